//! Checkpoint logging. Opens one append-mode, line-buffered log file per run
//! and writes a block per save-step boundary.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::FatalError;

/// Owns the run's single log file handle; exclusive to the dispatcher.
pub struct Checkpointer {
    path: PathBuf,
    file: BufWriter<File>,
}

impl Checkpointer {
    /// Opens `log/YYYYMMDD_HHMMSS.log` in append mode under `log_dir`.
    pub fn open(log_dir: &Path, timestamp: &str) -> Result<Self, FatalError> {
        fs::create_dir_all(log_dir).map_err(|source| FatalError::OpenLogFile {
            path: log_dir.to_path_buf(),
            source,
        })?;
        let path = log_dir.join(format!("{timestamp}.log"));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| FatalError::OpenLogFile {
                path: path.clone(),
                source,
            })?;
        Ok(Checkpointer {
            path,
            file: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one checkpoint block: iteration, Elo ± 2σ, and every parameter
    /// at 3-decimal precision, then flush (the file is line-buffered in
    /// spirit: each checkpoint is flushed as a unit).
    pub fn record(
        &mut self,
        iteration: u64,
        elo: f64,
        elo_2sigma: f64,
        theta: &[(String, f64)],
    ) -> Result<(), FatalError> {
        let write_result = (|| -> std::io::Result<()> {
            writeln!(self.file, "Iteration {iteration}: Elo={elo:.2} \u{b1}{elo_2sigma:.2}")?;
            writeln!(self.file, "Parameters:")?;
            let mut sorted = theta.to_vec();
            sorted.sort_by(|a, b| a.0.cmp(&b.0));
            for (name, value) in sorted {
                writeln!(self.file, "  {name}: {value:.3}")?;
            }
            self.file.flush()
        })();

        write_result.map_err(|source| FatalError::WriteLogFile {
            path: self.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_expected_block_shape() {
        let dir = tempfile::tempdir().unwrap();
        let mut checkpointer = Checkpointer::open(dir.path(), "20260101_000000").unwrap();
        checkpointer
            .record(
                2000,
                0.0,
                0.0,
                &[("reductionA".to_string(), 1642.0), ("statBonusA".to_string(), 12.0)],
            )
            .unwrap();

        let contents = fs::read_to_string(checkpointer.path()).unwrap();
        assert!(contents.contains("Iteration 2000: Elo=0.00 \u{b1}0.00"));
        assert!(contents.contains("Parameters:"));
        assert!(contents.contains("  reductionA: 1642.000"));
        assert!(contents.contains("  statBonusA: 12.000"));
    }

    #[test]
    fn appends_across_multiple_checkpoints() {
        let dir = tempfile::tempdir().unwrap();
        let mut checkpointer = Checkpointer::open(dir.path(), "20260101_000001").unwrap();
        checkpointer.record(1000, 1.0, 2.0, &[]).unwrap();
        checkpointer.record(2000, 3.0, 4.0, &[]).unwrap();

        let contents = fs::read_to_string(checkpointer.path()).unwrap();
        assert!(contents.contains("Iteration 1000"));
        assert!(contents.contains("Iteration 2000"));
    }
}
