//! The match supervisor: launches the external match runner
//! and parses its score summary.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Command;

use regex::Regex;

use crate::error::MatchRunnerError;

/// A match outcome `(W, L, D)` from the perspective of the first-named side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchOutcome {
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
}

impl MatchOutcome {
    /// `y = W - L`, the scalar SPSA measurement (draws contribute zero).
    pub fn score(&self) -> i64 {
        self.wins as i64 - self.losses as i64
    }
}

/// Static settings shared by every match the supervisor launches.
#[derive(Debug, Clone)]
pub struct MatchSettings {
    pub match_runner_path: PathBuf,
    pub engine_path: PathBuf,
    pub book_path: PathBuf,
    pub tc_seconds: u32,
    pub concurrency: u32,
    pub resign_movecount: u32,
    pub resign_score: i32,
    pub draw_movenumber: u32,
    pub draw_movecount: u32,
    pub draw_score: i32,
}

/// The boundary the SPSA core depends on. Kept as a trait so tests can drive
/// the optimizer with a deterministic mock instead of a real subprocess.
pub trait MatchRunner: Send + Sync {
    /// Play a paired match: `plus` and `minus` each get their own rounded
    /// integer option set. Returns the outcome from `plus`'s perspective.
    fn run_paired(&self, plus: &HashMap<String, i64>, minus: &HashMap<String, i64>) -> MatchOutcome;

    /// Play `rounds` round-pairs with both sides configured identically
    /// (the evaluation match).
    fn run_eval(&self, params: &HashMap<String, i64>, rounds: u32) -> MatchOutcome;
}

/// Production [`MatchRunner`] backed by a `cutechess-cli`-compatible
/// subprocess.
pub struct CuteChessRunner {
    settings: MatchSettings,
}

impl CuteChessRunner {
    pub fn new(settings: MatchSettings) -> Self {
        CuteChessRunner { settings }
    }

    fn engine_args(&self, name: &str, params: &HashMap<String, i64>) -> Vec<String> {
        let mut args = vec![
            "-engine".to_string(),
            format!("cmd={}", self.settings.engine_path.display()),
            "proto=uci".to_string(),
            format!("name={name}"),
        ];
        let mut names: Vec<&String> = params.keys().collect();
        names.sort();
        for name in names {
            args.push(format!("option.{name}={}", params[name]));
        }
        args
    }

    fn shared_args(&self, rounds: u32) -> Vec<String> {
        vec![
            "-each".to_string(),
            format!("tc={}", self.settings.tc_seconds),
            "-games".to_string(),
            "2".to_string(),
            "-rounds".to_string(),
            rounds.to_string(),
            "-repeat".to_string(),
            "-openings".to_string(),
            format!("file={}", self.settings.book_path.display()),
            "format=epd".to_string(),
            "order=random".to_string(),
            "-concurrency".to_string(),
            self.settings.concurrency.to_string(),
            "-resign".to_string(),
            format!("movecount={}", self.settings.resign_movecount),
            format!("score={}", self.settings.resign_score),
            "-draw".to_string(),
            format!("movenumber={}", self.settings.draw_movenumber),
            format!("movecount={}", self.settings.draw_movecount),
            format!("score={}", self.settings.draw_score),
        ]
    }

    fn execute(&self, args: &[String]) -> Result<MatchOutcome, MatchRunnerError> {
        let output = Command::new(&self.settings.match_runner_path)
            .args(args)
            .output()
            .map_err(|source| MatchRunnerError::Spawn {
                path: self.settings.match_runner_path.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(MatchRunnerError::NonZeroExit {
                path: self.settings.match_runner_path.clone(),
                status: output.status.code().unwrap_or(-1),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_score_line(&stdout).ok_or(MatchRunnerError::NoScoreLine)
    }

    fn run_and_recover(&self, args: Vec<String>) -> MatchOutcome {
        match self.execute(&args) {
            Ok(outcome) => outcome,
            Err(err) => {
                log::warn!("match runner call failed, treating as a zero-score result: {err}");
                MatchOutcome::default()
            }
        }
    }
}

impl MatchRunner for CuteChessRunner {
    fn run_paired(&self, plus: &HashMap<String, i64>, minus: &HashMap<String, i64>) -> MatchOutcome {
        let mut args = self.engine_args("plus", plus);
        args.extend(self.engine_args("minus", minus));
        args.extend(self.shared_args(1));
        self.run_and_recover(args)
    }

    fn run_eval(&self, params: &HashMap<String, i64>, rounds: u32) -> MatchOutcome {
        let mut args = self.engine_args("Base", params);
        args.extend(self.engine_args("Test", params));
        args.extend(self.shared_args(rounds));
        self.run_and_recover(args)
    }
}

/// Scan `stdout` linewise for `Score of <A> vs <B>: W - L - D`, keeping the
/// last match if several are present.
fn parse_score_line(stdout: &str) -> Option<MatchOutcome> {
    let re = Regex::new(r"Score of .*?: (\d+)\s*-\s*(\d+)\s*-\s*(\d+)").unwrap();
    re.captures_iter(stdout).last().map(|caps| MatchOutcome {
        wins: caps[1].parse().unwrap_or(0),
        losses: caps[2].parse().unwrap_or(0),
        draws: caps[3].parse().unwrap_or(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_score_line() {
        let stdout = "Started tournament\nScore of plus vs minus: 12 - 4 - 8\n";
        let outcome = parse_score_line(stdout).unwrap();
        assert_eq!(outcome, MatchOutcome { wins: 12, losses: 4, draws: 8 });
    }

    #[test]
    fn takes_the_last_score_line_when_several_present() {
        let stdout = "Score of plus vs minus: 1 - 0 - 0\nScore of plus vs minus: 2 - 1 - 1\n";
        let outcome = parse_score_line(stdout).unwrap();
        assert_eq!(outcome, MatchOutcome { wins: 2, losses: 1, draws: 1 });
    }

    #[test]
    fn tolerates_trailing_brackets_and_totals() {
        let stdout = "Score of plus vs minus: 5 - 3 - 2 [0.575] 10\n";
        let outcome = parse_score_line(stdout).unwrap();
        assert_eq!(outcome, MatchOutcome { wins: 5, losses: 3, draws: 2 });
    }

    #[test]
    fn returns_none_when_no_line_matches() {
        assert!(parse_score_line("no useful output here").is_none());
    }

    #[test]
    fn score_is_wins_minus_losses() {
        let outcome = MatchOutcome { wins: 12, losses: 4, draws: 8 };
        assert_eq!(outcome.score(), 8);
    }
}
