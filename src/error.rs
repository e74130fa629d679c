use std::path::PathBuf;

/// Errors raised while loading the parameter registry or CLI configuration.
///
/// Per the error-handling policy, these are never fatal on their own: the
/// binary logs them with `log::warn!` and drops the offending entry.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("override file {path:?} refers to unknown parameter {name:?}")]
    UnknownOverride { path: PathBuf, name: String },

    #[error("duplicate parameter name {name:?} across registry groups")]
    DuplicateName { name: String },

    #[error("failed to read override file {path:?}: {source}")]
    ReadOverrideFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse override file {path:?} as JSON: {source}")]
    ParseOverrideFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised by the match supervisor.
///
/// A `MatchRunnerError` never propagates out of [`crate::spsa`]: a failed
/// match is treated as a zero-score observation (`y = 0`) and the SPSA step
/// that triggered it still counts against the iteration budget.
#[derive(Debug, thiserror::Error)]
pub enum MatchRunnerError {
    #[error("failed to launch match runner {path:?}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("match runner {path:?} exited with status {status}")]
    NonZeroExit { path: PathBuf, status: i32 },

    #[error("no parseable score line in match runner output")]
    NoScoreLine,
}

/// Fatal errors that abort the optimization run outright.
#[derive(Debug, thiserror::Error)]
pub enum FatalError {
    #[error("failed to open checkpoint log file {path:?}: {source}")]
    OpenLogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write checkpoint log file {path:?}: {source}")]
    WriteLogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
