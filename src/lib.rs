//! Parallel SPSA tuning for a chess engine's integer search parameters.
//!
//! The optimizer (see [`spsa::Optimizer`]) schedules short self-play
//! matches across a worker pool, harvests their noisy score signals through
//! the [`match_runner`] boundary, and applies clipped gradient-style updates
//! to a shared parameter vector (see [`registry`]) under an iteration
//! budget, with optional Adam smoothing and periodic Elo evaluation
//! ([`elo`]) checkpointed to a log file ([`checkpoint`]).
//!
//! # Example
//!
//! ```rust,no_run
//! use spsa_tuner::checkpoint::Checkpointer;
//! use spsa_tuner::match_runner::{CuteChessRunner, MatchSettings};
//! use spsa_tuner::registry::{Group, Overrides, Registry};
//! use spsa_tuner::spsa::{Optimizer, OptimizerOptions, Schedule};
//! use std::path::PathBuf;
//! use std::sync::atomic::AtomicBool;
//! use std::sync::Arc;
//!
//! let mut warnings = Vec::new();
//! let registry = Registry::load(&Overrides::new(), &Overrides::new(), Group::Info, &mut warnings);
//! let runner = CuteChessRunner::new(MatchSettings {
//!     match_runner_path: PathBuf::from("cutechess-cli"),
//!     engine_path: PathBuf::from("./engine"),
//!     book_path: PathBuf::from("openings.epd"),
//!     tc_seconds: 10,
//!     concurrency: 1,
//!     resign_movecount: 8,
//!     resign_score: 600,
//!     draw_movenumber: 40,
//!     draw_movecount: 8,
//!     draw_score: 20,
//! });
//! let optimizer = Optimizer::new(
//!     registry,
//!     OptimizerOptions {
//!         iterations: 100_000,
//!         save_step: 2_000,
//!         test_rounds: 1_024,
//!         use_adam: false,
//!         schedule: Schedule { big_a: 10_000.0, ..Schedule::default() },
//!     },
//!     runner,
//! );
//! let mut checkpoint = Checkpointer::open(std::path::Path::new("log"), "20260101_000000").unwrap();
//! let interrupted = Arc::new(AtomicBool::new(false));
//! optimizer.run(&mut checkpoint, 8, &interrupted).unwrap();
//! ```

pub mod checkpoint;
pub mod config;
pub mod elo;
pub mod error;
pub mod match_runner;
pub mod registry;
pub mod spsa;
