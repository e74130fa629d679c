//! Configuration loader: the CLI surface and the JSON
//! override files it reads.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{Arg, ArgAction, Command};

use crate::registry::Group;

/// Tune a chess engine's search parameters with parallel SPSA.
#[derive(Debug, Clone)]
pub struct Cli {
    pub spsa_target: String,
    pub json_info: Option<PathBuf>,
    pub json_tc: Option<PathBuf>,
    pub iterations: u64,
    pub concurrency: Option<usize>,
    pub save_step: u64,
    pub test_rounds: u32,
    pub use_adam: bool,
    pub big_a: Option<f64>,
    pub engine: PathBuf,
    pub match_runner: PathBuf,
    pub book: PathBuf,
    pub tc: u32,
    pub log_dir: PathBuf,
}

fn command() -> Command {
    Command::new("tune")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Tune a chess engine's search parameters with parallel SPSA.")
        .arg(
            Arg::new("spsa-target")
                .long("spsa-target")
                .help("Which origin group SPSA is allowed to update")
                .num_args(1)
                .default_value("info"),
        )
        .arg(
            Arg::new("json-info")
                .long("json-info")
                .help("JSON override file for the \"info\" parameter group")
                .num_args(1)
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("json-tc")
                .long("json-tc")
                .help("JSON override file for the \"tc\" parameter group")
                .num_args(1)
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("iterations")
                .long("iterations")
                .help("Total number of SPSA iterations to run")
                .num_args(1)
                .default_value("100000")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("concurrency")
                .long("concurrency")
                .help("Number of concurrent workers. Defaults to the number of logical CPUs")
                .num_args(1)
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("save-step")
                .long("save-step")
                .help("Iterations per checkpoint/evaluation phase")
                .num_args(1)
                .default_value("2000")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("test-rounds")
                .long("test-rounds")
                .help("Game-pairs played during each periodic Elo evaluation")
                .num_args(1)
                .default_value("1024")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("use-adam")
                .long("use-adam")
                .help("Use the Adam update rule instead of plain SGD")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("A")
                .long("A")
                .help("SPSA stability constant. Defaults to 0.1 * iterations")
                .num_args(1)
                .value_parser(clap::value_parser!(f64)),
        )
        .arg(
            Arg::new("engine")
                .long("engine")
                .help("Path to the engine binary under test")
                .num_args(1)
                .default_value("./engine")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("match-runner")
                .long("match-runner")
                .help("Path to the match-runner binary (e.g. cutechess-cli)")
                .num_args(1)
                .default_value("cutechess-cli")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("book")
                .long("book")
                .help("Opening book file passed to the match runner")
                .num_args(1)
                .default_value("openings.epd")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("tc")
                .long("tc")
                .help("Per-game time control, in seconds")
                .num_args(1)
                .default_value("10")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("log-dir")
                .long("log-dir")
                .help("Directory the checkpoint log is written under")
                .num_args(1)
                .default_value("log")
                .value_parser(clap::value_parser!(PathBuf)),
        )
}

impl Cli {
    pub fn parse() -> Cli {
        Cli::parse_from(std::env::args_os())
    }

    pub fn parse_from<I, T>(args: I) -> Cli
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = command().get_matches_from(args);
        Cli {
            spsa_target: matches.get_one::<String>("spsa-target").unwrap().clone(),
            json_info: matches.get_one::<PathBuf>("json-info").cloned(),
            json_tc: matches.get_one::<PathBuf>("json-tc").cloned(),
            iterations: *matches.get_one::<u64>("iterations").unwrap(),
            concurrency: matches.get_one::<usize>("concurrency").copied(),
            save_step: *matches.get_one::<u64>("save-step").unwrap(),
            test_rounds: *matches.get_one::<u32>("test-rounds").unwrap(),
            use_adam: matches.get_flag("use-adam"),
            big_a: matches.get_one::<f64>("A").copied(),
            engine: matches.get_one::<PathBuf>("engine").unwrap().clone(),
            match_runner: matches.get_one::<PathBuf>("match-runner").unwrap().clone(),
            book: matches.get_one::<PathBuf>("book").unwrap().clone(),
            tc: *matches.get_one::<u32>("tc").unwrap(),
            log_dir: matches.get_one::<PathBuf>("log-dir").unwrap().clone(),
        }
    }

    pub fn spsa_target_group(&self) -> Result<Group, String> {
        self.spsa_target.parse()
    }

    pub fn resolved_concurrency(&self) -> usize {
        self.concurrency.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    pub fn resolved_big_a(&self) -> f64 {
        self.big_a.unwrap_or(0.1 * self.iterations as f64)
    }
}
