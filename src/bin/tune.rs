#![allow(clippy::uninlined_format_args)]

use std::process::exit;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use spsa_tuner::checkpoint::Checkpointer;
use spsa_tuner::config::Cli;
use spsa_tuner::match_runner::{CuteChessRunner, MatchSettings};
use spsa_tuner::registry::{Overrides, Registry};
use spsa_tuner::spsa::{Optimizer, OptimizerOptions, Schedule};

fn init_logging() {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                message
            ))
        })
        .level(log::LevelFilter::Info)
        .chain(std::io::stderr())
        .apply()
        .expect("logger already initialized");
}

fn load_overrides_or_warn(path: &Option<std::path::PathBuf>) -> Overrides {
    match path {
        None => Overrides::new(),
        Some(path) => match spsa_tuner::registry::load_overrides_file(path) {
            Ok(overrides) => overrides,
            Err(err) => {
                log::warn!("{err}");
                Overrides::new()
            }
        },
    }
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let target = match cli.spsa_target_group() {
        Ok(group) => group,
        Err(err) => {
            log::error!("{err}");
            exit(1);
        }
    };

    let overrides_info = load_overrides_or_warn(&cli.json_info);
    let overrides_tc = load_overrides_or_warn(&cli.json_tc);

    let mut warnings = Vec::new();
    let registry = Registry::load(&overrides_info, &overrides_tc, target, &mut warnings);
    for warning in &warnings {
        log::warn!("{warning}");
    }
    if registry.is_empty() {
        log::error!("parameter registry is empty, nothing to tune");
        exit(1);
    }

    let runner = CuteChessRunner::new(MatchSettings {
        match_runner_path: cli.match_runner.clone(),
        engine_path: cli.engine.clone(),
        book_path: cli.book.clone(),
        tc_seconds: cli.tc,
        concurrency: 1,
        resign_movecount: 8,
        resign_score: 600,
        draw_movenumber: 40,
        draw_movecount: 8,
        draw_score: 20,
    });

    let options = OptimizerOptions {
        iterations: cli.iterations,
        save_step: cli.save_step,
        test_rounds: cli.test_rounds,
        use_adam: cli.use_adam,
        schedule: Schedule {
            big_a: cli.resolved_big_a(),
            ..Schedule::default()
        },
    };
    let concurrency = cli.resolved_concurrency();
    let optimizer = Optimizer::new(registry, options, runner);

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = interrupted.clone();
        ctrlc::set_handler(move || {
            log::warn!("interrupt received, finishing the current phase and exiting");
            interrupted.store(true, Ordering::SeqCst);
        })
        .expect("failed to install SIGINT handler");
    }

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    let mut checkpoint = match Checkpointer::open(&cli.log_dir, &timestamp) {
        Ok(checkpoint) => checkpoint,
        Err(err) => {
            log::error!("{err}");
            exit(1);
        }
    };

    log::info!(
        "starting SPSA tuning: {} iterations, {} workers, target={}",
        cli.iterations,
        concurrency,
        cli.spsa_target
    );

    if let Err(err) = optimizer.run(&mut checkpoint, concurrency, &interrupted) {
        log::error!("{err}");
        exit(1);
    }

    println!("SPSA optimization finished.");
    println!("Final parameters:");
    for (name, value) in optimizer.theta_snapshot() {
        println!("  {name}: {value:.3}");
    }
}
