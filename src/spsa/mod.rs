//! The SPSA core: constants, the per-iteration update step,
//! and the checkpoint-phase dispatcher.

mod adam;

use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::checkpoint::Checkpointer;
use crate::elo;
use crate::error::FatalError;
use crate::match_runner::MatchRunner;
use crate::registry::Registry;

use adam::AdamState;

/// A Rademacher sign. Kept as a two-inhabitant enum (rather than a float) so
/// the quotient-vs-product ambiguity for non-Rademacher perturbations cannot
/// arise: there is no way to construct a `Sign` other than `Plus` or `Minus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Plus,
    Minus,
}

impl Sign {
    fn sample<R: Rng + ?Sized>(rng: &mut R) -> Sign {
        if rng.gen_bool(0.5) {
            Sign::Plus
        } else {
            Sign::Minus
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Sign::Plus => 1.0,
            Sign::Minus => -1.0,
        }
    }
}

/// The SPSA decay schedule's exponents and stability constant (standard
/// Spall gamma/alpha schedule).
#[derive(Debug, Clone, Copy)]
pub struct Schedule {
    pub gamma: f64,
    pub alpha: f64,
    pub big_a: f64,
}

impl Default for Schedule {
    fn default() -> Self {
        Schedule {
            gamma: 0.101,
            alpha: 0.602,
            big_a: 0.0,
        }
    }
}

/// Tunables the dispatcher needs beyond the registry and match runner.
#[derive(Debug, Clone)]
pub struct OptimizerOptions {
    pub iterations: u64,
    pub save_step: u64,
    pub test_rounds: u32,
    pub use_adam: bool,
    pub schedule: Schedule,
}

/// Precomputed `a0`/`c0` per updating parameter.
struct Constants {
    c0: HashMap<String, f64>,
    a0: HashMap<String, f64>,
}

/// Draw a `[####----] current/total` bar on the current terminal line.
fn print_progress_bar(current: u64, total: u64) {
    const BAR_SIZE: u64 = 30;
    let ratio = if total == 0 { 0.0 } else { current as f64 / total as f64 };
    let filled = (BAR_SIZE as f64 * ratio) as u64;
    let bar: String = "#".repeat(filled as usize) + &"-".repeat((BAR_SIZE - filled) as usize);
    print!("\r[{bar}] {current}/{total}");
    let _ = std::io::stdout().flush();
}

fn compute_constants(registry: &Registry, iterations: u64, schedule: Schedule) -> Constants {
    let mut c0 = HashMap::new();
    let mut a0 = HashMap::new();
    let iterations = iterations as f64;
    for name in registry.updating_names() {
        let descriptor = registry.get(name).expect("name came from this registry");
        let c0_val = descriptor.c_end * iterations.powf(schedule.gamma);
        let a_end = descriptor.r_end * descriptor.c_end * descriptor.c_end;
        let a0_val = a_end * (schedule.big_a + iterations).powf(schedule.alpha);
        c0.insert(name.to_string(), c0_val);
        a0.insert(name.to_string(), a0_val);
    }
    Constants { c0, a0 }
}

struct SharedState {
    theta: HashMap<String, f64>,
    m: HashMap<String, f64>,
    v: HashMap<String, f64>,
    adam: AdamState,
    global_iter: u64,
}

/// The optimizer owns the registry, the precomputed schedule constants, and
/// the mutex-protected live state (`θ`, Adam accumulators, `globalIter`).
pub struct Optimizer<R: MatchRunner> {
    registry: Registry,
    constants: Constants,
    options: OptimizerOptions,
    state: Mutex<SharedState>,
    runner: R,
}

impl<R: MatchRunner> Optimizer<R> {
    pub fn new(registry: Registry, options: OptimizerOptions, runner: R) -> Self {
        let constants = compute_constants(&registry, options.iterations, options.schedule);
        let mut theta = HashMap::new();
        let mut m = HashMap::new();
        let mut v = HashMap::new();
        for (name, descriptor) in registry.iter() {
            theta.insert(name.to_string(), descriptor.default);
            if descriptor.update {
                m.insert(name.to_string(), 0.0);
                v.insert(name.to_string(), 0.0);
            }
        }
        let state = Mutex::new(SharedState {
            theta,
            m,
            v,
            adam: AdamState::default(),
            global_iter: 0,
        });
        Optimizer {
            registry,
            constants,
            options,
            state,
            runner,
        }
    }

    /// A snapshot of `θ`, for tests and for the evaluation match.
    pub fn theta_snapshot(&self) -> Vec<(String, f64)> {
        let state = self.state.lock().unwrap();
        let mut snapshot: Vec<_> = state.theta.iter().map(|(k, v)| (k.clone(), *v)).collect();
        snapshot.sort_by(|a, b| a.0.cmp(&b.0));
        snapshot
    }

    fn theta_rounded(&self) -> HashMap<String, i64> {
        let state = self.state.lock().unwrap();
        state.theta.iter().map(|(k, v)| (k.clone(), v.round() as i64)).collect()
    }

    pub fn global_iter(&self) -> u64 {
        self.state.lock().unwrap().global_iter
    }

    /// One SPSA step: perturb, dispatch a
    /// paired match, then apply the clipped gradient update under the lock.
    fn step(&self, iteration: u64) {
        let theta_snap: HashMap<String, f64> = {
            let state = self.state.lock().unwrap();
            state.theta.clone()
        };

        let mut rng = rand::rngs::StdRng::from_entropy();
        let mut plus = HashMap::new();
        let mut minus = HashMap::new();
        let mut deltas: HashMap<String, Sign> = HashMap::new();
        let mut c_i: HashMap<String, f64> = HashMap::new();

        for (name, descriptor) in self.registry.iter() {
            let base = theta_snap[name];
            if descriptor.update {
                let c0 = self.constants.c0[name];
                let c_val = c0 / (iteration as f64).powf(self.options.schedule.gamma);
                let sign = Sign::sample(&mut rng);
                let plus_val = descriptor.clip(base + c_val * sign.as_f64());
                let minus_val = descriptor.clip(base - c_val * sign.as_f64());
                plus.insert(name.to_string(), plus_val.round() as i64);
                minus.insert(name.to_string(), minus_val.round() as i64);
                deltas.insert(name.to_string(), sign);
                c_i.insert(name.to_string(), c_val);
            } else {
                plus.insert(name.to_string(), base.round() as i64);
                minus.insert(name.to_string(), base.round() as i64);
            }
        }

        let outcome = self.runner.run_paired(&plus, &minus);
        let y = outcome.score() as f64;

        let mut state = self.state.lock().unwrap();
        state.adam.t += 1;
        let adam_t = state.adam.t;
        for name in self.registry.updating_names() {
            let descriptor = self.registry.get(name).unwrap();
            let a0 = self.constants.a0[name];
            let a_val = a0 / (self.options.schedule.big_a + iteration as f64).powf(self.options.schedule.alpha);
            let sign = deltas[name];
            let c_val = c_i[name];
            let g = (y / sign.as_f64()) / (2.0 * c_val);

            let update = if !self.options.use_adam {
                a_val * g
            } else {
                let m = state.m.get_mut(name).unwrap();
                *m = adam::BETA1 * *m + (1.0 - adam::BETA1) * g;
                let m_val = *m;
                let v = state.v.get_mut(name).unwrap();
                *v = adam::BETA2 * *v + (1.0 - adam::BETA2) * g * g;
                let v_val = *v;
                adam::step(m_val, v_val, adam_t)
            };
            let theta = state.theta.get_mut(name).unwrap();
            *theta += update;
            *theta = descriptor.clip(*theta);
        }
    }

    /// Claim-and-run every iteration in `[lo, hi]` on a thread pool sized to
    /// `concurrency`, bounded to one save-step phase so the dispatcher can
    /// checkpoint between phases.
    fn run_phase(&self, lo: u64, hi: u64, concurrency: usize, interrupted: &AtomicBool) {
        if lo > hi {
            return;
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(concurrency.max(1))
            .build()
            .expect("failed to build worker thread pool");
        let total = self.options.iterations;
        pool.install(|| {
            (lo..=hi).into_par_iter().for_each(|i| {
                if interrupted.load(Ordering::SeqCst) {
                    return;
                }
                self.step(i);
                let current = {
                    let mut state = self.state.lock().unwrap();
                    state.global_iter += 1;
                    state.global_iter
                };
                print_progress_bar(current, total);
            });
        });
        println!();
    }

    /// Drive the iteration counter in `save_step`-sized phases, evaluating
    /// and logging after each boundary, until `iterations` is reached or
    /// `interrupted` is set (workers observe the flag at their next claim
    /// point rather than being forcibly killed mid-match).
    pub fn run(
        &self,
        checkpoint: &mut Checkpointer,
        concurrency: usize,
        interrupted: &Arc<AtomicBool>,
    ) -> Result<(), FatalError> {
        loop {
            let lo = self.global_iter() + 1;
            let hi = (lo + self.options.save_step - 1).min(self.options.iterations);
            if lo > self.options.iterations {
                break;
            }

            self.run_phase(lo, hi, concurrency, interrupted);

            let rounded = self.theta_rounded();
            let outcome = self.runner.run_eval(&rounded, self.options.test_rounds);
            let (elo_val, elo_2sigma) = elo::estimate(outcome.wins, outcome.losses, outcome.draws);
            checkpoint.record(self.global_iter(), elo_val, elo_2sigma, &self.theta_snapshot())?;
            log::info!(
                "iteration {}: elo={elo_val:.2} +/-{elo_2sigma:.2}",
                self.global_iter()
            );

            if interrupted.load(Ordering::SeqCst) || self.global_iter() >= self.options.iterations {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::match_runner::MatchOutcome;
    use crate::registry::{Group, Overrides};
    use std::sync::atomic::AtomicU64;

    /// A mock match runner returning a fixed outcome for every paired match
    /// and every evaluation match.
    struct FixedMatchRunner {
        paired: MatchOutcome,
        eval: MatchOutcome,
        paired_calls: AtomicU64,
    }

    impl MatchRunner for FixedMatchRunner {
        fn run_paired(&self, _plus: &HashMap<String, i64>, _minus: &HashMap<String, i64>) -> MatchOutcome {
            self.paired_calls.fetch_add(1, Ordering::SeqCst);
            self.paired
        }

        fn run_eval(&self, _params: &HashMap<String, i64>, _rounds: u32) -> MatchOutcome {
            self.eval
        }
    }

    fn options(iterations: u64, save_step: u64) -> OptimizerOptions {
        OptimizerOptions {
            iterations,
            save_step,
            test_rounds: 8,
            use_adam: false,
            schedule: Schedule {
                big_a: 0.1 * iterations as f64,
                ..Schedule::default()
            },
        }
    }

    fn test_registry(target: Group) -> Registry {
        let mut warnings = Vec::new();
        Registry::load(&Overrides::new(), &Overrides::new(), target, &mut warnings)
    }

    #[test]
    fn all_draw_mock_never_moves_theta() {
        let registry = test_registry(Group::Info);
        let runner = FixedMatchRunner {
            paired: MatchOutcome { wins: 0, losses: 0, draws: 2 },
            eval: MatchOutcome { wins: 0, losses: 0, draws: 2 },
            paired_calls: AtomicU64::new(0),
        };
        let optimizer = Optimizer::new(registry, options(20, 20), runner);
        let interrupted = Arc::new(AtomicBool::new(false));
        let dir = tempfile::tempdir().unwrap();
        let mut checkpoint = Checkpointer::open(dir.path(), "test-a").unwrap();

        optimizer.run(&mut checkpoint, 4, &interrupted).unwrap();

        for (name, descriptor) in optimizer.registry.iter() {
            if descriptor.update {
                let theta = optimizer.theta_snapshot();
                let value = theta.iter().find(|(n, _)| n == name).unwrap().1;
                assert_eq!(value, descriptor.default, "{name} drifted under an all-draw mock");
            }
        }
        assert_eq!(optimizer.global_iter(), 20);
    }

    #[test]
    fn always_plus_wins_drifts_theta_away_from_default() {
        let mut warnings = Vec::new();
        let registry = Registry::load(&Overrides::new(), &Overrides::new(), Group::Tc, &mut warnings);
        let runner = FixedMatchRunner {
            paired: MatchOutcome { wins: 2, losses: 0, draws: 0 },
            eval: MatchOutcome { wins: 1, losses: 1, draws: 0 },
            paired_calls: AtomicU64::new(0),
        };
        let optimizer = Optimizer::new(registry, options(10, 10), runner);
        let interrupted = Arc::new(AtomicBool::new(false));
        let dir = tempfile::tempdir().unwrap();
        let mut checkpoint = Checkpointer::open(dir.path(), "test-b").unwrap();

        optimizer.run(&mut checkpoint, 1, &interrupted).unwrap();

        let mut moved = false;
        for (name, descriptor) in optimizer.registry.iter() {
            if descriptor.update {
                let theta = optimizer.theta_snapshot();
                let value = theta.iter().find(|(n, _)| n == name).unwrap().1;
                if value != descriptor.default {
                    moved = true;
                }
                assert!(descriptor.range.0 <= value && value <= descriptor.range.1);
            }
        }
        assert!(moved, "expected at least one parameter to move under an always-winning mock");
    }

    #[test]
    fn pinned_parameters_never_move() {
        let mut overrides = Overrides::new();
        overrides.insert("reductionA".to_string(), 1500);
        let mut warnings = Vec::new();
        let registry = Registry::load(&overrides, &Overrides::new(), Group::Both, &mut warnings);
        let runner = FixedMatchRunner {
            paired: MatchOutcome { wins: 2, losses: 0, draws: 0 },
            eval: MatchOutcome { wins: 1, losses: 1, draws: 0 },
            paired_calls: AtomicU64::new(0),
        };
        let optimizer = Optimizer::new(registry, options(10, 10), runner);
        let interrupted = Arc::new(AtomicBool::new(false));
        let dir = tempfile::tempdir().unwrap();
        let mut checkpoint = Checkpointer::open(dir.path(), "test-c").unwrap();

        optimizer.run(&mut checkpoint, 2, &interrupted).unwrap();

        let theta = optimizer.theta_snapshot();
        let value = theta.iter().find(|(n, _)| n == "reductionA").unwrap().1;
        assert_eq!(value, 1500.0);
        assert!(!optimizer.registry.get("reductionA").unwrap().update);
    }

    #[test]
    fn interrupt_stops_future_phases_and_still_checkpoints() {
        let registry = test_registry(Group::Info);
        let runner = FixedMatchRunner {
            paired: MatchOutcome { wins: 1, losses: 1, draws: 0 },
            eval: MatchOutcome { wins: 1, losses: 1, draws: 0 },
            paired_calls: AtomicU64::new(0),
        };
        let optimizer = Optimizer::new(registry, options(100, 10), runner);
        let interrupted = Arc::new(AtomicBool::new(true));
        let dir = tempfile::tempdir().unwrap();
        let mut checkpoint = Checkpointer::open(dir.path(), "test-e").unwrap();

        optimizer.run(&mut checkpoint, 2, &interrupted).unwrap();

        assert!(optimizer.global_iter() <= 10);
        let contents = std::fs::read_to_string(checkpoint.path()).unwrap();
        assert!(contents.contains("Iteration"));
    }
}
