//! Worker loop
//!
//! A worker repeatedly echoes a value through the executor, classifies the
//! result and bumps the matching counter. It checks the cancellation signal
//! at the top of every iteration and never abandons an attempt midway.
//! Non-transient failures end the worker with an error.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tracing::{debug, trace};
use txchaos_concurrency::{CancellationSignal, CounterRegistry};
use txchaos_core::{Classifier, RunMode, TransactionError, TransactionExecutor, ValueSource};

/// Everything a worker shares with its siblings.
pub struct WorkerContext {
    /// Performs the round-trips
    pub executor: Arc<dyn TransactionExecutor>,
    /// Maps results to categories
    pub classifier: Classifier,
    /// Outcome tallies for the run
    pub counters: Arc<CounterRegistry>,
    /// Run-wide stop flag
    pub signal: CancellationSignal,
    /// Iteration budget
    pub mode: RunMode,
}

/// Produces the value a worker echoes on each attempt.
#[derive(Debug)]
pub enum ValueGenerator {
    /// Always the worker identity
    Identity(i32),
    /// A fresh non-negative value per attempt
    Random(StdRng),
}

impl ValueGenerator {
    /// Build the generator for worker `id`.
    ///
    /// With a seed, worker `id` draws from `seed + id`, so runs repeat.
    pub fn for_worker(source: ValueSource, id: i32, seed: Option<u64>) -> Self {
        match source {
            ValueSource::Worker => ValueGenerator::Identity(id),
            ValueSource::Random => {
                let rng = match seed {
                    Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(id as u64)),
                    None => StdRng::from_entropy(),
                };
                ValueGenerator::Random(rng)
            }
        }
    }

    /// Next value to echo.
    pub fn next_value(&mut self) -> i32 {
        match self {
            ValueGenerator::Identity(id) => *id,
            ValueGenerator::Random(rng) => rng.gen_range(0..=i32::MAX),
        }
    }
}

/// A worker that hit a non-transient failure
#[derive(Debug)]
pub struct WorkerFailure {
    /// Identity of the failing worker
    pub worker: i32,
    /// Classified attempts it completed before failing
    pub attempts: u64,
    /// The failure
    pub error: TransactionError,
}

/// Run one worker to completion.
///
/// Returns the number of classified attempts.
pub async fn run_worker(
    id: i32,
    ctx: Arc<WorkerContext>,
    mut values: ValueGenerator,
) -> Result<u64, WorkerFailure> {
    let mut attempts = 0u64;

    loop {
        if ctx.signal.is_cancelled() {
            debug!(target: "txchaos::worker", worker = id, attempts, "cancelled");
            break;
        }
        if let RunMode::Iterations(budget) = ctx.mode {
            if attempts >= budget {
                break;
            }
        }

        // Let sibling workers and the monitor run even when the executor
        // resolves without suspending.
        tokio::task::yield_now().await;

        let value = values.next_value();
        let result = ctx.executor.execute(value).await;
        let category = match ctx.classifier.classify(value, result) {
            Ok(category) => category,
            Err(error) => {
                return Err(WorkerFailure {
                    worker: id,
                    attempts,
                    error,
                })
            }
        };
        ctx.counters.increment(category);
        attempts += 1;
        trace!(target: "txchaos::worker", worker = id, value, %category, "attempt classified");
    }

    Ok(attempts)
}
