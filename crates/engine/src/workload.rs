//! Workload engine
//!
//! Spawns a fixed pool of workers plus the progress monitor and supervises
//! them as one group:
//!
//! 1. Start the monitor, the optional run-duration timer and N workers.
//! 2. Join workers as they finish. The first non-transient failure sets the
//!    cancellation signal; joining continues until every worker has stopped.
//! 3. Set the signal (no-op if already set), stop the monitor and wait for
//!    its final report, which is taken after the last worker returned.
//! 4. Surface the first failure, or return the report.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;
use tracing::{error, info, warn};
use txchaos_concurrency::{CancellationSignal, CounterRegistry, CounterSnapshot, StopReason};
use txchaos_core::{Classifier, RunMode, TransactionError, TransactionExecutor, ValueSource};

use crate::monitor::{ProgressMonitor, ProgressReporter};
use crate::worker::{run_worker, ValueGenerator, WorkerContext, WorkerFailure};

/// Shape of one workload run.
#[derive(Debug, Clone)]
pub struct WorkloadSettings {
    /// Number of concurrent workers
    pub workers: usize,
    /// Per-worker budget
    pub mode: RunMode,
    /// Where echoed values come from
    pub value_source: ValueSource,
    /// Seed for random values
    pub seed: Option<u64>,
    /// Progress cadence
    pub monitor_interval: Duration,
    /// Optional wall-clock limit
    pub run_duration: Option<Duration>,
}

impl Default for WorkloadSettings {
    fn default() -> Self {
        Self {
            workers: 4000,
            mode: RunMode::Iterations(200),
            value_source: ValueSource::Worker,
            seed: None,
            monitor_interval: Duration::from_secs(5),
            run_duration: None,
        }
    }
}

/// Errors that end a workload run
#[derive(Debug, Error)]
pub enum WorkloadError {
    /// A worker hit a failure the classifier does not count
    #[error("worker {worker} failed after {attempts} attempts: {source}")]
    WorkerFailed {
        /// Failing worker identity
        worker: i32,
        /// Attempts it classified before failing
        attempts: u64,
        /// The failure
        #[source]
        source: TransactionError,
    },

    /// A worker task panicked
    #[error("worker task panicked: {0}")]
    WorkerPanicked(String),

    /// Worker identities must fit the echoed 32-bit value
    #[error("{0} workers exceed the 32-bit identity range")]
    TooManyWorkers(usize),
}

/// What a completed workload observed
#[derive(Debug, Clone, Serialize)]
pub struct WorkloadReport {
    /// Workers that ran
    pub workers: usize,
    /// Classified attempts summed over workers
    pub attempts: u64,
    /// Final counter values
    pub snapshot: CounterSnapshot,
    /// Periodic progress reports emitted
    pub periodic_reports: u64,
    /// Why the run stopped
    pub stop_reason: StopReason,
    /// Wall-clock time of the workload phase
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Runs the worker pool
pub struct WorkloadEngine {
    settings: WorkloadSettings,
    executor: Arc<dyn TransactionExecutor>,
    classifier: Classifier,
    reporter: Arc<dyn ProgressReporter>,
}

impl WorkloadEngine {
    /// Create an engine.
    pub fn new(
        settings: WorkloadSettings,
        executor: Arc<dyn TransactionExecutor>,
        classifier: Classifier,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Self {
        Self {
            settings,
            executor,
            classifier,
            reporter,
        }
    }

    /// Run every worker to completion with a fresh counter registry.
    pub async fn run(&self, signal: CancellationSignal) -> Result<WorkloadReport, WorkloadError> {
        self.run_with_counters(signal, Arc::new(CounterRegistry::new()))
            .await
    }

    /// Run every worker to completion, counting into `counters`.
    pub async fn run_with_counters(
        &self,
        signal: CancellationSignal,
        counters: Arc<CounterRegistry>,
    ) -> Result<WorkloadReport, WorkloadError> {
        let workers = self.settings.workers;
        if i32::try_from(workers).is_err() {
            return Err(WorkloadError::TooManyWorkers(workers));
        }

        let started = Instant::now();
        let monitor_stop = CancellationToken::new();
        let monitor = ProgressMonitor::new(self.settings.monitor_interval, Arc::clone(&self.reporter));
        let monitor_handle = tokio::spawn(monitor.run(Arc::clone(&counters), monitor_stop.clone()));
        // Dropping this future early still stops the monitor and flushes its final report.
        let monitor_stop = monitor_stop.drop_guard();

        let timer = self.settings.run_duration.map(|limit| {
            let signal = signal.clone();
            AbortOnDropHandle::new(tokio::spawn(async move {
                tokio::time::sleep(limit).await;
                if signal.cancel(StopReason::DurationElapsed) {
                    info!(target: "txchaos::workload", limit_ms = limit.as_millis() as u64, "run duration elapsed");
                }
            }))
        });

        let ctx = Arc::new(WorkerContext {
            executor: Arc::clone(&self.executor),
            classifier: self.classifier.clone(),
            counters: Arc::clone(&counters),
            signal: signal.clone(),
            mode: self.settings.mode,
        });

        let mut pool = JoinSet::new();
        for id in 0..workers as i32 {
            let values = ValueGenerator::for_worker(self.settings.value_source, id, self.settings.seed);
            pool.spawn(run_worker(id, Arc::clone(&ctx), values));
        }
        info!(target: "txchaos::workload", workers, mode = ?self.settings.mode, "workers started");

        let mut attempts = 0u64;
        let mut failure: Option<WorkloadError> = None;
        while let Some(joined) = pool.join_next().await {
            match joined {
                Ok(Ok(done)) => attempts += done,
                Ok(Err(WorkerFailure {
                    worker,
                    attempts: done,
                    error: cause,
                })) => {
                    attempts += done;
                    if failure.is_none() {
                        error!(target: "txchaos::workload", worker, kind = %cause.kind(), error = %cause, "unclassified failure, stopping all workers");
                        signal.cancel(StopReason::WorkerFailed);
                        failure = Some(WorkloadError::WorkerFailed {
                            worker,
                            attempts: done,
                            source: cause,
                        });
                    } else {
                        warn!(target: "txchaos::workload", worker, error = %cause, "additional worker failure");
                    }
                }
                Err(join_error) => {
                    if failure.is_none() {
                        error!(target: "txchaos::workload", error = %join_error, "worker task panicked, stopping all workers");
                        signal.cancel(StopReason::WorkerFailed);
                        failure = Some(WorkloadError::WorkerPanicked(join_error.to_string()));
                    }
                }
            }
        }

        signal.cancel(StopReason::Completed);
        drop(timer);

        drop(monitor_stop);
        let summary = match monitor_handle.await {
            Ok(summary) => Some(summary),
            Err(join_error) => {
                warn!(target: "txchaos::workload", error = %join_error, "progress monitor did not finish cleanly");
                None
            }
        };

        if let Some(failure) = failure {
            return Err(failure);
        }

        let report = WorkloadReport {
            workers,
            attempts,
            snapshot: summary
                .map(|s| s.final_snapshot)
                .unwrap_or_else(|| counters.snapshot()),
            periodic_reports: summary.map(|s| s.periodic_reports).unwrap_or(0),
            stop_reason: signal.reason().unwrap_or(StopReason::Completed),
            elapsed: started.elapsed(),
        };
        info!(
            target: "txchaos::workload",
            attempts = report.attempts,
            stop_reason = %report.stop_reason,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "workload finished"
        );
        Ok(report)
    }
}
