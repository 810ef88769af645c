//! Run orchestration
//!
//! A run is the readiness/fault sequence followed by the workload. The
//! workload never starts unless the sequence reached `Ready`, so the
//! counters only ever see traffic under the probabilistic drop.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::info;
use txchaos_concurrency::CancellationSignal;
use txchaos_core::{FaultController, HarnessConfig, TransactionExecutor};

use crate::monitor::ProgressReporter;
use crate::sequencer::{SequenceError, SequenceReport, Sequencer, SequencerSettings};
use crate::workload::{WorkloadEngine, WorkloadError, WorkloadReport, WorkloadSettings};

/// Errors that end a run
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Readiness or fault sequencing failed; no workload ran
    #[error("sequencing failed: {0}")]
    Sequence(#[from] SequenceError),

    /// The workload ended on a failure
    #[error("workload failed: {0}")]
    Workload(#[from] WorkloadError),
}

/// Everything a successful run observed
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// Wall-clock time of the whole run
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    /// Readiness and fault setup
    pub sequence: SequenceReport,
    /// Workload outcome
    pub workload: WorkloadReport,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

impl RunReport {
    /// Whether any reply came back wrong or empty.
    pub fn has_correctness_violations(&self) -> bool {
        self.workload.snapshot.has_correctness_violations()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.workload.snapshot;
        writeln!(f, "run started   {}", self.started_at.to_rfc3339())?;
        writeln!(f, "stop reason   {}", self.workload.stop_reason)?;
        writeln!(f, "elapsed       {:.3}s", self.elapsed.as_secs_f64())?;
        writeln!(
            f,
            "readiness     {} probes in {:.3}s",
            self.sequence.readiness_attempts,
            self.sequence.readiness_elapsed.as_secs_f64()
        )?;
        writeln!(f, "drop rate     {}", self.sequence.drop_probability)?;
        writeln!(f, "workers       {}", self.workload.workers)?;
        writeln!(f, "processed     {}", s.total())?;
        writeln!(f, "success       {}", s.success)?;
        writeln!(f, "network       {}", s.network_errors)?;
        writeln!(f, "missing       {}", s.missing)?;
        write!(f, "invalid       {}", s.invalid)
    }
}

/// Wires the collaborators together for one run
pub struct Harness {
    config: HarnessConfig,
    executor: Arc<dyn TransactionExecutor>,
    faults: Arc<dyn FaultController>,
    reporter: Arc<dyn ProgressReporter>,
}

impl Harness {
    /// Create a harness from a validated config.
    pub fn new(
        config: HarnessConfig,
        executor: Arc<dyn TransactionExecutor>,
        faults: Arc<dyn FaultController>,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Self {
        Self {
            config,
            executor,
            faults,
            reporter,
        }
    }

    /// Config this harness runs with.
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    fn sequencer_settings(&self) -> SequencerSettings {
        SequencerSettings {
            probe_value: self.config.probe_value,
            readiness_timeout: self.config.readiness_timeout(),
            retry_interval: self.config.readiness_retry(),
            drop_probability: self.config.drop_probability,
        }
    }

    fn workload_settings(&self) -> WorkloadSettings {
        WorkloadSettings {
            workers: self.config.workers,
            mode: self.config.run_mode(),
            value_source: self.config.value_source,
            seed: self.config.seed,
            monitor_interval: self.config.monitor_interval(),
            run_duration: self.config.run_duration(),
        }
    }

    /// Sequence the faults, then run the workload until it completes or
    /// `signal` is set.
    pub async fn run(&self, signal: CancellationSignal) -> Result<RunReport, HarnessError> {
        let started_at = Utc::now();
        let started = Instant::now();
        let classifier = self.config.classifier();

        let mut sequencer = Sequencer::new(
            self.sequencer_settings(),
            Arc::clone(&self.executor),
            Arc::clone(&self.faults),
            classifier.clone(),
        )
        .with_signal(signal.clone());
        let sequence = sequencer.run().await?;

        let engine = WorkloadEngine::new(
            self.workload_settings(),
            Arc::clone(&self.executor),
            classifier,
            Arc::clone(&self.reporter),
        );
        let workload = engine.run(signal).await?;

        let report = RunReport {
            started_at,
            elapsed: started.elapsed(),
            sequence,
            workload,
        };
        info!(
            target: "txchaos::harness",
            stop_reason = %report.workload.stop_reason,
            processed = report.workload.snapshot.total(),
            violations = report.has_correctness_violations(),
            "done"
        );
        Ok(report)
    }
}
