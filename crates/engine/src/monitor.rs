//! Periodic progress reporting
//!
//! The monitor wakes every period, snapshots the counter registry and hands
//! a [`ProgressReport`] to its reporter. When told to stop it takes one last
//! snapshot and emits it flagged `is_final`, exactly once.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::info;
use txchaos_concurrency::{CounterRegistry, CounterSnapshot};

/// One progress line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressReport {
    /// Counter values at the time of the report
    pub snapshot: CounterSnapshot,
    /// Time since the monitor started
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    /// Whether this is the terminal report
    pub is_final: bool,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Receives progress reports
pub trait ProgressReporter: Send + Sync {
    /// Emit one report.
    fn report(&self, report: &ProgressReport);
}

/// Logs progress lines through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn report(&self, report: &ProgressReport) {
        let s = &report.snapshot;
        if report.is_final {
            info!(
                target: "txchaos::progress",
                total = s.total(),
                success = s.success,
                network_errors = s.network_errors,
                missing = s.missing,
                invalid = s.invalid,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "final: {}",
                s
            );
        } else {
            info!(
                target: "txchaos::progress",
                total = s.total(),
                network_errors = s.network_errors,
                missing = s.missing,
                invalid = s.invalid,
                "{}",
                s
            );
        }
    }
}

/// Totals returned when the monitor stops
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSummary {
    /// Periodic (non-final) reports emitted
    pub periodic_reports: u64,
    /// Snapshot carried by the final report
    pub final_snapshot: CounterSnapshot,
}

/// Periodic counter reporter
pub struct ProgressMonitor {
    interval: Duration,
    reporter: Arc<dyn ProgressReporter>,
}

impl ProgressMonitor {
    /// Create a monitor emitting every `interval`.
    ///
    /// # Panics
    ///
    /// Panics if `interval` is zero.
    pub fn new(interval: Duration, reporter: Arc<dyn ProgressReporter>) -> Self {
        assert!(!interval.is_zero(), "monitor interval must be non-zero");
        Self { interval, reporter }
    }

    /// Report until `stop` is cancelled, then emit the final report.
    ///
    /// The first periodic report comes one full interval after start.
    pub async fn run(self, counters: Arc<CounterRegistry>, stop: CancellationToken) -> MonitorSummary {
        let started = Instant::now();
        let mut ticker = tokio::time::interval_at(started + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut periodic_reports = 0u64;

        loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                _ = ticker.tick() => {
                    self.reporter.report(&ProgressReport {
                        snapshot: counters.snapshot(),
                        elapsed: started.elapsed(),
                        is_final: false,
                    });
                    periodic_reports += 1;
                }
            }
        }

        let final_snapshot = counters.snapshot();
        self.reporter.report(&ProgressReport {
            snapshot: final_snapshot,
            elapsed: started.elapsed(),
            is_final: true,
        });

        MonitorSummary {
            periodic_reports,
            final_snapshot,
        }
    }
}
