//! Shared test utilities for the integration suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]
#![allow(unused_imports)]

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub use txchaos_engine::testing::{
    AlternatingExecutor, EchoExecutor, FakeNetwork, FaultCall, FaultFailure, NetworkExecutor,
    NoRowExecutor, OffByOneExecutor, RecordingFaultController, RecordingReporter,
    ScriptedExecutor, Step,
};
pub use txchaos::{
    CancellationSignal, Category, CounterSnapshot, FailureKind, FaultController, FaultError,
    Harness, HarnessConfig, HarnessError, Reply, RunReport, StopReason, TransactionError,
    TransactionExecutor, WorkloadEngine, WorkloadError, WorkloadReport, WorkloadSettings,
};

/// Config for an in-process run: small pool, fast monitor.
pub fn test_config(workers: usize, iterations: u64) -> HarnessConfig {
    HarnessConfig {
        database_url: "postgres://chaos@127.0.0.1/chaos".to_string(),
        workers,
        iterations,
        monitor_interval_ms: 20,
        ..HarnessConfig::default()
    }
}

/// Workload settings matching [`test_config`].
pub fn test_settings(workers: usize, iterations: u64) -> WorkloadSettings {
    WorkloadSettings {
        workers,
        mode: txchaos::RunMode::Iterations(iterations),
        monitor_interval: Duration::from_millis(20),
        ..WorkloadSettings::default()
    }
}

/// Every attempt landed in exactly one bucket.
pub fn assert_totals(snapshot: &CounterSnapshot, expected_total: u64) {
    assert_eq!(
        snapshot.success + snapshot.invalid + snapshot.missing + snapshot.network_errors,
        expected_total,
        "counters do not add up: {}",
        snapshot
    );
    assert_eq!(snapshot.total(), expected_total);
}

// ============================================================================
// Lossy network simulation
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum Rule {
    None,
    Reject,
    Drop(f64),
}

/// In-memory packet filter with the same three rule states as iptables.
///
/// Dropped replies surface as `Timeout` failures, rejected ones as
/// `Connection` failures.
#[derive(Debug)]
pub struct LossyNetwork {
    rule: Mutex<Rule>,
    rng: Mutex<StdRng>,
    dropped: AtomicU64,
}

impl LossyNetwork {
    pub fn seeded(seed: u64) -> Arc<Self> {
        Arc::new(Self {
            rule: Mutex::new(Rule::None),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            dropped: AtomicU64::new(0),
        })
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Acquire)
    }

    pub fn drop_probability(&self) -> Option<f64> {
        match *self.rule.lock() {
            Rule::Drop(p) => Some(p),
            _ => None,
        }
    }
}

/// Fault controller driving a [`LossyNetwork`].
pub struct LossyController(pub Arc<LossyNetwork>);

#[async_trait]
impl FaultController for LossyController {
    async fn clear_rules(&self) -> Result<(), FaultError> {
        *self.0.rule.lock() = Rule::None;
        Ok(())
    }

    async fn install_hard_block(&self) -> Result<(), FaultError> {
        *self.0.rule.lock() = Rule::Reject;
        Ok(())
    }

    async fn install_probabilistic_drop(&self, probability: f64) -> Result<(), FaultError> {
        *self.0.rule.lock() = Rule::Drop(probability);
        Ok(())
    }
}

/// Echo executor whose replies travel over a [`LossyNetwork`].
pub struct LossyExecutor(pub Arc<LossyNetwork>);

#[async_trait]
impl TransactionExecutor for LossyExecutor {
    async fn execute(&self, value: i32) -> Result<Reply, TransactionError> {
        let rule = *self.0.rule.lock();
        match rule {
            Rule::None => Ok(Reply::Row(value)),
            Rule::Reject => Err(TransactionError::connection("connection refused")),
            Rule::Drop(p) => {
                if self.0.rng.lock().gen_bool(p) {
                    self.0.dropped.fetch_add(1, Ordering::AcqRel);
                    Err(TransactionError::timeout("reply dropped"))
                } else {
                    Ok(Reply::Row(value))
                }
            }
        }
    }
}
