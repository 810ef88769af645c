//! Test doubles for the harness collaborators
//!
//! In-process executors and fault controllers with scripted, deterministic
//! behavior. Used by the unit tests here and by the integration suites.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use txchaos_core::{
    FailureKind, FaultController, FaultError, Reply, TransactionError, TransactionExecutor,
};

use crate::monitor::{ProgressReport, ProgressReporter};

/// Echoes every value back unchanged.
#[derive(Debug, Default)]
pub struct EchoExecutor {
    calls: AtomicU64,
}

impl EchoExecutor {
    /// Create a new echo executor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `execute` calls so far.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Acquire)
    }
}

#[async_trait]
impl TransactionExecutor for EchoExecutor {
    async fn execute(&self, value: i32) -> Result<Reply, TransactionError> {
        self.calls.fetch_add(1, Ordering::AcqRel);
        Ok(Reply::Row(value))
    }
}

/// Always returns `value + 1`.
#[derive(Debug, Default)]
pub struct OffByOneExecutor;

#[async_trait]
impl TransactionExecutor for OffByOneExecutor {
    async fn execute(&self, value: i32) -> Result<Reply, TransactionError> {
        Ok(Reply::Row(value.wrapping_add(1)))
    }
}

/// Always completes without a row.
#[derive(Debug, Default)]
pub struct NoRowExecutor;

#[async_trait]
impl TransactionExecutor for NoRowExecutor {
    async fn execute(&self, _value: i32) -> Result<Reply, TransactionError> {
        Ok(Reply::NoRow)
    }
}

/// Alternates connection failure / echo across all callers.
///
/// The n-th call overall (0-based) fails when n is even, so any even number
/// of calls splits exactly in half regardless of interleaving.
#[derive(Debug, Default)]
pub struct AlternatingExecutor {
    calls: AtomicU64,
}

impl AlternatingExecutor {
    /// Create a new alternating executor.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionExecutor for AlternatingExecutor {
    async fn execute(&self, value: i32) -> Result<Reply, TransactionError> {
        let n = self.calls.fetch_add(1, Ordering::AcqRel);
        if n % 2 == 0 {
            Err(TransactionError::connection("connection reset by peer"))
        } else {
            Ok(Reply::Row(value))
        }
    }
}

/// Fails with the given kind once the call count reaches `after`.
#[derive(Debug)]
pub struct FailingExecutor {
    kind: FailureKind,
    after: u64,
    calls: AtomicU64,
}

impl FailingExecutor {
    /// Echo for the first `after` calls, then fail every call with `kind`.
    pub fn after(after: u64, kind: FailureKind) -> Self {
        Self {
            kind,
            after,
            calls: AtomicU64::new(0),
        }
    }

    /// Number of `execute` calls so far.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Acquire)
    }
}

#[async_trait]
impl TransactionExecutor for FailingExecutor {
    async fn execute(&self, value: i32) -> Result<Reply, TransactionError> {
        let n = self.calls.fetch_add(1, Ordering::AcqRel);
        if n >= self.after {
            Err(TransactionError::new(self.kind, format!("injected failure on call {}", n)))
        } else {
            Ok(Reply::Row(value))
        }
    }
}

/// Scripted result for [`ScriptedExecutor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Echo the input
    Echo,
    /// Return this value regardless of input
    Row(i32),
    /// Return no row
    NoRow,
    /// Fail with this kind
    Fail(FailureKind),
}

/// Plays back a fixed script, then repeats a fallback step.
#[derive(Debug)]
pub struct ScriptedExecutor {
    script: Mutex<VecDeque<Step>>,
    fallback: Step,
    calls: AtomicU64,
}

impl ScriptedExecutor {
    /// Play `script` in order, then `fallback` forever.
    pub fn new(script: impl IntoIterator<Item = Step>, fallback: Step) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback,
            calls: AtomicU64::new(0),
        }
    }

    /// Repeat `step` forever.
    pub fn always(step: Step) -> Self {
        Self::new([], step)
    }

    /// Number of `execute` calls so far.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Acquire)
    }
}

#[async_trait]
impl TransactionExecutor for ScriptedExecutor {
    async fn execute(&self, value: i32) -> Result<Reply, TransactionError> {
        self.calls.fetch_add(1, Ordering::AcqRel);
        let step = self.script.lock().pop_front().unwrap_or(self.fallback);
        match step {
            Step::Echo => Ok(Reply::Row(value)),
            Step::Row(v) => Ok(Reply::Row(v)),
            Step::NoRow => Ok(Reply::NoRow),
            Step::Fail(kind) => Err(TransactionError::new(kind, "scripted failure")),
        }
    }
}

/// One call made against a [`RecordingFaultController`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FaultCall {
    /// `clear_rules`
    Clear,
    /// `install_hard_block`
    HardBlock,
    /// `install_probabilistic_drop`
    Drop(f64),
}

/// Failure a [`RecordingFaultController`] injects for one kind of call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultFailure {
    /// The command could not be started
    Spawn,
    /// The command ran and failed
    Exit,
}

/// Shared in-memory "network" connecting the fake controller and executor.
#[derive(Debug, Default)]
pub struct FakeNetwork {
    blocked: AtomicBool,
}

impl FakeNetwork {
    /// Create an unblocked network.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Whether a hard block is installed.
    pub fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::Acquire)
    }
}

/// Records every call in order; optionally drives a [`FakeNetwork`].
#[derive(Debug, Default)]
pub struct RecordingFaultController {
    calls: Mutex<Vec<FaultCall>>,
    network: Option<Arc<FakeNetwork>>,
    fail_clear: Mutex<Option<FaultFailure>>,
    fail_hard_block: Option<FaultFailure>,
    fail_drop: Option<FaultFailure>,
}

impl RecordingFaultController {
    /// A controller whose rules have no effect on anything.
    pub fn new() -> Self {
        Self::default()
    }

    /// A controller that blocks and unblocks `network`.
    pub fn wired(network: Arc<FakeNetwork>) -> Self {
        Self {
            network: Some(network),
            ..Self::default()
        }
    }

    /// Make the next `clear_rules` call fail.
    pub fn fail_next_clear(self, failure: FaultFailure) -> Self {
        *self.fail_clear.lock() = Some(failure);
        self
    }

    /// Make every `install_hard_block` call fail.
    pub fn fail_hard_block(mut self, failure: FaultFailure) -> Self {
        self.fail_hard_block = Some(failure);
        self
    }

    /// Make every `install_probabilistic_drop` call fail.
    pub fn fail_drop(mut self, failure: FaultFailure) -> Self {
        self.fail_drop = Some(failure);
        self
    }

    /// Calls made so far, in order.
    pub fn calls(&self) -> Vec<FaultCall> {
        self.calls.lock().clone()
    }

    fn record(&self, call: FaultCall, failure: Option<FaultFailure>) -> Result<(), FaultError> {
        self.calls.lock().push(call);
        let command = format!("fake {:?}", call);
        match failure {
            None => Ok(()),
            Some(FaultFailure::Spawn) => Err(FaultError::Spawn {
                command,
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such binary"),
            }),
            Some(FaultFailure::Exit) => Err(FaultError::CommandFailed {
                command,
                status: "exit status: 1".to_string(),
                stderr: "rule rejected".to_string(),
            }),
        }
    }

    fn set_blocked(&self, blocked: bool) {
        if let Some(network) = &self.network {
            network.blocked.store(blocked, Ordering::Release);
        }
    }
}

#[async_trait]
impl FaultController for RecordingFaultController {
    async fn clear_rules(&self) -> Result<(), FaultError> {
        let failure = self.fail_clear.lock().take();
        self.record(FaultCall::Clear, failure)?;
        self.set_blocked(false);
        Ok(())
    }

    async fn install_hard_block(&self) -> Result<(), FaultError> {
        self.record(FaultCall::HardBlock, self.fail_hard_block)?;
        self.set_blocked(true);
        Ok(())
    }

    async fn install_probabilistic_drop(&self, probability: f64) -> Result<(), FaultError> {
        self.record(FaultCall::Drop(probability), self.fail_drop)
    }
}

/// Echoes unless the [`FakeNetwork`] is blocked, then fails with `Connection`.
#[derive(Debug)]
pub struct NetworkExecutor {
    network: Arc<FakeNetwork>,
}

impl NetworkExecutor {
    /// Create an executor routed through `network`.
    pub fn new(network: Arc<FakeNetwork>) -> Self {
        Self { network }
    }
}

#[async_trait]
impl TransactionExecutor for NetworkExecutor {
    async fn execute(&self, value: i32) -> Result<Reply, TransactionError> {
        if self.network.is_blocked() {
            Err(TransactionError::connection("connection refused"))
        } else {
            Ok(Reply::Row(value))
        }
    }
}

/// Collects every progress report in memory.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<ProgressReport>>,
}

impl RecordingReporter {
    /// Create an empty recorder.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Reports received so far, in order.
    pub fn reports(&self) -> Vec<ProgressReport> {
        self.reports.lock().clone()
    }

    /// Only the reports flagged final.
    pub fn final_reports(&self) -> Vec<ProgressReport> {
        self.reports
            .lock()
            .iter()
            .filter(|r| r.is_final)
            .cloned()
            .collect()
    }
}

impl ProgressReporter for RecordingReporter {
    fn report(&self, report: &ProgressReport) {
        self.reports.lock().push(report.clone());
    }
}
