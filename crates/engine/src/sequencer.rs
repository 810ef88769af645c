//! Readiness and fault sequencing
//!
//! Runs strictly before the workload, with no other traffic in flight:
//!
//! ```text
//! Init
//!   -> ClearingFaults           clear all rules
//!   -> AwaitingReadiness        probe until a round-trip completes or the deadline passes
//!   -> VerifyingHardBlock       install hard block, one probe must fail transiently
//!   -> ArmingProbabilisticDrop  clear rules, install probabilistic drop
//!   -> Ready
//! ```
//!
//! Every collaborator call is awaited before the next phase starts. Any
//! failure aborts the sequence; if a hard block may still be installed, a
//! best-effort clear is attempted before the error is returned.
//!
//! The cancellation signal is checked between phases and raced against
//! readiness polling, so an operator interrupt never lets a rule be
//! installed after it arrives.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use txchaos_concurrency::CancellationSignal;
use txchaos_core::{
    Category, Classifier, FaultController, FaultError, Outcome, Reply, TransactionError,
    TransactionExecutor,
};

/// Sequencer state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Nothing done yet
    Init,
    /// Removing leftover rules
    ClearingFaults,
    /// Polling the database
    AwaitingReadiness,
    /// Checking that the hard block actually blocks
    VerifyingHardBlock,
    /// Installing the lossy-network rule
    ArmingProbabilisticDrop,
    /// Handed off to the workload
    Ready,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Init => "init",
            Phase::ClearingFaults => "clearing faults",
            Phase::AwaitingReadiness => "awaiting readiness",
            Phase::VerifyingHardBlock => "verifying hard block",
            Phase::ArmingProbabilisticDrop => "arming probabilistic drop",
            Phase::Ready => "ready",
        };
        f.write_str(name)
    }
}

/// Errors that abort the sequence
#[derive(Debug, Error)]
pub enum SequenceError {
    /// A fault controller call failed
    #[error("fault controller failed while {phase}: {source}")]
    FaultController {
        /// Phase that issued the call
        phase: Phase,
        /// Underlying failure
        #[source]
        source: FaultError,
    },

    /// The database never answered a probe
    #[error("database not ready after {attempts} probes in {elapsed:?}: {last_failure}")]
    ReadinessTimeout {
        /// Probes issued
        attempts: u32,
        /// Time spent polling
        elapsed: Duration,
        /// Failure from the final probe
        #[source]
        last_failure: TransactionError,
    },

    /// The probe got through the hard block
    #[error("hard block is ineffective: probe completed with a {category} outcome")]
    HardBlockIneffective {
        /// How the probe was classified
        category: Category,
    },

    /// The probe failed, but not the way a blocked network fails
    #[error("hard block probe failed with a non-transient failure: {0}")]
    HardBlockUnexpectedFailure(#[source] TransactionError),

    /// The cancellation signal was set before the sequence reached `Ready`
    #[error("sequence interrupted while {phase}")]
    Interrupted {
        /// Phase that was running or about to run
        phase: Phase,
    },
}

/// Tunables for the sequencer
#[derive(Debug, Clone)]
pub struct SequencerSettings {
    /// Value echoed by probes
    pub probe_value: i32,
    /// Deadline for the readiness poll
    pub readiness_timeout: Duration,
    /// Delay between readiness probes
    pub retry_interval: Duration,
    /// Fraction of traffic dropped once armed
    pub drop_probability: f64,
}

impl Default for SequencerSettings {
    fn default() -> Self {
        Self {
            probe_value: 1,
            readiness_timeout: Duration::from_secs(30),
            retry_interval: Duration::from_secs(1),
            drop_probability: 0.1,
        }
    }
}

/// What the sequence observed
#[derive(Debug, Clone, Serialize)]
pub struct SequenceReport {
    /// Readiness probes issued, including the successful one
    pub readiness_attempts: u32,
    /// Time until the database answered
    #[serde(rename = "readiness_elapsed_ms", serialize_with = "serialize_millis")]
    pub readiness_elapsed: Duration,
    /// Kind of the failure observed behind the hard block
    pub hard_block_failure: String,
    /// Installed drop probability
    pub drop_probability: f64,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Drives the readiness and fault phases
pub struct Sequencer {
    settings: SequencerSettings,
    executor: Arc<dyn TransactionExecutor>,
    faults: Arc<dyn FaultController>,
    classifier: Classifier,
    signal: CancellationSignal,
    phase: Phase,
    history: Vec<Phase>,
}

impl Sequencer {
    /// Create a sequencer in [`Phase::Init`].
    pub fn new(
        settings: SequencerSettings,
        executor: Arc<dyn TransactionExecutor>,
        faults: Arc<dyn FaultController>,
        classifier: Classifier,
    ) -> Self {
        Self {
            settings,
            executor,
            faults,
            classifier,
            signal: CancellationSignal::new(),
            phase: Phase::Init,
            history: vec![Phase::Init],
        }
    }

    /// Stop sequencing once `signal` is set.
    pub fn with_signal(mut self, signal: CancellationSignal) -> Self {
        self.signal = signal;
        self
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Every phase entered so far, in order.
    pub fn history(&self) -> &[Phase] {
        &self.history
    }

    fn enter(&mut self, phase: Phase) {
        debug!(target: "txchaos::sequence", from = %self.phase, to = %phase, "phase transition");
        self.phase = phase;
        self.history.push(phase);
    }

    fn ensure_running(&self) -> Result<(), SequenceError> {
        if self.signal.is_cancelled() {
            info!(target: "txchaos::sequence", phase = %self.phase, "sequence interrupted");
            return Err(SequenceError::Interrupted { phase: self.phase });
        }
        Ok(())
    }

    /// Run every phase up to [`Phase::Ready`].
    pub async fn run(&mut self) -> Result<SequenceReport, SequenceError> {
        self.enter(Phase::ClearingFaults);
        self.clear_initial().await?;

        self.enter(Phase::AwaitingReadiness);
        self.ensure_running()?;
        let (readiness_attempts, readiness_elapsed) = self.await_readiness().await?;

        self.enter(Phase::VerifyingHardBlock);
        self.ensure_running()?;
        let hard_block_failure = match self.verify_hard_block().await {
            Ok(kind) => kind,
            Err(err) => {
                self.clear_after_abort().await;
                return Err(err);
            }
        };

        self.enter(Phase::ArmingProbabilisticDrop);
        if let Err(err) = self.ensure_running() {
            self.clear_after_abort().await;
            return Err(err);
        }
        if let Err(err) = self.arm_drop().await {
            self.clear_after_abort().await;
            return Err(err);
        }

        self.enter(Phase::Ready);
        Ok(SequenceReport {
            readiness_attempts,
            readiness_elapsed,
            hard_block_failure,
            drop_probability: self.settings.drop_probability,
        })
    }

    /// The first clear only needs the command to start; the rule table may
    /// legitimately be in any state.
    async fn clear_initial(&self) -> Result<(), SequenceError> {
        match self.faults.clear_rules().await {
            Ok(()) => {
                info!(target: "txchaos::sequence", "fault rules cleared");
                Ok(())
            }
            Err(FaultError::CommandFailed { command, status, stderr }) => {
                warn!(target: "txchaos::sequence", %command, %status, %stderr, "initial clear reported failure, continuing");
                Ok(())
            }
            Err(source) => Err(SequenceError::FaultController {
                phase: Phase::ClearingFaults,
                source,
            }),
        }
    }

    async fn await_readiness(&self) -> Result<(u32, Duration), SequenceError> {
        let probe = self.settings.probe_value;
        let started = Instant::now();
        let deadline = started + self.settings.readiness_timeout;
        let mut attempts = 0u32;

        info!(target: "txchaos::sequence", timeout_ms = self.settings.readiness_timeout.as_millis() as u64, "waiting for database");
        loop {
            attempts += 1;
            let result = tokio::select! {
                biased;
                _ = self.signal.cancelled() => return Err(self.interrupted_readiness(attempts - 1)),
                result = self.executor.execute(probe) => result,
            };
            let last_failure = match result {
                Ok(reply) => {
                    if reply != Reply::Row(probe) {
                        warn!(target: "txchaos::sequence", ?reply, probe, "readiness probe answered with an unexpected reply");
                    }
                    let elapsed = started.elapsed();
                    info!(target: "txchaos::sequence", attempts, elapsed_ms = elapsed.as_millis() as u64, "database ready");
                    return Ok((attempts, elapsed));
                }
                Err(err) => err,
            };
            debug!(target: "txchaos::sequence", attempts, error = %last_failure, "readiness probe failed");

            let now = Instant::now();
            if now >= deadline {
                return Err(SequenceError::ReadinessTimeout {
                    attempts,
                    elapsed: now - started,
                    last_failure,
                });
            }
            tokio::select! {
                biased;
                _ = self.signal.cancelled() => return Err(self.interrupted_readiness(attempts)),
                _ = tokio::time::sleep_until((now + self.settings.retry_interval).min(deadline)) => {}
            }
        }
    }

    fn interrupted_readiness(&self, attempts: u32) -> SequenceError {
        info!(target: "txchaos::sequence", attempts, "readiness polling interrupted");
        SequenceError::Interrupted {
            phase: Phase::AwaitingReadiness,
        }
    }

    async fn verify_hard_block(&self) -> Result<String, SequenceError> {
        self.faults
            .install_hard_block()
            .await
            .map_err(|source| SequenceError::FaultController {
                phase: Phase::VerifyingHardBlock,
                source,
            })?;

        let probe = self.settings.probe_value;
        let result = self.executor.execute(probe).await;
        match self.classifier.assess(probe, result) {
            Ok(Outcome::TransientFailure(err)) => {
                info!(target: "txchaos::sequence", kind = %err.kind(), "hard block verified");
                Ok(err.kind().to_string())
            }
            Ok(outcome) => Err(SequenceError::HardBlockIneffective {
                category: outcome.category(),
            }),
            Err(err) => Err(SequenceError::HardBlockUnexpectedFailure(err)),
        }
    }

    async fn arm_drop(&self) -> Result<(), SequenceError> {
        let wrap = |source| SequenceError::FaultController {
            phase: Phase::ArmingProbabilisticDrop,
            source,
        };
        self.faults.clear_rules().await.map_err(wrap)?;
        self.faults
            .install_probabilistic_drop(self.settings.drop_probability)
            .await
            .map_err(wrap)?;
        info!(target: "txchaos::sequence", probability = self.settings.drop_probability, "probabilistic drop armed");
        Ok(())
    }

    async fn clear_after_abort(&self) {
        if let Err(err) = self.faults.clear_rules().await {
            warn!(target: "txchaos::sequence", error = %err, "could not clear fault rules after abort");
        }
    }
}
