//! Run-wide cancellation signal
//!
//! A set-once, level-triggered stop flag shared by every worker and the
//! progress monitor. Once cancelled it stays cancelled. The first caller to
//! cancel also records why the run stopped; later reasons are ignored.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, OnceLock};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Why the workload stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every worker spent its iteration budget
    Completed,
    /// The configured run duration elapsed
    DurationElapsed,
    /// An operator interrupt asked the workers to stop
    Interrupted,
    /// A worker hit a failure that could not be classified
    WorkerFailed,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StopReason::Completed => "completed",
            StopReason::DurationElapsed => "duration elapsed",
            StopReason::Interrupted => "interrupted",
            StopReason::WorkerFailed => "worker failed",
        };
        f.write_str(name)
    }
}

/// Shared stop flag for one run
///
/// Cloning is cheap; all clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct CancellationSignal {
    token: CancellationToken,
    reason: Arc<OnceLock<StopReason>>,
}

impl CancellationSignal {
    /// Create an unset signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the signal. Returns `true` if this call was the one that set it.
    pub fn cancel(&self, reason: StopReason) -> bool {
        let first = self.reason.set(reason).is_ok();
        if first {
            debug!(target: "txchaos::cancel", %reason, "cancellation signal set");
        }
        self.token.cancel();
        first
    }

    /// Whether the signal has been set.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The reason recorded by the first `cancel` call.
    pub fn reason(&self) -> Option<StopReason> {
        self.reason.get().copied()
    }

    /// Resolves once the signal is set.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}
