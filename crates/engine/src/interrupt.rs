//! Operator interrupt handling
//!
//! Ctrl-C is intercepted for the whole run. Under
//! [`InterruptPolicy::StopWorkers`] the first interrupt sets the cancellation
//! signal; under [`InterruptPolicy::Ignore`] interrupts are logged and
//! swallowed. The watcher exits once the signal is set by anyone.

use std::future::Future;
use std::io;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use txchaos_concurrency::{CancellationSignal, StopReason};
use txchaos_core::InterruptPolicy;

/// Apply `policy` to every interrupt yielded by `next_interrupt` until
/// `signal` is set.
///
/// Returns the number of interrupts observed.
pub async fn watch_interrupts<F, Fut>(
    signal: CancellationSignal,
    policy: InterruptPolicy,
    mut next_interrupt: F,
) -> u64
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    let mut seen = 0u64;
    loop {
        tokio::select! {
            biased;
            _ = signal.cancelled() => return seen,
            received = next_interrupt() => {
                if let Err(err) = received {
                    warn!(target: "txchaos::interrupt", error = %err, "could not listen for interrupts");
                    return seen;
                }
                seen += 1;
                match policy {
                    InterruptPolicy::StopWorkers => {
                        info!(target: "txchaos::interrupt", "interrupt received, stopping workers");
                        signal.cancel(StopReason::Interrupted);
                        return seen;
                    }
                    InterruptPolicy::Ignore => {
                        info!(target: "txchaos::interrupt", count = seen, "interrupt received and ignored");
                    }
                }
            }
        }
    }
}

/// Listen for Ctrl-C in the background.
pub fn spawn_interrupt_listener(
    signal: CancellationSignal,
    policy: InterruptPolicy,
) -> JoinHandle<u64> {
    tokio::spawn(watch_interrupts(signal, policy, tokio::signal::ctrl_c))
}
