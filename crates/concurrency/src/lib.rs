//! Shared concurrent state for a txchaos run
//!
//! The workers and the progress monitor share exactly two things:
//! - CounterRegistry: lock-free per-category tallies
//! - CancellationSignal: the set-once stop flag
//!
//! Both are built once per run and passed down explicitly.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cancel;
pub mod counters;

pub use cancel::{CancellationSignal, StopReason};
pub use counters::{CounterRegistry, CounterSnapshot};
