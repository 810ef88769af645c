//! Chaos harness engine
//!
//! This crate drives a run end to end:
//! - Sequencer: clear faults, wait for the database, verify the hard block,
//!   arm the probabilistic drop
//! - Workload: N workers echoing values, each result classified and counted
//! - Monitor: periodic progress lines and one final report
//! - Harness: the two phases glued together, plus interrupt handling
//!
//! Collaborators (transaction executor, fault controller) come in as trait
//! objects; `testing` (behind the `testing` feature) has in-process doubles
//! for both.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod harness;
pub mod interrupt;
pub mod monitor;
pub mod sequencer;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod worker;
pub mod workload;

pub use harness::{Harness, HarnessError, RunReport};
pub use interrupt::{spawn_interrupt_listener, watch_interrupts};
pub use monitor::{MonitorSummary, ProgressMonitor, ProgressReport, ProgressReporter, TracingReporter};
pub use sequencer::{Phase, SequenceError, SequenceReport, Sequencer, SequencerSettings};
pub use worker::{run_worker, ValueGenerator, WorkerContext, WorkerFailure};
pub use workload::{WorkloadEngine, WorkloadError, WorkloadReport, WorkloadSettings};
