//! Sequencing Integration Tests
//!
//! Whole-harness runs against simulated networks: the fault phases happen in
//! order, gate the workload, and leave the drop rule in place for it.

#[path = "../common/mod.rs"]
mod common;

mod gating;
mod lossy_run;
