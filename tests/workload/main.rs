//! Workload Integration Tests
//!
//! Full worker pools against in-process executors: per-category counts,
//! counter totals, cancellation and run-duration behavior.

#[path = "../common/mod.rs"]
mod common;

mod cancellation;
mod categories;
mod totals;
