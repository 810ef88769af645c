//! Production collaborators for the chaos harness
//!
//! - [`PostgresExecutor`]: echo transactions over a sqlx connection pool
//! - [`IptablesFaultController`]: packet-filter rules via an iptables binary

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod iptables;
pub mod postgres;

pub use iptables::IptablesFaultController;
pub use postgres::{failure_kind, kind_for_sqlstate, PostgresExecutor};
