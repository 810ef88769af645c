//! Collaborator traits
//!
//! The harness drives two external capabilities: something that performs one
//! transactional round-trip, and something that manipulates packet delivery
//! between the harness and the database. Both are object-safe so the engine
//! can hold them as `Arc<dyn ...>`.

use async_trait::async_trait;

use crate::error::{FaultError, TransactionError};
use crate::outcome::Reply;

/// Performs one transactional round-trip
///
/// Each call opens (or checks out) a connection, begins a transaction, runs a
/// single parameterized query echoing `value`, reads at most one row and
/// commits. Calls are independent; implementations never retry internally.
///
/// Thread safety: called concurrently from thousands of tasks.
#[async_trait]
pub trait TransactionExecutor: Send + Sync {
    /// Echo `value` through the database.
    ///
    /// # Errors
    ///
    /// Returns a [`TransactionError`] tagged with the failure kind. A call
    /// that exceeds the configured timeout fails with
    /// [`FailureKind::Timeout`](crate::FailureKind::Timeout).
    async fn execute(&self, value: i32) -> Result<Reply, TransactionError>;
}

/// Installs and clears network impairment rules
///
/// Every operation is idempotent from the harness' point of view and has
/// completed by the time the returned future resolves.
#[async_trait]
pub trait FaultController: Send + Sync {
    /// Remove every rule this controller manages.
    async fn clear_rules(&self) -> Result<(), FaultError>;

    /// Make all return traffic from the database fail outright.
    async fn install_hard_block(&self) -> Result<(), FaultError>;

    /// Drop `probability` of the return traffic from the database.
    async fn install_probabilistic_drop(&self, probability: f64) -> Result<(), FaultError>;
}
