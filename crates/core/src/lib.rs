//! Core types and traits for txchaos
//!
//! This crate defines the vocabulary shared by the harness:
//! - Reply / Outcome / Category: what one round-trip produced and where it is counted
//! - Classifier: maps executor results to outcomes, by failure kind
//! - Errors: TransactionError (with FailureKind), FaultError, ConfigError
//! - HarnessConfig: `txchaos.toml` configuration
//! - Traits: TransactionExecutor, FaultController

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod classify;
pub mod config;
pub mod error;
pub mod outcome;
pub mod traits;

pub use classify::Classifier;
pub use config::{
    FaultsConfig, HarnessConfig, InterruptPolicy, RunMode, ValueSource, CONFIG_FILE_NAME,
};
pub use error::{BoxError, ConfigError, FailureKind, FaultError, TransactionError};
pub use outcome::{Category, Outcome, Reply};
pub use traits::{FaultController, TransactionExecutor};
