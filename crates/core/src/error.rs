//! Error types shared across the harness
//!
//! Transaction failures carry a [`FailureKind`] assigned by the executor when
//! it maps driver errors. The classifier decides which kinds are transient by
//! looking at the kind only, never at the message.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use thiserror::Error;

/// Boxed source error carried by [`TransactionError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Broad kind of a failed transactional round-trip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Connection refused, reset, closed, or the pool could not hand one out
    Connection,
    /// The round-trip did not finish within the transaction timeout
    Timeout,
    /// Malformed or unexpected wire traffic
    Protocol,
    /// The server rejected the statement
    Database,
    /// The returned row could not be decoded
    Decode,
    /// The executor is misconfigured (bad URL, missing TLS setup, ...)
    Configuration,
    /// Anything the executor could not place
    Other,
}

impl FailureKind {
    /// All kinds, in declaration order.
    pub const ALL: [FailureKind; 7] = [
        FailureKind::Connection,
        FailureKind::Timeout,
        FailureKind::Protocol,
        FailureKind::Database,
        FailureKind::Decode,
        FailureKind::Configuration,
        FailureKind::Other,
    ];

    /// Stable lowercase name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Connection => "connection",
            FailureKind::Timeout => "timeout",
            FailureKind::Protocol => "protocol",
            FailureKind::Database => "database",
            FailureKind::Decode => "decode",
            FailureKind::Configuration => "configuration",
            FailureKind::Other => "other",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed transactional round-trip
#[derive(Debug, Error)]
#[error("{kind} failure: {message}")]
pub struct TransactionError {
    kind: FailureKind,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl TransactionError {
    /// Create an error of the given kind without an underlying source.
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create an error of the given kind wrapping a driver error.
    pub fn with_source(
        kind: FailureKind,
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Shorthand for a [`FailureKind::Connection`] error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Connection, message)
    }

    /// Shorthand for a [`FailureKind::Timeout`] error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Timeout, message)
    }

    /// The failure kind.
    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    /// The failure message, without the kind prefix.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors from a fault controller
#[derive(Debug, Error)]
pub enum FaultError {
    /// The rule command could not be started at all
    #[error("failed to invoke `{command}`: {source}")]
    Spawn {
        /// Command line that was attempted
        command: String,
        /// Underlying spawn error
        #[source]
        source: io::Error,
    },

    /// The rule command ran but reported failure
    #[error("`{command}` exited with {status}: {stderr}")]
    CommandFailed {
        /// Command line that ran
        command: String,
        /// Exit status description
        status: String,
        /// Captured standard error, trimmed
        stderr: String,
    },

    /// The requested rule is not valid
    #[error("invalid fault rule: {0}")]
    InvalidRule(String),
}

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config file '{path}': {source}")]
    Read {
        /// Path that was read
        path: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Config file is not valid TOML for [`HarnessConfig`](crate::HarnessConfig)
    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        /// Path that was parsed
        path: String,
        /// Underlying TOML error
        #[source]
        source: toml::de::Error,
    },

    /// A value is out of range
    #[error("invalid config value for `{field}`: {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
