//! Outcome model for a single transaction attempt

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TransactionError;

/// What a completed round-trip returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// One row came back carrying this value
    Row(i32),
    /// The query completed without returning a row
    NoRow,
}

/// Result of one execution attempt, as seen by the classifier.
///
/// Only transient failures are outcomes. Every other failure leaves the
/// worker as a fatal error instead of becoming an `Outcome`.
#[derive(Debug)]
pub enum Outcome {
    /// The echoed value matched the input
    Success(i32),
    /// No row was returned
    Missing,
    /// A row came back with the wrong value
    ValueMismatch {
        /// Value sent
        expected: i32,
        /// Value received
        actual: i32,
    },
    /// Connectivity or timeout class failure
    TransientFailure(TransactionError),
}

impl Outcome {
    /// Build an outcome from a completed round-trip.
    pub fn from_reply(input: i32, reply: Reply) -> Self {
        match reply {
            Reply::Row(value) if value == input => Outcome::Success(value),
            Reply::Row(actual) => Outcome::ValueMismatch {
                expected: input,
                actual,
            },
            Reply::NoRow => Outcome::Missing,
        }
    }

    /// The counter bucket this outcome belongs to.
    pub fn category(&self) -> Category {
        match self {
            Outcome::Success(_) => Category::Success,
            Outcome::Missing => Category::Missing,
            Outcome::ValueMismatch { .. } => Category::Invalid,
            Outcome::TransientFailure(_) => Category::NetworkError,
        }
    }
}

/// Classification bucket for an [`Outcome`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Round-trip echoed the input
    Success,
    /// Round-trip returned a different value
    Invalid,
    /// Round-trip returned no row
    Missing,
    /// Round-trip failed with a transient failure
    NetworkError,
}

impl Category {
    /// All categories, in counter order.
    pub const ALL: [Category; 4] = [
        Category::Success,
        Category::Invalid,
        Category::Missing,
        Category::NetworkError,
    ];

    /// Dense index used by the counter registry.
    pub fn index(self) -> usize {
        match self {
            Category::Success => 0,
            Category::Invalid => 1,
            Category::Missing => 2,
            Category::NetworkError => 3,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Success => "success",
            Category::Invalid => "invalid",
            Category::Missing => "missing",
            Category::NetworkError => "network_error",
        };
        f.write_str(name)
    }
}
