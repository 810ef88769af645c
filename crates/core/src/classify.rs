//! Result classification
//!
//! Maps the result of one executor call to an [`Outcome`]. Failures whose
//! [`FailureKind`] is not in the transient set are handed back as errors so
//! the caller aborts instead of counting them.

use std::collections::BTreeSet;

use crate::error::{FailureKind, TransactionError};
use crate::outcome::{Category, Outcome, Reply};

/// Decides which failure kinds are transient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classifier {
    transient: BTreeSet<FailureKind>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new([FailureKind::Connection, FailureKind::Timeout])
    }
}

impl Classifier {
    /// Create a classifier treating exactly `transient` as network errors.
    pub fn new(transient: impl IntoIterator<Item = FailureKind>) -> Self {
        Self {
            transient: transient.into_iter().collect(),
        }
    }

    /// Also treat `kind` as transient.
    pub fn with_transient(mut self, kind: FailureKind) -> Self {
        self.transient.insert(kind);
        self
    }

    /// Whether failures of `kind` are counted as network errors.
    pub fn is_transient(&self, kind: FailureKind) -> bool {
        self.transient.contains(&kind)
    }

    /// The transient kinds, in order.
    pub fn transient_kinds(&self) -> impl Iterator<Item = FailureKind> + '_ {
        self.transient.iter().copied()
    }

    /// Turn an executor result for `input` into an outcome.
    ///
    /// # Errors
    ///
    /// Returns the executor's error unchanged when its kind is not transient.
    pub fn assess(
        &self,
        input: i32,
        result: Result<Reply, TransactionError>,
    ) -> Result<Outcome, TransactionError> {
        match result {
            Ok(reply) => Ok(Outcome::from_reply(input, reply)),
            Err(err) if self.is_transient(err.kind()) => Ok(Outcome::TransientFailure(err)),
            Err(err) => Err(err),
        }
    }

    /// Shorthand for `assess(..)?.category()`.
    pub fn classify(
        &self,
        input: i32,
        result: Result<Reply, TransactionError>,
    ) -> Result<Category, TransactionError> {
        self.assess(input, result).map(|outcome| outcome.category())
    }
}
