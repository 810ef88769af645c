//! Outcome counters
//!
//! One atomic counter per [`Category`], each on its own cache line so that
//! thousands of workers bumping different categories do not false-share.
//! Increments are `fetch_add`, so concurrent updates are never lost; there is
//! no lock anywhere on the increment path.
//!
//! Snapshots read the four counters one after another. They are not taken at
//! a single instant, but every value read is monotonic and never ahead of
//! the increments that produced it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use txchaos_core::Category;

/// Keeps a counter on its own 64-byte cache line.
#[repr(C, align(64))]
#[derive(Debug, Default)]
struct PaddedCounter(AtomicU64);

/// Process-wide tallies of classified outcomes for one run
///
/// Construct one per run and share it behind an `Arc`.
#[derive(Debug, Default)]
pub struct CounterRegistry {
    counters: [PaddedCounter; 4],
}

impl CounterRegistry {
    /// Create a registry with every counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one classified outcome.
    #[inline]
    pub fn increment(&self, category: Category) {
        self.counters[category.index()].0.fetch_add(1, Ordering::Relaxed);
    }

    /// Current value of one counter.
    pub fn get(&self, category: Category) -> u64 {
        self.counters[category.index()].0.load(Ordering::Acquire)
    }

    /// Read all four counters.
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            success: self.get(Category::Success),
            invalid: self.get(Category::Invalid),
            missing: self.get(Category::Missing),
            network_errors: self.get(Category::NetworkError),
        }
    }
}

/// Point-in-time copy of a [`CounterRegistry`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    /// Round-trips that echoed their input
    pub success: u64,
    /// Round-trips that returned a different value
    pub invalid: u64,
    /// Round-trips that returned no row
    pub missing: u64,
    /// Round-trips that failed with a transient failure
    pub network_errors: u64,
}

impl CounterSnapshot {
    /// Total classified attempts.
    pub fn total(&self) -> u64 {
        self.success + self.invalid + self.missing + self.network_errors
    }

    /// Count for one category.
    pub fn get(&self, category: Category) -> u64 {
        match category {
            Category::Success => self.success,
            Category::Invalid => self.invalid,
            Category::Missing => self.missing,
            Category::NetworkError => self.network_errors,
        }
    }

    /// Whether any round-trip returned wrong or missing data.
    pub fn has_correctness_violations(&self) -> bool {
        self.invalid > 0 || self.missing > 0
    }
}

impl fmt::Display for CounterSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Processed: {:>6} - Network errors: {:>6} - Missing: {:>6} - Invalid: {:>6}",
            self.total(),
            self.network_errors,
            self.missing,
            self.invalid
        )
    }
}
