//! Vector clock used for idempotent merge.
//!
//! Only per-source monotonic ordering is tracked: the clock records, for each
//! source, the highest sequence number applied so far. It does not order
//! transactions from different sources against each other.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Highest applied sequence number per source.
///
/// A source that has never been seen reads as 0, so sequence numbers start at
/// 1. Entries never decrease.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VectorClock {
    entries: BTreeMap<String, u64>,
}

impl VectorClock {
    /// Create an empty clock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest sequence applied for `source` (0 if unknown).
    pub fn get(&self, source: &str) -> u64 {
        self.entries.get(source).copied().unwrap_or(0)
    }

    /// True if `(source, sequence)` has already been applied.
    #[inline]
    pub fn is_duplicate(&self, source: &str, sequence: u64) -> bool {
        sequence <= self.get(source)
    }

    /// Record `sequence` for `source`, keeping the maximum.
    pub fn advance(&mut self, source: &str, sequence: u64) {
        match self.entries.get_mut(source) {
            Some(current) => *current = (*current).max(sequence),
            None => {
                self.entries.insert(source.to_string(), sequence);
            }
        }
    }

    /// Number of sources seen.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no source has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(source, sequence)` pairs in source order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl FromIterator<(String, u64)> for VectorClock {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        let mut clock = Self::new();
        for (source, sequence) in iter {
            clock.advance(&source, sequence);
        }
        clock
    }
}
