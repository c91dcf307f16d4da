//! Source-stamped, sequence-numbered edits.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A single edit submitted to the log.
///
/// `data` holds a JSON Patch document as text. The pair `(source, sequence)`
/// is the transaction's identity: two transactions with the same pair are the
/// same edit as far as deduplication is concerned, whatever their data.
///
/// Fields are private so an accepted transaction cannot change under the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    data: String,
    source: String,
    sequence: u64,
}

impl Transaction {
    /// Create a transaction with an explicit identity.
    pub fn new(data: impl Into<String>, source: impl Into<String>, sequence: u64) -> Self {
        Self {
            data: data.into(),
            source: source.into(),
            sequence,
        }
    }

    /// The JSON Patch document, as text.
    pub fn data(&self) -> &str {
        &self.data
    }

    /// Origin replica or client.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Position of this edit in its source's sequence (1-based).
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

/// Per-replica monotonically increasing sequence counter.
///
/// The first value handed out is 1; values are never reused.
#[derive(Debug, Default)]
pub struct SequenceCounter {
    last: AtomicU64,
}

impl SequenceCounter {
    /// Create a counter whose next value is 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next sequence number.
    pub fn next(&self) -> u64 {
        self.last.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// The most recently reserved value (0 if none).
    pub fn current(&self) -> u64 {
        self.last.load(Ordering::Relaxed)
    }
}
