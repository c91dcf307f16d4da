//! Transaction log and derived snapshot.
//!
//! [`Replica`] is the state owned by the merge loop: the log of accepted
//! transactions in application order, the snapshot obtained by applying them
//! to an empty document, and the vector clock. It is plain synchronous data;
//! the [`Manager`](crate::Manager) wraps it in its exclusive section.

use crate::clock::VectorClock;
use crate::error::PatchError;
use crate::patch;
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// What happens to the clock when a transaction's patch fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailedPatchPolicy {
    /// Leave the clock alone. A later delivery of the same `(source, sequence)`
    /// is merged again and may succeed against a different snapshot, but only
    /// while no higher sequence from that source has been applied. After that
    /// the clock covers the failed sequence and redelivery is a duplicate.
    #[default]
    Retain,
    /// Advance the clock anyway. The failed sequence is never retried.
    Consume,
}

/// Result of merging one transaction.
#[derive(Debug)]
pub enum MergeOutcome {
    /// Patch applied, log and clock advanced.
    Applied,
    /// `(source, sequence)` was already covered by the clock.
    Duplicate,
    /// Patch failed; snapshot and log unchanged.
    Rejected(PatchError),
}

impl MergeOutcome {
    /// True for [`MergeOutcome::Applied`].
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Running merge counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    /// Transactions applied to the snapshot.
    pub applied: u64,
    /// Transactions discarded as already seen.
    pub duplicates: u64,
    /// Transactions whose patch failed.
    pub rejected: u64,
}

/// Append-only log of accepted transactions, in application order.
#[derive(Debug, Clone, Default)]
pub struct TransactionLog {
    entries: Vec<Arc<Transaction>>,
}

impl TransactionLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an accepted transaction.
    pub fn push(&mut self, tx: Arc<Transaction>) {
        self.entries.push(tx);
    }

    /// Number of accepted transactions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing has been accepted yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Accepted transactions, oldest first.
    pub fn entries(&self) -> &[Arc<Transaction>] {
        &self.entries
    }

    /// Copy of the log for replay to a new subscriber.
    pub fn replay(&self) -> Vec<Arc<Transaction>> {
        self.entries.clone()
    }
}

/// Log, snapshot and clock of one replica.
#[derive(Debug)]
pub struct Replica {
    log: TransactionLog,
    snapshot: Value,
    clock: VectorClock,
    policy: FailedPatchPolicy,
    stats: MergeStats,
}

impl Replica {
    /// Empty replica: empty log, `{}` snapshot, empty clock.
    pub fn new(policy: FailedPatchPolicy) -> Self {
        Self {
            log: TransactionLog::new(),
            snapshot: patch::empty_document(),
            clock: VectorClock::new(),
            policy,
            stats: MergeStats::default(),
        }
    }

    /// Merge one transaction.
    ///
    /// The clock is advanced only after the patch applied, unless the policy
    /// is [`FailedPatchPolicy::Consume`].
    pub fn merge(&mut self, tx: Arc<Transaction>) -> MergeOutcome {
        if self.clock.is_duplicate(tx.source(), tx.sequence()) {
            self.stats.duplicates += 1;
            return MergeOutcome::Duplicate;
        }

        match patch::apply(&self.snapshot, tx.data()) {
            Ok(next) => {
                self.snapshot = next;
                self.clock.advance(tx.source(), tx.sequence());
                self.log.push(tx);
                self.stats.applied += 1;
                MergeOutcome::Applied
            }
            Err(err) => {
                if self.policy == FailedPatchPolicy::Consume {
                    self.clock.advance(tx.source(), tx.sequence());
                }
                self.stats.rejected += 1;
                MergeOutcome::Rejected(err)
            }
        }
    }

    /// Accepted transactions.
    pub fn log(&self) -> &TransactionLog {
        &self.log
    }

    /// Current document.
    pub fn snapshot(&self) -> &Value {
        &self.snapshot
    }

    /// Current clock.
    pub fn clock(&self) -> &VectorClock {
        &self.clock
    }

    /// Merge counters.
    pub fn stats(&self) -> MergeStats {
        self.stats
    }

    /// Failure policy in effect.
    pub fn policy(&self) -> FailedPatchPolicy {
        self.policy
    }
}

impl Default for Replica {
    fn default() -> Self {
        Self::new(FailedPatchPolicy::default())
    }
}
