//! Merge observer hook.
//!
//! The merge loop reports every outcome through a [`MergeObserver`], which
//! lets the daemon feed metrics without the core knowing about them.
//! Callbacks run on the merge loop after the exclusive section is released
//! and must not block.

use crate::error::PatchError;
use crate::fanout::{FanoutReport, SubscriberId};
use crate::transaction::Transaction;

/// Observes merge-loop events.
pub trait MergeObserver: Send + Sync {
    /// A transaction was applied; `log_len` is the new log length.
    fn on_applied(&self, tx: &Transaction, log_len: usize, fanout: &FanoutReport);

    /// A transaction was discarded as already seen.
    fn on_duplicate(&self, tx: &Transaction);

    /// A transaction's patch failed.
    fn on_rejected(&self, tx: &Transaction, error: &PatchError);

    /// A subscriber attached; `attached` is the new subscriber count.
    fn on_attach(&self, id: SubscriberId, attached: usize);

    /// A subscriber left (detached, dropped, or disconnected for saturation).
    fn on_detach(&self, id: SubscriberId, attached: usize);
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl MergeObserver for NoopObserver {
    fn on_applied(&self, _tx: &Transaction, _log_len: usize, _fanout: &FanoutReport) {}

    fn on_duplicate(&self, _tx: &Transaction) {}

    fn on_rejected(&self, _tx: &Transaction, _error: &PatchError) {}

    fn on_attach(&self, _id: SubscriberId, _attached: usize) {}

    fn on_detach(&self, _id: SubscriberId, _attached: usize) {}
}
