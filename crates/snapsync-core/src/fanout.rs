//! Subscriber registry and ordered fan-out.
//!
//! The registry only holds the sending half of each subscriber's queue. It is
//! mutated exclusively from inside the merge engine's exclusive section, so a
//! delivery round for one transaction completes before the next one starts and
//! every subscriber sees accepted transactions in application order.
//!
//! # Backpressure
//!
//! Delivery never waits. A subscriber whose bounded queue is full is
//! disconnected: its sender is dropped, it drains what was already buffered
//! and then observes end-of-stream. Peer links reconnect and get a fresh
//! replay, so nothing is lost for them; dedup discards the overlap.

use crate::transaction::Transaction;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Identifier handed out by [`SubscriberRegistry::register`].
pub type SubscriberId = u64;

/// An attached subscriber: the log at the attach point plus the live queue.
///
/// Every transaction applied before the attach point is in `replay` exactly
/// once; every transaction applied after it arrives on the queue exactly once.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    replay: Vec<Arc<Transaction>>,
    queue: mpsc::Receiver<Arc<Transaction>>,
}

impl Subscription {
    pub(crate) fn new(
        id: SubscriberId,
        replay: Vec<Arc<Transaction>>,
        queue: mpsc::Receiver<Arc<Transaction>>,
    ) -> Self {
        Self { id, replay, queue }
    }

    /// Registry id, used to detach.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Log contents at the attach point.
    pub fn replay(&self) -> &[Arc<Transaction>] {
        &self.replay
    }

    /// Next live transaction. `None` once the subscriber was detached,
    /// disconnected for saturation, or the engine was canceled.
    pub async fn recv(&mut self) -> Option<Arc<Transaction>> {
        self.queue.recv().await
    }

    /// Split into `(id, replay, queue)`.
    pub fn into_parts(
        self,
    ) -> (
        SubscriberId,
        Vec<Arc<Transaction>>,
        mpsc::Receiver<Arc<Transaction>>,
    ) {
        (self.id, self.replay, self.queue)
    }
}

/// Outcome of one delivery round.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FanoutReport {
    /// Subscribers the transaction was enqueued for.
    pub delivered: usize,
    /// Subscribers disconnected because their queue was full.
    pub saturated: Vec<SubscriberId>,
    /// Subscribers pruned because their receiver was dropped.
    pub closed: Vec<SubscriberId>,
}

/// Live output queues, keyed by subscriber id.
#[derive(Debug)]
pub struct SubscriberRegistry {
    next_id: SubscriberId,
    capacity: usize,
    queues: BTreeMap<SubscriberId, mpsc::Sender<Arc<Transaction>>>,
}

impl SubscriberRegistry {
    /// Create a registry whose queues hold up to `capacity` transactions.
    pub fn new(capacity: usize) -> Self {
        Self {
            next_id: 0,
            // tokio panics on zero-capacity channels
            capacity: capacity.max(1),
            queues: BTreeMap::new(),
        }
    }

    /// Add a queue and return its id and receiving half.
    pub fn register(&mut self) -> (SubscriberId, mpsc::Receiver<Arc<Transaction>>) {
        let id = self.next_id;
        self.next_id += 1;
        let (tx, rx) = mpsc::channel(self.capacity);
        self.queues.insert(id, tx);
        (id, rx)
    }

    /// Remove a queue. Returns false if it was already gone.
    pub fn remove(&mut self, id: SubscriberId) -> bool {
        self.queues.remove(&id).is_some()
    }

    /// Enqueue `tx` for every subscriber without waiting.
    pub fn deliver(&mut self, tx: &Arc<Transaction>) -> FanoutReport {
        let mut report = FanoutReport::default();
        self.queues
            .retain(|id, queue| match queue.try_send(Arc::clone(tx)) {
                Ok(()) => {
                    report.delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    report.saturated.push(*id);
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    report.closed.push(*id);
                    false
                }
            });
        report
    }

    /// Drop every queue; receivers observe end-of-stream.
    pub fn clear(&mut self) {
        self.queues.clear();
    }

    /// Attached subscribers.
    pub fn len(&self) -> usize {
        self.queues.len()
    }

    /// True if nobody is attached.
    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    /// Per-subscriber queue capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
