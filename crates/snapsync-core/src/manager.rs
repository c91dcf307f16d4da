//! The merge engine.
//!
//! [`Manager`] is a cheap, cloneable handle around the replica state. Exactly
//! one task drives [`Manager::run`], the single-writer loop that drains the
//! bounded inbound queue. Every mutation of the log, snapshot, clock and
//! subscriber registry happens inside one `parking_lot::Mutex`; the short
//! read, attach and detach operations take the same lock, so nobody observes
//! a snapshot without its log append or a subscription that straddles a
//! delivery.
//!
//! ```text
//!  submit() ──> [inbound mpsc] ──> run() ──lock──> Replica::merge
//!                                          └─────> SubscriberRegistry::deliver
//! ```

use crate::clock::VectorClock;
use crate::error::{ManagerError, PatchError};
use crate::fanout::{FanoutReport, SubscriberId, SubscriberRegistry, Subscription};
use crate::log::{FailedPatchPolicy, MergeOutcome, MergeStats, Replica};
use crate::observer::{MergeObserver, NoopObserver};
use crate::transaction::{SequenceCounter, Transaction};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Engine tuning, deserialized from the `[engine]` config section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Capacity of the inbound queue; `submit` waits while it is full.
    pub inbound_capacity: usize,
    /// Capacity of each subscriber queue before the subscriber is dropped.
    pub subscriber_capacity: usize,
    /// Buffered rejection reports per `rejections()` receiver.
    pub rejection_capacity: usize,
    /// Clock handling for transactions whose patch fails.
    pub failed_patch_policy: FailedPatchPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            inbound_capacity: 1024,
            subscriber_capacity: 1024,
            rejection_capacity: 64,
            failed_patch_policy: FailedPatchPolicy::default(),
        }
    }
}

/// Lifecycle of a [`Manager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    /// Accepting work.
    Running,
    /// Stopped for good.
    Canceled,
}

/// A transaction the engine dropped because its patch failed.
#[derive(Debug, Clone)]
pub struct Rejection {
    /// The offending transaction.
    pub transaction: Arc<Transaction>,
    /// `"malformed"` or `"rejected"`.
    pub kind: &'static str,
    /// Human-readable failure.
    pub reason: String,
}

/// Point-in-time view of the engine, taken under the exclusive section.
#[derive(Debug, Clone, Serialize)]
pub struct ReplicaStatus {
    /// Source identifier stamped on local transactions.
    pub source: String,
    /// Lifecycle state.
    pub state: EngineState,
    /// Accepted transactions.
    pub log_len: usize,
    /// Attached subscribers.
    pub subscribers: usize,
    /// Sources present in the clock.
    pub clock_sources: usize,
    /// Merge counters.
    pub stats: MergeStats,
    /// Subscribers disconnected because their queue was full.
    pub dropped_subscribers: u64,
}

struct Engine {
    state: EngineState,
    replica: Replica,
    subscribers: SubscriberRegistry,
    dropped_subscribers: u64,
}

impl Engine {
    fn ensure_running(&self) -> Result<(), ManagerError> {
        match self.state {
            EngineState::Running => Ok(()),
            EngineState::Canceled => Err(ManagerError::Canceled),
        }
    }
}

struct Shared {
    source: String,
    counter: SequenceCounter,
    engine: Mutex<Engine>,
    inbound: mpsc::Sender<Arc<Transaction>>,
    inbound_rx: Mutex<Option<mpsc::Receiver<Arc<Transaction>>>>,
    cancel: CancellationToken,
    observer: Arc<dyn MergeObserver>,
    rejections: broadcast::Sender<Rejection>,
}

/// Handle to one replica's merge engine.
#[derive(Clone)]
pub struct Manager {
    inner: Arc<Shared>,
}

impl fmt::Debug for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("source", &self.inner.source)
            .field("canceled", &self.is_canceled())
            .finish_non_exhaustive()
    }
}

impl Manager {
    /// Create an engine for `source` with no observer.
    pub fn new(source: impl Into<String>, config: EngineConfig) -> Self {
        Self::with_observer(source, config, Arc::new(NoopObserver))
    }

    /// Create an engine that reports merge events to `observer`.
    pub fn with_observer(
        source: impl Into<String>,
        config: EngineConfig,
        observer: Arc<dyn MergeObserver>,
    ) -> Self {
        let (inbound, inbound_rx) = mpsc::channel(config.inbound_capacity.max(1));
        let (rejections, _) = broadcast::channel(config.rejection_capacity.max(1));

        Self {
            inner: Arc::new(Shared {
                source: source.into(),
                counter: SequenceCounter::new(),
                engine: Mutex::new(Engine {
                    state: EngineState::Running,
                    replica: Replica::new(config.failed_patch_policy),
                    subscribers: SubscriberRegistry::new(config.subscriber_capacity),
                    dropped_subscribers: 0,
                }),
                inbound,
                inbound_rx: Mutex::new(Some(inbound_rx)),
                cancel: CancellationToken::new(),
                observer,
                rejections,
            }),
        }
    }

    /// Source identifier of this replica.
    pub fn source(&self) -> &str {
        &self.inner.source
    }

    /// Drive the merge loop until [`cancel`](Self::cancel) is called.
    ///
    /// Only one loop may run per manager; a second call fails with
    /// [`ManagerError::AlreadyRunning`]. Items still queued at cancellation are
    /// not drained.
    pub async fn run(&self) -> Result<(), ManagerError> {
        self.inner.engine.lock().ensure_running()?;
        let mut inbound = self
            .inner
            .inbound_rx
            .lock()
            .take()
            .ok_or(ManagerError::AlreadyRunning)?;

        info!(source = %self.inner.source, "merge loop started");

        loop {
            tokio::select! {
                biased;

                _ = self.inner.cancel.cancelled() => break,

                next = inbound.recv() => match next {
                    Some(tx) => self.merge_one(tx),
                    None => break,
                },
            }
        }

        info!(source = %self.inner.source, "merge loop stopped");
        Ok(())
    }

    fn merge_one(&self, tx: Arc<Transaction>) {
        let (outcome, log_len, fanout, attached) = {
            let mut engine = self.inner.engine.lock();
            if engine.state == EngineState::Canceled {
                return;
            }
            let outcome = engine.replica.merge(Arc::clone(&tx));
            let fanout = if outcome.is_applied() {
                let report = engine.subscribers.deliver(&tx);
                engine.dropped_subscribers += report.saturated.len() as u64;
                report
            } else {
                FanoutReport::default()
            };
            (
                outcome,
                engine.replica.log().len(),
                fanout,
                engine.subscribers.len(),
            )
        };

        let observer = &self.inner.observer;
        match outcome {
            MergeOutcome::Applied => {
                debug!(
                    source = %tx.source(),
                    sequence = tx.sequence(),
                    log_len,
                    delivered = fanout.delivered,
                    "transaction applied"
                );
                observer.on_applied(&tx, log_len, &fanout);
                for id in &fanout.saturated {
                    warn!(subscriber = id, "subscriber queue full, disconnecting");
                    observer.on_detach(*id, attached);
                }
                for id in &fanout.closed {
                    debug!(subscriber = id, "pruned closed subscriber");
                    observer.on_detach(*id, attached);
                }
            }
            MergeOutcome::Duplicate => {
                debug!(source = %tx.source(), sequence = tx.sequence(), "duplicate discarded");
                observer.on_duplicate(&tx);
            }
            MergeOutcome::Rejected(err) => self.report_rejection(tx, &err),
        }
    }

    fn report_rejection(&self, tx: Arc<Transaction>, err: &PatchError) {
        warn!(
            source = %tx.source(),
            sequence = tx.sequence(),
            kind = err.kind(),
            error = %err,
            "dropping transaction with failed patch"
        );
        self.inner.observer.on_rejected(&tx, err);
        // No receivers is fine.
        let _ = self.inner.rejections.send(Rejection {
            transaction: tx,
            kind: err.kind(),
            reason: err.to_string(),
        });
    }

    /// Enqueue a transaction for merging.
    ///
    /// Waits while the inbound queue is full. Fails with
    /// [`ManagerError::Canceled`] once the engine has stopped, including for a
    /// caller that was waiting when cancellation happened.
    pub async fn submit(&self, tx: Transaction) -> Result<(), ManagerError> {
        if self.is_canceled() {
            return Err(ManagerError::Canceled);
        }

        tokio::select! {
            biased;

            _ = self.inner.cancel.cancelled() => Err(ManagerError::Canceled),

            sent = self.inner.inbound.send(Arc::new(tx)) => {
                sent.map_err(|_| ManagerError::Canceled)
            }
        }
    }

    /// Stamp `data` as a local edit and enqueue it.
    ///
    /// The sequence number is assigned only once an inbound slot is held, and
    /// stamping and enqueueing happen under the engine lock, so local edits
    /// reach the merge loop in sequence order and none is mistaken for a
    /// duplicate. Returns the stamped transaction.
    pub async fn submit_local(&self, data: impl Into<String>) -> Result<Transaction, ManagerError> {
        if self.is_canceled() {
            return Err(ManagerError::Canceled);
        }

        let permit = tokio::select! {
            biased;

            _ = self.inner.cancel.cancelled() => return Err(ManagerError::Canceled),

            reserved = self.inner.inbound.reserve() => {
                reserved.map_err(|_| ManagerError::Canceled)?
            }
        };

        let engine = self.inner.engine.lock();
        engine.ensure_running()?;
        let sequence = self.inner.counter.next();
        let tx = Transaction::new(data, self.inner.source.as_str(), sequence);
        permit.send(Arc::new(tx.clone()));
        Ok(tx)
    }

    /// Stamp `data` with this replica's source and next sequence number.
    ///
    /// The caller must enqueue stamped transactions in sequence order; a lower
    /// sequence merged after a higher one is discarded as a duplicate. Use
    /// [`submit_local`](Self::submit_local) when several tasks edit at once.
    pub fn new_transaction(&self, data: impl Into<String>) -> Result<Transaction, ManagerError> {
        if self.is_canceled() {
            return Err(ManagerError::Canceled);
        }
        let sequence = self.inner.counter.next();
        Ok(Transaction::new(data, self.inner.source.as_str(), sequence))
    }

    /// Current document.
    pub fn snapshot(&self) -> Result<Value, ManagerError> {
        let engine = self.inner.engine.lock();
        engine.ensure_running()?;
        Ok(engine.replica.snapshot().clone())
    }

    /// Current vector clock.
    pub fn clock(&self) -> Result<VectorClock, ManagerError> {
        let engine = self.inner.engine.lock();
        engine.ensure_running()?;
        Ok(engine.replica.clock().clone())
    }

    /// Accepted transactions in application order.
    pub fn log(&self) -> Result<Vec<Arc<Transaction>>, ManagerError> {
        let engine = self.inner.engine.lock();
        engine.ensure_running()?;
        Ok(engine.replica.log().replay())
    }

    /// Diagnostic view. Available in every state.
    pub fn status(&self) -> ReplicaStatus {
        let engine = self.inner.engine.lock();
        ReplicaStatus {
            source: self.inner.source.clone(),
            state: engine.state,
            log_len: engine.replica.log().len(),
            subscribers: engine.subscribers.len(),
            clock_sources: engine.replica.clock().len(),
            stats: engine.replica.stats(),
            dropped_subscribers: engine.dropped_subscribers,
        }
    }

    /// Attach a subscriber: the current log plus a queue of everything
    /// applied from now on.
    pub fn attach(&self) -> Result<Subscription, ManagerError> {
        let (subscription, attached) = {
            let mut engine = self.inner.engine.lock();
            engine.ensure_running()?;
            let replay = engine.replica.log().replay();
            let (id, queue) = engine.subscribers.register();
            (Subscription::new(id, replay, queue), engine.subscribers.len())
        };

        debug!(
            subscriber = subscription.id(),
            replay = subscription.replay().len(),
            "subscriber attached"
        );
        self.inner.observer.on_attach(subscription.id(), attached);
        Ok(subscription)
    }

    /// Stop delivering to `id`. Detaching an unknown id is a no-op.
    pub fn detach(&self, id: SubscriberId) -> Result<(), ManagerError> {
        let (removed, attached) = {
            let mut engine = self.inner.engine.lock();
            engine.ensure_running()?;
            (engine.subscribers.remove(id), engine.subscribers.len())
        };

        if removed {
            debug!(subscriber = id, "subscriber detached");
            self.inner.observer.on_detach(id, attached);
        }
        Ok(())
    }

    /// Stop the engine. Repeated calls are no-ops.
    ///
    /// Every subscriber queue is dropped so readers see end-of-stream.
    pub fn cancel(&self) {
        {
            let mut engine = self.inner.engine.lock();
            if engine.state == EngineState::Canceled {
                return;
            }
            engine.state = EngineState::Canceled;
            engine.subscribers.clear();
        }
        self.inner.cancel.cancel();
        info!(source = %self.inner.source, "manager canceled");
    }

    /// True once [`cancel`](Self::cancel) has been called.
    pub fn is_canceled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Lifecycle state.
    pub fn state(&self) -> EngineState {
        self.inner.engine.lock().state
    }

    /// Receive reports of transactions dropped for a failed patch.
    pub fn rejections(&self) -> broadcast::Receiver<Rejection> {
        self.inner.rejections.subscribe()
    }

    /// A token that is canceled together with the engine.
    pub fn cancellation(&self) -> CancellationToken {
        self.inner.cancel.child_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tokio::task::JoinHandle;
    use tokio::time::timeout;

    fn start(manager: &Manager) -> JoinHandle<Result<(), ManagerError>> {
        let engine = manager.clone();
        tokio::spawn(async move { engine.run().await })
    }

    /// Wait until the loop has processed `count` transactions.
    async fn settle(manager: &Manager, count: u64) {
        timeout(Duration::from_secs(5), async {
            loop {
                let stats = manager.status().stats;
                if stats.applied + stats.duplicates + stats.rejected >= count {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("engine did not settle");
    }

    fn add(path: &str, value: i64) -> String {
        format!(r#"[{{"op":"add","path":"/{path}","value":{value}}}]"#)
    }

    #[tokio::test]
    async fn subscriber_receives_in_application_order() {
        let manager = Manager::new("A", EngineConfig::default());
        let mut sub = manager.attach().unwrap();
        assert!(sub.replay().is_empty());
        let handle = start(&manager);

        for (i, key) in ["a", "b", "c"].iter().enumerate() {
            let tx = manager.new_transaction(add(key, i as i64)).unwrap();
            manager.submit(tx).await.unwrap();
        }

        let mut seen = Vec::new();
        for _ in 0..3 {
            let tx = timeout(Duration::from_secs(5), sub.recv()).await.unwrap().unwrap();
            seen.push(tx.sequence());
        }
        assert_eq!(seen, vec![1, 2, 3]);

        manager.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn same_identity_different_data_is_discarded() {
        let manager = Manager::new("local", EngineConfig::default());
        let handle = start(&manager);

        manager.submit(Transaction::new(add("x", 1), "A", 1)).await.unwrap();
        manager.submit(Transaction::new(add("y", 2), "A", 1)).await.unwrap();
        settle(&manager, 2).await;

        assert_eq!(manager.snapshot().unwrap(), json!({"x": 1}));
        assert_eq!(manager.log().unwrap().len(), 1);
        assert_eq!(manager.status().stats.duplicates, 1);

        manager.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn two_sources_merge_with_clock() {
        let manager = Manager::new("local", EngineConfig::default());
        let handle = start(&manager);

        manager.submit(Transaction::new(add("x", 1), "A", 1)).await.unwrap();
        manager.submit(Transaction::new(add("y", 2), "B", 1)).await.unwrap();
        settle(&manager, 2).await;

        assert_eq!(manager.snapshot().unwrap(), json!({"x": 1, "y": 2}));
        let clock = manager.clock().unwrap();
        assert_eq!(clock.get("A"), 1);
        assert_eq!(clock.get("B"), 1);

        manager.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn invalid_patch_is_reported_not_fatal() {
        let manager = Manager::new("A", EngineConfig::default());
        let mut rejections = manager.rejections();
        let handle = start(&manager);

        manager.submit(Transaction::new(add("x", 1), "A", 1)).await.unwrap();
        manager.submit(Transaction::new("garbage", "A", 2)).await.unwrap();
        manager.submit(Transaction::new(add("y", 2), "A", 3)).await.unwrap();
        settle(&manager, 3).await;

        let rejection = timeout(Duration::from_secs(5), rejections.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rejection.transaction.sequence(), 2);
        assert_eq!(rejection.kind, "malformed");

        assert_eq!(manager.snapshot().unwrap(), json!({"x": 1, "y": 2}));
        assert_eq!(manager.status().state, EngineState::Running);

        manager.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_attach_sees_replay_then_live() {
        const TOTAL: u64 = 200;
        let manager = Manager::new("A", EngineConfig::default());
        let handle = start(&manager);

        let producer = {
            let manager = manager.clone();
            tokio::spawn(async move {
                for i in 0..TOTAL {
                    let tx = manager.new_transaction(add(&format!("k{i}"), i as i64)).unwrap();
                    manager.submit(tx).await.unwrap();
                }
            })
        };

        let mut subscriptions = Vec::new();
        for _ in 0..20 {
            subscriptions.push(manager.attach().unwrap());
            tokio::task::yield_now().await;
        }

        producer.await.unwrap();
        settle(&manager, TOTAL).await;

        let log: Vec<u64> = manager.log().unwrap().iter().map(|t| t.sequence()).collect();
        assert_eq!(log.len() as u64, TOTAL);

        for sub in subscriptions {
            let (_, replay, mut queue) = sub.into_parts();
            let mut seen: Vec<u64> = replay.iter().map(|t| t.sequence()).collect();
            while let Ok(tx) = queue.try_recv() {
                seen.push(tx.sequence());
            }
            assert_eq!(seen, log);
        }

        manager.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn detach_mid_stream_does_not_block() {
        let manager = Manager::new("A", EngineConfig::default());
        let mut sub = manager.attach().unwrap();
        let handle = start(&manager);

        manager.submit(manager.new_transaction(add("a", 1)).unwrap()).await.unwrap();
        settle(&manager, 1).await;
        manager.detach(sub.id()).unwrap();
        // Detaching twice is harmless.
        manager.detach(sub.id()).unwrap();

        manager.submit(manager.new_transaction(add("b", 2)).unwrap()).await.unwrap();
        manager.submit(manager.new_transaction(add("c", 3)).unwrap()).await.unwrap();
        settle(&manager, 3).await;

        assert_eq!(sub.recv().await.unwrap().sequence(), 1);
        assert!(sub.recv().await.is_none());
        assert_eq!(manager.status().subscribers, 0);

        manager.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn saturated_subscriber_is_disconnected() {
        let config = EngineConfig {
            subscriber_capacity: 2,
            ..EngineConfig::default()
        };
        let manager = Manager::new("A", config);
        let mut slow = manager.attach().unwrap();
        let handle = start(&manager);

        for i in 0..5 {
            let tx = manager.new_transaction(add(&format!("k{i}"), i)).unwrap();
            manager.submit(tx).await.unwrap();
        }
        settle(&manager, 5).await;

        let status = manager.status();
        assert_eq!(status.log_len, 5);
        assert_eq!(status.subscribers, 0);
        assert_eq!(status.dropped_subscribers, 1);

        assert_eq!(slow.recv().await.unwrap().sequence(), 1);
        assert_eq!(slow.recv().await.unwrap().sequence(), 2);
        assert!(slow.recv().await.is_none());

        manager.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn operations_fail_after_cancel() {
        let manager = Manager::new("A", EngineConfig::default());
        let mut sub = manager.attach().unwrap();
        let handle = start(&manager);

        manager.cancel();
        manager.cancel();
        handle.await.unwrap().unwrap();

        let tx = Transaction::new(add("x", 1), "A", 1);
        assert_eq!(manager.submit(tx).await, Err(ManagerError::Canceled));
        assert_eq!(manager.snapshot().unwrap_err(), ManagerError::Canceled);
        assert_eq!(manager.clock().unwrap_err(), ManagerError::Canceled);
        assert_eq!(manager.attach().unwrap_err(), ManagerError::Canceled);
        assert_eq!(manager.detach(0), Err(ManagerError::Canceled));
        assert_eq!(manager.new_transaction("[]").unwrap_err(), ManagerError::Canceled);
        assert_eq!(manager.run().await, Err(ManagerError::Canceled));
        assert_eq!(manager.state(), EngineState::Canceled);
        assert!(manager.cancellation().is_cancelled());
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn blocked_submit_is_released_by_cancel() {
        let config = EngineConfig {
            inbound_capacity: 1,
            ..EngineConfig::default()
        };
        let manager = Manager::new("A", config);

        // No loop is running, so the queue stays full.
        manager.submit(Transaction::new("[]", "A", 1)).await.unwrap();
        let blocked = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.submit(Transaction::new("[]", "A", 2)).await })
        };
        tokio::task::yield_now().await;
        assert!(!blocked.is_finished());

        manager.cancel();
        let result = timeout(Duration::from_secs(5), blocked).await.unwrap().unwrap();
        assert_eq!(result, Err(ManagerError::Canceled));
    }

    #[tokio::test]
    async fn second_run_is_refused() {
        let manager = Manager::new("A", EngineConfig::default());
        let mut first = Box::pin(manager.run());

        // Poll the first loop once so it owns the inbound queue.
        tokio::select! {
            biased;
            _ = &mut first => panic!("loop exited early"),
            _ = std::future::ready(()) => {}
        }

        assert_eq!(manager.run().await, Err(ManagerError::AlreadyRunning));

        manager.cancel();
        assert_eq!(first.await, Ok(()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_local_edits_are_all_applied() {
        const TOTAL: u64 = 500;
        let config = EngineConfig {
            inbound_capacity: 8,
            ..EngineConfig::default()
        };
        let manager = Manager::new("A", config);
        let handle = start(&manager);

        let writers: Vec<_> = (0..TOTAL)
            .map(|i| {
                let manager = manager.clone();
                tokio::spawn(async move {
                    manager.submit_local(add(&format!("k{i}"), i as i64)).await.unwrap()
                })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap();
        }
        settle(&manager, TOTAL).await;

        let stats = manager.status().stats;
        assert_eq!(stats.applied, TOTAL);
        assert_eq!(stats.duplicates, 0);
        assert_eq!(manager.snapshot().unwrap().as_object().unwrap().len() as u64, TOTAL);

        let sequences: Vec<u64> = manager.log().unwrap().iter().map(|t| t.sequence()).collect();
        assert_eq!(sequences, (1..=TOTAL).collect::<Vec<_>>());
        assert_eq!(manager.clock().unwrap().get("A"), TOTAL);

        manager.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn submit_local_fails_after_cancel() {
        let config = EngineConfig {
            inbound_capacity: 1,
            ..EngineConfig::default()
        };
        let manager = Manager::new("A", config);

        // No loop is running: the first edit fills the queue, the second waits.
        let first = manager.submit_local("[]").await.unwrap();
        assert_eq!(first.sequence(), 1);
        let blocked = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.submit_local("[]").await })
        };
        tokio::task::yield_now().await;

        manager.cancel();
        let result = timeout(Duration::from_secs(5), blocked).await.unwrap().unwrap();
        assert_eq!(result, Err(ManagerError::Canceled));
        assert_eq!(manager.submit_local("[]").await, Err(ManagerError::Canceled));
    }

    #[tokio::test]
    async fn new_transaction_stamps_source_and_sequence() {
        let manager = Manager::new("alice", EngineConfig::default());
        let first = manager.new_transaction("[]").unwrap();
        let second = manager.new_transaction("[]").unwrap();

        assert_eq!(first.source(), "alice");
        assert_eq!((first.sequence(), second.sequence()), (1, 2));
    }
}
