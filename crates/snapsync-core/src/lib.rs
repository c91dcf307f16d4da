//! # snapsync-core
//!
//! Replicated transaction log and merge engine for a shared JSON document.
//!
//! A replica accepts transactions (JSON Patch documents stamped with a source
//! identifier and a per-source sequence number) from local clients and from
//! peer replicas, deduplicates them with a vector clock, applies them to a
//! running snapshot, and fans every accepted transaction out to attached
//! subscribers in application order.
//!
//! ```text
//!   local edit ──┐                        ┌──> subscriber queue (browser)
//!                ▼                        │
//!   peer link ──> inbound queue ──> merge loop ──> subscriber queue (peer link)
//!                                   │
//!                     clock / log / snapshot (one exclusive section)
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use snapsync_core::{EngineConfig, Manager};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), snapsync_core::ManagerError> {
//! let manager = Manager::new("alice", EngineConfig::default());
//! let engine = manager.clone();
//! let handle = tokio::spawn(async move { engine.run().await });
//!
//! let tx = manager.submit_local(r#"[{"op":"add","path":"/x","value":1}]"#).await?;
//! assert_eq!(tx.sequence(), 1);
//!
//! manager.cancel();
//! let _ = handle.await;
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod clock;
pub mod error;
pub mod fanout;
pub mod log;
pub mod manager;
pub mod observer;
pub mod patch;
pub mod transaction;

pub use clock::VectorClock;
pub use error::{ManagerError, PatchError};
pub use fanout::{FanoutReport, SubscriberId, SubscriberRegistry, Subscription};
pub use log::{FailedPatchPolicy, MergeOutcome, MergeStats, Replica, TransactionLog};
pub use manager::{EngineConfig, EngineState, Manager, Rejection, ReplicaStatus};
pub use observer::{MergeObserver, NoopObserver};
pub use transaction::{SequenceCounter, Transaction};
