//! Sync Module - replica-to-replica gossip.
//!
//! This module manages link sessions with peers and browser subscribers:
//! the link registry, the outbound reconnect loop, and the transaction wire
//! format.

pub mod link;
pub mod manager;
pub mod wire;

pub use link::LinkInfo;
pub use manager::PeerReplicator;
