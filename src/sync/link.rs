use chrono::{DateTime, Utc};
use serde::Serialize;
use snapsync_core::SubscriberId;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Which side opened the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Accepted by the gateway (browser subscriber or dialing peer).
    Inbound,
    /// Dialed from `[[peers]]`.
    Outbound,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        }
    }
}

/// Represents a live link session.
#[derive(Debug, Clone)]
pub struct LinkState {
    /// Peer name, or remote address for inbound links.
    pub name: String,
    pub direction: Direction,
    /// Engine subscription feeding this link.
    pub subscriber: SubscriberId,
    /// Time when the session started.
    pub connected_at: DateTime<Utc>,
    /// Transaction frames written to the socket.
    pub frames_sent: Arc<AtomicU64>,
    /// Transaction frames read from the socket.
    pub frames_recv: Arc<AtomicU64>,
}

impl LinkState {
    pub fn new(name: impl Into<String>, direction: Direction, subscriber: SubscriberId) -> Self {
        Self {
            name: name.into(),
            direction,
            subscriber,
            connected_at: Utc::now(),
            frames_sent: Arc::new(AtomicU64::new(0)),
            frames_recv: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Point-in-time copy for `/status`.
    pub fn info(&self) -> LinkInfo {
        LinkInfo {
            name: self.name.clone(),
            direction: self.direction,
            subscriber: self.subscriber,
            connected_at: self.connected_at,
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_recv: self.frames_recv.load(Ordering::Relaxed),
        }
    }
}

/// Serializable view of a [`LinkState`].
#[derive(Debug, Clone, Serialize)]
pub struct LinkInfo {
    pub name: String,
    pub direction: Direction,
    pub subscriber: SubscriberId,
    pub connected_at: DateTime<Utc>,
    pub frames_sent: u64,
    pub frames_recv: u64,
}
