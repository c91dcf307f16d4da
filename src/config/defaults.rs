//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

use std::net::SocketAddr;

/// Returns `true` (for serde defaults).
pub fn default_true() -> bool {
    true
}

// =============================================================================
// Replica Defaults
// =============================================================================

/// A fresh random source id, so two unconfigured replicas never collide.
pub fn default_source() -> String {
    format!("replica-{}", uuid::Uuid::new_v4().simple())
}

// =============================================================================
// Listener Defaults
// =============================================================================

pub fn default_http_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8081))
}

pub fn default_websocket_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8082))
}

// =============================================================================
// Sync Defaults
// =============================================================================

pub fn default_reconnect_delay_ms() -> u64 {
    1000
}
