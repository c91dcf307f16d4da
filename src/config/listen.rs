//! Network listener configuration.

use serde::Deserialize;
use std::net::SocketAddr;

use super::defaults::{default_http_address, default_websocket_address};

/// Listener addresses.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    /// HTTP query/edit surface (e.g., "127.0.0.1:8081").
    #[serde(default = "default_http_address")]
    pub http: SocketAddr,
    /// WebSocket gateway for subscribers and peers (e.g., "127.0.0.1:8082").
    #[serde(default = "default_websocket_address")]
    pub websocket: SocketAddr,
    /// Allowed origins for the WebSocket handshake (e.g., `["https://example.com"]`).
    /// Empty list allows all origins. Requests without an Origin header
    /// (peer replicas) are always accepted.
    #[serde(default)]
    pub allow_origins: Vec<String>,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            http: default_http_address(),
            websocket: default_websocket_address(),
            allow_origins: Vec::new(),
        }
    }
}
