//! Peer replica configuration.

use serde::Deserialize;
use std::path::Path;

use super::types::ConfigError;

/// A peer replica to dial.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PeerBlock {
    /// Label used in logs, metrics and `/status`.
    pub name: String,
    /// WebSocket URL of the peer's gateway (e.g., "ws://10.0.0.2:8082/ws").
    pub url: String,
}

impl PeerBlock {
    /// Peer entry for a bare `host:port` address.
    pub fn from_address(address: &str) -> Self {
        Self {
            name: address.to_string(),
            url: format!("ws://{address}/ws"),
        }
    }
}

/// Read a JSON array of `"host:port"` strings.
pub fn load_peers_file(path: &Path) -> Result<Vec<PeerBlock>, ConfigError> {
    let display = path.display().to_string();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::PeersFile {
        path: display.clone(),
        reason: e.to_string(),
    })?;
    parse_peers(&content).map_err(|reason| ConfigError::PeersFile {
        path: display,
        reason,
    })
}

fn parse_peers(content: &str) -> Result<Vec<PeerBlock>, String> {
    let addresses: Vec<String> = serde_json::from_str(content).map_err(|e| e.to_string())?;
    addresses
        .iter()
        .map(|address| {
            let address = address.trim();
            if address.is_empty() || address.contains('/') {
                Err(format!("invalid peer address {address:?}"))
            } else {
                Ok(PeerBlock::from_address(address))
            }
        })
        .collect()
}
