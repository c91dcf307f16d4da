//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("replica.source must not be empty")]
    EmptySource,
    #[error("engine.{0} must be greater than zero")]
    ZeroCapacity(&'static str),
    #[error("listen.http and listen.websocket must differ, both are {0}")]
    ListenAddressConflict(SocketAddr),
    #[error("peer '{name}' has invalid url '{url}' (expected ws:// or wss://)")]
    InvalidPeerUrl { name: String, url: String },
    #[error("peer '{0}' is configured more than once")]
    DuplicatePeer(String),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.replica.source.trim().is_empty() {
        errors.push(ValidationError::EmptySource);
    }

    let engine = &config.engine;
    for (name, value) in [
        ("inbound_capacity", engine.inbound_capacity),
        ("subscriber_capacity", engine.subscriber_capacity),
        ("rejection_capacity", engine.rejection_capacity),
    ] {
        if value == 0 {
            errors.push(ValidationError::ZeroCapacity(name));
        }
    }

    if config.listen.http == config.listen.websocket {
        errors.push(ValidationError::ListenAddressConflict(config.listen.http));
    }

    let mut seen = HashSet::new();
    for peer in &config.peers {
        if !is_websocket_url(&peer.url) {
            errors.push(ValidationError::InvalidPeerUrl {
                name: peer.name.clone(),
                url: peer.url.clone(),
            });
        }
        if !seen.insert(peer.url.as_str()) {
            errors.push(ValidationError::DuplicatePeer(peer.name.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_websocket_url(url: &str) -> bool {
    url.strip_prefix("ws://")
        .or_else(|| url.strip_prefix("wss://"))
        .is_some_and(|rest| !rest.is_empty() && !rest.starts_with('/'))
}
