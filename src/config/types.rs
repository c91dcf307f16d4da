//! Core configuration types and loading.

use serde::Deserialize;
use snapsync_core::EngineConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::defaults::{default_reconnect_delay_ms, default_source, default_true};
use super::listen::ListenConfig;
use super::peers::{self, PeerBlock};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to load peers file {path}: {reason}")]
    PeersFile { path: String, reason: String },
}

/// Daemon configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Replica identity.
    #[serde(default)]
    pub replica: ReplicaConfig,
    /// HTTP and WebSocket listeners.
    #[serde(default)]
    pub listen: ListenConfig,
    /// Merge engine tuning.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Peer link behavior.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Statically configured peers. Entries from `sync.peers_file` are
    /// appended on load.
    #[serde(default)]
    pub peers: Vec<PeerBlock>,
    /// Prometheus metrics.
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// Log output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// A relative `sync.peers_file` is resolved against the config file's
    /// directory.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;

        if let Some(file) = &config.sync.peers_file {
            let resolved = match path.parent() {
                Some(dir) if file.is_relative() => dir.join(file),
                _ => file.clone(),
            };
            config.peers.extend(peers::load_peers_file(&resolved)?);
        }

        Ok(config)
    }
}

/// Replica identity.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplicaConfig {
    /// Source identifier stamped on local edits. Must be unique across the
    /// replica set; defaults to a random `replica-<uuid>`.
    #[serde(default = "default_source")]
    pub source: String,
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
        }
    }
}

/// Peer link behavior.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Fixed delay between outbound reconnect attempts, in milliseconds.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// Optional JSON file holding an array of `"host:port"` peer addresses.
    #[serde(default)]
    pub peers_file: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: default_reconnect_delay_ms(),
            peers_file: None,
        }
    }
}

/// Prometheus metrics configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Serve `/metrics` and record engine and link counters.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Logging configuration. `RUST_LOG` still controls filtering.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}
