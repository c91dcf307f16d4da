//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Core config struct definitions (Config, ReplicaConfig, SyncConfig, ...)
//! - [`listen`]: HTTP and WebSocket listener addresses (ListenConfig)
//! - [`peers`]: Peer replica entries and the JSON peers file (PeerBlock)
//! - [`defaults`]: serde default functions
//! - [`validation`]: startup checks

mod defaults;
mod listen;
mod peers;
mod types;
pub mod validation;

pub use peers::PeerBlock;
pub use types::{Config, LogFormat};
