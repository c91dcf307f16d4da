//! Network module.
//!
//! Contains the Gateway (WebSocket listener). Link sessions themselves live
//! in [`crate::sync`].

mod gateway;

pub use gateway::Gateway;
