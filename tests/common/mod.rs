//! Integration test common infrastructure.
//!
//! Provides utilities for spawning test daemons, driving them over HTTP and
//! WebSocket, and waiting for replicas to converge.

pub mod client;
pub mod server;

#[allow(unused_imports)]
pub use client::{TestClient, WsClient};
#[allow(unused_imports)]
pub use server::{Ports, TestServer};

use std::future::Future;
use std::time::Duration;

/// Poll `check` until it returns true or ten seconds pass.
#[allow(dead_code)]
pub async fn eventually<F, Fut>(what: &str, mut check: F) -> anyhow::Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<bool>>,
{
    for _ in 0..100 {
        if check().await? {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    anyhow::bail!("timed out waiting for {what}")
}
