//! Test clients.
//!
//! [`TestClient`] drives the HTTP surface, [`WsClient`] speaks the
//! transaction stream over WebSocket.

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

/// HTTP client for one daemon.
pub struct TestClient {
    http: reqwest::Client,
    base: String,
}

impl TestClient {
    pub fn new(base: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base,
        }
    }

    /// POST a JSON Patch document to `/replace`; returns the status code.
    pub async fn replace(&self, patch: &str) -> anyhow::Result<u16> {
        let response = self
            .http
            .post(format!("{}/replace", self.base))
            .body(patch.to_string())
            .send()
            .await?;
        Ok(response.status().as_u16())
    }

    async fn get_json(&self, path: &str) -> anyhow::Result<Value> {
        let response = self
            .http
            .get(format!("{}{}", self.base, path))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    pub async fn snapshot(&self) -> anyhow::Result<Value> {
        self.get_json("/get").await
    }

    pub async fn vclock(&self) -> anyhow::Result<Value> {
        self.get_json("/vclock").await
    }

    pub async fn log(&self) -> anyhow::Result<Value> {
        self.get_json("/log").await
    }

    pub async fn status(&self) -> anyhow::Result<Value> {
        self.get_json("/status").await
    }

    pub async fn metrics(&self) -> anyhow::Result<reqwest::Response> {
        Ok(self.http.get(format!("{}/metrics", self.base)).send().await?)
    }
}

/// A WebSocket link to a daemon's gateway.
pub struct WsClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsClient {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let (stream, _) = connect_async(url).await?;
        Ok(Self { stream })
    }

    /// Send a raw text frame.
    pub async fn send_raw(&mut self, frame: &str) -> anyhow::Result<()> {
        self.stream.send(Message::Text(frame.to_string())).await?;
        Ok(())
    }

    /// Send a transaction frame.
    pub async fn send_tx(&mut self, data: &str, source: &str, sequence: u64) -> anyhow::Result<()> {
        let frame = serde_json::json!({
            "data": data,
            "source": source,
            "sequence": sequence,
        });
        self.send_raw(&frame.to_string()).await
    }

    /// Receive the next transaction frame as JSON.
    pub async fn recv_tx(&mut self) -> anyhow::Result<Value> {
        loop {
            let frame = timeout(Duration::from_secs(5), self.stream.next())
                .await?
                .ok_or_else(|| anyhow::anyhow!("stream closed"))??;
            if let Message::Text(text) = frame {
                return Ok(serde_json::from_str(&text)?);
            }
        }
    }

    /// True once the server has closed the stream.
    pub async fn is_closed(&mut self) -> bool {
        loop {
            match timeout(Duration::from_secs(5), self.stream.next()).await {
                Ok(None) | Ok(Some(Err(_))) | Ok(Some(Ok(Message::Close(_)))) => return true,
                Ok(Some(Ok(_))) => continue,
                Err(_) => return false,
            }
        }
    }
}
