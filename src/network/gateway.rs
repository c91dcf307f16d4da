//! Gateway - WebSocket listener that accepts subscribers and peers.
//!
//! The Gateway binds the WebSocket address and hands every accepted socket
//! to the [`PeerReplicator`] as an inbound link session.

use crate::sync::PeerReplicator;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Path peers and subscribers connect to.
pub const WEBSOCKET_PATH: &str = "/ws";

/// The Gateway accepts incoming WebSocket connections and spawns link sessions.
pub struct Gateway {
    listener: TcpListener,
    allow_origins: Arc<Vec<String>>,
    replicator: PeerReplicator,
}

impl Gateway {
    /// Bind the gateway to the specified address.
    pub async fn bind(
        addr: SocketAddr,
        allow_origins: Vec<String>,
        replicator: PeerReplicator,
    ) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "WebSocket listener bound");

        Ok(Self {
            listener,
            allow_origins: Arc::new(allow_origins),
            replicator,
        })
    }

    /// Accept connections until `shutdown` fires.
    pub async fn run(self, shutdown: CancellationToken) {
        loop {
            let accepted = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, addr)) => {
                    info!(%addr, "WebSocket connection attempt");

                    let replicator = self.replicator.clone();
                    let allowed = Arc::clone(&self.allow_origins);

                    tokio::spawn(async move {
                        let callback = |req: &Request, response: Response| {
                            check_handshake(&allowed, req, addr).map(|()| response)
                        };

                        match accept_hdr_async(stream, callback).await {
                            Ok(ws_stream) => {
                                info!(%addr, "WebSocket handshake successful");
                                replicator.handle_inbound(ws_stream, addr).await;
                            }
                            Err(e) => {
                                warn!(%addr, error = %e, "WebSocket handshake failed");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept WebSocket connection");
                }
            }
        }

        info!("WebSocket listener stopped");
    }
}

/// Validate path and Origin during the handshake.
fn check_handshake(allowed: &[String], req: &Request, addr: SocketAddr) -> Result<(), ErrorResponse> {
    if req.uri().path() != WEBSOCKET_PATH {
        warn!(%addr, path = %req.uri().path(), "WebSocket request for unknown path");
        return Err(reject(http::StatusCode::NOT_FOUND, "not found"));
    }

    let origin = req.headers().get("Origin").and_then(|o| o.to_str().ok());
    if origin_allowed(allowed, origin) {
        Ok(())
    } else {
        warn!(%addr, origin = ?origin, "WebSocket CORS rejected");
        Err(reject(http::StatusCode::FORBIDDEN, "CORS origin not allowed"))
    }
}

/// An empty allow list admits everyone; a missing Origin header (peer
/// replicas, non-browser clients) is always admitted.
fn origin_allowed(allowed: &[String], origin: Option<&str>) -> bool {
    match origin {
        _ if allowed.is_empty() => true,
        None => true,
        Some(origin) => allowed.iter().any(|a| a == origin || a == "*"),
    }
}

fn reject(status: http::StatusCode, body: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(body.to_string()));
    *response.status_mut() = status;
    response
}
