//! Unified error handling for snapsyncd.
//!
//! This module provides the daemon's error hierarchy on top of the engine's
//! [`ManagerError`], with metric labels and HTTP status mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use snapsync_core::ManagerError;
use std::time::Duration;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

// ============================================================================
// Wire Errors (frame decoding)
// ============================================================================

/// A WebSocket frame that is not a valid transaction.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("invalid transaction frame: {0}")]
    Json(#[from] serde_json::Error),

    #[error("transaction from '{0}' has sequence 0")]
    ZeroSequence(String),
}

// ============================================================================
// Link Errors (peer and subscriber sessions)
// ============================================================================

/// Why a link session ended abnormally.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("transport error: {0}")]
    Transport(#[from] tungstenite::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] WireError),

    #[error("peer stopped reading for {0:?}")]
    SendTimeout(Duration),

    #[error("engine canceled")]
    Canceled,
}

impl LinkError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Protocol(_) => "protocol",
            Self::SendTimeout(_) => "send_timeout",
            Self::Canceled => "canceled",
        }
    }
}

impl From<ManagerError> for LinkError {
    fn from(_: ManagerError) -> Self {
        Self::Canceled
    }
}

// ============================================================================
// API Errors (HTTP surface)
// ============================================================================

/// Errors returned by HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] ManagerError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Engine(ManagerError::Canceled) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Engine(ManagerError::AlreadyRunning) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}
