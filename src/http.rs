//! HTTP query/edit surface.
//!
//! Runs on its own tokio task and stops with the engine's cancellation token.
//!
//! | Route | Behavior |
//! |---|---|
//! | `POST /replace` | stamp the body as a local transaction and submit it |
//! | `GET /get` | current snapshot |
//! | `GET /vclock` | current vector clock |
//! | `GET /log` | accepted transactions in application order |
//! | `GET /status` | engine status and live links |
//! | `GET /metrics` | Prometheus text format, when enabled |

use crate::error::ApiError;
use crate::sync::{LinkInfo, PeerReplicator};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::Value;
use snapsync_core::{Manager, ReplicaStatus, Transaction, VectorClock};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub manager: Manager,
    pub replicator: PeerReplicator,
}

/// Body of `POST /replace`.
#[derive(Debug, Serialize)]
struct Accepted {
    source: String,
    sequence: u64,
}

/// Body of `GET /status`.
#[derive(Debug, Serialize)]
struct Status {
    #[serde(flatten)]
    replica: ReplicaStatus,
    links: Vec<LinkInfo>,
}

/// Handler for POST /replace - body is a JSON Patch document.
///
/// The patch is not validated here; a bad patch is reported by the engine.
async fn replace(
    State(state): State<AppState>,
    body: String,
) -> Result<impl IntoResponse, ApiError> {
    let tx = state.manager.submit_local(body).await?;
    let accepted = Accepted {
        source: tx.source().to_string(),
        sequence: tx.sequence(),
    };
    Ok((StatusCode::ACCEPTED, Json(accepted)))
}

/// Handler for GET /get.
async fn get_snapshot(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    Ok(Json(state.manager.snapshot()?))
}

/// Handler for GET /vclock.
async fn get_clock(State(state): State<AppState>) -> Result<Json<VectorClock>, ApiError> {
    Ok(Json(state.manager.clock()?))
}

/// Handler for GET /log.
async fn get_log(State(state): State<AppState>) -> Result<Json<Vec<Transaction>>, ApiError> {
    let log = state.manager.log()?;
    Ok(Json(log.iter().map(|tx| tx.as_ref().clone()).collect()))
}

/// Handler for GET /status.
async fn get_status(State(state): State<AppState>) -> Json<Status> {
    Json(Status {
        replica: state.manager.status(),
        links: state.replicator.links(),
    })
}

/// Handler for GET /metrics - returns Prometheus metrics in text format.
async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}

/// Build the router. `/metrics` is only mounted when metrics are enabled.
pub fn router(state: AppState, metrics_enabled: bool) -> Router {
    let mut app = Router::new()
        .route("/replace", post(replace))
        .route("/get", get(get_snapshot))
        .route("/vclock", get(get_clock))
        .route("/log", get(get_log))
        .route("/status", get(get_status));

    if metrics_enabled {
        app = app.route("/metrics", get(metrics_handler));
    }

    app.with_state(state)
}

/// Serve the HTTP surface until `shutdown` fires.
pub async fn run_http_server(listener: TcpListener, app: Router, shutdown: CancellationToken) {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "HTTP server listening");
    }

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await;

    if let Err(e) = result {
        tracing::error!(error = %e, "HTTP server error");
    }
    tracing::info!("HTTP server stopped");
}
