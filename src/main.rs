//! snapsyncd - replicated JSON document daemon.
//!
//! Hosts one replica's merge engine, serves it over HTTP and WebSocket, and
//! gossips its transactions with the configured peers.

mod config;
mod error;
mod http;
mod metrics;
mod network;
mod sync;
mod telemetry;

use crate::config::{Config, LogFormat};
use crate::http::AppState;
use crate::network::Gateway;
use crate::sync::PeerReplicator;
use snapsync_core::{Manager, MergeObserver, NoopObserver};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{Instrument, error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = match Config::load(&config_path) {
        Ok(config) => {
            telemetry::init(config.logging.format);
            config
        }
        Err(e) => {
            telemetry::init(LogFormat::Pretty);
            error!(path = %config_path, error = %e, "Failed to load config");
            return Err(e.into());
        }
    };

    if let Err(errors) = config::validation::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        anyhow::bail!("{} configuration error(s) in {}", errors.len(), config_path);
    }

    info!(
        source = %config.replica.source,
        http = %config.listen.http,
        websocket = %config.listen.websocket,
        peers = config.peers.len(),
        policy = ?config.engine.failed_patch_policy,
        "Starting snapsyncd"
    );

    // Prometheus metrics are optional.
    let observer: Arc<dyn MergeObserver> = if config.metrics.enabled {
        metrics::init();
        info!("Metrics initialized");
        Arc::new(metrics::MetricsObserver)
    } else {
        info!("Metrics disabled");
        Arc::new(NoopObserver)
    };

    let manager = Manager::with_observer(
        config.replica.source.clone(),
        config.engine.clone(),
        observer,
    );

    let engine = {
        let manager = manager.clone();
        let span = telemetry::spans::engine(manager.source());
        tokio::spawn(async move { manager.run().await }.instrument(span))
    };

    let replicator = PeerReplicator::new(
        manager.clone(),
        Duration::from_millis(config.sync.reconnect_delay_ms),
    );

    // Bind both listeners before dialing anyone so startup errors are fatal.
    let gateway = Gateway::bind(
        config.listen.websocket,
        config.listen.allow_origins.clone(),
        replicator.clone(),
    )
    .await?;
    let http_listener = TcpListener::bind(config.listen.http).await?;

    let app = http::router(
        AppState {
            manager: manager.clone(),
            replicator: replicator.clone(),
        },
        config.metrics.enabled,
    );
    let http_task = tokio::spawn(http::run_http_server(
        http_listener,
        app,
        manager.cancellation(),
    ));
    let gateway_task = tokio::spawn(gateway.run(manager.cancellation()));

    // Start outgoing connections
    let peer_tasks: Vec<_> = config
        .peers
        .iter()
        .map(|peer| replicator.connect_to_peer(peer.clone()))
        .collect();
    info!(count = peer_tasks.len(), "Peer links started");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown requested");
    manager.cancel();

    match engine.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "Merge loop exited with error"),
        Err(e) => error!(error = %e, "Merge loop task failed"),
    }
    let _ = http_task.await;
    let _ = gateway_task.await;
    for task in peer_tasks {
        let _ = task.await;
    }

    info!("snapsyncd stopped");
    Ok(())
}
