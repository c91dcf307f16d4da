use crate::config::PeerBlock;
use crate::error::LinkError;
use crate::metrics;
use crate::sync::link::{Direction, LinkInfo, LinkState};
use crate::sync::wire;
use crate::telemetry::spans;
use dashmap::DashMap;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use snapsync_core::{Manager, Transaction};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, warn};

/// Registry key for a live link session.
pub type LinkId = u64;

/// Longest a single frame write may stay pending.
const SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Gossips the local transaction stream to peers and feeds theirs into the
/// engine.
///
/// Every link, inbound or outbound, runs the same session: a send task that
/// writes the engine's replay and then live deliveries, and a receive loop that
/// decodes frames and submits them. Dedup is left entirely to the engine.
#[derive(Clone)]
pub struct PeerReplicator {
    manager: Manager,
    /// Live link sessions.
    links: Arc<DashMap<LinkId, LinkState>>,
    next_link: Arc<AtomicU64>,
    reconnect_delay: Duration,
    shutdown: CancellationToken,
}

impl PeerReplicator {
    pub fn new(manager: Manager, reconnect_delay: Duration) -> Self {
        let shutdown = manager.cancellation();
        Self {
            manager,
            links: Arc::new(DashMap::new()),
            next_link: Arc::new(AtomicU64::new(0)),
            reconnect_delay,
            shutdown,
        }
    }

    /// Live links, ordered by name.
    pub fn links(&self) -> Vec<LinkInfo> {
        let mut links: Vec<LinkInfo> = self.links.iter().map(|entry| entry.info()).collect();
        links.sort_by(|a, b| a.name.cmp(&b.name));
        links
    }

    /// Initiates an outbound connection, retried with a fixed delay until the
    /// engine is canceled.
    pub fn connect_to_peer(&self, peer: PeerBlock) -> JoinHandle<()> {
        let replicator = self.clone();
        let span = spans::peer(&peer.name, &peer.url);

        tokio::spawn(
            async move {
                let shutdown = replicator.shutdown.clone();

                'reconnect_loop: loop {
                    info!("Connecting to peer");
                    let attempt = tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => break 'reconnect_loop,
                        result = connect_async(peer.url.as_str()) => result,
                    };

                    match attempt {
                        Ok((ws, _response)) => {
                            info!("Peer connected");
                            match replicator.run_link(ws, &peer.name, Direction::Outbound).await {
                                Ok(()) => info!("Peer link closed"),
                                Err(LinkError::Canceled) => break 'reconnect_loop,
                                Err(e) => {
                                    warn!(error = %e, "Peer link failed");
                                    metrics::record_link_error(e.error_code());
                                }
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "Failed to connect to peer");
                        }
                    }

                    metrics::record_reconnect(&peer.name);
                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => break 'reconnect_loop,
                        _ = tokio::time::sleep(replicator.reconnect_delay) => {}
                    }
                }

                info!("Peer reconnect loop stopped");
            }
            .instrument(span),
        )
    }

    /// Serve a connection accepted by the gateway.
    pub async fn handle_inbound<S>(&self, ws: WebSocketStream<S>, addr: SocketAddr)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let name = addr.to_string();
        match self.run_link(ws, &name, Direction::Inbound).await {
            Ok(()) | Err(LinkError::Canceled) => info!(%addr, "Inbound link closed"),
            Err(e) => {
                warn!(%addr, error = %e, "Inbound link failed");
                metrics::record_link_error(e.error_code());
            }
        }
    }

    /// Run one link session until either half ends.
    async fn run_link<S>(
        &self,
        ws: WebSocketStream<S>,
        name: &str,
        direction: Direction,
    ) -> Result<(), LinkError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (subscriber, replay, mut queue) = self.manager.attach()?.into_parts();
        let state = LinkState::new(name, direction, subscriber);
        let frames_sent = Arc::clone(&state.frames_sent);
        let frames_recv = Arc::clone(&state.frames_recv);
        let link_id = self.next_link.fetch_add(1, Ordering::Relaxed);
        self.links.insert(link_id, state);
        metrics::add_links(direction.as_str(), 1);

        let span = spans::link(name, direction.as_str());
        let (mut sink, mut stream) = ws.split();
        let stop = self.shutdown.child_token();

        debug!(parent: &span, replay = replay.len(), "Link established");

        let send_task = {
            let stop = stop.clone();
            let label = name.to_string();
            tokio::spawn(
                async move {
                    let result = async {
                        for tx in replay {
                            if !write_frame(&mut sink, &stop, &tx).await? {
                                return Ok(());
                            }
                            frames_sent.fetch_add(1, Ordering::Relaxed);
                            metrics::record_frame(&label, "out");
                        }

                        loop {
                            tokio::select! {
                                biased;
                                _ = stop.cancelled() => return Ok(()),
                                next = queue.recv() => match next {
                                    Some(tx) => {
                                        if !write_frame(&mut sink, &stop, &tx).await? {
                                            return Ok(());
                                        }
                                        frames_sent.fetch_add(1, Ordering::Relaxed);
                                        metrics::record_frame(&label, "out");
                                    }
                                    None => {
                                        debug!("Subscription ended");
                                        break;
                                    }
                                },
                            }
                        }

                        tokio::select! {
                            biased;
                            _ = stop.cancelled() => {}
                            _ = sink.close() => {}
                        }
                        Ok::<(), LinkError>(())
                    }
                    .await;

                    stop.cancel();
                    result
                }
                .instrument(span.clone()),
            )
        };

        let recv_result = async {
            loop {
                let frame = tokio::select! {
                    biased;
                    _ = stop.cancelled() => break,
                    frame = stream.next() => frame,
                };

                match frame {
                    Some(Ok(Message::Text(text))) => {
                        let tx = wire::decode(&text)?;
                        frames_recv.fetch_add(1, Ordering::Relaxed);
                        metrics::record_frame(name, "in");
                        self.manager.submit(tx).await?;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("Remote closed the link");
                        break;
                    }
                    // Ping, pong and binary frames carry no transactions.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(LinkError::from(e)),
                }
            }
            Ok::<(), LinkError>(())
        }
        .instrument(span.clone())
        .await;

        stop.cancel();
        let send_result = match send_task.await {
            Ok(result) => result,
            Err(e) => {
                error!(parent: &span, error = %e, "Link send task panicked");
                Ok(())
            }
        };

        self.links.remove(&link_id);
        metrics::add_links(direction.as_str(), -1);
        // Fails only once the engine is canceled, which already dropped the queue.
        let _ = self.manager.detach(subscriber);

        if self.shutdown.is_cancelled() {
            return Err(LinkError::Canceled);
        }
        recv_result.and(send_result)
    }
}

/// Write one transaction frame. Returns `Ok(false)` if `stop` fired first.
///
/// A peer that stops reading fails the link after [`SEND_TIMEOUT`].
async fn write_frame<S>(
    sink: &mut SplitSink<WebSocketStream<S>, Message>,
    stop: &CancellationToken,
    tx: &Transaction,
) -> Result<bool, LinkError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let frame = Message::Text(wire::encode(tx));
    tokio::select! {
        biased;
        _ = stop.cancelled() => Ok(false),
        sent = tokio::time::timeout(SEND_TIMEOUT, sink.send(frame)) => match sent {
            Ok(result) => result.map(|()| true).map_err(LinkError::from),
            Err(_) => Err(LinkError::SendTimeout(SEND_TIMEOUT)),
        },
    }
}
