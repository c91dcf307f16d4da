//! Prometheus metrics collection for snapsyncd.
//!
//! Engine counters are fed by [`MetricsObserver`], link counters by the link
//! sessions in [`crate::sync`].
//!
//! ## Engine
//!
//! - `snapsync_transactions_applied_total` - transactions merged into the snapshot
//! - `snapsync_transactions_duplicate_total` - transactions discarded by the vector clock
//! - `snapsync_transactions_rejected_total{kind}` - transactions whose patch failed
//! - `snapsync_log_length` - accepted transactions (gauge)
//! - `snapsync_subscribers` - attached subscribers (gauge)
//! - `snapsync_subscribers_dropped_total` - subscribers disconnected for a full queue
//! - `snapsync_fanout` - subscribers reached per applied transaction (histogram)
//!
//! ## Links
//!
//! - `snapsync_links_connected{direction}` - live link sessions (gauge)
//! - `snapsync_link_frames_total{link, direction}` - transaction frames sent/received
//! - `snapsync_link_errors_total{error}` - link sessions ended by an error
//! - `snapsync_peer_reconnects_total{peer}` - outbound reconnect attempts

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use snapsync_core::{FanoutReport, MergeObserver, PatchError, SubscriberId, Transaction};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters (monotonic increasing)
// ========================================================================

pub static TRANSACTIONS_APPLIED: OnceLock<IntCounter> = OnceLock::new();

pub static TRANSACTIONS_DUPLICATE: OnceLock<IntCounter> = OnceLock::new();

/// Rejected transactions by failure kind (malformed, rejected).
pub static TRANSACTIONS_REJECTED: OnceLock<IntCounterVec> = OnceLock::new();

/// Subscribers disconnected because their queue was full.
pub static SUBSCRIBERS_DROPPED: OnceLock<IntCounter> = OnceLock::new();

pub static LINK_FRAMES: OnceLock<IntCounterVec> = OnceLock::new();

pub static LINK_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

pub static PEER_RECONNECTS: OnceLock<IntCounterVec> = OnceLock::new();

// ========================================================================
// Gauges (can increase/decrease)
// ========================================================================

pub static LOG_LENGTH: OnceLock<IntGauge> = OnceLock::new();

pub static SUBSCRIBERS: OnceLock<IntGauge> = OnceLock::new();

pub static LINKS_CONNECTED: OnceLock<IntGaugeVec> = OnceLock::new();

// ========================================================================
// Histograms
// ========================================================================

/// Subscribers reached per applied transaction.
pub static FANOUT: OnceLock<Histogram> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at startup before any metrics are recorded. Until
/// then every recording helper is a no-op.
pub fn init() {
    let r = registry();

    // Helper macro to register metric
    macro_rules! register {
        ($metric:ident, $init:expr) => {
            match $init {
                Ok(m) => {
                    if let Err(e) = r.register(Box::new(m.clone())) {
                        tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
                    }
                    let _ = $metric.set(m);
                }
                Err(e) => {
                    tracing::error!(error = %e, concat!("Failed to create metric ", stringify!($metric)));
                }
            }
        };
    }

    register!(TRANSACTIONS_APPLIED, IntCounter::new("snapsync_transactions_applied_total", "Transactions merged into the snapshot"));
    register!(TRANSACTIONS_DUPLICATE, IntCounter::new("snapsync_transactions_duplicate_total", "Transactions discarded as already seen"));
    register!(TRANSACTIONS_REJECTED, IntCounterVec::new(Opts::new("snapsync_transactions_rejected_total", "Transactions whose patch failed"), &["kind"]));
    register!(SUBSCRIBERS_DROPPED, IntCounter::new("snapsync_subscribers_dropped_total", "Subscribers disconnected for a full queue"));
    register!(LINK_FRAMES, IntCounterVec::new(Opts::new("snapsync_link_frames_total", "Transaction frames per link"), &["link", "direction"]));
    register!(LINK_ERRORS, IntCounterVec::new(Opts::new("snapsync_link_errors_total", "Link sessions ended by an error"), &["error"]));
    register!(PEER_RECONNECTS, IntCounterVec::new(Opts::new("snapsync_peer_reconnects_total", "Outbound reconnect attempts"), &["peer"]));
    register!(LOG_LENGTH, IntGauge::new("snapsync_log_length", "Accepted transactions"));
    register!(SUBSCRIBERS, IntGauge::new("snapsync_subscribers", "Attached subscribers"));
    register!(LINKS_CONNECTED, IntGaugeVec::new(Opts::new("snapsync_links_connected", "Live link sessions"), &["direction"]));
    register!(FANOUT, Histogram::with_opts(
        HistogramOpts::new("snapsync_fanout", "Subscribers reached per applied transaction")
            .buckets(vec![0.0, 1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0])));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Helper functions for link metric updates
// ============================================================================

/// Count one transaction frame on a link. `direction` is "in" or "out".
#[inline]
pub fn record_frame(link: &str, direction: &str) {
    if let Some(c) = LINK_FRAMES.get() {
        c.with_label_values(&[link, direction]).inc();
    }
}

#[inline]
pub fn record_link_error(code: &str) {
    if let Some(c) = LINK_ERRORS.get() {
        c.with_label_values(&[code]).inc();
    }
}

#[inline]
pub fn record_reconnect(peer: &str) {
    if let Some(c) = PEER_RECONNECTS.get() {
        c.with_label_values(&[peer]).inc();
    }
}

/// Adjust the live link gauge for `direction` by `delta`.
#[inline]
pub fn add_links(direction: &str, delta: i64) {
    if let Some(g) = LINKS_CONNECTED.get() {
        g.with_label_values(&[direction]).add(delta);
    }
}

// ============================================================================
// Engine observer
// ============================================================================

/// Feeds merge-loop events into the engine metrics.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsObserver;

impl MergeObserver for MetricsObserver {
    fn on_applied(&self, _tx: &Transaction, log_len: usize, fanout: &FanoutReport) {
        if let Some(c) = TRANSACTIONS_APPLIED.get() {
            c.inc();
        }
        if let Some(g) = LOG_LENGTH.get() {
            g.set(log_len as i64);
        }
        if let Some(h) = FANOUT.get() {
            h.observe(fanout.delivered as f64);
        }
        if !fanout.saturated.is_empty()
            && let Some(c) = SUBSCRIBERS_DROPPED.get()
        {
            c.inc_by(fanout.saturated.len() as u64);
        }
    }

    fn on_duplicate(&self, _tx: &Transaction) {
        if let Some(c) = TRANSACTIONS_DUPLICATE.get() {
            c.inc();
        }
    }

    fn on_rejected(&self, _tx: &Transaction, error: &PatchError) {
        if let Some(c) = TRANSACTIONS_REJECTED.get() {
            c.with_label_values(&[error.kind()]).inc();
        }
    }

    fn on_attach(&self, _id: SubscriberId, attached: usize) {
        if let Some(g) = SUBSCRIBERS.get() {
            g.set(attached as i64);
        }
    }

    fn on_detach(&self, _id: SubscriberId, attached: usize) {
        if let Some(g) = SUBSCRIBERS.get() {
            g.set(attached as i64);
        }
    }
}
