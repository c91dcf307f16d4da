//! Tracing setup and span constructors.

use crate::config::LogFormat;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` overrides the default `info`
/// filter.
pub fn init(format: LogFormat) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true);

    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Standardized span constructors.
pub mod spans {
    use tracing::{Span, info_span};

    /// Span for the merge loop.
    pub fn engine(source: &str) -> Span {
        info_span!("engine", source = %source)
    }

    /// Span for a link session.
    pub fn link(name: &str, direction: &str) -> Span {
        info_span!("link", name = %name, direction = %direction)
    }

    /// Span for an outbound reconnect loop.
    pub fn peer(name: &str, url: &str) -> Span {
        info_span!("peer", name = %name, url = %url)
    }
}
