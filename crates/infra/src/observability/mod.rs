//! Observability for the request layer
//!
//! Every completed request produces one [`RequestEvent`] handed to the
//! configured [`MetricsSink`]. Sinks must not affect correctness: a layer
//! without one behaves identically.
//!
//! - [`RequestMetrics`]: lock-free counters
//! - [`TracingSink`]: one structured log line per request
//! - [`init_tracing`]: subscriber setup honouring `RUST_LOG`

pub mod events;
pub mod metrics;

pub use events::{RequestEvent, RequestStatus, ResponseSource};
pub use metrics::{MetricsSink, RequestMetrics, TracingSink};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global tracing subscriber
///
/// `RUST_LOG` wins over `default_filter` when set. Returns `false` if a
/// subscriber was already installed.
pub fn init_tracing(default_filter: &str, json: bool) -> bool {
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(default_filter));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).try_init().is_ok()
    } else {
        registry.with(fmt::layer()).try_init().is_ok()
    }
}
