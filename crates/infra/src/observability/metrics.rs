//! Metrics sinks
//!
//! [`RequestMetrics`] folds request events into counters the host app can
//! poll. [`TracingSink`] forwards each event as a structured log line.
//!
//! Counters are updated independently with relaxed ordering, so derived
//! figures such as the hit rate may lag by an event while requests are
//! still completing.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{info, warn};

use super::events::{RequestEvent, ResponseSource};

/// Receives one event per completed request
pub trait MetricsSink: Send + Sync {
    fn record(&self, event: &RequestEvent);
}

/// Counters aggregated over every recorded request
#[derive(Debug, Default)]
pub struct RequestMetrics {
    requests: AtomicU64,
    errors: AtomicU64,
    cache_hits: AtomicU64,
    shared: AtomicU64,
    total_duration_ms: AtomicU64,
}

impl RequestMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn cache_hit_count(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    /// Requests that joined another caller's in-flight call
    pub fn shared_count(&self) -> u64 {
        self.shared.load(Ordering::Relaxed)
    }

    /// Average duration in milliseconds, 0.0 before any request
    pub fn avg_duration_ms(&self) -> f64 {
        let total = self.total_duration_ms.load(Ordering::Relaxed);
        let count = self.requests.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        total as f64 / count as f64
    }

    /// Share of requests answered from cache, between 0.0 and 1.0
    pub fn cache_hit_rate(&self) -> f64 {
        let hits = self.cache_hits.load(Ordering::Relaxed);
        let count = self.requests.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        hits as f64 / count as f64
    }

    pub fn reset(&self) {
        self.requests.store(0, Ordering::Relaxed);
        self.errors.store(0, Ordering::Relaxed);
        self.cache_hits.store(0, Ordering::Relaxed);
        self.shared.store(0, Ordering::Relaxed);
        self.total_duration_ms.store(0, Ordering::Relaxed);
    }
}

impl MetricsSink for RequestMetrics {
    fn record(&self, event: &RequestEvent) {
        self.total_duration_ms.fetch_add(event.duration_ms, Ordering::Relaxed);
        self.requests.fetch_add(1, Ordering::Relaxed);

        match event.source {
            ResponseSource::Cache => {
                self.cache_hits.fetch_add(1, Ordering::Relaxed);
            }
            ResponseSource::Shared => {
                self.shared.fetch_add(1, Ordering::Relaxed);
            }
            ResponseSource::Network => {}
        }
        if event.is_error() {
            // Relaxed OK: independent counter
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Logs every event as a structured `tracing` record
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl MetricsSink for TracingSink {
    fn record(&self, event: &RequestEvent) {
        let cache_key = event.cache_key.map(|key| key.to_string());
        match &event.error {
            Some(error) => warn!(
                target: "footsteps::requests",
                method = %event.method,
                url = %event.url,
                duration_ms = event.duration_ms,
                status = %event.status,
                cache_key = cache_key.as_deref(),
                source = ?event.source,
                %error,
                "request failed"
            ),
            None => info!(
                target: "footsteps::requests",
                method = %event.method,
                url = %event.url,
                duration_ms = event.duration_ms,
                status = %event.status,
                cache_key = cache_key.as_deref(),
                source = ?event.source,
                "request completed"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use footsteps_domain::Method;

    use super::*;
    use crate::observability::events::RequestStatus;

    fn event(source: ResponseSource, duration_ms: u64, error: Option<&str>) -> RequestEvent {
        RequestEvent {
            method: Method::Get,
            url: "/characters".into(),
            duration_ms,
            status: if error.is_some() { RequestStatus::Error } else { RequestStatus::Code(200) },
            cache_key: None,
            source,
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn counters_aggregate_events() {
        let metrics = RequestMetrics::new();

        metrics.record(&event(ResponseSource::Network, 30, None));
        metrics.record(&event(ResponseSource::Cache, 0, None));
        metrics.record(&event(ResponseSource::Shared, 30, None));
        metrics.record(&event(ResponseSource::Network, 60, Some("Network error: reset")));

        assert_eq!(metrics.request_count(), 4);
        assert_eq!(metrics.error_count(), 1);
        assert_eq!(metrics.cache_hit_count(), 1);
        assert_eq!(metrics.shared_count(), 1);
        assert!((metrics.avg_duration_ms() - 30.0).abs() < f64::EPSILON);
        assert!((metrics.cache_hit_rate() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn counters_settle_after_concurrent_recording() {
        let metrics = std::sync::Arc::new(RequestMetrics::new());

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let metrics = std::sync::Arc::clone(&metrics);
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        metrics.record(&event(ResponseSource::Cache, 2, None));
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(metrics.request_count(), 1000);
        assert_eq!(metrics.cache_hit_count(), 1000);
        assert!((metrics.avg_duration_ms() - 2.0).abs() < f64::EPSILON);
        assert!((metrics.cache_hit_rate() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_metrics_report_zero() {
        let metrics = RequestMetrics::new();
        assert_eq!(metrics.avg_duration_ms(), 0.0);
        assert_eq!(metrics.cache_hit_rate(), 0.0);

        metrics.record(&event(ResponseSource::Network, 5, None));
        metrics.reset();
        assert_eq!(metrics.request_count(), 0);
    }

    #[test]
    fn tracing_sink_accepts_events() {
        TracingSink.record(&event(ResponseSource::Network, 1, Some("boom")));
        TracingSink.record(&event(ResponseSource::Cache, 0, None));
    }
}
