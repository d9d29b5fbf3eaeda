//! # Footsteps Infrastructure
//!
//! The resilient request layer and its adapters.
//!
//! This crate contains:
//! - The [`RequestLayer`] facade (cache, single-flight, retry, token refresh)
//! - The reqwest-backed [`HttpTransport`]
//! - Session and token refresh collaborators
//! - Configuration loading and request observability
//!
//! ## Architecture
//! - Pure types live in `footsteps-domain`
//! - Generic cache, retry and single-flight primitives live in
//!   `footsteps-common`
//! - Everything that performs I/O lives here

pub mod auth;
pub mod config;
pub mod errors;
pub mod http;
pub mod observability;
pub mod request;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export commonly used items
pub use auth::{AuthCoordinator, HttpTokenRefresher, InMemorySession, RefreshError, SessionStore, TokenRefresher};
pub use config::ConfigError;
pub use errors::{InfraError, InfraResult};
pub use http::{HttpTransport, HttpTransportBuilder, Transport};
pub use observability::{init_tracing, MetricsSink, RequestEvent, RequestMetrics, RequestStatus, ResponseSource, TracingSink};
pub use request::{CacheKey, RequestKeyer, RequestLayer, RequestLayerBuilder, UrlPattern};
