//! Modular common utilities shared across Footsteps crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: clock abstraction and the in-memory cache
//! - `runtime`: async infrastructure (retry executor, single-flight)
//! - `test-utils`: async test helpers
//!
//! ```toml
//! footsteps-common = { workspace = true, features = ["runtime"] }
//! ```

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod cache;
#[cfg(feature = "foundation")]
pub mod time;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod resilience;
#[cfg(feature = "runtime")]
pub mod sync;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(feature = "test-utils")]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "foundation")]
pub use cache::{Cache, CacheConfig, CacheStats, EvictionPolicy};
#[cfg(feature = "runtime")]
pub use resilience::{
    BackoffStrategy, RetryConfig, RetryConfigBuilder, RetryDecision, RetryError, RetryExecutor,
    RetryPolicy, RetryResult,
};
#[cfg(feature = "runtime")]
pub use sync::{Flight, FlightAborted, SingleFlight, ZeroWaiterPolicy};
#[cfg(feature = "foundation")]
pub use time::{Clock, MockClock, SystemClock};
