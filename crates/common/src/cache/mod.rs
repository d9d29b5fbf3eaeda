//! Generic in-memory cache with per-entry expiry and bounded size
//!
//! # Features
//!
//! - **Thread-safe**: clones share one `Arc<Mutex<..>>` storage
//! - **Per-entry TTL**: every entry carries its own deadline; a default TTL
//!   applies when none is given
//! - **Bounded**: inserting into a full cache evicts exactly one entry,
//!   chosen by [`EvictionPolicy`] (insertion order by default)
//! - **Lazy and bulk expiry**: expired entries are dropped on lookup and by
//!   [`Cache::cleanup_expired`]
//! - **Predicate invalidation**: [`Cache::remove_where`]
//! - **Metrics**: hit/miss/eviction/expiration/invalidation counters
//! - **Testable**: driven by a [`Clock`](crate::time::Clock), so tests can
//!   use `MockClock`
//!
//! # Example
//! ```
//! use std::time::Duration;
//!
//! use footsteps_common::cache::{Cache, CacheConfig, EvictionPolicy};
//!
//! let config = CacheConfig::builder()
//!     .max_size(500)
//!     .default_ttl(Duration::from_secs(300))
//!     .eviction_policy(EvictionPolicy::FIFO)
//!     .build();
//!
//! let cache: Cache<String, i32> = Cache::new(config);
//! cache.insert_with_ttl("short".to_string(), 1, Some(Duration::from_secs(5)));
//! cache.insert("default".to_string(), 2);
//!
//! let stats = cache.stats();
//! assert_eq!(stats.inserts, 2);
//! ```

mod config;
mod core;
mod stats;

pub use core::{Cache, Entry};

pub use config::{CacheConfig, CacheConfigBuilder, EvictionPolicy};
pub use stats::CacheStats;
