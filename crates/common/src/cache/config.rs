//! Cache configuration types and builder
//!
//! Configuration covers the size bound, the default time-to-live applied to
//! entries inserted without an explicit TTL, and which entry is evicted
//! when an insert overflows the bound.

use std::time::Duration;

/// Eviction policy applied when an insert would exceed `max_size`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicy {
    /// First In First Out - evicts the entry with the oldest insertion time
    #[default]
    FIFO,
    /// Least Recently Used - evicts the entry read or written longest ago
    LRU,
    /// No automatic eviction; the bound is not enforced
    None,
}

/// Configuration for cache behavior
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries (None = unlimited)
    pub max_size: Option<usize>,

    /// TTL for entries inserted without one (None = no expiration)
    pub default_ttl: Option<Duration>,

    /// Eviction policy when max_size is reached
    pub eviction_policy: EvictionPolicy,

    /// Whether to collect hit/miss/eviction counters
    pub track_metrics: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: None,
            default_ttl: None,
            eviction_policy: EvictionPolicy::FIFO,
            track_metrics: true,
        }
    }
}

impl CacheConfig {
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Unbounded cache whose entries expire after `ttl`
    pub fn ttl(ttl: Duration) -> Self {
        Self { default_ttl: Some(ttl), eviction_policy: EvictionPolicy::None, ..Self::default() }
    }

    /// Bounded insertion-order cache without expiry
    pub fn fifo(max_size: usize) -> Self {
        Self { max_size: Some(max_size), ..Self::default() }
    }

    /// Bounded insertion-order cache with expiry
    pub fn ttl_fifo(ttl: Duration, max_size: usize) -> Self {
        Self { max_size: Some(max_size), default_ttl: Some(ttl), ..Self::default() }
    }

    /// Bounded recency-ordered cache with expiry
    pub fn ttl_lru(ttl: Duration, max_size: usize) -> Self {
        Self {
            max_size: Some(max_size),
            default_ttl: Some(ttl),
            eviction_policy: EvictionPolicy::LRU,
            ..Self::default()
        }
    }
}

/// Builder for [`CacheConfig`]
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    config: CacheConfig,
}

impl CacheConfigBuilder {
    pub fn max_size(mut self, size: usize) -> Self {
        self.config.max_size = Some(size);
        self
    }

    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.config.default_ttl = Some(ttl);
        self
    }

    pub fn eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.config.eviction_policy = policy;
        self
    }

    pub fn track_metrics(mut self, enabled: bool) -> Self {
        self.config.track_metrics = enabled;
        self
    }

    pub fn build(self) -> CacheConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for cache::config.
    use super::*;

    /// Validates `CacheConfig::default` behavior for the cache config default
    /// scenario.
    ///
    /// Assertions:
    /// - Ensures `config.max_size.is_none()` evaluates to true.
    /// - Confirms `config.eviction_policy` equals `EvictionPolicy::FIFO`.
    /// - Ensures `config.track_metrics` evaluates to true.
    #[test]
    fn test_cache_config_default() {
        let config = CacheConfig::default();
        assert!(config.max_size.is_none());
        assert!(config.default_ttl.is_none());
        assert_eq!(config.eviction_policy, EvictionPolicy::FIFO);
        assert!(config.track_metrics);
    }

    /// Validates `CacheConfig::ttl_fifo` behavior for the bounded ttl preset
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms `config.max_size` equals `Some(100)`.
    /// - Confirms `config.default_ttl` equals `Some(ttl)`.
    #[test]
    fn test_cache_config_ttl_fifo_preset() {
        let ttl = Duration::from_secs(600);
        let config = CacheConfig::ttl_fifo(ttl, 100);

        assert_eq!(config.max_size, Some(100));
        assert_eq!(config.default_ttl, Some(ttl));
        assert_eq!(config.eviction_policy, EvictionPolicy::FIFO);
    }

    /// Validates `CacheConfig::ttl` behavior for the unbounded preset scenario.
    ///
    /// Assertions:
    /// - Confirms `config.eviction_policy` equals `EvictionPolicy::None`.
    #[test]
    fn test_cache_config_ttl_preset() {
        let config = CacheConfig::ttl(Duration::from_secs(5));
        assert!(config.max_size.is_none());
        assert_eq!(config.eviction_policy, EvictionPolicy::None);
    }

    #[test]
    fn test_cache_config_builder() {
        let config = CacheConfig::builder()
            .max_size(10)
            .default_ttl(Duration::from_millis(250))
            .eviction_policy(EvictionPolicy::LRU)
            .track_metrics(false)
            .build();

        assert_eq!(config.max_size, Some(10));
        assert_eq!(config.default_ttl, Some(Duration::from_millis(250)));
        assert_eq!(config.eviction_policy, EvictionPolicy::LRU);
        assert!(!config.track_metrics);
    }
}
