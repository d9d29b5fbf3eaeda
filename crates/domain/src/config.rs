//! Request layer configuration
//!
//! All durations are expressed in milliseconds on the wire. The camelCase
//! aliases accept configuration files written for the web client.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};

use crate::constants::{
    DEFAULT_AUTH_EXPIRED_STATUS, DEFAULT_BASE_RETRY_DELAY_MS, DEFAULT_MAX_CACHE_SIZE,
    DEFAULT_MAX_RETRY_ATTEMPTS, DEFAULT_MAX_SNAPSHOT_BYTES, DEFAULT_SWEEP_INTERVAL_MS,
    DEFAULT_TTL_MS, LOCALE_HEADER,
};
use crate::errors::{RequestError, Result};

/// Which entry leaves the cache when an insert overflows it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Oldest `cachedAt` first
    #[default]
    Fifo,
    /// Least recently read first
    Lru,
}

/// What happens to an in-flight call once every waiter has withdrawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroWaiterPolicy {
    /// Let the call finish; its result may still be cached
    #[default]
    KeepRunning,
    /// Abort the call as soon as the last waiter is gone
    Abort,
}

/// Configuration for a `RequestLayer`
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestLayerConfig {
    #[serde(alias = "enableCache")]
    pub enable_cache: bool,

    /// TTL applied when no endpoint class matches
    #[serde(alias = "defaultTTL")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub default_ttl: Duration,

    /// URL prefix to TTL; the longest matching prefix wins
    #[serde(alias = "perEndpointTTL")]
    #[serde_as(as = "BTreeMap<_, DurationMilliSeconds<u64>>")]
    pub per_endpoint_ttl: BTreeMap<String, Duration>,

    #[serde(alias = "maxCacheSize")]
    pub max_cache_size: usize,

    pub eviction_policy: EvictionPolicy,

    /// Total attempts, first one included
    #[serde(alias = "maxRetryAttempts")]
    pub max_retry_attempts: u32,

    #[serde(alias = "baseRetryDelay")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub base_retry_delay: Duration,

    /// Optional budget shared by every attempt of one logical request
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    pub retry_budget: Option<Duration>,

    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub sweep_interval: Duration,

    pub auth_expired_status: u16,

    /// Response-affecting headers that take part in request keys
    pub key_headers: Vec<String>,

    /// Honour the per-request idempotent opt-in for mutations
    pub dedupe_idempotent: bool,

    pub zero_waiter_policy: ZeroWaiterPolicy,

    /// Bodies larger than this are never snapshotted
    pub max_snapshot_bytes: usize,
}

impl Default for RequestLayerConfig {
    fn default() -> Self {
        Self {
            enable_cache: true,
            default_ttl: Duration::from_millis(DEFAULT_TTL_MS),
            per_endpoint_ttl: BTreeMap::new(),
            max_cache_size: DEFAULT_MAX_CACHE_SIZE,
            eviction_policy: EvictionPolicy::default(),
            max_retry_attempts: DEFAULT_MAX_RETRY_ATTEMPTS,
            base_retry_delay: Duration::from_millis(DEFAULT_BASE_RETRY_DELAY_MS),
            retry_budget: None,
            sweep_interval: Duration::from_millis(DEFAULT_SWEEP_INTERVAL_MS),
            auth_expired_status: DEFAULT_AUTH_EXPIRED_STATUS,
            key_headers: vec![LOCALE_HEADER.to_string()],
            dedupe_idempotent: true,
            zero_waiter_policy: ZeroWaiterPolicy::default(),
            max_snapshot_bytes: DEFAULT_MAX_SNAPSHOT_BYTES,
        }
    }
}

impl RequestLayerConfig {
    /// TTL for a URL: the longest configured endpoint prefix, else the default
    pub fn ttl_for(&self, url: &str) -> Duration {
        self.per_endpoint_ttl
            .iter()
            .filter(|(prefix, _)| url.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map_or(self.default_ttl, |(_, ttl)| *ttl)
    }

    /// Check for values the layer cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_retry_attempts == 0 {
            return Err(RequestError::config("max_retry_attempts must be at least 1"));
        }
        if self.max_cache_size == 0 {
            return Err(RequestError::config("max_cache_size must be at least 1"));
        }
        if self.default_ttl.is_zero() {
            return Err(RequestError::config("default_ttl must be greater than zero"));
        }
        if let Some((prefix, _)) = self.per_endpoint_ttl.iter().find(|(_, ttl)| ttl.is_zero()) {
            return Err(RequestError::config(format!("TTL for '{prefix}' must be greater than zero")));
        }
        if self.sweep_interval.is_zero() {
            return Err(RequestError::config("sweep_interval must be greater than zero"));
        }
        if self.retry_budget.is_some_and(|budget| budget.is_zero()) {
            return Err(RequestError::config("retry_budget must be greater than zero when set"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RequestLayerConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.enable_cache);
        assert_eq!(config.eviction_policy, EvictionPolicy::Fifo);
        assert_eq!(config.zero_waiter_policy, ZeroWaiterPolicy::KeepRunning);
    }

    #[test]
    fn longest_endpoint_prefix_wins() {
        let mut config = RequestLayerConfig::default();
        config.per_endpoint_ttl.insert("/characters".into(), Duration::from_secs(600));
        config.per_endpoint_ttl.insert("/characters/featured".into(), Duration::from_secs(30));

        assert_eq!(config.ttl_for("/characters/42"), Duration::from_secs(600));
        assert_eq!(config.ttl_for("/characters/featured?page=1"), Duration::from_secs(30));
        assert_eq!(config.ttl_for("/levels"), config.default_ttl);
    }

    #[test]
    fn rejects_zero_attempts() {
        let config = RequestLayerConfig { max_retry_attempts: 0, ..Default::default() };
        assert!(matches!(config.validate(), Err(RequestError::Config { .. })));
    }

    #[test]
    fn rejects_zero_endpoint_ttl() {
        let mut config = RequestLayerConfig::default();
        config.per_endpoint_ttl.insert("/progress".into(), Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn accepts_camel_case_json() {
        let config: RequestLayerConfig = serde_json::from_str(
            r#"{
                "enableCache": false,
                "defaultTTL": 600000,
                "perEndpointTTL": {"/characters": 120000},
                "maxCacheSize": 50,
                "maxRetryAttempts": 5,
                "baseRetryDelay": 250
            }"#,
        )
        .unwrap();

        assert!(!config.enable_cache);
        assert_eq!(config.default_ttl, Duration::from_millis(600_000));
        assert_eq!(config.ttl_for("/characters/1"), Duration::from_millis(120_000));
        assert_eq!(config.max_cache_size, 50);
        assert_eq!(config.max_retry_attempts, 5);
        assert_eq!(config.base_retry_delay, Duration::from_millis(250));
        assert_eq!(config.sweep_interval, Duration::from_millis(DEFAULT_SWEEP_INTERVAL_MS));
    }

    #[test]
    fn parses_toml_with_policies() {
        let config: RequestLayerConfig = toml::from_str(
            r#"
                eviction_policy = "lru"
                zero_waiter_policy = "abort"
                retry_budget = 10000
                key_headers = ["accept-language", "x-client-version"]
            "#,
        )
        .unwrap();

        assert_eq!(config.eviction_policy, EvictionPolicy::Lru);
        assert_eq!(config.zero_waiter_policy, ZeroWaiterPolicy::Abort);
        assert_eq!(config.retry_budget, Some(Duration::from_secs(10)));
        assert_eq!(config.key_headers.len(), 2);
    }
}
