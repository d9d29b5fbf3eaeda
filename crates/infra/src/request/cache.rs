//! Response cache for read-class requests
//!
//! Wraps the generic [`Cache`] with what the request layer needs on top:
//! snapshot admission checks, URL-pattern and tag invalidation, and a
//! background sweep. Expired entries are dropped lazily on `get` as well as
//! by [`ResponseCache::sweep`].

use std::collections::BTreeSet;
use std::time::Duration;

use footsteps_common::cache::{Cache, CacheConfig, CacheStats, EvictionPolicy as CacheEviction};
use footsteps_common::time::{Clock, SystemClock};
use footsteps_domain::{ApiResponse, EvictionPolicy, RequestDescriptor, RequestError, RequestLayerConfig};
use regex::Regex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::keyer::CacheKey;

/// Cached response plus what invalidation needs to know about its request
#[derive(Debug, Clone)]
pub struct CachedResponse {
    url: String,
    tags: BTreeSet<String>,
    response: ApiResponse,
}

impl CachedResponse {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub const fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub const fn response(&self) -> &ApiResponse {
        &self.response
    }
}

/// Selects cached entries by the URL they were fetched from
///
/// A plain string converts to [`UrlPattern::Path`].
#[derive(Debug, Clone)]
pub enum UrlPattern {
    /// The URL itself and anything below it at a segment boundary
    Path(String),
    /// Any URL starting with the string
    Prefix(String),
    /// Any URL containing the string
    Contains(String),
    Regex(Regex),
}

impl UrlPattern {
    /// Compile a regular expression pattern
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Self::Regex)
    }

    pub fn matches(&self, url: &str) -> bool {
        match self {
            Self::Path(path) => match url.strip_prefix(path.as_str()) {
                Some(rest) => {
                    rest.is_empty()
                        || path.ends_with('/')
                        || rest.starts_with(['/', '?', '#'])
                }
                None => false,
            },
            Self::Prefix(prefix) => url.starts_with(prefix.as_str()),
            Self::Contains(needle) => url.contains(needle.as_str()),
            Self::Regex(regex) => regex.is_match(url),
        }
    }
}

impl From<&str> for UrlPattern {
    fn from(value: &str) -> Self {
        Self::Path(value.to_string())
    }
}

impl From<String> for UrlPattern {
    fn from(value: String) -> Self {
        Self::Path(value)
    }
}

impl From<Regex> for UrlPattern {
    fn from(value: Regex) -> Self {
        Self::Regex(value)
    }
}

/// Bounded, expiring store of successful read responses
pub struct ResponseCache<C = SystemClock>
where
    C: Clock + Clone,
{
    entries: Cache<CacheKey, CachedResponse, C>,
    max_snapshot_bytes: usize,
}

impl ResponseCache<SystemClock> {
    pub fn new(config: &RequestLayerConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C> ResponseCache<C>
where
    C: Clock + Clone,
{
    pub fn with_clock(config: &RequestLayerConfig, clock: C) -> Self {
        let eviction = match config.eviction_policy {
            EvictionPolicy::Fifo => CacheEviction::FIFO,
            EvictionPolicy::Lru => CacheEviction::LRU,
        };
        let cache_config = CacheConfig::builder()
            .max_size(config.max_cache_size)
            .default_ttl(config.default_ttl)
            .eviction_policy(eviction)
            .build();

        Self {
            entries: Cache::with_clock(cache_config, clock),
            max_snapshot_bytes: config.max_snapshot_bytes,
        }
    }

    /// Cached response for `key`, if present and not expired
    pub fn get(&self, key: &CacheKey) -> Option<ApiResponse> {
        let hit = self.entries.get(key).map(|cached| cached.response);
        debug!(cache_key = %key, hit = hit.is_some(), "cache lookup");
        hit
    }

    /// Store `response` for `request` under `key` for `ttl`
    ///
    /// Returns the key evicted to make room, if any. A response that cannot
    /// be snapshotted yields [`RequestError::Cache`] and is not stored.
    pub fn put(
        &self,
        key: CacheKey,
        request: &RequestDescriptor,
        response: &ApiResponse,
        ttl: Duration,
    ) -> Result<Option<CacheKey>, RequestError> {
        if !request.is_cacheable() {
            return Err(RequestError::cache(format!(
                "{} {} is not a cacheable request",
                request.method(),
                request.url()
            )));
        }
        if !response.is_success() {
            return Err(RequestError::cache(format!(
                "status {} responses are not cached",
                response.status()
            )));
        }
        if response.forbids_storage() {
            return Err(RequestError::cache("response is marked no-store"));
        }
        if response.body().len() > self.max_snapshot_bytes {
            return Err(RequestError::cache(format!(
                "response body of {} bytes exceeds the {} byte snapshot limit",
                response.body().len(),
                self.max_snapshot_bytes
            )));
        }

        let cached = CachedResponse {
            url: request.url().to_string(),
            tags: request.tags().clone(),
            response: response.clone(),
        };
        let evicted = self.entries.insert_with_ttl(key, cached, Some(ttl));
        match &evicted {
            Some(victim) => debug!(cache_key = %key, evicted = %victim, ?ttl, "cached response, evicted oldest"),
            None => debug!(cache_key = %key, ?ttl, "cached response"),
        }
        Ok(evicted)
    }

    /// Remove every entry whose request URL matches `pattern`
    pub fn invalidate(&self, pattern: impl Into<UrlPattern>) -> usize {
        let pattern = pattern.into();
        let removed = self.entries.remove_where(|_, cached| pattern.matches(&cached.url));
        debug!(?pattern, removed, "invalidated cache entries by url");
        removed
    }

    /// Remove every entry cached from a request carrying any of `tags`
    pub fn invalidate_tags<I, S>(&self, tags: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tags: Vec<S> = tags.into_iter().collect();
        let removed = self.entries.remove_where(|_, cached| {
            tags.iter().any(|tag| cached.tags.contains(tag.as_ref()))
        });
        debug!(removed, "invalidated cache entries by tag");
        removed
    }

    /// Whether a live entry exists for `key`, without touching hit counters
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn remove(&self, key: &CacheKey) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Drop expired entries regardless of access
    pub fn sweep(&self) -> usize {
        let removed = self.entries.cleanup_expired();
        if removed > 0 {
            debug!(removed, remaining = self.entries.len(), "swept expired cache entries");
        }
        removed
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.entries.stats()
    }
}

impl<C> ResponseCache<C>
where
    C: Clock + Clone + Send + Sync,
{
    /// Sweep every `interval` until `cancel` fires
    ///
    /// The first sweep happens one full interval after spawning.
    pub fn spawn_sweeper(&self, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            info!(?interval, "cache sweeper started");

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("cache sweeper cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        cache.sweep();
                    }
                }
            }
        })
    }
}

impl<C> Clone for ResponseCache<C>
where
    C: Clock + Clone,
{
    fn clone(&self) -> Self {
        Self { entries: self.entries.clone(), max_snapshot_bytes: self.max_snapshot_bytes }
    }
}

impl<C> std::fmt::Debug for ResponseCache<C>
where
    C: Clock + Clone,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("len", &self.entries.len())
            .field("max_snapshot_bytes", &self.max_snapshot_bytes)
            .finish()
    }
}

/// Log a rejected snapshot and carry on without caching
pub(crate) fn log_cache_bypass(key: &CacheKey, error: &RequestError) {
    warn!(cache_key = %key, error = %error, "response not cached, bypassing cache");
}
