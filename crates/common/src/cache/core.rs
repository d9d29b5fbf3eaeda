//! Core cache implementation
//!
//! A thread-safe map with per-entry expiry and a size bound. Each entry
//! carries its own deadline, so entries inserted with different TTLs can
//! live side by side. Expired entries are dropped lazily on lookup and in
//! bulk by [`Cache::cleanup_expired`].

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::config::{CacheConfig, EvictionPolicy};
use super::stats::{CacheStats, MetricsCollector};
use crate::time::{Clock, SystemClock};

/// A value read from the cache together with its timestamps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry<V> {
    pub value: V,
    pub inserted_at: Instant,
    /// `None` when the entry never expires
    pub expires_at: Option<Instant>,
}

impl<V> Entry<V> {
    /// Valid iff `now < expires_at`
    pub fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

#[derive(Debug)]
struct Slot<V> {
    entry: Entry<V>,
    /// Position in `order`; insertion sequence for FIFO, last touch for LRU
    seq: u64,
}

#[derive(Debug)]
struct CacheStorage<K, V> {
    entries: HashMap<K, Slot<V>>,
    /// Sequence number to key, oldest first
    order: BTreeMap<u64, K>,
    next_seq: u64,
}

impl<K, V> CacheStorage<K, V>
where
    K: Eq + Hash + Clone,
{
    fn new() -> Self {
        Self { entries: HashMap::new(), order: BTreeMap::new(), next_seq: 0 }
    }

    fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn remove(&mut self, key: &K) -> Option<Slot<V>> {
        let slot = self.entries.remove(key)?;
        self.order.remove(&slot.seq);
        Some(slot)
    }

    fn touch(&mut self, key: &K) {
        let seq = self.bump_seq();
        if let Some(slot) = self.entries.get_mut(key) {
            self.order.remove(&slot.seq);
            slot.seq = seq;
            self.order.insert(seq, key.clone());
        }
    }

    fn oldest(&self) -> Option<K> {
        self.order.values().next().cloned()
    }
}

/// Generic thread-safe cache with per-entry expiry and bounded size
///
/// # Type Parameters
/// - `K`: Key type (must be `Eq + Hash + Clone`)
/// - `V`: Value type (must be `Clone`)
/// - `C`: Clock used for expiry (defaults to `SystemClock`)
///
/// # Example
/// ```
/// use std::time::Duration;
///
/// use footsteps_common::cache::{Cache, CacheConfig};
///
/// let cache: Cache<String, i32> = Cache::new(CacheConfig::ttl_fifo(Duration::from_secs(60), 100));
/// cache.insert("key".to_string(), 42);
/// assert_eq!(cache.get(&"key".to_string()), Some(42));
/// ```
pub struct Cache<K, V, C = SystemClock>
where
    K: Eq + Hash + Clone,
    V: Clone,
    C: Clock,
{
    storage: Arc<Mutex<CacheStorage<K, V>>>,
    config: CacheConfig,
    metrics: MetricsCollector,
    clock: C,
}

impl<K, V> Cache<K, V, SystemClock>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<K, V, C> Cache<K, V, C>
where
    K: Eq + Hash + Clone,
    V: Clone,
    C: Clock + Clone,
{
    /// Create a cache driven by a custom clock (useful for testing)
    pub fn with_clock(config: CacheConfig, clock: C) -> Self {
        Self {
            storage: Arc::new(Mutex::new(CacheStorage::new())),
            config,
            metrics: MetricsCollector::default(),
            clock,
        }
    }

    pub const fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Insert with the configured default TTL
    ///
    /// Returns the key evicted to make room, if any.
    pub fn insert(&self, key: K, value: V) -> Option<K> {
        self.insert_with_ttl(key, value, self.config.default_ttl)
    }

    /// Insert with an explicit TTL (`None` = never expires)
    ///
    /// When the key is new and the cache is full, exactly one entry is
    /// evicted first according to the eviction policy. Replacing an existing
    /// key never evicts and resets its insertion time.
    pub fn insert_with_ttl(&self, key: K, value: V, ttl: Option<Duration>) -> Option<K> {
        let now = self.clock.now();
        let mut storage = self.storage.lock();

        let mut evicted = None;
        if let Some(max_size) = self.config.max_size {
            if self.config.eviction_policy != EvictionPolicy::None
                && storage.entries.len() >= max_size
                && !storage.entries.contains_key(&key)
            {
                evicted = storage.oldest();
                if let Some(victim) = &evicted {
                    storage.remove(victim);
                    if self.config.track_metrics {
                        self.metrics.record_eviction();
                    }
                }
            }
        }

        storage.remove(&key);
        let seq = storage.bump_seq();
        let entry = Entry { value, inserted_at: now, expires_at: ttl.map(|ttl| now + ttl) };
        storage.order.insert(seq, key.clone());
        storage.entries.insert(key, Slot { entry, seq });

        if self.config.track_metrics {
            self.metrics.record_insert();
        }
        evicted
    }

    /// Get a value, dropping it if it has expired
    pub fn get(&self, key: &K) -> Option<V> {
        self.get_entry(key).map(|entry| entry.value)
    }

    /// Get a value with its timestamps, dropping it if it has expired
    pub fn get_entry(&self, key: &K) -> Option<Entry<V>> {
        let now = self.clock.now();
        let mut storage = self.storage.lock();

        let expired = match storage.entries.get(key) {
            None => {
                self.record_miss();
                return None;
            }
            Some(slot) => slot.entry.is_expired_at(now),
        };

        if expired {
            storage.remove(key);
            if self.config.track_metrics {
                self.metrics.record_miss();
                self.metrics.record_expirations(1);
            }
            return None;
        }

        if self.config.eviction_policy == EvictionPolicy::LRU {
            storage.touch(key);
        }
        if self.config.track_metrics {
            self.metrics.record_hit();
        }
        storage.entries.get(key).map(|slot| slot.entry.clone())
    }

    /// Whether a live entry exists for `key`
    ///
    /// Unlike [`Cache::get`] this leaves hit/miss counters and LRU order alone.
    pub fn contains_key(&self, key: &K) -> bool {
        let now = self.clock.now();
        self.storage.lock().entries.get(key).is_some_and(|slot| !slot.entry.is_expired_at(now))
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.storage.lock().remove(key).map(|slot| slot.entry.value)
    }

    /// Remove every entry matching `predicate`
    ///
    /// Returns the number of entries removed.
    pub fn remove_where<F>(&self, mut predicate: F) -> usize
    where
        F: FnMut(&K, &V) -> bool,
    {
        let mut storage = self.storage.lock();
        let doomed: Vec<K> = storage
            .entries
            .iter()
            .filter(|(key, slot)| predicate(key, &slot.entry.value))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &doomed {
            storage.remove(key);
        }
        if self.config.track_metrics {
            self.metrics.record_invalidations(doomed.len());
        }
        doomed.len()
    }

    /// Remove all entries and reset the counters
    pub fn clear(&self) {
        let mut storage = self.storage.lock();
        storage.entries.clear();
        storage.order.clear();
        self.metrics.reset();
    }

    pub fn len(&self) -> usize {
        self.storage.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove expired entries regardless of access
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let mut storage = self.storage.lock();

        let expired: Vec<K> = storage
            .entries
            .iter()
            .filter(|(_, slot)| slot.entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            storage.remove(key);
        }
        if self.config.track_metrics {
            self.metrics.record_expirations(expired.len());
        }
        expired.len()
    }

    pub fn stats(&self) -> CacheStats {
        self.metrics.snapshot(self.len(), self.config.max_size)
    }

    fn record_miss(&self) {
        if self.config.track_metrics {
            self.metrics.record_miss();
        }
    }
}

impl<K, V, C> Clone for Cache<K, V, C>
where
    K: Eq + Hash + Clone,
    V: Clone,
    C: Clock + Clone,
{
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            config: self.config.clone(),
            metrics: self.metrics.clone(),
            clock: self.clock.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for cache::core.
    use std::thread;

    use super::*;
    use crate::time::MockClock;

    fn fifo_cache(max_size: usize) -> (Cache<String, i32, MockClock>, MockClock) {
        let clock = MockClock::new();
        let config = CacheConfig::ttl_fifo(Duration::from_secs(60), max_size);
        (Cache::with_clock(config, clock.clone()), clock)
    }

    /// Validates `Cache::insert` behavior for the insert and get scenario.
    ///
    /// Assertions:
    /// - Confirms `cache.get(&"key1".to_string())` equals `Some(42)`.
    /// - Confirms `cache.get(&"key3".to_string())` equals `None`.
    /// - Confirms `cache.len()` equals `2`.
    #[test]
    fn test_cache_insert_and_get() {
        let (cache, _) = fifo_cache(10);

        cache.insert("key1".to_string(), 42);
        cache.insert("key2".to_string(), 84);

        assert_eq!(cache.get(&"key1".to_string()), Some(42));
        assert_eq!(cache.get(&"key2".to_string()), Some(84));
        assert_eq!(cache.get(&"key3".to_string()), None);
        assert_eq!(cache.len(), 2);
    }

    /// Validates `Cache::insert_with_ttl` behavior for the expiry boundary
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms the entry is served one millisecond before its deadline.
    /// - Confirms the entry is gone one millisecond after its deadline.
    #[test]
    fn test_cache_ttl_boundary() {
        let (cache, clock) = fifo_cache(10);
        cache.insert_with_ttl("k".to_string(), 1, Some(Duration::from_millis(600_000)));

        clock.advance_millis(599_999);
        assert_eq!(cache.get(&"k".to_string()), Some(1));

        clock.advance_millis(2);
        assert_eq!(cache.get(&"k".to_string()), None);
        assert!(cache.is_empty());
    }

    /// Validates `Cache::get_entry` behavior for the exact deadline scenario.
    ///
    /// Assertions:
    /// - Confirms an entry read at exactly `expires_at` is a miss.
    #[test]
    fn test_cache_entry_invalid_at_deadline() {
        let (cache, clock) = fifo_cache(10);
        cache.insert_with_ttl("k".to_string(), 1, Some(Duration::from_millis(10)));
        let entry = cache.get_entry(&"k".to_string()).unwrap();
        assert!(entry.expires_at.unwrap() > entry.inserted_at);

        clock.advance_millis(10);
        assert_eq!(cache.get_entry(&"k".to_string()), None);
    }

    #[test]
    fn test_cache_entries_keep_their_own_ttl() {
        let (cache, clock) = fifo_cache(10);
        cache.insert_with_ttl("short".to_string(), 1, Some(Duration::from_secs(1)));
        cache.insert_with_ttl("long".to_string(), 2, Some(Duration::from_secs(100)));
        cache.insert_with_ttl("forever".to_string(), 3, None);

        clock.advance(Duration::from_secs(2));

        assert_eq!(cache.get(&"short".to_string()), None);
        assert_eq!(cache.get(&"long".to_string()), Some(2));

        clock.advance(Duration::from_secs(1_000));
        assert_eq!(cache.get(&"forever".to_string()), Some(3));
    }

    /// Validates `Cache::insert` behavior for the fifo eviction scenario.
    ///
    /// Assertions:
    /// - Confirms the evicted key is the first inserted.
    /// - Confirms reads do not protect the oldest entry.
    /// - Confirms `cache.len()` equals `2`.
    #[test]
    fn test_cache_fifo_eviction() {
        let (cache, _) = fifo_cache(2);

        cache.insert("a".to_string(), 1);
        cache.insert("b".to_string(), 2);
        let _ = cache.get(&"a".to_string());

        let evicted = cache.insert("c".to_string(), 3);

        assert_eq!(evicted, Some("a".to_string()));
        assert_eq!(cache.get(&"a".to_string()), None);
        assert_eq!(cache.get(&"b".to_string()), Some(2));
        assert_eq!(cache.get(&"c".to_string()), Some(3));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().evictions, 1);
    }

    /// Validates `Cache::insert` behavior for the lru eviction scenario.
    ///
    /// Assertions:
    /// - Confirms the read entry survives and the untouched one is evicted.
    #[test]
    fn test_cache_lru_eviction() {
        let clock = MockClock::new();
        let cache: Cache<String, i32, MockClock> =
            Cache::with_clock(CacheConfig::ttl_lru(Duration::from_secs(60), 2), clock);

        cache.insert("a".to_string(), 1);
        cache.insert("b".to_string(), 2);
        let _ = cache.get(&"a".to_string());

        assert_eq!(cache.insert("c".to_string(), 3), Some("b".to_string()));
        assert_eq!(cache.get(&"a".to_string()), Some(1));
        assert_eq!(cache.get(&"b".to_string()), None);
    }

    #[test]
    fn test_cache_replacing_key_does_not_evict() {
        let (cache, _) = fifo_cache(2);

        cache.insert("a".to_string(), 1);
        cache.insert("b".to_string(), 2);

        assert_eq!(cache.insert("a".to_string(), 10), None);
        assert_eq!(cache.len(), 2);
        // "a" was re-inserted, so "b" is now the oldest
        assert_eq!(cache.insert("c".to_string(), 3), Some("b".to_string()));
        assert_eq!(cache.get(&"a".to_string()), Some(10));
    }

    #[test]
    fn test_cache_no_eviction_policy_ignores_bound() {
        let config = CacheConfig::builder().max_size(2).eviction_policy(EvictionPolicy::None).build();
        let cache: Cache<String, i32> = Cache::new(config);

        cache.insert("a".to_string(), 1);
        cache.insert("b".to_string(), 2);
        assert_eq!(cache.insert("c".to_string(), 3), None);
        assert_eq!(cache.len(), 3);
    }

    /// Validates `Cache::cleanup_expired` behavior for the sweep scenario.
    ///
    /// Assertions:
    /// - Confirms `removed` equals `2`.
    /// - Confirms the unexpired entry remains.
    #[test]
    fn test_cache_cleanup_expired() {
        let (cache, clock) = fifo_cache(10);

        cache.insert_with_ttl("a".to_string(), 1, Some(Duration::from_secs(5)));
        cache.insert_with_ttl("b".to_string(), 2, Some(Duration::from_secs(5)));
        cache.insert_with_ttl("c".to_string(), 3, Some(Duration::from_secs(50)));

        clock.advance(Duration::from_secs(6));

        assert_eq!(cache.cleanup_expired(), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().expirations, 2);
    }

    #[test]
    fn test_cache_remove_where() {
        let (cache, _) = fifo_cache(10);
        cache.insert("/characters/1".to_string(), 1);
        cache.insert("/characters/2".to_string(), 2);
        cache.insert("/levels".to_string(), 3);

        let removed = cache.remove_where(|key, _| key.starts_with("/characters"));

        assert_eq!(removed, 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().invalidations, 2);
    }

    /// Validates `Cache::stats` behavior for the stats tracking scenario.
    ///
    /// Assertions:
    /// - Confirms `stats.hits` equals `2`.
    /// - Confirms `stats.misses` equals `1`.
    /// - Confirms `stats.inserts` equals `2`.
    #[test]
    fn test_cache_stats_tracking() {
        let (cache, _) = fifo_cache(10);

        cache.insert("key1".to_string(), 1);
        cache.insert("key2".to_string(), 2);

        let _ = cache.get(&"key1".to_string());
        let _ = cache.get(&"key1".to_string());
        let _ = cache.get(&"key3".to_string());

        let stats = cache.stats();
        assert_eq!(stats.size, 2);
        assert_eq!(stats.max_size, Some(10));
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.inserts, 2);
    }

    #[test]
    fn test_cache_contains_key_leaves_counters_alone() {
        let (cache, clock) = fifo_cache(10);
        cache.insert("a".to_string(), 1);

        assert!(cache.contains_key(&"a".to_string()));
        assert!(!cache.contains_key(&"b".to_string()));

        clock.advance_millis(60_000);
        assert!(!cache.contains_key(&"a".to_string()));

        let stats = cache.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
    }

    #[test]
    fn test_cache_clear_resets() {
        let (cache, _) = fifo_cache(10);
        cache.insert("a".to_string(), 1);
        let _ = cache.get(&"a".to_string());

        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(cache.stats().hits, 0);
    }

    #[test]
    fn test_cache_thread_safety() {
        let cache = Arc::new(Cache::new(CacheConfig::fifo(100)));
        let mut handles = vec![];

        for i in 0..10 {
            let cache = Arc::clone(&cache);
            handles.push(thread::spawn(move || {
                for j in 0..10 {
                    cache.insert(format!("key-{i}-{j}"), i * 10 + j);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.len(), 100);
    }

    #[test]
    fn test_cache_clone_shares_storage() {
        let (first, _) = fifo_cache(10);
        first.insert("key".to_string(), 42);

        let second = first.clone();
        assert_eq!(second.get(&"key".to_string()), Some(42));
        assert_eq!(first.stats().hits, 1);
    }
}
