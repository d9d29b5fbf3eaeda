//! In-flight request registry
//!
//! Thin domain layer over [`SingleFlight`]: decides which requests may be
//! shared, maps the configured zero-waiter policy, and remembers the URL and
//! tags of every running call so cache invalidation can detach it.
//!
//! A detached call keeps running and its current waiters still get the
//! response. Its [`FlightTicket`] turns stale, so the response is not written
//! to the cache, and the next identical request starts a new call.

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use footsteps_common::sync::{Flight, SingleFlight, ZeroWaiterPolicy as FlightPolicy};
use footsteps_domain::{ApiResponse, RequestDescriptor, RequestError, RequestLayerConfig, ZeroWaiterPolicy};
use parking_lot::Mutex;
use tracing::debug;

use super::keyer::CacheKey;

/// Value every waiter of a shared request receives
pub type SharedOutcome = Result<ApiResponse, RequestError>;

/// Handed to a shared call; goes stale once the call is detached
#[derive(Debug, Clone, Default)]
pub struct FlightTicket {
    detached: Arc<Mutex<bool>>,
}

impl FlightTicket {
    /// Run `f` unless the call has been detached
    ///
    /// Detaching waits for a running `f` to finish, so anything `f` writes is
    /// visible to whoever detached the call.
    pub fn if_current<T>(&self, f: impl FnOnce() -> T) -> Option<T> {
        let detached = self.detached.lock();
        if *detached {
            return None;
        }
        Some(f())
    }

    pub fn is_detached(&self) -> bool {
        *self.detached.lock()
    }

    fn detach(&self) {
        *self.detached.lock() = true;
    }
}

#[derive(Debug)]
struct TrackedCall {
    seq: u64,
    url: String,
    tags: BTreeSet<String>,
    ticket: FlightTicket,
}

type Tracked = Arc<Mutex<HashMap<CacheKey, TrackedCall>>>;

/// Drops the tracking entry when the call settles or is aborted
struct Untrack {
    tracked: Tracked,
    key: CacheKey,
    seq: u64,
}

impl Drop for Untrack {
    fn drop(&mut self) {
        let mut tracked = self.tracked.lock();
        if tracked.get(&self.key).is_some_and(|call| call.seq == self.seq) {
            tracked.remove(&self.key);
        }
    }
}

/// Collapses concurrent identical requests into one call
#[derive(Debug)]
pub struct PendingRegistry {
    flights: SingleFlight<CacheKey, SharedOutcome>,
    tracked: Tracked,
    next_seq: AtomicU64,
    dedupe_idempotent: bool,
}

impl PendingRegistry {
    pub fn new(config: &RequestLayerConfig) -> Self {
        let policy = match config.zero_waiter_policy {
            ZeroWaiterPolicy::KeepRunning => FlightPolicy::KeepRunning,
            ZeroWaiterPolicy::Abort => FlightPolicy::Abort,
        };
        Self {
            flights: SingleFlight::new(policy),
            tracked: Arc::new(Mutex::new(HashMap::new())),
            next_seq: AtomicU64::new(0),
            dedupe_idempotent: config.dedupe_idempotent,
        }
    }

    /// Whether `request` may share a call with an identical one
    ///
    /// Reads always may. Mutations only when the caller opted the request in
    /// as idempotent and the layer honours that opt-in.
    pub const fn shares(&self, request: &RequestDescriptor) -> bool {
        if request.method().is_read() {
            return request.is_dedupable();
        }
        self.dedupe_idempotent && request.is_dedupable()
    }

    /// Join the call for `key`, starting it with `start` if none is running
    ///
    /// `start` receives the ticket of the new call; it is only invoked for
    /// the caller that starts it.
    pub fn join<F, Fut>(&self, key: CacheKey, request: &RequestDescriptor, start: F) -> Flight<CacheKey, SharedOutcome>
    where
        F: FnOnce(FlightTicket) -> Fut,
        Fut: Future<Output = SharedOutcome> + Send + 'static,
    {
        self.flights.join(key, || {
            let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
            let ticket = FlightTicket::default();
            self.tracked.lock().insert(
                key,
                TrackedCall {
                    seq,
                    url: request.url().to_string(),
                    tags: request.tags().clone(),
                    ticket: ticket.clone(),
                },
            );

            let untrack = Untrack { tracked: Arc::clone(&self.tracked), key, seq };
            let computation = start(ticket);
            async move {
                let _untrack = untrack;
                computation.await
            }
        })
    }

    /// Detach every running call whose URL and tags match `predicate`
    ///
    /// Returns how many calls were detached.
    pub fn detach_where<F>(&self, mut predicate: F) -> usize
    where
        F: FnMut(&str, &BTreeSet<String>) -> bool,
    {
        let detached: Vec<(CacheKey, FlightTicket)> = {
            let mut tracked = self.tracked.lock();
            let keys: Vec<CacheKey> =
                tracked.iter().filter(|(_, call)| predicate(call.url.as_str(), &call.tags)).map(|(key, _)| *key).collect();
            keys.into_iter().filter_map(|key| tracked.remove(&key).map(|call| (key, call.ticket))).collect()
        };

        for (key, ticket) in &detached {
            ticket.detach();
            self.flights.forget(key);
        }
        if !detached.is_empty() {
            debug!(detached = detached.len(), "detached in-flight requests");
        }
        detached.len()
    }

    pub fn waiters(&self, key: &CacheKey) -> Option<usize> {
        self.flights.waiters(key)
    }

    pub fn is_pending(&self, key: &CacheKey) -> bool {
        self.flights.is_in_flight(key)
    }

    pub fn len(&self) -> usize {
        self.flights.in_flight()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Abort every in-flight call; their waiters see [`RequestError::Cancelled`]
    pub fn abort_all(&self) -> usize {
        let aborted = self.flights.abort_all();
        self.tracked.lock().clear();
        aborted
    }
}
