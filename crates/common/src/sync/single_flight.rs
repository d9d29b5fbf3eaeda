//! Single-flight deduplication of concurrent calls
//!
//! [`SingleFlight::join`] collapses concurrent calls for the same key into
//! one underlying computation. The first caller's future is spawned on the
//! runtime; everyone who joins while it runs receives a [`Flight`] that
//! resolves to a clone of the same value.
//!
//! The registry entry is removed by the computation itself, under the
//! registry lock, in the same step that publishes the result. A caller that
//! joins after that step starts a fresh computation.
//!
//! Dropping a [`Flight`] before it resolves withdraws that caller's interest.
//! What happens when the last caller leaves is decided by
//! [`ZeroWaiterPolicy`].

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::channel::oneshot;
use futures::future::{FutureExt, Shared};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::task::AbortHandle;
use tracing::debug;

/// What to do with an in-flight computation once no caller is waiting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZeroWaiterPolicy {
    /// Let it finish; side effects of the computation still happen
    #[default]
    KeepRunning,
    /// Abort the spawned task and drop the registry entry
    Abort,
}

/// The computation was aborted before it produced a value
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("in-flight computation was aborted before it settled")]
pub struct FlightAborted;

type ResultChannel<V> = Shared<oneshot::Receiver<V>>;

struct PendingEntry<V> {
    id: u64,
    result: ResultChannel<V>,
    waiters: usize,
    task: AbortHandle,
}

struct Registry<K, V> {
    pending: HashMap<K, PendingEntry<V>>,
    next_id: u64,
}

/// Registry of in-flight computations keyed by `K`
pub struct SingleFlight<K, V> {
    registry: Arc<Mutex<Registry<K, V>>>,
    policy: ZeroWaiterPolicy,
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(policy: ZeroWaiterPolicy) -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry { pending: HashMap::new(), next_id: 0 })),
            policy,
        }
    }

    pub const fn policy(&self) -> ZeroWaiterPolicy {
        self.policy
    }

    /// Join the computation for `key`, starting it with `start` if none is
    /// in flight.
    ///
    /// The check and the insert happen under one lock, so two concurrent
    /// callers can never both start a computation for the same key. `start`
    /// runs while that lock is held and must only build the future.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn join<F, Fut>(&self, key: K, start: F) -> Flight<K, V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let mut registry = self.registry.lock();

        if let Some(entry) = registry.pending.get_mut(&key) {
            entry.waiters += 1;
            debug!(waiters = entry.waiters, "joined in-flight computation");
            return Flight {
                key,
                id: entry.id,
                result: entry.result.clone(),
                registry: Arc::clone(&self.registry),
                policy: self.policy,
                leader: false,
                settled: false,
            };
        }

        let id = registry.next_id;
        registry.next_id += 1;

        let (sender, receiver) = oneshot::channel();
        let computation = start();
        let task_registry = Arc::clone(&self.registry);
        let task_key = key.clone();
        let task = tokio::spawn(async move {
            let value = computation.await;
            let mut registry = task_registry.lock();
            if registry.pending.get(&task_key).is_some_and(|entry| entry.id == id) {
                registry.pending.remove(&task_key);
            }
            // Nobody listening is fine: every waiter may have withdrawn.
            let _ = sender.send(value);
        });

        let result = receiver.shared();
        registry.pending.insert(
            key.clone(),
            PendingEntry { id, result: result.clone(), waiters: 1, task: task.abort_handle() },
        );
        debug!(in_flight = registry.pending.len(), "started new computation");

        Flight {
            key,
            id,
            result,
            registry: Arc::clone(&self.registry),
            policy: self.policy,
            leader: true,
            settled: false,
        }
    }

    /// Number of callers still waiting on `key`, if it is in flight
    pub fn waiters(&self, key: &K) -> Option<usize> {
        self.registry.lock().pending.get(key).map(|entry| entry.waiters)
    }

    pub fn is_in_flight(&self, key: &K) -> bool {
        self.registry.lock().pending.contains_key(key)
    }

    pub fn in_flight(&self) -> usize {
        self.registry.lock().pending.len()
    }

    /// Detach the computation for `key` without aborting it
    ///
    /// Callers already holding a [`Flight`] still receive its value. The next
    /// [`SingleFlight::join`] for `key` starts a fresh computation.
    pub fn forget(&self, key: &K) -> bool {
        let forgotten = self.registry.lock().pending.remove(key).is_some();
        if forgotten {
            debug!("detached in-flight computation");
        }
        forgotten
    }

    /// Abort every in-flight computation and forget it
    pub fn abort_all(&self) -> usize {
        let mut registry = self.registry.lock();
        let count = registry.pending.len();
        for (_, entry) in registry.pending.drain() {
            entry.task.abort();
        }
        count
    }
}

impl<K, V> std::fmt::Debug for SingleFlight<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFlight")
            .field("in_flight", &self.registry.lock().pending.len())
            .field("policy", &self.policy)
            .finish()
    }
}

/// One caller's handle on a shared computation
///
/// Resolves to the shared value. Dropping it early withdraws this caller
/// without affecting the others.
#[must_use = "a flight does nothing unless awaited"]
pub struct Flight<K, V>
where
    K: Eq + Hash,
{
    key: K,
    id: u64,
    result: ResultChannel<V>,
    registry: Arc<Mutex<Registry<K, V>>>,
    policy: ZeroWaiterPolicy,
    leader: bool,
    settled: bool,
}

impl<K, V> Flight<K, V>
where
    K: Eq + Hash,
{
    /// Whether this caller started the computation
    pub const fn is_leader(&self) -> bool {
        self.leader
    }
}

// `Flight` is never structurally pinned.
impl<K: Eq + Hash, V> Unpin for Flight<K, V> {}

impl<K, V> Future for Flight<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    type Output = Result<V, FlightAborted>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.result.poll_unpin(cx) {
            Poll::Ready(result) => {
                self.settled = true;
                Poll::Ready(result.map_err(|_| FlightAborted))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<K, V> Drop for Flight<K, V>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        if self.settled {
            return;
        }

        let mut registry = self.registry.lock();
        let Some(entry) = registry.pending.get_mut(&self.key) else {
            return;
        };
        if entry.id != self.id {
            return;
        }

        entry.waiters = entry.waiters.saturating_sub(1);
        if entry.waiters > 0 {
            debug!(waiters = entry.waiters, "waiter withdrew from in-flight computation");
            return;
        }

        match self.policy {
            ZeroWaiterPolicy::KeepRunning => {
                debug!("last waiter withdrew, computation keeps running");
            }
            ZeroWaiterPolicy::Abort => {
                if let Some(entry) = registry.pending.remove(&self.key) {
                    entry.task.abort();
                }
                debug!("last waiter withdrew, computation aborted");
            }
        }
    }
}
