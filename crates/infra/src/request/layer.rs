//! The request layer facade
//!
//! A [`RequestLayer`] owns every piece of shared state (response cache,
//! pending registry, auth coordinator) for one application session. Build
//! one per session, clone it freely, and [`dispose`](RequestLayer::dispose)
//! it when the session ends.
//!
//! Issuing a request:
//! 1. key the descriptor (binary bodies skip straight to the transport)
//! 2. serve read-class requests from the cache when possible
//! 3. join an identical in-flight call, or start one
//! 4. the call sends with retry; an auth-expired response waits for the
//!    single token refresh and is replayed once
//! 5. a successful read is cached before the shared call settles
//! 6. one [`RequestEvent`] goes to the metrics sink

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use footsteps_common::cache::CacheStats;
use footsteps_common::resilience::RetryExecutor;
use footsteps_common::sync::FlightAborted;
use footsteps_common::time::{Clock, SystemClock};
use footsteps_domain::{ApiResponse, RequestDescriptor, RequestError, RequestLayerConfig, Result};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::cache::{log_cache_bypass, ResponseCache, UrlPattern};
use super::keyer::{CacheKey, RequestKeyer};
use super::pending::PendingRegistry;
use super::retry::{last_error, retry_executor, NetworkFailuresOnly};
use crate::auth::{AuthCoordinator, InMemorySession, SessionStore, TokenRefresher};
use crate::http::Transport;
use crate::observability::{MetricsSink, RequestEvent, RequestStatus, ResponseSource};

struct Sweeper {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct LayerInner<C>
where
    C: Clock + Clone,
{
    config: RequestLayerConfig,
    transport: Arc<dyn Transport>,
    session: Arc<dyn SessionStore>,
    auth: Option<AuthCoordinator>,
    keyer: RequestKeyer,
    cache: ResponseCache<C>,
    pending: PendingRegistry,
    retry: RetryExecutor<NetworkFailuresOnly>,
    sink: Option<Arc<dyn MetricsSink>>,
    sweeper: Mutex<Option<Sweeper>>,
    disposed: AtomicBool,
}

/// Resilient request layer: caching, single-flight, retry and token refresh
/// in front of a [`Transport`]
pub struct RequestLayer<C = SystemClock>
where
    C: Clock + Clone,
{
    inner: Arc<LayerInner<C>>,
}

impl RequestLayer<SystemClock> {
    /// Start building a layer on top of `transport`
    pub fn builder(transport: Arc<dyn Transport>) -> RequestLayerBuilder<SystemClock> {
        RequestLayerBuilder {
            config: RequestLayerConfig::default(),
            transport,
            session: None,
            refresher: None,
            sink: None,
            clock: SystemClock,
        }
    }
}

impl<C> RequestLayer<C>
where
    C: Clock + Clone,
{
    /// Issue `request` through the layer
    ///
    /// Errors are the final outcome, unchanged: [`RequestError::Network`]
    /// after retries, [`RequestError::Http`] with the received status and
    /// body, [`RequestError::AuthExpired`] if a replay was rejected again,
    /// or [`RequestError::RefreshFailed`].
    #[instrument(skip(self, request), fields(method = %request.method(), url = %request.url()))]
    pub async fn issue(&self, request: RequestDescriptor) -> Result<ApiResponse> {
        if self.is_disposed() {
            return Err(RequestError::config("request layer has been disposed"));
        }

        let started = tokio::time::Instant::now();
        let request = Arc::new(request);
        let key = self.inner.keyer.key(&request);
        if key.is_none() {
            debug!("request body cannot be keyed, bypassing cache and deduplication");
        }

        let (result, source) = LayerInner::resolve(&self.inner, Arc::clone(&request), key).await;
        self.inner.emit(&request, key, started.elapsed(), &result, source);
        result
    }

    /// Issue a plain GET for `url`
    pub async fn get(&self, url: impl Into<String>) -> Result<ApiResponse> {
        self.issue(RequestDescriptor::get(url)).await
    }

    /// Drop every cached response whose request URL matches `pattern`
    ///
    /// Callers performing a mutation use this to bust prior reads.
    /// In-flight calls for matching URLs are detached first: their
    /// responses still reach current waiters but are not cached, and the
    /// next request starts a fresh call. Returns the number of cache entries
    /// removed.
    pub fn invalidate_cache(&self, pattern: impl Into<UrlPattern>) -> usize {
        let pattern = pattern.into();
        self.inner.pending.detach_where(|url, _| pattern.matches(url));
        self.inner.cache.invalidate(pattern)
    }

    /// Drop every cached response whose request carried any of `tags`
    pub fn invalidate_tags<I, S>(&self, tags: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tags: Vec<S> = tags.into_iter().collect();
        self.inner.pending.detach_where(|_, carried| tags.iter().any(|tag| carried.contains(tag.as_ref())));
        self.inner.cache.invalidate_tags(tags)
    }

    pub fn clear_cache(&self) {
        self.inner.pending.detach_where(|_, _| true);
        self.inner.cache.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.inner.cache.stats()
    }

    /// Remove expired cache entries now
    pub fn sweep(&self) -> usize {
        self.inner.cache.sweep()
    }

    /// Number of distinct calls currently in flight
    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }

    /// Callers currently waiting on the call for `key`
    pub fn waiters(&self, key: &CacheKey) -> Option<usize> {
        self.inner.pending.waiters(key)
    }

    /// Key the layer would use for `request`
    pub fn key_for(&self, request: &RequestDescriptor) -> Option<CacheKey> {
        self.inner.keyer.key(request)
    }

    pub fn config(&self) -> &RequestLayerConfig {
        &self.inner.config
    }

    pub fn session(&self) -> &Arc<dyn SessionStore> {
        &self.inner.session
    }

    /// The auth coordinator, when a token refresher was configured
    pub fn auth(&self) -> Option<&AuthCoordinator> {
        self.inner.auth.as_ref()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Pre-populate the cache by issuing read requests one after another
    ///
    /// Waits `pacing` between requests. Failures are logged and skipped.
    /// Returns how many new cache entries the warm-up created; responses
    /// already cached, or refused by the cache, are not counted.
    pub async fn warm_up<I>(&self, requests: I, pacing: Duration) -> usize
    where
        I: IntoIterator<Item = RequestDescriptor>,
    {
        let mut cached = 0;
        let mut first = true;

        for request in requests {
            if !request.is_cacheable() {
                debug!(method = %request.method(), url = %request.url(), "skipping non-cacheable warm-up request");
                continue;
            }
            if !first && !pacing.is_zero() {
                tokio::time::sleep(pacing).await;
            }
            first = false;

            let url = request.url().to_string();
            let key = self.inner.keyer.key(&request);
            let was_cached = key.is_some_and(|key| self.inner.cache.contains(&key));
            match self.issue(request).await {
                Ok(_) if !was_cached && key.is_some_and(|key| self.inner.cache.contains(&key)) => cached += 1,
                Ok(_) => debug!(%url, "warm-up response not added to the cache"),
                Err(err) => warn!(%url, error = %err, "cache warm-up request failed"),
            }
        }

        info!(cached, "cache warm-up finished");
        cached
    }

    /// Dispose the layer: stop the sweeper, abort in-flight calls, clear
    /// the cache. Later calls to `issue` fail with a configuration error.
    pub async fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        let sweeper = self.inner.sweeper.lock().take();
        if let Some(sweeper) = sweeper {
            sweeper.cancel.cancel();
            if let Err(err) = sweeper.handle.await {
                warn!(error = %err, "cache sweeper ended abnormally");
            }
        }

        let aborted = self.inner.pending.abort_all();
        self.inner.cache.clear();
        info!(aborted, "request layer disposed");
    }
}

impl<C> RequestLayer<C>
where
    C: Clock + Clone + Send + Sync,
{
    /// Spawn the background expiry sweep
    ///
    /// Returns `false` if it is already running or the layer is disposed.
    pub fn start_sweeper(&self) -> bool {
        if self.is_disposed() {
            return false;
        }
        let mut slot = self.inner.sweeper.lock();
        if slot.is_some() {
            return false;
        }

        let cancel = CancellationToken::new();
        let handle = self.inner.cache.spawn_sweeper(self.inner.config.sweep_interval, cancel.clone());
        *slot = Some(Sweeper { cancel, handle });
        true
    }
}

impl<C> Clone for RequestLayer<C>
where
    C: Clock + Clone,
{
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<C> std::fmt::Debug for RequestLayer<C>
where
    C: Clock + Clone,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestLayer")
            .field("cache", &self.inner.cache)
            .field("pending", &self.inner.pending)
            .field("auth", &self.inner.auth)
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

impl<C> LayerInner<C>
where
    C: Clock + Clone,
{
    async fn resolve(
        this: &Arc<Self>,
        request: Arc<RequestDescriptor>,
        key: Option<CacheKey>,
    ) -> (Result<ApiResponse>, ResponseSource) {
        let Some(key) = key else {
            return (this.execute(&request).await, ResponseSource::Network);
        };

        if this.config.enable_cache && request.is_cacheable() {
            if let Some(response) = this.cache.get(&key) {
                debug!(cache_key = %key, "served from cache");
                return (Ok(response), ResponseSource::Cache);
            }
        }

        if !this.pending.shares(&request) {
            let result = this.execute(&request).await;
            this.store(key, &request, &result);
            return (result, ResponseSource::Network);
        }

        let inner = Arc::clone(this);
        let call = Arc::clone(&request);
        let flight = this.pending.join(key, &request, move |ticket| async move {
            let result = inner.execute(&call).await;
            if ticket.if_current(|| inner.store(key, &call, &result)).is_none() {
                debug!(cache_key = %key, "request invalidated while in flight, response not cached");
            }
            result
        });
        let source = if flight.is_leader() {
            ResponseSource::Network
        } else {
            debug!(cache_key = %key, "joined in-flight request");
            ResponseSource::Shared
        };

        match flight.await {
            Ok(result) => (result, source),
            Err(FlightAborted) => (Err(RequestError::Cancelled), source),
        }
    }

    /// Send with retry, recovering once from an expired token
    async fn execute(&self, request: &RequestDescriptor) -> Result<ApiResponse> {
        let auth_status = self.config.auth_expired_status;
        let token = self.session.token();

        match self.send_retried(request, token.as_deref()).await {
            Err(RequestError::Http { status, response }) if status == auth_status => {
                let Some(auth) = &self.auth else {
                    return Err(RequestError::AuthExpired { response });
                };

                debug!(status, "authentication expired, waiting for token refresh");
                let fresh = auth.recover(token.as_deref()).await?;

                match self.send_retried(request, Some(&fresh)).await {
                    Err(RequestError::Http { status, response }) if status == auth_status => {
                        warn!(status, "request rejected again after token refresh");
                        Err(RequestError::AuthExpired { response })
                    }
                    other => other,
                }
            }
            other => other,
        }
    }

    async fn send_retried(&self, request: &RequestDescriptor, token: Option<&str>) -> Result<ApiResponse> {
        self.retry
            .execute(|_attempt| async move { self.transport.send(request, token).await.into_result() })
            .await
            .map_err(last_error)
    }

    fn store(&self, key: CacheKey, request: &RequestDescriptor, result: &Result<ApiResponse>) {
        if !self.config.enable_cache || !request.is_cacheable() {
            return;
        }
        if let Ok(response) = result {
            let ttl = self.config.ttl_for(request.url());
            if let Err(err) = self.cache.put(key, request, response, ttl) {
                log_cache_bypass(&key, &err);
            }
        }
    }

    fn emit(
        &self,
        request: &RequestDescriptor,
        key: Option<CacheKey>,
        elapsed: Duration,
        result: &Result<ApiResponse>,
        source: ResponseSource,
    ) {
        let Some(sink) = &self.sink else {
            return;
        };

        let event = RequestEvent {
            method: request.method(),
            url: request.url().to_string(),
            duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            status: RequestStatus::of(result),
            cache_key: key,
            source,
            error: result.as_ref().err().map(ToString::to_string),
        };
        sink.record(&event);
    }
}

impl<C> Drop for LayerInner<C>
where
    C: Clock + Clone,
{
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.get_mut().take() {
            warn!("request layer dropped without dispose; cancelling cache sweeper");
            sweeper.cancel.cancel();
        }
    }
}

/// Builder for [`RequestLayer`]
pub struct RequestLayerBuilder<C = SystemClock> {
    config: RequestLayerConfig,
    transport: Arc<dyn Transport>,
    session: Option<Arc<dyn SessionStore>>,
    refresher: Option<Arc<dyn TokenRefresher>>,
    sink: Option<Arc<dyn MetricsSink>>,
    clock: C,
}

impl<C> RequestLayerBuilder<C>
where
    C: Clock + Clone,
{
    #[must_use]
    pub fn config(mut self, config: RequestLayerConfig) -> Self {
        self.config = config;
        self
    }

    /// Session collaborator. Defaults to an empty [`InMemorySession`].
    #[must_use]
    pub fn session(mut self, session: Arc<dyn SessionStore>) -> Self {
        self.session = Some(session);
        self
    }

    /// Token refresher. Without one, an auth-expired response is surfaced
    /// as [`RequestError::AuthExpired`] right away.
    #[must_use]
    pub fn refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    #[must_use]
    pub fn metrics_sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Clock driving cache expiry (useful for testing)
    pub fn clock<C2>(self, clock: C2) -> RequestLayerBuilder<C2>
    where
        C2: Clock + Clone,
    {
        RequestLayerBuilder {
            config: self.config,
            transport: self.transport,
            session: self.session,
            refresher: self.refresher,
            sink: self.sink,
            clock,
        }
    }

    /// # Errors
    /// Returns [`RequestError::Config`] if the configuration is invalid.
    pub fn build(self) -> Result<RequestLayer<C>> {
        self.config.validate()?;
        let retry = retry_executor(&self.config)?;

        let session = self.session.unwrap_or_else(|| Arc::new(InMemorySession::new()));
        let auth = self
            .refresher
            .map(|refresher| AuthCoordinator::new(Arc::clone(&session), refresher));

        let inner = LayerInner {
            keyer: RequestKeyer::from_config(&self.config),
            cache: ResponseCache::with_clock(&self.config, self.clock),
            pending: PendingRegistry::new(&self.config),
            transport: self.transport,
            session,
            auth,
            retry,
            sink: self.sink,
            sweeper: Mutex::new(None),
            disposed: AtomicBool::new(false),
            config: self.config,
        };

        info!(
            cache = inner.config.enable_cache,
            max_cache_size = inner.config.max_cache_size,
            max_retry_attempts = inner.config.max_retry_attempts,
            "request layer ready"
        );
        Ok(RequestLayer { inner: Arc::new(inner) })
    }
}

impl<C> std::fmt::Debug for RequestLayerBuilder<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestLayerBuilder")
            .field("config", &self.config)
            .field("has_refresher", &self.refresher.is_some())
            .field("has_sink", &self.sink.is_some())
            .finish_non_exhaustive()
    }
}
