//! Scripted collaborators for exercising the request layer without a
//! network
//!
//! Available to this crate's tests and, with the `test-utils` feature, to
//! downstream crates.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use footsteps_domain::{ApiResponse, Method, RequestDescriptor, TransportOutcome};
use parking_lot::{Mutex, RwLock};

use crate::auth::{RefreshError, SessionStore, TokenRefresher};
use crate::http::Transport;
use crate::observability::{MetricsSink, RequestEvent};

/// One call observed by [`ScriptedTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub method: Method,
    pub url: String,
    pub token: Option<String>,
}

type Responder = Box<dyn Fn(&RequestDescriptor, Option<&str>) -> TransportOutcome + Send + Sync>;

/// [`Transport`] answering from a script and recording every call
pub struct ScriptedTransport {
    responder: Responder,
    latency: Duration,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    /// Answer every call with `responder`
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&RequestDescriptor, Option<&str>) -> TransportOutcome + Send + Sync + 'static,
    {
        Self { responder: Box::new(responder), latency: Duration::ZERO, calls: Mutex::new(Vec::new()) }
    }

    /// Answer with `outcome` every time
    pub fn always(outcome: TransportOutcome) -> Self {
        Self::new(move |_, _| outcome.clone())
    }

    /// `200` with `body` for every call
    pub fn ok(body: &'static str) -> Self {
        Self::always(TransportOutcome::Success(ApiResponse::new(200, body)))
    }

    /// Answer with `outcomes` in order, repeating the last one once drained
    pub fn sequence(outcomes: impl IntoIterator<Item = TransportOutcome>) -> Self {
        let queue: Mutex<VecDeque<TransportOutcome>> = Mutex::new(outcomes.into_iter().collect());
        Self::new(move |_, _| {
            let mut queue = queue.lock();
            match queue.len() {
                0 => TransportOutcome::NetworkFailure("script exhausted".into()),
                1 => queue[0].clone(),
                _ => queue.pop_front().unwrap_or_else(|| TransportOutcome::NetworkFailure("script exhausted".into())),
            }
        })
    }

    /// Delay every answer by `latency` (tokio time, so it can be paused)
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Calls whose URL equals `url`
    pub fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().iter().filter(|call| call.url == url).count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &RequestDescriptor, token: Option<&str>) -> TransportOutcome {
        self.calls.lock().push(RecordedCall {
            method: request.method(),
            url: request.url().to_string(),
            token: token.map(str::to_string),
        });
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        (self.responder)(request, token)
    }
}

impl std::fmt::Debug for ScriptedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedTransport")
            .field("latency", &self.latency)
            .field("calls", &self.call_count())
            .finish_non_exhaustive()
    }
}

/// [`TokenRefresher`] returning a fixed outcome after an optional delay
#[derive(Debug)]
pub struct ScriptedRefresher {
    outcome: Result<String, RefreshError>,
    latency: Duration,
    calls: AtomicUsize,
}

impl ScriptedRefresher {
    pub fn succeeding(token: impl Into<String>) -> Self {
        Self { outcome: Ok(token.into()), latency: Duration::ZERO, calls: AtomicUsize::new(0) }
    }

    pub fn failing(error: RefreshError) -> Self {
        Self { outcome: Err(error), latency: Duration::ZERO, calls: AtomicUsize::new(0) }
    }

    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenRefresher for ScriptedRefresher {
    async fn refresh(&self, _current: Option<&str>) -> Result<String, RefreshError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.outcome.clone()
    }
}

/// [`SessionStore`] counting how often the session ended
#[derive(Debug, Default)]
pub struct RecordingSession {
    token: RwLock<Option<String>>,
    clears: AtomicUsize,
    logins: AtomicUsize,
}

impl RecordingSession {
    pub fn with_token(token: impl Into<String>) -> Arc<Self> {
        Arc::new(Self { token: RwLock::new(Some(token.into())), ..Self::default() })
    }

    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }

    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }
}

impl SessionStore for RecordingSession {
    fn token(&self) -> Option<String> {
        self.token.read().clone()
    }

    fn set_token(&self, token: String) {
        *self.token.write() = Some(token);
    }

    fn clear_session(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
        *self.token.write() = None;
    }

    fn navigate_to_login(&self) {
        self.logins.fetch_add(1, Ordering::SeqCst);
    }
}

/// [`MetricsSink`] keeping every event
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<RequestEvent>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<RequestEvent> {
        self.events.lock().clone()
    }
}

impl MetricsSink for RecordingSink {
    fn record(&self, event: &RequestEvent) {
        self.events.lock().push(event.clone());
    }
}
