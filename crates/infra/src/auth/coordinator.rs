//! Single-refresh coordination
//!
//! When a request is rejected as unauthorized it calls
//! [`AuthCoordinator::recover`]. The first caller starts the refresh; every
//! caller arriving while it runs attaches to the same result. The refresh
//! runs on its own task, so it completes even if the caller that started it
//! goes away.
//!
//! On success the session token is updated before any waiter resumes. On
//! failure the session is cleared, the login hook fires once, and every
//! waiter receives the same [`RequestError::RefreshFailed`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use footsteps_domain::RequestError;
use futures::channel::oneshot;
use futures::future::{FutureExt, Shared};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::refresher::TokenRefresher;
use super::session::SessionStore;

type RefreshOutcome = Result<String, RequestError>;

struct InFlight {
    generation: u64,
    result: Shared<oneshot::Receiver<RefreshOutcome>>,
}

/// Runs at most one token refresh at a time
pub struct AuthCoordinator {
    session: Arc<dyn SessionStore>,
    refresher: Arc<dyn TokenRefresher>,
    in_flight: Arc<Mutex<Option<InFlight>>>,
    generation: AtomicU64,
}

impl AuthCoordinator {
    pub fn new(session: Arc<dyn SessionStore>, refresher: Arc<dyn TokenRefresher>) -> Self {
        Self {
            session,
            refresher,
            in_flight: Arc::new(Mutex::new(None)),
            generation: AtomicU64::new(0),
        }
    }

    pub fn session(&self) -> &Arc<dyn SessionStore> {
        &self.session
    }

    /// Current session token
    pub fn token(&self) -> Option<String> {
        self.session.token()
    }

    /// Number of refreshes started so far
    pub fn refreshes_started(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn is_refreshing(&self) -> bool {
        self.in_flight.lock().is_some()
    }

    /// Obtain a token to replay a request that was rejected with `stale`
    ///
    /// If a refresh already finished since `stale` was read, the current
    /// token is returned without refreshing again. Must be called from
    /// within a Tokio runtime.
    pub async fn recover(&self, stale: Option<&str>) -> RefreshOutcome {
        let result = {
            let mut slot = self.in_flight.lock();

            if let Some(in_flight) = slot.as_ref() {
                debug!(generation = in_flight.generation, "attaching to in-flight token refresh");
                in_flight.result.clone()
            } else {
                if let Some(current) = self.session.token() {
                    if stale != Some(current.as_str()) {
                        debug!("token already refreshed, replaying with current token");
                        return Ok(current);
                    }
                }

                let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
                let result = self.start_refresh(generation, stale.map(str::to_string));
                *slot = Some(InFlight { generation, result: result.clone() });
                result
            }
        };

        result.await.unwrap_or(Err(RequestError::Cancelled))
    }

    fn start_refresh(
        &self,
        generation: u64,
        stale: Option<String>,
    ) -> Shared<oneshot::Receiver<RefreshOutcome>> {
        let (sender, receiver) = oneshot::channel();
        let session = Arc::clone(&self.session);
        let refresher = Arc::clone(&self.refresher);
        let in_flight = Arc::clone(&self.in_flight);

        info!(generation, "starting token refresh");
        tokio::spawn(async move {
            let outcome = match refresher.refresh(stale.as_deref()).await {
                Ok(token) => {
                    session.set_token(token.clone());
                    info!(generation, "token refresh succeeded");
                    Ok(token)
                }
                Err(err) => {
                    warn!(generation, error = %err, "token refresh failed, ending session");
                    session.clear_session();
                    session.navigate_to_login();
                    Err(RequestError::from(err))
                }
            };

            {
                let mut slot = in_flight.lock();
                if slot.as_ref().is_some_and(|current| current.generation == generation) {
                    *slot = None;
                }
            }
            // Every waiter may already be gone.
            let _ = sender.send(outcome);
        });

        receiver.shared()
    }
}

impl std::fmt::Debug for AuthCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthCoordinator")
            .field("refreshes_started", &self.refreshes_started())
            .field("refreshing", &self.is_refreshing())
            .finish_non_exhaustive()
    }
}
