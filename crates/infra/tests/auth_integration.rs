//! Integration tests for token refresh coordination
//!
//! **Coverage:**
//! - Many concurrent recoveries share one refresh
//! - A recovery after a finished refresh reuses the new token
//! - A failed refresh ends the session exactly once
//! - A later expiry starts a new refresh

use std::sync::Arc;
use std::time::Duration;

use footsteps_domain::RequestError;
use footsteps_infra::testing::{RecordingSession, ScriptedRefresher};
use footsteps_infra::{AuthCoordinator, RefreshError, SessionStore, TokenRefresher};
use futures::future::join_all;

fn coordinator(session: &Arc<RecordingSession>, refresher: &Arc<ScriptedRefresher>) -> AuthCoordinator {
    AuthCoordinator::new(
        Arc::clone(session) as Arc<dyn SessionStore>,
        Arc::clone(refresher) as Arc<dyn TokenRefresher>,
    )
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_recoveries_share_one_refresh() {
    let session = RecordingSession::with_token("stale");
    let refresher = Arc::new(ScriptedRefresher::succeeding("fresh").with_latency(Duration::from_millis(200)));
    let auth = coordinator(&session, &refresher);

    let tokens = join_all((0..8).map(|_| auth.recover(Some("stale")))).await;

    assert_eq!(refresher.calls(), 1);
    assert_eq!(auth.refreshes_started(), 1);
    assert!(tokens.iter().all(|token| token.as_deref() == Ok("fresh")));
    assert!(!auth.is_refreshing());
}

#[tokio::test(start_paused = true)]
async fn test_late_recovery_reuses_refreshed_token() {
    let session = RecordingSession::with_token("stale");
    let refresher = Arc::new(ScriptedRefresher::succeeding("fresh"));
    let auth = coordinator(&session, &refresher);

    assert_eq!(auth.recover(Some("stale")).await, Ok("fresh".to_string()));
    // A request that was sent with the old token fails after the refresh
    assert_eq!(auth.recover(Some("stale")).await, Ok("fresh".to_string()));

    assert_eq!(refresher.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_again_with_new_token_refreshes_again() {
    let session = RecordingSession::with_token("first");
    let refresher = Arc::new(ScriptedRefresher::succeeding("second"));
    let auth = coordinator(&session, &refresher);

    assert_eq!(auth.recover(Some("first")).await, Ok("second".to_string()));
    assert_eq!(auth.recover(Some("second")).await, Ok("second".to_string()));

    assert_eq!(refresher.calls(), 2);
    assert_eq!(auth.refreshes_started(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_refresh_ends_session_once() {
    let session = RecordingSession::with_token("stale");
    let refresher = Arc::new(
        ScriptedRefresher::failing(RefreshError::Network("offline".into()))
            .with_latency(Duration::from_millis(50)),
    );
    let auth = coordinator(&session, &refresher);

    let results = join_all((0..5).map(|_| auth.recover(Some("stale")))).await;

    for result in results {
        match result {
            Err(RequestError::RefreshFailed { message }) => assert!(message.contains("offline")),
            other => panic!("expected refresh failure, got {other:?}"),
        }
    }
    assert_eq!(refresher.calls(), 1);
    assert_eq!(session.clears(), 1);
    assert_eq!(session.logins(), 1);
    assert_eq!(session.token(), None);
}

#[tokio::test(start_paused = true)]
async fn test_recovery_without_session_token_refreshes() {
    let session = Arc::new(RecordingSession::default());
    let refresher = Arc::new(ScriptedRefresher::succeeding("issued"));
    let auth = coordinator(&session, &refresher);

    assert_eq!(auth.recover(None).await, Ok("issued".to_string()));
    assert_eq!(session.token().as_deref(), Some("issued"));
}
