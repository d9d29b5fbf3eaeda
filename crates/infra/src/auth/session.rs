//! Session collaborator

use std::fmt;

use parking_lot::RwLock;
use tracing::info;

/// Access to the current session
///
/// `navigate_to_login` is a pure side effect owned by the UI layer. It is
/// only invoked after a refresh failed for good.
pub trait SessionStore: Send + Sync {
    fn token(&self) -> Option<String>;

    fn set_token(&self, token: String);

    fn clear_session(&self);

    fn navigate_to_login(&self);
}

type LoginHook = Box<dyn Fn() + Send + Sync>;

/// Process-local session holding the token in memory
#[derive(Default)]
pub struct InMemorySession {
    token: RwLock<Option<String>>,
    on_login: Option<LoginHook>,
}

impl InMemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self { token: RwLock::new(Some(token.into())), on_login: None }
    }

    /// Call `hook` whenever the layer sends the user back to login
    #[must_use]
    pub fn on_login<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_login = Some(Box::new(hook));
        self
    }
}

impl SessionStore for InMemorySession {
    fn token(&self) -> Option<String> {
        self.token.read().clone()
    }

    fn set_token(&self, token: String) {
        *self.token.write() = Some(token);
    }

    fn clear_session(&self) {
        *self.token.write() = None;
    }

    fn navigate_to_login(&self) {
        info!("session ended, navigating to login");
        if let Some(hook) = &self.on_login {
            hook();
        }
    }
}

impl fmt::Debug for InMemorySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemorySession")
            .field("has_token", &self.token.read().is_some())
            .field("has_login_hook", &self.on_login.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn token_lifecycle() {
        let session = InMemorySession::with_token("old");
        assert_eq!(session.token().as_deref(), Some("old"));

        session.set_token("new".into());
        assert_eq!(session.token().as_deref(), Some("new"));

        session.clear_session();
        assert_eq!(session.token(), None);
    }

    #[test]
    fn login_hook_fires() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let session = InMemorySession::new().on_login(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        session.navigate_to_login();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
