//! Session state and token refresh coordination
//!
//! - [`SessionStore`]: where the current token lives, plus the logout hook
//! - [`TokenRefresher`]: obtains a new token
//! - [`AuthCoordinator`]: guarantees one refresh at a time system-wide

pub mod coordinator;
pub mod refresher;
pub mod session;

pub use coordinator::AuthCoordinator;
pub use refresher::{HttpTokenRefresher, RefreshError, TokenRefresher};
pub use session::{InMemorySession, SessionStore};
