//! Error types used throughout the request layer

use thiserror::Error;

use crate::types::ApiResponse;

/// Main error type surfaced to callers of the request layer
///
/// Every waiter of a shared in-flight call receives a clone of the same
/// value, so the type is `Clone` and carries owned payloads only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// No response reached the client after the retry budget was spent
    #[error("Network error: {message}")]
    Network { message: String },

    /// A non-auth HTTP error response, status and body untouched
    #[error("HTTP error: status {status}")]
    Http { status: u16, response: ApiResponse },

    /// The replayed request was rejected as unauthorized a second time
    #[error("Authentication expired: status {}", .response.status())]
    AuthExpired { response: ApiResponse },

    /// The token refresh failed; the session has been cleared
    #[error("Token refresh failed: {message}")]
    RefreshFailed { message: String },

    /// A response could not be cached. Logged, never returned from `issue`.
    #[error("Cache error: {message}")]
    Cache { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The shared call was dropped before it settled
    #[error("Request cancelled")]
    Cancelled,
}

impl RequestError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into() }
    }

    pub fn refresh_failed(message: impl Into<String>) -> Self {
        Self::RefreshFailed { message: message.into() }
    }

    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache { message: message.into() }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    /// HTTP status carried by the error, if a response was received
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::AuthExpired { response } => Some(response.status()),
            _ => None,
        }
    }

    pub const fn response(&self) -> Option<&ApiResponse> {
        match self {
            Self::Http { response, .. } | Self::AuthExpired { response } => Some(response),
            _ => None,
        }
    }

    /// Short stable label for metrics and logs
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Network { .. } => "network",
            Self::Http { .. } => "http",
            Self::AuthExpired { .. } => "auth_expired",
            Self::RefreshFailed { .. } => "refresh_failed",
            Self::Cache { .. } => "cache",
            Self::Config { .. } => "config",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Result type alias for request layer operations
pub type Result<T> = std::result::Result<T, RequestError>;
