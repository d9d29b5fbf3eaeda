//! Infrastructure errors
//!
//! Failures raised while talking to the outside world. They never reach a
//! caller of the request layer directly: [`conversions`] folds them into the
//! domain's [`footsteps_domain::RequestError`].

pub mod conversions;

use thiserror::Error;

/// Errors raised by infrastructure adapters
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InfraError {
    #[error("HTTP request timed out")]
    Timeout,

    #[error("HTTP connection failure: {0}")]
    Connect(String),

    #[error("HTTP transport error: {0}")]
    Http(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),
}

impl InfraError {
    /// The request itself is at fault; resending it cannot succeed
    pub const fn is_invalid_request(&self) -> bool {
        matches!(self, Self::InvalidUrl(_) | Self::InvalidHeader(_))
    }
}

/// Result alias for infrastructure adapters
pub type InfraResult<T> = Result<T, InfraError>;
