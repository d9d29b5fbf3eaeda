//! Token refresh collaborator

use std::sync::Arc;

use async_trait::async_trait;
use footsteps_domain::{RequestDescriptor, TransportOutcome};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::http::Transport;

/// Why a refresh did not produce a token
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RefreshError {
    #[error("refresh rejected with status {status}")]
    Rejected { status: u16 },

    #[error("refresh request failed: {0}")]
    Network(String),

    #[error("refresh response was not understood: {0}")]
    InvalidResponse(String),

    #[error("refresh request could not be sent: {0}")]
    InvalidRequest(String),
}

/// Obtains a new access token
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// `current` is the token that was rejected, if any
    async fn refresh(&self, current: Option<&str>) -> Result<String, RefreshError>;
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Refreshes by POSTing to an endpoint through a [`Transport`]
///
/// Expects a JSON body with an `access_token` field, e.g.
/// `{"access_token": "...", "token_type": "bearer"}`.
pub struct HttpTokenRefresher {
    transport: Arc<dyn Transport>,
    endpoint: String,
    payload: Option<Value>,
}

impl HttpTokenRefresher {
    pub fn new(transport: Arc<dyn Transport>, endpoint: impl Into<String>) -> Self {
        Self { transport, endpoint: endpoint.into(), payload: None }
    }

    /// JSON body sent with every refresh call
    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

impl std::fmt::Debug for HttpTokenRefresher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTokenRefresher").field("endpoint", &self.endpoint).finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self, current: Option<&str>) -> Result<String, RefreshError> {
        let mut request = RequestDescriptor::post(self.endpoint.as_str());
        if let Some(payload) = &self.payload {
            request = request.with_json(payload.clone());
        }

        debug!(endpoint = %self.endpoint, "requesting token refresh");
        match self.transport.send(&request, current).await {
            TransportOutcome::Success(response) => response
                .parse_json::<TokenResponse>()
                .map(|body| body.access_token)
                .map_err(|err| RefreshError::InvalidResponse(err.to_string())),
            TransportOutcome::HttpError(response) => {
                Err(RefreshError::Rejected { status: response.status() })
            }
            TransportOutcome::NetworkFailure(message) => Err(RefreshError::Network(message)),
            TransportOutcome::InvalidRequest(message) => Err(RefreshError::InvalidRequest(message)),
        }
    }
}
