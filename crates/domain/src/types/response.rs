//! Response snapshots and transport outcomes

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::errors::RequestError;

/// Snapshot of a received HTTP response
///
/// Cloning is cheap: the body is reference counted, so a cached snapshot
/// can be handed to every waiter without copying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    status: u16,
    headers: BTreeMap<String, String>,
    body: Bytes,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self { status, headers: BTreeMap::new(), body: body.into() }
    }

    /// Response with a serialized JSON body and matching content type
    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        Self::new(status, value.to_string()).with_header("content-type", "application/json")
    }

    /// Add a header. Names are stored lower-cased.
    #[must_use]
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    pub const fn status(&self) -> u16 {
        self.status
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    pub const fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub const fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body as UTF-8 text, lossy
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the body as JSON
    pub fn parse_json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Whether the server asked for the response not to be stored
    pub fn forbids_storage(&self) -> bool {
        self.header("cache-control").is_some_and(|value| {
            value.split(',').any(|directive| directive.trim().eq_ignore_ascii_case("no-store"))
        })
    }
}

/// Categorized result of a single transport call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportOutcome {
    /// 2xx response
    Success(ApiResponse),
    /// A response arrived with a non-success status
    HttpError(ApiResponse),
    /// No response reached the client
    NetworkFailure(String),
    /// The request could not be sent as described, e.g. a malformed URL;
    /// sending it again cannot help
    InvalidRequest(String),
}

impl TransportOutcome {
    /// Classify a received response by status
    pub const fn from_response(response: ApiResponse) -> Self {
        if response.is_success() {
            Self::Success(response)
        } else {
            Self::HttpError(response)
        }
    }

    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Success(response) | Self::HttpError(response) => Some(response.status()),
            Self::NetworkFailure(_) | Self::InvalidRequest(_) => None,
        }
    }

    pub const fn is_network_failure(&self) -> bool {
        matches!(self, Self::NetworkFailure(_))
    }

    /// Surface the outcome to a caller, status and body intact
    pub fn into_result(self) -> Result<ApiResponse, RequestError> {
        match self {
            Self::Success(response) => Ok(response),
            Self::HttpError(response) => {
                Err(RequestError::Http { status: response.status(), response })
            }
            Self::NetworkFailure(message) => Err(RequestError::Network { message }),
            Self::InvalidRequest(message) => Err(RequestError::Config { message }),
        }
    }
}
