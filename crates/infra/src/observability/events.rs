//! Per-request observability events

use footsteps_domain::{Method, RequestError};
use serde::{Serialize, Serializer};

use crate::request::keyer::CacheKey;

/// Final status of a request: an HTTP code, or `"ERROR"` when none arrived
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Code(u16),
    Error,
}

impl RequestStatus {
    /// Status for a settled request
    pub fn of(result: &Result<footsteps_domain::ApiResponse, RequestError>) -> Self {
        match result {
            Ok(response) => Self::Code(response.status()),
            Err(err) => err.status().map_or(Self::Error, Self::Code),
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Code(code) => write!(f, "{code}"),
            Self::Error => f.write_str("ERROR"),
        }
    }
}

impl Serialize for RequestStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Code(code) => serializer.serialize_u16(*code),
            Self::Error => serializer.serialize_str("ERROR"),
        }
    }
}

/// Where the response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    /// This caller drove the transport call
    Network,
    /// Served from the response cache
    Cache,
    /// Joined a call another caller started
    Shared,
}

/// One completed request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEvent {
    pub method: Method,
    pub url: String,
    pub duration_ms: u64,
    pub status: RequestStatus,
    #[serde(serialize_with = "serialize_key")]
    pub cache_key: Option<CacheKey>,
    pub source: ResponseSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RequestEvent {
    pub const fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

fn serialize_key<S: Serializer>(key: &Option<CacheKey>, serializer: S) -> Result<S::Ok, S::Error> {
    match key {
        Some(key) => serializer.collect_str(key),
        None => serializer.serialize_none(),
    }
}
