//! Transport boundary
//!
//! One call, one outcome. Implementations attach the session token and
//! locale, send the request, and classify what came back. Retry, caching and
//! deduplication all live above this trait.

use std::time::Duration;

use async_trait::async_trait;
use footsteps_domain::constants::{AUTHORIZATION_HEADER, LOCALE_HEADER, REQUEST_ID_HEADER};
use footsteps_domain::{ApiResponse, Method, RequestBody, RequestDescriptor, TransportOutcome};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Client as ReqwestClient;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use crate::errors::{InfraError, InfraResult};

/// Sends a single request and categorizes the outcome
#[async_trait]
pub trait Transport: Send + Sync {
    /// `token` is attached as a bearer credential when present
    async fn send(&self, request: &RequestDescriptor, token: Option<&str>) -> TransportOutcome;
}

/// [`Transport`] backed by `reqwest`
#[derive(Clone)]
pub struct HttpTransport {
    client: ReqwestClient,
    base_url: Option<Url>,
    locale: Option<String>,
}

impl HttpTransport {
    /// Start building a new HTTP transport.
    pub fn builder() -> HttpTransportBuilder {
        HttpTransportBuilder::default()
    }

    fn resolve_url(&self, request: &RequestDescriptor) -> InfraResult<Url> {
        let mut url = match Url::parse(request.url()) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = self.base_url.as_ref().ok_or_else(|| {
                    InfraError::InvalidUrl(format!("relative url without base: {}", request.url()))
                })?;
                base.join(request.url().trim_start_matches('/'))
                    .map_err(|err| InfraError::InvalidUrl(err.to_string()))?
            }
            Err(err) => return Err(InfraError::InvalidUrl(err.to_string())),
        };

        if !request.query().is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in request.query() {
                match value {
                    Value::Null => {}
                    Value::Array(items) => {
                        for item in items {
                            pairs.append_pair(name, &query_value(item));
                        }
                    }
                    other => {
                        pairs.append_pair(name, &query_value(other));
                    }
                }
            }
        }

        Ok(url)
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url.as_ref().map(Url::as_str))
            .field("locale", &self.locale)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &RequestDescriptor, token: Option<&str>) -> TransportOutcome {
        let url = match self.resolve_url(request) {
            Ok(url) => url,
            Err(err) => {
                warn!(url = request.url(), error = %err, "request url cannot be resolved");
                return TransportOutcome::InvalidRequest(err.to_string());
            }
        };

        let request_id = Uuid::new_v4().to_string();
        let mut builder = self
            .client
            .request(reqwest_method(request.method()), url.clone())
            .header(REQUEST_ID_HEADER, request_id.as_str());

        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if request.header(LOCALE_HEADER).is_none() {
            if let Some(locale) = &self.locale {
                builder = builder.header(LOCALE_HEADER, locale.as_str());
            }
        }
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION_HEADER, format!("Bearer {token}"));
        }

        builder = match request.body() {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Text(text) => {
                if request.header("content-type").is_none() {
                    builder = builder.header(CONTENT_TYPE, "text/plain; charset=utf-8");
                }
                builder.body(text.clone())
            }
            RequestBody::Binary(bytes) => builder.body(bytes.clone()),
        };

        debug!(method = %request.method(), %url, %request_id, "sending HTTP request");

        let response = match builder.send().await {
            Ok(response) => response,
            Err(err) => {
                debug!(method = %request.method(), %url, error = %err, "HTTP request failed");
                let err = InfraError::from(err);
                if err.is_invalid_request() {
                    return TransportOutcome::InvalidRequest(err.to_string());
                }
                return TransportOutcome::NetworkFailure(err.to_string());
            }
        };

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(err) => {
                debug!(%url, status, error = %err, "response body could not be read");
                return TransportOutcome::NetworkFailure(InfraError::from(err).to_string());
            }
        };

        debug!(method = %request.method(), %url, status, "received HTTP response");
        TransportOutcome::from_response(snapshot(status, &headers, body))
    }
}

fn snapshot(status: u16, headers: &HeaderMap, body: bytes::Bytes) -> ApiResponse {
    headers.iter().fold(ApiResponse::new(status, body), |response, (name, value)| {
        match value.to_str() {
            Ok(value) => response.with_header(name.as_str(), value),
            Err(_) => response,
        }
    })
}

fn query_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

const fn reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Head => reqwest::Method::HEAD,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
        Method::Options => reqwest::Method::OPTIONS,
    }
}

/// Builder for [`HttpTransport`].
#[derive(Debug)]
pub struct HttpTransportBuilder {
    timeout: Duration,
    base_url: Option<String>,
    locale: Option<String>,
    user_agent: Option<String>,
    default_headers: Vec<(String, String)>,
}

impl Default for HttpTransportBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            base_url: None,
            locale: None,
            user_agent: None,
            default_headers: Vec::new(),
        }
    }
}

impl HttpTransportBuilder {
    /// Per-call timeout enforced by the client
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Base for relative request URLs
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Locale sent as `accept-language` unless the request sets its own
    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    pub fn build(self) -> InfraResult<HttpTransport> {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.default_headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|err| InfraError::InvalidHeader(err.to_string()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|err| InfraError::InvalidHeader(err.to_string()))?;
            headers.insert(name, value);
        }

        let mut builder =
            ReqwestClient::builder().timeout(self.timeout).no_proxy().default_headers(headers);
        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }
        let client = builder.build()?;

        // A trailing slash keeps the last base segment when joining.
        let base_url = self
            .base_url
            .map(|raw| {
                let raw = if raw.ends_with('/') { raw } else { format!("{raw}/") };
                Url::parse(&raw).map_err(|err| InfraError::InvalidUrl(err.to_string()))
            })
            .transpose()?;

        Ok(HttpTransport { client, base_url, locale: self.locale })
    }
}
