//! Request descriptors
//!
//! A [`RequestDescriptor`] captures everything the layer needs to key, cache
//! and send one logical request. Descriptors are built with consuming
//! setters and are never mutated after they are handed to the layer.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// HTTP method of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl Method {
    /// Canonical upper-case name
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
        }
    }

    /// GET-class methods: the only ones that are cached or deduplicated
    /// without an explicit opt-in.
    pub const fn is_read(self) -> bool {
        matches!(self, Self::Get | Self::Head)
    }

    /// Methods that change server state
    pub const fn is_mutation(self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch | Self::Delete)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request payload
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Text(String),
    /// Opaque binary or streamed payload (uploads). Never keyed.
    Binary(Bytes),
}

impl RequestBody {
    /// Whether the body can take part in a canonical key
    pub const fn is_keyable(&self) -> bool {
        !matches!(self, Self::Binary(_))
    }

    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// Immutable description of one logical request
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    method: Method,
    url: String,
    query: Map<String, Value>,
    body: RequestBody,
    headers: BTreeMap<String, String>,
    idempotent: bool,
    tags: BTreeSet<String>,
}

impl RequestDescriptor {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Map::new(),
            body: RequestBody::Empty,
            headers: BTreeMap::new(),
            idempotent: false,
            tags: BTreeSet::new(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::Put, url)
    }

    pub fn patch(url: impl Into<String>) -> Self {
        Self::new(Method::Patch, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::Delete, url)
    }

    /// Add a query parameter. Values may be nested objects or arrays.
    #[must_use]
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    #[must_use]
    pub fn with_text(mut self, body: impl Into<String>) -> Self {
        self.body = RequestBody::Text(body.into());
        self
    }

    #[must_use]
    pub fn with_binary(mut self, body: impl Into<Bytes>) -> Self {
        self.body = RequestBody::Binary(body.into());
        self
    }

    /// Add a header. Names are stored lower-cased.
    #[must_use]
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Opt a mutating request into single-flight deduplication
    #[must_use]
    pub const fn idempotent(mut self) -> Self {
        self.idempotent = true;
        self
    }

    /// Attach an invalidation tag
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub const fn method(&self) -> Method {
        self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub const fn query(&self) -> &Map<String, Value> {
        &self.query
    }

    pub const fn body(&self) -> &RequestBody {
        &self.body
    }

    pub const fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Header lookup, case-insensitive
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub const fn is_idempotent(&self) -> bool {
        self.idempotent
    }

    pub const fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// Reads are cacheable; everything else never is
    pub const fn is_cacheable(&self) -> bool {
        self.method.is_read() && self.body.is_keyable()
    }

    /// Reads always share in-flight calls; mutations only when opted in
    pub const fn is_dedupable(&self) -> bool {
        self.body.is_keyable() && (self.method.is_read() || self.idempotent)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn header_names_are_case_insensitive() {
        let request = RequestDescriptor::get("/characters").with_header("Accept-Language", "ar");

        assert_eq!(request.header("accept-language"), Some("ar"));
        assert_eq!(request.header("ACCEPT-LANGUAGE"), Some("ar"));
        assert!(request.headers().contains_key("accept-language"));
    }

    #[test]
    fn only_reads_are_cacheable() {
        assert!(RequestDescriptor::get("/characters").is_cacheable());
        assert!(!RequestDescriptor::put("/characters/42").is_cacheable());
        assert!(!RequestDescriptor::post("/progress").idempotent().is_cacheable());
    }

    #[test]
    fn mutations_dedupe_only_when_opted_in() {
        assert!(!RequestDescriptor::post("/progress").is_dedupable());
        assert!(RequestDescriptor::post("/progress").idempotent().is_dedupable());
        assert!(RequestDescriptor::get("/levels").is_dedupable());
    }

    #[test]
    fn binary_bodies_bypass_everything() {
        let upload = RequestDescriptor::post("/media").with_binary(vec![1_u8, 2, 3]).idempotent();

        assert!(!upload.body().is_keyable());
        assert!(!upload.is_dedupable());
        assert!(!upload.is_cacheable());
    }

    #[test]
    fn nested_query_values_are_kept() {
        let request = RequestDescriptor::get("/content")
            .with_query("filter", json!({"era": "abbasid", "tags": ["poetry"]}))
            .with_query("page", 2);

        assert_eq!(request.query()["page"], json!(2));
        assert_eq!(request.query()["filter"]["tags"][0], json!("poetry"));
    }

    #[test]
    fn method_display_matches_wire_name() {
        assert_eq!(Method::Patch.to_string(), "PATCH");
        assert!(Method::Head.is_read());
        assert!(Method::Delete.is_mutation());
        assert!(!Method::Options.is_mutation());
    }
}
