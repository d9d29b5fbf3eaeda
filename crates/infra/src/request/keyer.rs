//! Canonical request keys
//!
//! A [`CacheKey`] is a BLAKE3 digest over a canonical, type-tagged and
//! length-prefixed encoding of the descriptor. Object keys are visited in
//! sorted order at every depth, so field order never changes a key; array
//! order is preserved because it is meaningful. Only whitelisted headers take
//! part.
//!
//! Distinct descriptors collide only if BLAKE3 does. The probability is
//! negligible but not zero, and a collision would serve one request's cached
//! response to another.

use std::collections::BTreeSet;
use std::fmt;

use footsteps_domain::{RequestBody, RequestDescriptor, RequestLayerConfig};
use serde_json::{Map, Value};

const KEY_CONTEXT: &[u8] = b"footsteps.request-key.v1";

/// Fixed-width key identifying a request shape
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey({})", &hex::encode(self.0)[..12])
    }
}

/// Derives [`CacheKey`]s from descriptors
#[derive(Debug, Clone)]
pub struct RequestKeyer {
    headers: BTreeSet<String>,
}

impl RequestKeyer {
    /// Keyer that includes the given response-affecting headers
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self { headers: headers.into_iter().map(|h| h.as_ref().to_ascii_lowercase()).collect() }
    }

    pub fn from_config(config: &RequestLayerConfig) -> Self {
        Self::new(&config.key_headers)
    }

    pub const fn headers(&self) -> &BTreeSet<String> {
        &self.headers
    }

    /// Key for `request`, or `None` when its body cannot be keyed
    pub fn key(&self, request: &RequestDescriptor) -> Option<CacheKey> {
        if !request.body().is_keyable() {
            return None;
        }

        let mut hasher = blake3::Hasher::new();
        write_bytes(&mut hasher, KEY_CONTEXT);
        write_bytes(&mut hasher, request.method().as_str().as_bytes());
        write_bytes(&mut hasher, request.url().as_bytes());
        write_object(&mut hasher, request.query());

        match request.body() {
            RequestBody::Empty => {
                hasher.update(b"E");
            }
            RequestBody::Json(value) => {
                hasher.update(b"J");
                write_value(&mut hasher, value);
            }
            RequestBody::Text(text) => {
                hasher.update(b"T");
                write_bytes(&mut hasher, text.as_bytes());
            }
            RequestBody::Binary(_) => return None,
        }

        let included: Vec<(&String, &String)> =
            request.headers().iter().filter(|(name, _)| self.headers.contains(*name)).collect();
        write_len(&mut hasher, included.len());
        for (name, value) in included {
            write_bytes(&mut hasher, name.as_bytes());
            write_bytes(&mut hasher, value.as_bytes());
        }

        Some(CacheKey(*hasher.finalize().as_bytes()))
    }
}

fn write_len(hasher: &mut blake3::Hasher, len: usize) {
    hasher.update(&(len as u64).to_le_bytes());
}

fn write_bytes(hasher: &mut blake3::Hasher, bytes: &[u8]) {
    write_len(hasher, bytes.len());
    hasher.update(bytes);
}

fn write_object(hasher: &mut blake3::Hasher, map: &Map<String, Value>) {
    hasher.update(b"{");
    write_len(hasher, map.len());
    let mut entries: Vec<(&String, &Value)> = map.iter().collect();
    entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
    for (name, value) in entries {
        write_bytes(hasher, name.as_bytes());
        write_value(hasher, value);
    }
}

fn write_value(hasher: &mut blake3::Hasher, value: &Value) {
    match value {
        Value::Null => {
            hasher.update(b"n");
        }
        Value::Bool(flag) => {
            hasher.update(if *flag { b"t" } else { b"f" });
        }
        Value::Number(number) => {
            hasher.update(b"#");
            write_bytes(hasher, number.to_string().as_bytes());
        }
        Value::String(text) => {
            hasher.update(b"s");
            write_bytes(hasher, text.as_bytes());
        }
        Value::Array(items) => {
            hasher.update(b"[");
            write_len(hasher, items.len());
            for item in items {
                write_value(hasher, item);
            }
        }
        Value::Object(map) => write_object(hasher, map),
    }
}
