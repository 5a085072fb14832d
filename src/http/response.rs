//! The uniform response contract shared by every backend.

use crate::base::neterror::NetError;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode, Version};
use std::fmt;
use std::ops::Index;
use std::str::FromStr;

/// Key under which the numeric status is exposed alongside named headers.
pub const STATUS_KEY: &str = "status";

/// Which engine produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Backend {
    /// Structured client fronted by an HTTP cache.
    Cached,
    /// Handler-chain opener that signals non-2xx statuses as errors.
    Opener,
    /// Raw transfer whose header bytes go through the raw response parser.
    #[default]
    Transfer,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Backend::Cached => "cached",
            Backend::Opener => "opener",
            Backend::Transfer => "transfer",
        })
    }
}

/// Protocol version of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpVersion {
    Http10,
    Http11,
}

impl HttpVersion {
    /// Map an engine-reported version. Anything older than 1.1 is 1.0;
    /// newer protocols are reported as 1.1, the highest this contract knows.
    pub fn from_wire(version: Version) -> Self {
        if version == Version::HTTP_09 || version == Version::HTTP_10 {
            HttpVersion::Http10
        } else {
            HttpVersion::Http11
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpVersion::Http10 => "HTTP/1.0",
            HttpVersion::Http11 => "HTTP/1.1",
        }
    }
}

impl From<HttpVersion> for Version {
    fn from(v: HttpVersion) -> Self {
        match v {
            HttpVersion::Http10 => Version::HTTP_10,
            HttpVersion::Http11 => Version::HTTP_11,
        }
    }
}

/// Response header table.
///
/// Names are lower-cased on insert, duplicates are last-write-wins, and the
/// wire order of first appearance is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHeaders {
    entries: Vec<(String, String)>,
}

impl ResponseHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        let name = name.to_ascii_lowercase();
        let value = value.into();
        if let Some((_, v)) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            *v = value;
        } else {
            self.entries.push((name, value));
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Collect from a structured `http::HeaderMap`. Repeated names keep the
    /// last value; values that are not visible ASCII are decoded lossily.
    pub fn from_header_map(map: &HeaderMap) -> Self {
        let mut headers = Self::new();
        for (name, value) in map {
            let value = match value.to_str() {
                Ok(s) => s.to_string(),
                Err(_) => String::from_utf8_lossy(value.as_bytes()).into_owned(),
            };
            headers.insert(name.as_str(), value);
        }
        headers
    }
}

/// Backend-agnostic view of one HTTP response.
///
/// Constructed once per request from either an engine's structured response
/// or a parsed raw header block, and never mutated afterwards. The numeric
/// status is always available under the `status` key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    backend: Backend,
    status: StatusCode,
    reason: Option<String>,
    version: HttpVersion,
    headers: ResponseHeaders,
}

impl HttpResponse {
    /// Build a response; `headers` gets the synthetic `status` entry.
    pub fn new(
        backend: Backend,
        status: StatusCode,
        reason: Option<String>,
        version: HttpVersion,
        mut headers: ResponseHeaders,
    ) -> Self {
        headers.insert(STATUS_KEY, status.as_u16().to_string());
        Self {
            backend,
            status,
            reason,
            version,
            headers,
        }
    }

    /// Build from structured response parts (status, version, header map).
    /// The reason falls back to the canonical phrase for the status.
    pub fn from_parts(
        backend: Backend,
        status: StatusCode,
        version: Version,
        headers: &HeaderMap,
        reason: Option<&str>,
    ) -> Self {
        let reason = reason
            .or_else(|| status.canonical_reason())
            .map(str::to_string);
        Self::new(
            backend,
            status,
            reason,
            HttpVersion::from_wire(version),
            ResponseHeaders::from_header_map(headers),
        )
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn status_u16(&self) -> u16 {
        self.status.as_u16()
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn version(&self) -> HttpVersion {
        self.version
    }

    /// Look up a header (or `status`) by case-insensitive name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Look up a header, returning `default` when it is absent.
    pub fn get_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.get(name).unwrap_or(default)
    }

    /// Look up a header, failing with [`NetError::KeyNotFound`] when absent.
    pub fn try_get(&self, name: &str) -> Result<&str, NetError> {
        self.get(name).ok_or_else(|| NetError::KeyNotFound {
            key: name.to_ascii_lowercase(),
        })
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.headers.contains_key(name)
    }

    /// All known keys, including `status`.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.headers.keys()
    }

    pub fn headers(&self) -> &ResponseHeaders {
        &self.headers
    }

    /// Convenience accessor for `content-type`.
    pub fn content_type(&self) -> Option<&str> {
        self.get("content-type")
    }

    /// Convenience accessor for `location`.
    pub fn location(&self) -> Option<&str> {
        self.get("location")
    }

    /// Convert to an `http::HeaderMap`, without the synthetic `status` entry.
    /// Entries that are not valid header names or values are skipped.
    pub fn header_map(&self) -> HeaderMap {
        let mut map = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in self.headers.iter() {
            if name == STATUS_KEY {
                continue;
            }
            if let (Ok(n), Ok(v)) = (HeaderName::from_str(name), HeaderValue::from_str(value)) {
                map.insert(n, v);
            }
        }
        map
    }
}

impl<'a> Index<&'a str> for HttpResponse {
    type Output = str;

    /// # Panics
    ///
    /// Panics when no header named `name` exists; use [`HttpResponse::get`]
    /// or [`HttpResponse::try_get`] for a fallible lookup.
    fn index(&self, name: &'a str) -> &str {
        match self.get(name) {
            Some(value) => value,
            None => panic!("no header named {name:?} in response"),
        }
    }
}
