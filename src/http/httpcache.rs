//! In-memory HTTP cache for the cached backend.
//!
//! Only `GET` responses are stored. Supports:
//! - Cache-Control parsing (max-age, no-store, no-cache)
//! - ETag/If-None-Match and Last-Modified/If-Modified-Since revalidation
//! - Invalidation after a successful unsafe method on the same URL
//! - `Vary`: an entry is only reused for requests whose varying headers
//!   match the ones it was fetched with; `Vary: *` is never stored
//! - Entry-count and byte limits with eviction

use crate::http::response::{Backend, HttpResponse};
use bytes::Bytes;
use dashmap::DashMap;
use http::header::HeaderName;
use http::{header, HeaderMap, HeaderValue, StatusCode, Version};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use url::Url;

/// Default maximum number of entries.
pub const DEFAULT_MAX_ENTRIES: usize = 1000;
/// Default maximum total body size.
pub const DEFAULT_MAX_BYTES: usize = 50 * 1024 * 1024;

/// URL without fragment.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self(url.into())
    }
}

/// Cached response entry.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub status: StatusCode,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// When this entry was stored or last revalidated
    pub cached_at: Instant,
    /// Time-to-live from max-age; `None` means always stale
    pub ttl: Option<Duration>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    /// Request header values named by the response's `Vary`
    pub vary: Vec<(HeaderName, Vec<HeaderValue>)>,
}

impl CacheEntry {
    pub fn is_fresh(&self) -> bool {
        match self.ttl {
            Some(ttl) => self.cached_at.elapsed() < ttl,
            None => false,
        }
    }

    /// Whether `request_headers` select this entry under its `Vary`.
    pub fn matches(&self, request_headers: &HeaderMap) -> bool {
        self.vary
            .iter()
            .all(|(name, stored)| request_values(request_headers, name) == *stored)
    }

    /// `If-None-Match` / `If-Modified-Since` for this entry.
    pub fn conditional_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(value) = self.etag.as_deref().and_then(|v| HeaderValue::from_str(v).ok()) {
            headers.insert(header::IF_NONE_MATCH, value);
        }
        if let Some(value) = self
            .last_modified
            .as_deref()
            .and_then(|v| HeaderValue::from_str(v).ok())
        {
            headers.insert(header::IF_MODIFIED_SINCE, value);
        }
        headers
    }

    /// Rebuild the uniform response and content from this entry.
    pub fn to_response(&self) -> (HttpResponse, Option<Bytes>) {
        let response =
            HttpResponse::from_parts(Backend::Cached, self.status, self.version, &self.headers, None);
        (response, Some(self.body.clone()))
    }
}

/// Result of consulting the cache before a request.
#[derive(Debug)]
pub enum CacheLookup {
    /// Serve without I/O.
    Fresh(CacheEntry),
    /// Send these conditional headers; a `304` confirms the entry.
    Revalidate(HeaderMap),
    Miss,
}

/// Cache mode for controlling behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    #[default]
    Normal,
    /// Bypass cache for reads and writes
    Disabled,
    /// Only read from cache, don't write
    ReadOnly,
    /// Ignore fresh entries but still revalidate and store
    ForceRefresh,
}

/// Thread-safe in-memory HTTP cache.
pub struct HttpCache {
    entries: DashMap<CacheKey, CacheEntry>,
    max_entries: usize,
    current_size: AtomicUsize,
    max_size_bytes: usize,
    mode: CacheMode,
}

impl Default for HttpCache {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpCache {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_ENTRIES, DEFAULT_MAX_BYTES)
    }

    pub fn with_limits(max_entries: usize, max_size_bytes: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries: max_entries.max(1),
            current_size: AtomicUsize::new(0),
            max_size_bytes,
            mode: CacheMode::Normal,
        }
    }

    pub fn set_mode(&mut self, mode: CacheMode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> CacheMode {
        self.mode
    }

    /// Decide how a `GET` for `url`, sent with `request_headers`, should
    /// proceed.
    pub fn lookup(&self, url: &Url, request_headers: &HeaderMap) -> CacheLookup {
        if self.mode == CacheMode::Disabled {
            return CacheLookup::Miss;
        }
        let Some(entry) = self.entries.get(&CacheKey::new(url)).map(|e| e.clone()) else {
            return CacheLookup::Miss;
        };
        if !entry.matches(request_headers) {
            tracing::debug!(%url, "cached entry varies from request");
            return CacheLookup::Miss;
        }

        if entry.is_fresh() && self.mode != CacheMode::ForceRefresh {
            return CacheLookup::Fresh(entry);
        }
        let conditional = entry.conditional_headers();
        if conditional.is_empty() {
            CacheLookup::Miss
        } else {
            CacheLookup::Revalidate(conditional)
        }
    }

    /// Look up a fresh entry only.
    pub fn get(&self, url: &Url, request_headers: &HeaderMap) -> Option<CacheEntry> {
        match self.lookup(url, request_headers) {
            CacheLookup::Fresh(entry) => Some(entry),
            _ => None,
        }
    }

    /// Store a `GET` response fetched with `request_headers`.
    ///
    /// Returns whether the response was cacheable.
    pub fn store(
        &self,
        url: &Url,
        request_headers: &HeaderMap,
        status: StatusCode,
        version: Version,
        headers: &HeaderMap,
        body: Bytes,
    ) -> bool {
        if self.mode == CacheMode::Disabled || self.mode == CacheMode::ReadOnly {
            return false;
        }
        if !status.is_success() {
            return false;
        }

        let cache_control = parse_cache_control(headers);
        if cache_control.no_store {
            return false;
        }
        let Some(vary_names) = parse_vary(headers) else {
            return false;
        };
        // no-cache still allows storing, but every use must revalidate.
        let ttl = match (cache_control.no_cache, cache_control.max_age) {
            (false, Some(age)) => Some(Duration::from_secs(age)),
            _ => None,
        };

        let etag = header_string(headers, header::ETAG);
        let last_modified = header_string(headers, header::LAST_MODIFIED);
        if ttl.is_none() && etag.is_none() && last_modified.is_none() {
            return false;
        }
        if body.len() > self.max_size_bytes {
            return false;
        }

        let key = CacheKey::new(url);
        self.remove_by_key(&key);
        self.maybe_evict(body.len());

        let entry = CacheEntry {
            status,
            version,
            headers: headers.clone(),
            body,
            cached_at: Instant::now(),
            ttl,
            etag,
            last_modified,
            vary: vary_names
                .into_iter()
                .map(|name| {
                    let values = request_values(request_headers, &name);
                    (name, values)
                })
                .collect(),
        };
        self.current_size.fetch_add(entry.body.len(), Ordering::Relaxed);
        self.entries.insert(key, entry);
        true
    }

    /// Refresh an entry from a `304 Not Modified` and return it.
    pub fn update_from_not_modified(&self, url: &Url, headers: &HeaderMap) -> Option<CacheEntry> {
        let mut entry = self.entries.get_mut(&CacheKey::new(url))?;

        for name in [
            header::CACHE_CONTROL,
            header::ETAG,
            header::EXPIRES,
            header::DATE,
            header::LAST_MODIFIED,
        ] {
            if let Some(value) = headers.get(&name) {
                entry.headers.insert(name, value.clone());
            }
        }

        let cache_control = parse_cache_control(&entry.headers);
        entry.ttl = match (cache_control.no_cache, cache_control.max_age) {
            (false, Some(age)) => Some(Duration::from_secs(age)),
            _ => None,
        };
        entry.cached_at = Instant::now();
        if let Some(etag) = header_string(headers, header::ETAG) {
            entry.etag = Some(etag);
        }
        if let Some(last_modified) = header_string(headers, header::LAST_MODIFIED) {
            entry.last_modified = Some(last_modified);
        }

        Some(entry.clone())
    }

    /// Drop the entry for `url`, if any.
    pub fn invalidate(&self, url: &Url) {
        self.remove_by_key(&CacheKey::new(url));
    }

    pub fn clear(&self) {
        self.entries.clear();
        self.current_size.store(0, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn size_bytes(&self) -> usize {
        self.current_size.load(Ordering::Relaxed)
    }

    fn maybe_evict(&self, new_entry_size: usize) {
        while self.entries.len() >= self.max_entries {
            if !self.evict_one() {
                break;
            }
        }
        while self.current_size.load(Ordering::Relaxed) + new_entry_size > self.max_size_bytes {
            if !self.evict_one() {
                break;
            }
        }
    }

    /// Evict the entry cached longest ago.
    fn evict_one(&self) -> bool {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|e| e.value().cached_at)
            .map(|e| e.key().clone());
        match oldest {
            Some(key) => {
                self.remove_by_key(&key);
                true
            }
            None => false,
        }
    }

    fn remove_by_key(&self, key: &CacheKey) {
        if let Some((_, entry)) = self.entries.remove(key) {
            self.current_size.fetch_sub(entry.body.len(), Ordering::Relaxed);
        }
    }
}

fn header_string(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn request_values(headers: &HeaderMap, name: &HeaderName) -> Vec<HeaderValue> {
    headers.get_all(name).iter().cloned().collect()
}

/// Header names listed in `Vary`, or `None` for `Vary: *`.
fn parse_vary(headers: &HeaderMap) -> Option<Vec<HeaderName>> {
    let mut names = Vec::new();
    for value in headers.get_all(header::VARY) {
        let Ok(value) = value.to_str() else {
            return None;
        };
        for token in value.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            if token == "*" {
                return None;
            }
            // An unparseable name cannot be matched later.
            let name = HeaderName::from_bytes(token.as_bytes()).ok()?;
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    Some(names)
}

#[derive(Debug, Default)]
struct CacheControl {
    no_store: bool,
    no_cache: bool,
    max_age: Option<u64>,
}

fn parse_cache_control(headers: &HeaderMap) -> CacheControl {
    let mut cc = CacheControl::default();

    let Some(value) = headers
        .get(header::CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
    else {
        return cc;
    };

    for directive in value.split(',') {
        let directive = directive.trim().to_ascii_lowercase();
        if directive == "no-store" {
            cc.no_store = true;
        } else if directive == "no-cache" {
            cc.no_cache = true;
        } else if let Some(age) = directive.strip_prefix("max-age=") {
            if let Ok(age) = age.trim_matches('"').parse::<u64>() {
                cc.max_age = Some(age);
            }
        }
    }

    cc
}
