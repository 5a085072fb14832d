//! Cached backend: reqwest in front of the in-memory [`HttpCache`].

use crate::base::neterror::NetError;
use crate::client::{HttpLayer, TransportConfig};
use crate::http::credentials::Credentials;
use crate::http::httpcache::{CacheLookup, HttpCache};
use crate::http::orderedheaders::OrderedHeaderMap;
use crate::http::request::TransportRequest;
use crate::http::requestbody::RequestBody;
use crate::http::response::{Backend, HttpResponse};
use crate::transport::authorize;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};

pub struct CachedLayer {
    client: reqwest::Client,
    cache: HttpCache,
    credentials: Option<Credentials>,
}

impl std::fmt::Debug for CachedLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedLayer")
            .field("cached_entries", &self.cache.len())
            .field("credentials", &self.credentials)
            .finish()
    }
}

impl CachedLayer {
    pub fn new(config: &TransportConfig) -> Result<Self, NetError> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects));
        for root in &config.tls.extra_roots {
            let cert = reqwest::Certificate::from_der(root.as_ref())
                .map_err(|_| NetError::SslProtocolError)?;
            builder = builder.add_root_certificate(cert);
        }
        let client = builder.build()?;
        Ok(Self {
            client,
            cache: HttpCache::with_limits(config.cache_max_entries, config.cache_max_bytes),
            credentials: None,
        })
    }

    pub fn cache(&self) -> &HttpCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut HttpCache {
        &mut self.cache
    }

    async fn send(
        &self,
        request: &TransportRequest,
        conditional: &HeaderMap,
    ) -> Result<(StatusCode, http::Version, HeaderMap, Bytes), NetError> {
        let mut headers = request.headers.to_header_map();
        for (name, value) in conditional {
            if !headers.contains_key(name) {
                headers.insert(name.clone(), value.clone());
            }
        }

        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(headers);
        if let RequestBody::Bytes(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status();
        let version = response.version();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        Ok((status, version, headers, body))
    }
}

impl HttpLayer for CachedLayer {
    /// Entries fetched under the previous identity are dropped.
    fn add_credentials(&mut self, username: &str, password: &str) {
        self.credentials = Some(Credentials::basic(username, password));
        self.cache.clear();
    }

    async fn request(
        &mut self,
        uri: &str,
        method: &str,
        headers: Option<&OrderedHeaderMap>,
        body: Option<Bytes>,
    ) -> Result<(HttpResponse, Option<Bytes>), NetError> {
        let mut request = TransportRequest::new(uri, method, headers, body)?;
        authorize(&mut request, self.credentials.as_ref())?;
        tracing::debug!(backend = "cached", method, url = %request.url, "request start");

        let is_get = request.method == Method::GET;
        let request_headers = request.headers.to_header_map();
        let mut conditional = HeaderMap::new();
        if is_get {
            match self.cache.lookup(&request.url, &request_headers) {
                CacheLookup::Fresh(entry) => {
                    tracing::debug!(url = %request.url, "cache hit");
                    return Ok(entry.to_response());
                }
                CacheLookup::Revalidate(headers) => {
                    tracing::debug!(url = %request.url, "revalidating cached entry");
                    conditional = headers;
                }
                CacheLookup::Miss => {}
            }
        }

        let (status, version, headers, body) = self.send(&request, &conditional).await?;

        if status == StatusCode::NOT_MODIFIED && !conditional.is_empty() {
            if let Some(entry) = self.cache.update_from_not_modified(&request.url, &headers) {
                tracing::debug!(url = %request.url, "cached entry confirmed by 304");
                return Ok(entry.to_response());
            }
        }

        if is_get {
            self.cache
                .store(&request.url, &request_headers, status, version, &headers, body.clone());
        } else if status.is_success() {
            self.cache.invalidate(&request.url);
        }

        tracing::debug!(backend = "cached", %status, bytes = body.len(), "request finished");
        let response = HttpResponse::from_parts(Backend::Cached, status, version, &headers, None);
        Ok((response, Some(body)))
    }
}
