//! Transport façade with builder pattern.
//!
//! Protocol code talks to [`HttpLayer`]; which engine sits behind it is
//! picked once, when the [`Transport`] is built.
//!
//! # Example
//!
//! ```rust,no_run
//! use swordnet::{Backend, HttpLayer, Transport};
//!
//! # async fn run() -> Result<(), swordnet::NetError> {
//! let mut transport = Transport::builder().backend(Backend::Opener).build()?;
//! transport.add_credentials("sword", "sword");
//!
//! let (resp, content) = transport
//!     .request("http://localhost:8080/sd-uri", "GET", None, None)
//!     .await?;
//! println!("{} {:?}", resp.status_u16(), content.map(|c| c.len()));
//! # Ok(())
//! # }
//! ```

use crate::base::neterror::NetError;
use crate::http::httpcache::{DEFAULT_MAX_BYTES, DEFAULT_MAX_ENTRIES};
use crate::http::orderedheaders::OrderedHeaderMap;
use crate::http::response::{Backend, HttpResponse};
use crate::socket::tls::TlsConfig;
use crate::socket::transfer::{TransferOptions, MAX_HEADER_BYTES};
use crate::transport::cached::CachedLayer;
use crate::transport::opener::OpenerLayer;
use crate::transport::transfer::TransferLayer;
use bytes::Bytes;
use std::future::Future;
use std::time::Duration;

/// Request/response interface shared by every backend.
pub trait HttpLayer {
    /// Store credentials, applied preemptively from the next request on.
    fn add_credentials(&mut self, username: &str, password: &str);

    /// Perform one request and return the response with its full body.
    ///
    /// `method` must be one of `GET`, `POST`, `PUT`, `DELETE`. HTTP error
    /// statuses are returned as ordinary responses; only request validation,
    /// connection failures and unparseable responses are errors.
    fn request(
        &mut self,
        uri: &str,
        method: &str,
        headers: Option<&OrderedHeaderMap>,
        body: Option<Bytes>,
    ) -> impl Future<Output = Result<(HttpResponse, Option<Bytes>), NetError>> + Send;
}

/// Settings shared by all backends.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub backend: Backend,
    /// Bound on connect and on each read/write.
    pub timeout: Duration,
    pub user_agent: String,
    pub max_redirects: usize,
    pub cache_max_entries: usize,
    pub cache_max_bytes: usize,
    /// Bodies at least this large are sent with `Expect: 100-continue` by
    /// the transfer backend. `None` disables it.
    pub expect_continue_threshold: Option<usize>,
    pub expect_continue_timeout: Duration,
    pub tls: TlsConfig,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            timeout: Duration::from_secs(30),
            user_agent: concat!("swordnet/", env!("CARGO_PKG_VERSION")).to_string(),
            max_redirects: 5,
            cache_max_entries: DEFAULT_MAX_ENTRIES,
            cache_max_bytes: DEFAULT_MAX_BYTES,
            expect_continue_threshold: Some(1024),
            expect_continue_timeout: Duration::from_secs(1),
            tls: TlsConfig::default(),
        }
    }
}

impl TransportConfig {
    pub(crate) fn transfer_options(&self) -> TransferOptions {
        TransferOptions {
            timeout: self.timeout,
            user_agent: self.user_agent.clone(),
            expect_continue_threshold: self.expect_continue_threshold,
            expect_continue_timeout: self.expect_continue_timeout,
            send_chunk_size: 16 * 1024,
            max_header_bytes: MAX_HEADER_BYTES,
        }
    }
}

/// A transport bound to one backend.
#[derive(Debug)]
pub enum Transport {
    Cached(CachedLayer),
    Opener(OpenerLayer),
    Transfer(TransferLayer),
}

impl Transport {
    /// Transport with default settings (transfer backend).
    pub fn new() -> Result<Self, NetError> {
        Self::from_config(TransportConfig::default())
    }

    pub fn builder() -> TransportBuilder {
        TransportBuilder::default()
    }

    pub fn from_config(config: TransportConfig) -> Result<Self, NetError> {
        tracing::debug!(backend = %config.backend, "building transport");
        Ok(match config.backend {
            Backend::Cached => Transport::Cached(CachedLayer::new(&config)?),
            Backend::Opener => Transport::Opener(OpenerLayer::new(&config)),
            Backend::Transfer => Transport::Transfer(TransferLayer::new(&config)),
        })
    }

    pub fn backend(&self) -> Backend {
        match self {
            Transport::Cached(_) => Backend::Cached,
            Transport::Opener(_) => Backend::Opener,
            Transport::Transfer(_) => Backend::Transfer,
        }
    }
}

impl HttpLayer for Transport {
    fn add_credentials(&mut self, username: &str, password: &str) {
        match self {
            Transport::Cached(layer) => layer.add_credentials(username, password),
            Transport::Opener(layer) => layer.add_credentials(username, password),
            Transport::Transfer(layer) => layer.add_credentials(username, password),
        }
    }

    async fn request(
        &mut self,
        uri: &str,
        method: &str,
        headers: Option<&OrderedHeaderMap>,
        body: Option<Bytes>,
    ) -> Result<(HttpResponse, Option<Bytes>), NetError> {
        match self {
            Transport::Cached(layer) => layer.request(uri, method, headers, body).await,
            Transport::Opener(layer) => layer.request(uri, method, headers, body).await,
            Transport::Transfer(layer) => layer.request(uri, method, headers, body).await,
        }
    }
}

/// Builder for [`Transport`].
#[derive(Debug, Default)]
pub struct TransportBuilder {
    config: TransportConfig,
}

impl TransportBuilder {
    pub fn backend(mut self, backend: Backend) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    pub fn max_redirects(mut self, max: usize) -> Self {
        self.config.max_redirects = max;
        self
    }

    /// Limits of the cached backend's store.
    pub fn cache_limits(mut self, max_entries: usize, max_bytes: usize) -> Self {
        self.config.cache_max_entries = max_entries;
        self.config.cache_max_bytes = max_bytes;
        self
    }

    pub fn expect_continue_threshold(mut self, threshold: Option<usize>) -> Self {
        self.config.expect_continue_threshold = threshold;
        self
    }

    pub fn expect_continue_timeout(mut self, timeout: Duration) -> Self {
        self.config.expect_continue_timeout = timeout;
        self
    }

    pub fn tls(mut self, tls: TlsConfig) -> Self {
        self.config.tls = tls;
        self
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn build(self) -> Result<Transport, NetError> {
        Transport::from_config(self.config)
    }
}
