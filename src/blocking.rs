//! Blocking façade.
//!
//! [`BlockingTransport`] owns a current-thread runtime and blocks the calling
//! thread for the whole round trip: connect, send, and full body receive.
//! It must not be used from inside an async context.

use crate::base::neterror::NetError;
use crate::client::{HttpLayer, Transport, TransportBuilder};
use crate::http::orderedheaders::OrderedHeaderMap;
use crate::http::response::{Backend, HttpResponse};
use bytes::Bytes;
use tokio::runtime::{Builder, Runtime};

pub struct BlockingTransport {
    runtime: Runtime,
    inner: Transport,
}

impl std::fmt::Debug for BlockingTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingTransport")
            .field("inner", &self.inner)
            .finish()
    }
}

impl BlockingTransport {
    pub fn new() -> Result<Self, NetError> {
        Self::from_builder(Transport::builder())
    }

    /// Build the async transport inside the owned runtime.
    pub fn from_builder(builder: TransportBuilder) -> Result<Self, NetError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| NetError::transport(format!("runtime: {e}")))?;
        // reqwest needs a runtime context when its client is built.
        let inner = {
            let _guard = runtime.enter();
            builder.build()?
        };
        Ok(Self { runtime, inner })
    }

    pub fn backend(&self) -> Backend {
        self.inner.backend()
    }

    pub fn add_credentials(&mut self, username: &str, password: &str) {
        self.inner.add_credentials(username, password);
    }

    /// Blocking form of [`HttpLayer::request`].
    pub fn request(
        &mut self,
        uri: &str,
        method: &str,
        headers: Option<&OrderedHeaderMap>,
        body: Option<Bytes>,
    ) -> Result<(HttpResponse, Option<Bytes>), NetError> {
        self.runtime
            .block_on(self.inner.request(uri, method, headers, body))
    }
}
