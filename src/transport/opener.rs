//! Opener backend: the handler-chain [`Opener`], with non-2xx errors turned
//! back into ordinary responses.

use crate::base::neterror::NetError;
use crate::client::{HttpLayer, TransportConfig};
use crate::http::credentials::Credentials;
use crate::http::opener::{
    OpenError, Opener, OpenerHandler, OpenerRequest, PreemptiveBasicAuth, UserAgent,
};
use crate::http::orderedheaders::OrderedHeaderMap;
use crate::http::request::TransportRequest;
use crate::http::response::{Backend, HttpResponse};
use bytes::Bytes;

#[derive(Debug)]
pub struct OpenerLayer {
    opener: Opener,
}

impl OpenerLayer {
    pub fn new(config: &TransportConfig) -> Self {
        let opener = Opener::builder()
            .tls(config.tls.clone())
            .timeout(config.timeout)
            .max_redirects(config.max_redirects)
            .handler(UserAgent(config.user_agent.clone()))
            .build();
        Self { opener }
    }

    pub fn opener(&self) -> &Opener {
        &self.opener
    }
}

impl HttpLayer for OpenerLayer {
    /// Rebuild the opener with a preemptive auth handler appended. Other
    /// handlers stay in place; an earlier auth handler is replaced.
    fn add_credentials(&mut self, username: &str, password: &str) {
        let auth = PreemptiveBasicAuth::new(Credentials::basic(username, password));
        self.opener = self
            .opener
            .to_builder()
            .without_handler(auth.name())
            .handler(auth)
            .build();
    }

    async fn request(
        &mut self,
        uri: &str,
        method: &str,
        headers: Option<&OrderedHeaderMap>,
        body: Option<Bytes>,
    ) -> Result<(HttpResponse, Option<Bytes>), NetError> {
        let request = TransportRequest::new(uri, method, headers, body)?;
        tracing::debug!(backend = "opener", method, url = %request.url, "request start");

        let opener_request = OpenerRequest::new(request.url, request.method)
            .with_headers(request.headers.to_header_map())
            .with_body(request.body);

        match self.opener.open(opener_request).await {
            Ok(opened) => {
                let reason = opened.reason();
                let response = HttpResponse::from_parts(
                    Backend::Opener,
                    opened.parts.status,
                    opened.parts.version,
                    &opened.parts.headers,
                    reason.as_deref(),
                );
                tracing::debug!(backend = "opener", status = %opened.parts.status, "request finished");
                Ok((response, Some(opened.body)))
            }
            Err(OpenError::Http(err)) => {
                let reason = err.reason();
                let (parts, content) = match err.read_body().await {
                    Ok((parts, body)) => (parts, Some(body)),
                    Err((parts, e)) => {
                        tracing::warn!(status = %parts.status, error = %e, "could not read error body");
                        (parts, None)
                    }
                };
                tracing::debug!(backend = "opener", status = %parts.status, "request finished with error status");
                let response = HttpResponse::from_parts(
                    Backend::Opener,
                    parts.status,
                    parts.version,
                    &parts.headers,
                    reason.as_deref(),
                );
                Ok((response, content))
            }
            Err(OpenError::Net(e)) => Err(e),
        }
    }
}
