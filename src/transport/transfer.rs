//! Transfer backend: raw socket transfer plus the raw response parser.
//!
//! The engine hands back header bytes and body bytes separately. A
//! [`TransferJob`] collects both for one request, tracks its [`LoadState`],
//! and parses the header bytes once the final block is in.

use crate::base::loadstate::LoadState;
use crate::base::neterror::NetError;
use crate::client::{HttpLayer, TransportConfig};
use crate::http::credentials::Credentials;
use crate::http::orderedheaders::OrderedHeaderMap;
use crate::http::rawresponse::{parse_response_head, ResponseHead};
use crate::http::request::TransportRequest;
use crate::http::response::{Backend, HttpResponse};
use crate::socket::connectjob::ConnectJob;
use crate::socket::transfer::{perform, TransferOptions, TransferSink};
use crate::transport::authorize;
use bytes::{Bytes, BytesMut};

/// Buffers and state of one request on the transfer backend.
#[derive(Debug, Default)]
pub struct TransferJob {
    state: LoadState,
    header_buf: BytesMut,
    body_buf: BytesMut,
    head: Option<ResponseHead>,
}

impl TransferJob {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    fn advance(&mut self, next: LoadState) {
        if self.state == next && next != LoadState::SkipInterim {
            return;
        }
        if !self.state.can_advance_to(next) {
            tracing::debug!(from = ?self.state, to = ?next, "unexpected load state transition");
        }
        tracing::trace!(from = ?self.state, to = ?next, "load state");
        self.state = next;
    }

    pub fn start(&mut self) {
        self.advance(LoadState::Sending);
    }

    /// Mark the job failed and pass the error through.
    pub fn fail(&mut self, err: NetError) -> NetError {
        if !self.state.is_terminal() {
            tracing::debug!(state = ?self.state, error = %err, "transfer failed");
            self.state = LoadState::Failed;
        }
        err
    }

    /// Hand back the parsed response and the body.
    pub fn finish(mut self) -> Result<(HttpResponse, Option<Bytes>), NetError> {
        let head = self.head.take().ok_or(NetError::EmptyResponse)?;
        self.advance(LoadState::Done);
        let response = head.into_response(Backend::Transfer);
        Ok((response, Some(self.body_buf.freeze())))
    }
}

impl TransferSink for TransferJob {
    fn on_request_sent(&mut self) {
        self.advance(LoadState::AwaitingHeaders);
    }

    fn on_header(&mut self, block: &[u8], interim: bool) -> Result<(), NetError> {
        self.header_buf.extend_from_slice(block);
        if interim {
            self.advance(LoadState::SkipInterim);
        }
        Ok(())
    }

    fn on_headers_complete(&mut self) -> Result<(), NetError> {
        self.advance(LoadState::ParsingHeaders);
        let head = parse_response_head(&self.header_buf)?;
        tracing::debug!(
            status = %head.status,
            interim_skipped = head.interim_skipped,
            "response head parsed"
        );
        self.head = Some(head);
        self.advance(LoadState::StreamingBody);
        Ok(())
    }

    fn on_body(&mut self, chunk: &[u8]) -> Result<(), NetError> {
        self.body_buf.extend_from_slice(chunk);
        Ok(())
    }
}

#[derive(Debug)]
pub struct TransferLayer {
    connector: ConnectJob,
    options: TransferOptions,
    credentials: Option<Credentials>,
}

impl TransferLayer {
    pub fn new(config: &TransportConfig) -> Self {
        Self {
            connector: ConnectJob::new(config.tls.clone(), config.timeout),
            options: config.transfer_options(),
            credentials: None,
        }
    }
}

impl HttpLayer for TransferLayer {
    fn add_credentials(&mut self, username: &str, password: &str) {
        self.credentials = Some(Credentials::basic(username, password));
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
        tracing::debug!(backend = "transfer", method, url = %request.url, "request start");

        let mut job = TransferJob::new();
        job.start();
        if let Err(e) = perform(&self.connector, &request, &self.options, &mut job).await {
            return Err(job.fail(e));
        }

        let (response, content) = job.finish()?;
        tracing::debug!(
            backend = "transfer",
            status = %response.status(),
            bytes = content.as_ref().map_or(0, |c| c.len()),
            "request finished"
        );
        Ok((response, content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_skips_interim_block() {
        let mut job = TransferJob::new();
        job.start();
        job.on_request_sent();
        job.on_header(b"HTTP/1.1 100 Continue\r\n\r\n", true).unwrap();
        assert_eq!(job.state(), LoadState::SkipInterim);
        job.on_header(b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\r\n", false)
            .unwrap();
        job.on_headers_complete().unwrap();
        assert_eq!(job.state(), LoadState::StreamingBody);
        job.on_body(b"hello ").unwrap();
        job.on_body(b"world").unwrap();

        let (resp, content) = job.finish().unwrap();
        assert_eq!(resp.status_u16(), 200);
        assert_eq!(resp.backend(), Backend::Transfer);
        assert_eq!(resp.get("content-type"), Some("text/plain"));
        assert_eq!(content.unwrap(), Bytes::from_static(b"hello world"));
    }

    #[test]
    fn test_job_fails_on_malformed_head() {
        let mut job = TransferJob::new();
        job.start();
        job.on_request_sent();
        job.on_header(b"FOO/1.1 200 OK\r\n\r\n", false).unwrap();
        let err = job.on_headers_complete().unwrap_err();
        let err = job.fail(err);
        assert!(matches!(err, NetError::MalformedStatusLine { .. }));
        assert_eq!(job.state(), LoadState::Failed);
    }

    #[test]
    fn test_finish_without_head() {
        let job = TransferJob::new();
        assert!(matches!(job.finish(), Err(NetError::EmptyResponse)));
    }
}
