//! Handler-chain opener on hyper's HTTP/1.1 client connection.
//!
//! Every request passes through the installed [`OpenerHandler`]s before it
//! is sent. Only `2xx` responses come back as `Ok`; every other status is
//! reported as [`OpenError::Http`], which still carries the response head
//! and the unread body.

use crate::base::context::DeadlineExt;
use crate::base::neterror::NetError;
use crate::http::credentials::Credentials;
use crate::http::request::{host_header, origin_form};
use crate::http::requestbody::RequestBody;
use crate::socket::connectjob::ConnectJob;
use crate::socket::tls::TlsConfig;
use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_LENGTH, HOST, LOCATION, USER_AGENT};
use http::{HeaderMap, HeaderValue, Method, Request, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use url::Url;

/// A step applied to every outgoing request.
pub trait OpenerHandler: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn process_request(&self, parts: &mut http::request::Parts) -> Result<(), NetError>;
}

/// Sends `Basic` credentials on the first round trip.
///
/// A request that already carries `Authorization` is left alone.
#[derive(Debug)]
pub struct PreemptiveBasicAuth {
    credentials: Credentials,
}

impl PreemptiveBasicAuth {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

impl OpenerHandler for PreemptiveBasicAuth {
    fn name(&self) -> &'static str {
        "preemptive-basic-auth"
    }

    fn process_request(&self, parts: &mut http::request::Parts) -> Result<(), NetError> {
        if !parts.headers.contains_key(AUTHORIZATION) {
            parts
                .headers
                .insert(AUTHORIZATION, self.credentials.header_value()?);
        }
        Ok(())
    }
}

/// Fills in `User-Agent` when the caller did not set one.
#[derive(Debug)]
pub struct UserAgent(pub String);

impl OpenerHandler for UserAgent {
    fn name(&self) -> &'static str {
        "user-agent"
    }

    fn process_request(&self, parts: &mut http::request::Parts) -> Result<(), NetError> {
        if !parts.headers.contains_key(USER_AGENT) {
            let value = HeaderValue::from_str(&self.0).map_err(|_| NetError::InvalidHeader)?;
            parts.headers.insert(USER_AGENT, value);
        }
        Ok(())
    }
}

/// A request for [`Opener::open`].
///
/// The method is fixed at construction.
#[derive(Debug, Clone)]
pub struct OpenerRequest {
    url: Url,
    method: Method,
    headers: HeaderMap,
    body: RequestBody,
}

impl OpenerRequest {
    pub fn new(url: Url, method: Method) -> Self {
        Self {
            url,
            method,
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

/// A `2xx` response with its body fully read.
#[derive(Debug)]
pub struct OpenedResponse {
    pub parts: http::response::Parts,
    pub body: Bytes,
    /// URL the response came from, after redirects.
    pub url: Url,
}

impl OpenedResponse {
    pub fn status(&self) -> StatusCode {
        self.parts.status
    }

    pub fn reason(&self) -> Option<String> {
        reason_phrase(&self.parts)
    }
}

/// A non-`2xx` response reported as an error.
#[derive(Debug)]
pub struct HttpError {
    pub parts: http::response::Parts,
    body: Incoming,
    read_timeout: Duration,
}

impl HttpError {
    pub fn status(&self) -> StatusCode {
        self.parts.status
    }

    pub fn reason(&self) -> Option<String> {
        reason_phrase(&self.parts)
    }

    /// Read the error body. Consumes the error.
    pub async fn read_body(self) -> Result<(http::response::Parts, Bytes), (http::response::Parts, NetError)> {
        let Self {
            parts,
            body,
            read_timeout,
        } = self;
        match collect_body(body, read_timeout).await {
            Ok(bytes) => Ok((parts, bytes)),
            Err(e) => Err((parts, e)),
        }
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP Error {}", self.parts.status)
    }
}

/// Failure of [`Opener::open`].
#[derive(Debug, Error)]
pub enum OpenError {
    /// The server answered with a non-2xx status.
    #[error("{0}")]
    Http(HttpError),
    #[error(transparent)]
    Net(#[from] NetError),
}

/// Reason phrase as sent by the server, or the canonical one.
fn reason_phrase(parts: &http::response::Parts) -> Option<String> {
    match parts.extensions.get::<hyper::ext::ReasonPhrase>() {
        Some(reason) => Some(String::from_utf8_lossy(reason.as_bytes()).into_owned()),
        None => parts.status.canonical_reason().map(str::to_string),
    }
}

async fn collect_body(body: Incoming, read_timeout: Duration) -> Result<Bytes, NetError> {
    let collected = timeout(read_timeout, body.collect())
        .await
        .within_deadline("read body")?;
    Ok(collected.to_bytes())
}

fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme()
        && a.host_str() == b.host_str()
        && a.port_or_known_default() == b.port_or_known_default()
}

/// Opens URLs through a chain of handlers.
#[derive(Debug, Clone)]
pub struct Opener {
    handlers: Vec<Arc<dyn OpenerHandler>>,
    connector: ConnectJob,
    max_redirects: usize,
}

impl Default for Opener {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Opener {
    pub fn builder() -> OpenerBuilder {
        OpenerBuilder::default()
    }

    pub fn handlers(&self) -> &[Arc<dyn OpenerHandler>] {
        &self.handlers
    }

    /// A builder preloaded with this opener's handlers and settings.
    pub fn to_builder(&self) -> OpenerBuilder {
        OpenerBuilder {
            handlers: self.handlers.clone(),
            tls: None,
            connector: Some(self.connector.clone()),
            timeout: self.connector.timeout(),
            max_redirects: self.max_redirects,
        }
    }

    /// Perform `request`, following redirects for `GET`.
    pub async fn open(&self, request: OpenerRequest) -> Result<OpenedResponse, OpenError> {
        let OpenerRequest {
            mut url,
            method,
            headers,
            body,
        } = request;

        let (mut parts, ()) = Request::builder()
            .method(method.clone())
            .uri(origin_form(&url))
            .body(())
            .map_err(|_| NetError::InvalidUrl)?
            .into_parts();
        parts.headers = headers;
        for handler in &self.handlers {
            handler.process_request(&mut parts)?;
            tracing::debug!(handler = handler.name(), "request processed");
        }
        if body.is_present() {
            parts.headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        }
        let body = body.into_bytes();

        let mut redirects = 0;
        loop {
            let response = self.round_trip(&url, &parts, body.clone()).await?;
            let status = response.status();
            tracing::debug!(%url, %method, %status, "opener round trip finished");

            if status.is_redirection() && method == Method::GET {
                if let Some(next) = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|loc| url.join(loc).ok())
                {
                    redirects += 1;
                    if redirects > self.max_redirects {
                        return Err(NetError::TooManyRedirects.into());
                    }
                    if !same_origin(&url, &next) {
                        parts.headers.remove(AUTHORIZATION);
                    }
                    tracing::debug!(from = %url, to = %next, "following redirect");
                    url = next;
                    continue;
                }
            }

            let (resp_parts, incoming) = response.into_parts();
            if status.is_success() {
                let body = collect_body(incoming, self.connector.timeout()).await?;
                return Ok(OpenedResponse {
                    parts: resp_parts,
                    body,
                    url,
                });
            }
            return Err(OpenError::Http(HttpError {
                parts: resp_parts,
                body: incoming,
                read_timeout: self.connector.timeout(),
            }));
        }
    }

    async fn round_trip(
        &self,
        url: &Url,
        template: &http::request::Parts,
        body: Bytes,
    ) -> Result<http::Response<Incoming>, NetError> {
        let socket = self.connector.connect(url).await?;
        let io = TokioIo::new(socket);
        let (mut sender, conn) = http1::handshake::<_, Full<Bytes>>(io).await?;
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!(error = %e, "opener connection closed with error");
            }
        });

        let mut request = Request::builder()
            .method(template.method.clone())
            .uri(origin_form(url))
            .body(Full::new(body))
            .map_err(|_| NetError::InvalidUrl)?;
        *request.headers_mut() = template.headers.clone();
        let host = HeaderValue::from_str(&host_header(url)?).map_err(|_| NetError::InvalidUrl)?;
        request.headers_mut().insert(HOST, host);

        timeout(self.connector.timeout(), sender.send_request(request))
            .await
            .within_deadline("send request")
    }
}

/// Builder for [`Opener`].
pub struct OpenerBuilder {
    handlers: Vec<Arc<dyn OpenerHandler>>,
    tls: Option<TlsConfig>,
    connector: Option<ConnectJob>,
    timeout: Duration,
    max_redirects: usize,
}

impl Default for OpenerBuilder {
    fn default() -> Self {
        Self {
            handlers: Vec::new(),
            tls: None,
            connector: None,
            timeout: Duration::from_secs(30),
            max_redirects: 5,
        }
    }
}

impl OpenerBuilder {
    /// Append a handler to the chain.
    pub fn handler<H: OpenerHandler + 'static>(mut self, handler: H) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// Drop every handler called `name`.
    pub fn without_handler(mut self, name: &str) -> Self {
        self.handlers.retain(|h| h.name() != name);
        self
    }

    pub fn tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self.connector = None;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self.connector = None;
        self
    }

    pub fn max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }

    pub fn build(self) -> Opener {
        let connector = self
            .connector
            .unwrap_or_else(|| ConnectJob::new(self.tls.unwrap_or_default(), self.timeout));
        Opener {
            handlers: self.handlers,
            connector,
            max_redirects: self.max_redirects,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve `responses` on consecutive connections, returning each
    /// request head through the channel.
    async fn serve(
        responses: Vec<&'static str>,
    ) -> (Url, tokio::sync::mpsc::UnboundedReceiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        tokio::spawn(async move {
            for response in responses {
                let (mut s, _) = listener.accept().await.unwrap();
                let mut buf = vec![0u8; 8192];
                let n = s.read(&mut buf).await.unwrap();
                let _ = tx.send(String::from_utf8_lossy(&buf[..n]).into_owned());
                s.write_all(response.as_bytes()).await.unwrap();
            }
        });
        (Url::parse(&format!("http://{}/", addr)).unwrap(), rx)
    }

    #[test]
    fn test_handler_chain_preserved_by_to_builder() {
        let opener = Opener::builder().handler(UserAgent("ua".into())).build();
        let rebuilt = opener
            .to_builder()
            .handler(PreemptiveBasicAuth::new(Credentials::basic("u", "p")))
            .build();
        let names: Vec<_> = rebuilt.handlers().iter().map(|h| h.name()).collect();
        assert_eq!(names, ["user-agent", "preemptive-basic-auth"]);
        assert_eq!(opener.handlers().len(), 1);

        let stripped = rebuilt.to_builder().without_handler("preemptive-basic-auth").build();
        assert_eq!(stripped.handlers().len(), 1);
    }

    #[test]
    fn test_preemptive_auth_respects_caller_header() {
        let handler = PreemptiveBasicAuth::new(Credentials::basic("user", "pass"));

        let (mut parts, ()) = Request::builder().uri("/").body(()).unwrap().into_parts();
        handler.process_request(&mut parts).unwrap();
        assert_eq!(parts.headers[AUTHORIZATION], "Basic dXNlcjpwYXNz");

        let (mut parts, ()) = Request::builder()
            .uri("/")
            .header(AUTHORIZATION, "Bearer token")
            .body(())
            .unwrap()
            .into_parts();
        handler.process_request(&mut parts).unwrap();
        assert_eq!(parts.headers[AUTHORIZATION], "Bearer token");
    }

    #[tokio::test]
    async fn test_success_reads_body() {
        let (url, mut rx) =
            serve(vec!["HTTP/1.1 200 OK\r\nContent-Length: 9\r\n\r\n<service>"]).await;
        let opener = Opener::builder().handler(UserAgent("swordnet-test".into())).build();
        let resp = opener.open(OpenerRequest::new(url, Method::GET)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.reason().as_deref(), Some("OK"));
        assert_eq!(&resp.body[..], b"<service>");

        let head = rx.recv().await.unwrap().to_ascii_lowercase();
        assert!(head.starts_with("get / http/1.1\r\n"));
        assert!(head.contains("user-agent: swordnet-test"));
        assert!(head.contains("host: 127.0.0.1:"));
    }

    #[tokio::test]
    async fn test_non_success_is_http_error() {
        let (url, _rx) = serve(vec![
            "HTTP/1.1 404 Gone Fishing\r\nContent-Length: 7\r\n\r\nmissing",
        ])
        .await;
        let err = Opener::default()
            .open(OpenerRequest::new(url, Method::DELETE))
            .await
            .unwrap_err();
        let http_err = match err {
            OpenError::Http(e) => e,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(http_err.status(), StatusCode::NOT_FOUND);
        assert_eq!(http_err.reason().as_deref(), Some("Gone Fishing"));
        let (_, body) = http_err.read_body().await.unwrap();
        assert_eq!(&body[..], b"missing");
    }

    #[tokio::test]
    async fn test_redirect_followed_for_get() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let redirect = format!(
                "HTTP/1.1 302 Found\r\nLocation: http://{}/moved\r\nContent-Length: 0\r\n\r\n",
                addr
            );
            let responses = [redirect, "HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok".to_string()];
            for response in responses {
                let (mut s, _) = listener.accept().await.unwrap();
                let mut buf = vec![0u8; 4096];
                let _ = s.read(&mut buf).await.unwrap();
                s.write_all(response.as_bytes()).await.unwrap();
            }
        });

        let url = Url::parse(&format!("http://{}/start", addr)).unwrap();
        let resp = Opener::default()
            .open(OpenerRequest::new(url, Method::GET))
            .await
            .unwrap();
        assert_eq!(resp.url.path(), "/moved");
        assert_eq!(&resp.body[..], b"ok");
    }

    #[tokio::test]
    async fn test_redirect_limit() {
        let (url, _rx) = serve(vec![
            "HTTP/1.1 301 Moved Permanently\r\nLocation: /a\r\nContent-Length: 0\r\n\r\n",
            "HTTP/1.1 301 Moved Permanently\r\nLocation: /b\r\nContent-Length: 0\r\n\r\n",
        ])
        .await;
        let opener = Opener::builder().max_redirects(1).build();
        let err = opener
            .open(OpenerRequest::new(url, Method::GET))
            .await
            .unwrap_err();
        assert!(matches!(err, OpenError::Net(NetError::TooManyRedirects)));
    }

    #[test]
    fn test_same_origin() {
        let a = Url::parse("http://example.org/a").unwrap();
        assert!(same_origin(&a, &Url::parse("http://example.org:80/b").unwrap()));
        assert!(!same_origin(&a, &Url::parse("https://example.org/b").unwrap()));
        assert!(!same_origin(&a, &Url::parse("http://other.org/a").unwrap()));
    }
}
