//! Raw HTTP/1.1 transfer primitive.
//!
//! Writes the request itself, then hands the response back unstructured:
//! each header block (interim `100 Continue` blocks included) goes to
//! [`TransferSink::on_header`] as raw bytes, the body goes to
//! [`TransferSink::on_body`] as it arrives. Nothing here builds a response
//! object; turning header bytes into one is the raw parser's job.
//!
//! Framing is only what is needed to know where the body ends:
//! `Transfer-Encoding: chunked`, `Content-Length`, or read until close.
//! Every request carries `Connection: close`, so a socket serves one
//! request and is dropped.

use crate::base::context::DeadlineExt;
use crate::base::neterror::NetError;
use crate::http::rawresponse::{find_head_end, is_interim, parse_status_line};
use crate::http::request::TransportRequest;
use crate::socket::client::SocketType;
use crate::socket::connectjob::ConnectJob;
use bytes::{Buf, Bytes, BytesMut};
use http::StatusCode;
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

/// Cap on one response header block.
pub const MAX_HEADER_BYTES: usize = 256 * 1024;
/// Cap on one chunk-size or trailer line.
const MAX_LINE_BYTES: usize = 8 * 1024;
const READ_BUF_SIZE: usize = 16 * 1024;

/// Callbacks receiving the raw response.
pub trait TransferSink {
    /// The request head (and body, unless deferred by `Expect`) is written.
    fn on_request_sent(&mut self) {}

    /// One complete header block, terminator included.
    fn on_header(&mut self, block: &[u8], interim: bool) -> Result<(), NetError>;

    /// The final header block has been delivered; body bytes follow.
    fn on_headers_complete(&mut self) -> Result<(), NetError>;

    fn on_body(&mut self, chunk: &[u8]) -> Result<(), NetError>;
}

/// Knobs for [`perform`].
#[derive(Debug, Clone)]
pub struct TransferOptions {
    /// Bound on each socket read and write.
    pub timeout: Duration,
    pub user_agent: String,
    /// Bodies at least this large are sent with `Expect: 100-continue`.
    /// `None` disables the handshake.
    pub expect_continue_threshold: Option<usize>,
    /// How long to wait for `100 Continue` before sending the body anyway.
    pub expect_continue_timeout: Duration,
    pub send_chunk_size: usize,
    pub max_header_bytes: usize,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: concat!("swordnet/", env!("CARGO_PKG_VERSION")).to_string(),
            expect_continue_threshold: Some(1024),
            expect_continue_timeout: Duration::from_secs(1),
            send_chunk_size: 16 * 1024,
            max_header_bytes: MAX_HEADER_BYTES,
        }
    }
}

impl TransferOptions {
    fn wants_expect(&self, request: &TransportRequest) -> bool {
        if request.headers.contains("expect") {
            return false;
        }
        match self.expect_continue_threshold {
            Some(threshold) => request.body.is_present() && request.body.len() >= threshold,
            None => false,
        }
    }
}

/// How the response body is delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFraming {
    None,
    Chunked,
    Length(u64),
    UntilClose,
}

impl BodyFraming {
    /// Framing of the response carried by `block`.
    ///
    /// Header lines are scanned leniently; the raw parser is the one that
    /// rejects malformed lines.
    pub fn from_head(block: &[u8], status: Option<StatusCode>) -> Self {
        if let Some(status) = status {
            if status.is_informational()
                || status == StatusCode::NO_CONTENT
                || status == StatusCode::NOT_MODIFIED
            {
                return BodyFraming::None;
            }
        }

        let text = String::from_utf8_lossy(block);
        let mut length = None;
        for line in text.lines().skip(1) {
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            let name = name.trim();
            let value = value.trim();
            if name.eq_ignore_ascii_case("transfer-encoding") {
                let last = value.rsplit(',').next().unwrap_or("").trim();
                if last.eq_ignore_ascii_case("chunked") {
                    return BodyFraming::Chunked;
                }
            } else if name.eq_ignore_ascii_case("content-length") {
                length = value.parse::<u64>().ok();
            }
        }

        match length {
            Some(0) => BodyFraming::None,
            Some(n) => BodyFraming::Length(n),
            None => BodyFraming::UntilClose,
        }
    }
}

/// Status of a header block, if its first line parses.
fn block_status(block: &[u8]) -> Option<StatusCode> {
    let text = String::from_utf8_lossy(block);
    let line = text.lines().find(|l| !l.trim().is_empty())?;
    parse_status_line(line).ok().map(|s| s.status)
}

async fn io_timeout<T, F>(dur: Duration, fut: F) -> Result<T, NetError>
where
    F: Future<Output = io::Result<T>>,
{
    timeout(dur, fut).await.within_deadline("transfer io")
}

/// Serialize the request head.
pub fn encode_head(request: &TransportRequest, options: &TransferOptions, expect: bool) -> Result<Vec<u8>, NetError> {
    let mut head = Vec::with_capacity(256);
    head.extend_from_slice(request.method.as_str().as_bytes());
    head.push(b' ');
    head.extend_from_slice(request.origin_form().as_bytes());
    head.extend_from_slice(b" HTTP/1.1\r\nHost: ");
    head.extend_from_slice(request.host_header()?.as_bytes());
    head.extend_from_slice(b"\r\n");

    if !request.headers.contains("user-agent") {
        head.extend_from_slice(b"User-Agent: ");
        head.extend_from_slice(options.user_agent.as_bytes());
        head.extend_from_slice(b"\r\n");
    }

    for (name, value) in request.headers.iter() {
        if matches!(name.as_str(), "host" | "content-length" | "connection" | "transfer-encoding") {
            continue;
        }
        head.extend_from_slice(name.as_str().as_bytes());
        head.extend_from_slice(b": ");
        head.extend_from_slice(value.as_bytes());
        head.extend_from_slice(b"\r\n");
    }

    if request.body.is_present() {
        head.extend_from_slice(format!("Content-Length: {}\r\n", request.body.len()).as_bytes());
    }
    if expect {
        head.extend_from_slice(b"Expect: 100-continue\r\n");
    }
    head.extend_from_slice(b"Connection: close\r\n\r\n");
    Ok(head)
}

/// Buffered reader/writer over one connection.
pub struct TransferConn<S> {
    io: S,
    buf: BytesMut,
    timeout: Duration,
    max_header_bytes: usize,
}

impl<S: AsyncRead + AsyncWrite + Unpin> TransferConn<S> {
    pub fn new(io: S, timeout: Duration, max_header_bytes: usize) -> Self {
        Self {
            io,
            buf: BytesMut::with_capacity(READ_BUF_SIZE),
            timeout,
            max_header_bytes,
        }
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<(), NetError> {
        io_timeout(self.timeout, self.io.write_all(data)).await
    }

    async fn send_body(&mut self, request: &TransportRequest, chunk_size: usize) -> Result<(), NetError> {
        for chunk in request.body.chunks(chunk_size) {
            self.write_all(chunk).await?;
        }
        io_timeout(self.timeout, self.io.flush()).await
    }

    /// Read more bytes into the buffer. Returns 0 at EOF.
    async fn fill(&mut self) -> Result<usize, NetError> {
        self.buf.reserve(READ_BUF_SIZE);
        io_timeout(self.timeout, self.io.read_buf(&mut self.buf)).await
    }

    /// Read one header block.
    ///
    /// A block cut short by EOF is returned as is; the parser decides
    /// whether it is usable.
    pub async fn read_head_block(&mut self) -> Result<Bytes, NetError> {
        loop {
            while matches!(self.buf.first(), Some(b'\r' | b'\n')) {
                self.buf.advance(1);
            }
            if let Some(end) = find_head_end(&self.buf) {
                if end > self.max_header_bytes {
                    return Err(NetError::ResponseHeadersTooBig);
                }
                return Ok(self.buf.split_to(end).freeze());
            }
            if self.buf.len() > self.max_header_bytes {
                return Err(NetError::ResponseHeadersTooBig);
            }
            if self.fill().await? == 0 {
                if self.buf.is_empty() {
                    return Err(NetError::ConnectionClosed);
                }
                return Ok(self.buf.split().freeze());
            }
        }
    }

    /// Read one line without its terminator. `None` at a clean EOF.
    async fn read_line(&mut self) -> Result<Option<Bytes>, NetError> {
        loop {
            if let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
                let mut line = self.buf.split_to(pos + 1);
                line.truncate(pos);
                if line.last() == Some(&b'\r') {
                    line.truncate(pos - 1);
                }
                return Ok(Some(line.freeze()));
            }
            if self.buf.len() > MAX_LINE_BYTES {
                return Err(NetError::InvalidChunkedEncoding);
            }
            if self.fill().await? == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Err(NetError::InvalidChunkedEncoding);
            }
        }
    }

    /// Forward up to `n` bytes to the sink; returns how many arrived
    /// before EOF.
    async fn forward_exact<K: TransferSink + ?Sized>(&mut self, n: u64, sink: &mut K) -> Result<u64, NetError> {
        let mut remaining = n;
        while remaining > 0 {
            if self.buf.is_empty() && self.fill().await? == 0 {
                break;
            }
            let take = remaining.min(self.buf.len() as u64) as usize;
            let chunk = self.buf.split_to(take);
            sink.on_body(&chunk)?;
            remaining -= take as u64;
        }
        Ok(n - remaining)
    }

    async fn forward_to_eof<K: TransferSink + ?Sized>(&mut self, sink: &mut K) -> Result<(), NetError> {
        loop {
            if !self.buf.is_empty() {
                let chunk = self.buf.split();
                sink.on_body(&chunk)?;
            }
            if self.fill().await? == 0 {
                return Ok(());
            }
        }
    }

    async fn forward_chunked<K: TransferSink + ?Sized>(&mut self, sink: &mut K) -> Result<(), NetError> {
        loop {
            let line = self.read_line().await?.ok_or(NetError::InvalidChunkedEncoding)?;
            let text = std::str::from_utf8(&line).map_err(|_| NetError::InvalidChunkedEncoding)?;
            let size_str = text.split(';').next().unwrap_or("").trim();
            let size =
                u64::from_str_radix(size_str, 16).map_err(|_| NetError::InvalidChunkedEncoding)?;

            if size == 0 {
                // Trailers are dropped; a missing final CRLF is tolerated.
                while let Some(trailer) = self.read_line().await? {
                    if trailer.is_empty() {
                        break;
                    }
                }
                return Ok(());
            }

            if self.forward_exact(size, sink).await? != size {
                return Err(NetError::InvalidChunkedEncoding);
            }
            match self.read_line().await? {
                Some(crlf) if crlf.is_empty() => {}
                _ => return Err(NetError::InvalidChunkedEncoding),
            }
        }
    }

    /// Deliver the body described by `framing`.
    pub async fn forward_body<K: TransferSink + ?Sized>(
        &mut self,
        framing: BodyFraming,
        sink: &mut K,
    ) -> Result<(), NetError> {
        match framing {
            BodyFraming::None => Ok(()),
            BodyFraming::Chunked => self.forward_chunked(sink).await,
            BodyFraming::UntilClose => self.forward_to_eof(sink).await,
            BodyFraming::Length(n) => {
                if self.forward_exact(n, sink).await? == n {
                    Ok(())
                } else {
                    Err(NetError::ContentLengthMismatch)
                }
            }
        }
    }
}

/// Run one request over a fresh connection, streaming the raw response into
/// `sink`.
pub async fn perform<K: TransferSink + ?Sized>(
    connector: &ConnectJob,
    request: &TransportRequest,
    options: &TransferOptions,
    sink: &mut K,
) -> Result<(), NetError> {
    let socket: SocketType = connector.connect(&request.url).await?;
    let mut conn = TransferConn::new(socket, options.timeout, options.max_header_bytes);

    let expect = options.wants_expect(request);
    let head = encode_head(request, options, expect)?;
    conn.write_all(&head).await?;

    // A final response that arrives while waiting for `100 Continue`.
    let mut early: Option<Bytes> = None;

    if expect {
        io_timeout(options.timeout, conn.io.flush()).await?;
        sink.on_request_sent();
        match timeout(options.expect_continue_timeout, conn.read_head_block()).await {
            Ok(block) => {
                let block = block?;
                let status = block_status(&block);
                if status.map(is_interim).unwrap_or(false) {
                    tracing::debug!("received 100 Continue, sending body");
                    sink.on_header(&block, true)?;
                    conn.send_body(request, options.send_chunk_size).await?;
                } else {
                    tracing::debug!(?status, "final response before body, body not sent");
                    early = Some(block);
                }
            }
            Err(_) => {
                tracing::debug!("no 100 Continue within timeout, sending body");
                conn.send_body(request, options.send_chunk_size).await?;
            }
        }
    } else {
        conn.send_body(request, options.send_chunk_size).await?;
        sink.on_request_sent();
    }

    let final_block = loop {
        let block = match early.take() {
            Some(block) => block,
            None => conn.read_head_block().await?,
        };
        let status = block_status(&block);
        // An unparseable status line is handed over as final; the parser
        // reports it.
        let interim = status.map(is_interim).unwrap_or(false);
        sink.on_header(&block, interim)?;
        if !interim {
            break block;
        }
    };

    sink.on_headers_complete()?;

    let framing = BodyFraming::from_head(&final_block, block_status(&final_block));
    tracing::debug!(?framing, "reading response body");
    conn.forward_body(framing, sink).await
}
