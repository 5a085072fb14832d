use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetError {
    // Connection Errors
    #[error("Connection closed (TCP FIN)")]
    ConnectionClosed,
    #[error("Connection reset (TCP RST)")]
    ConnectionReset,
    #[error("Connection refused")]
    ConnectionRefused,
    #[error("Connection aborted")]
    ConnectionAborted,
    #[error("Connection failed")]
    ConnectionFailed,
    #[error("Connection to {host}:{port} failed: {source}")]
    ConnectionFailedTo {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("Name not resolved")]
    NameNotResolved,
    #[error("Could not resolve {domain}: {source}")]
    NameNotResolvedFor {
        domain: String,
        #[source]
        source: io::Error,
    },
    #[error("Connection timed out")]
    ConnectionTimedOut,
    #[error("SSL protocol error")]
    SslProtocolError,
    #[error("Transport failure: {message}")]
    TransportFailure { message: String },

    // Request Errors
    #[error("Invalid URL")]
    InvalidUrl,
    #[error("Disallowed URL scheme")]
    DisallowedUrlScheme,
    #[error("Unsupported method: {method}")]
    UnsupportedMethod { method: String },
    #[error("Invalid header")]
    InvalidHeader,
    #[error("Request body does not match method {method}")]
    RequestBodyMismatch { method: String },
    #[error("Too many redirects")]
    TooManyRedirects,

    // Response Errors
    #[error("Malformed status line: {line:?}")]
    MalformedStatusLine { line: String },
    #[error("Unsupported HTTP version: {version:?}")]
    UnsupportedVersion { version: String },
    #[error("Malformed header line: {line:?}")]
    MalformedHeaderLine { line: String },
    #[error("Empty response")]
    EmptyResponse,
    #[error("Response headers too big")]
    ResponseHeadersTooBig,
    #[error("Invalid chunked encoding")]
    InvalidChunkedEncoding,
    #[error("Content-Length mismatch")]
    ContentLengthMismatch,
    #[error("No header named {key:?}")]
    KeyNotFound { key: String },
}

impl NetError {
    /// Connection-level failure reported by the underlying engine.
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            NetError::ConnectionClosed
                | NetError::ConnectionReset
                | NetError::ConnectionRefused
                | NetError::ConnectionAborted
                | NetError::ConnectionFailed
                | NetError::ConnectionFailedTo { .. }
                | NetError::NameNotResolved
                | NetError::NameNotResolvedFor { .. }
                | NetError::ConnectionTimedOut
                | NetError::SslProtocolError
                | NetError::TransportFailure { .. }
                | NetError::TooManyRedirects
        )
    }

    /// The response arrived but could not be turned into a response head/body.
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            NetError::MalformedStatusLine { .. }
                | NetError::UnsupportedVersion { .. }
                | NetError::MalformedHeaderLine { .. }
                | NetError::EmptyResponse
                | NetError::ResponseHeadersTooBig
                | NetError::InvalidChunkedEncoding
                | NetError::ContentLengthMismatch
        )
    }

    pub fn malformed_status_line(line: impl Into<String>) -> Self {
        NetError::MalformedStatusLine { line: line.into() }
    }

    pub fn malformed_header_line(line: impl Into<String>) -> Self {
        NetError::MalformedHeaderLine { line: line.into() }
    }

    pub fn connection_failed_to(host: impl Into<String>, port: u16, source: io::Error) -> Self {
        NetError::ConnectionFailedTo {
            host: host.into(),
            port,
            source,
        }
    }

    pub fn dns_failed(domain: impl Into<String>, source: io::Error) -> Self {
        NetError::NameNotResolvedFor {
            domain: domain.into(),
            source,
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        NetError::TransportFailure {
            message: message.into(),
        }
    }
}

impl From<io::Error> for NetError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => NetError::ConnectionRefused,
            io::ErrorKind::ConnectionReset => NetError::ConnectionReset,
            io::ErrorKind::ConnectionAborted => NetError::ConnectionAborted,
            io::ErrorKind::TimedOut => NetError::ConnectionTimedOut,
            io::ErrorKind::UnexpectedEof | io::ErrorKind::BrokenPipe => NetError::ConnectionClosed,
            _ => NetError::transport(err.to_string()),
        }
    }
}

impl From<hyper::Error> for NetError {
    fn from(err: hyper::Error) -> Self {
        if err.is_timeout() {
            NetError::ConnectionTimedOut
        } else if err.is_incomplete_message() || err.is_closed() {
            NetError::ConnectionClosed
        } else if err.is_parse() {
            NetError::transport(format!("invalid response: {err}"))
        } else {
            NetError::transport(err.to_string())
        }
    }
}

impl From<reqwest::Error> for NetError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NetError::ConnectionTimedOut
        } else if err.is_redirect() {
            NetError::TooManyRedirects
        } else if err.is_builder() {
            NetError::InvalidUrl
        } else if err.is_connect() {
            NetError::ConnectionFailed
        } else {
            NetError::transport(err.to_string())
        }
    }
}
