//! Raw HTTP/1.x response head parser.
//!
//! Rebuilds status line and header table from the unstructured header bytes
//! a raw transfer hands back. The body never passes through here; it is
//! delivered separately by the transfer.
//!
//! Accepted shape, with `\r\n` or bare `\n` line endings:
//!
//! ```text
//! HTTP/<version> <status> <reason>
//! <Header-Name>: <value>
//! ...
//! <blank line>
//! ```
//!
//! A `100 Continue` block in front of the real response is skipped: its
//! status line, its header lines and the blank line ending it.

use crate::base::neterror::NetError;
use crate::http::response::{Backend, HttpResponse, HttpVersion, ResponseHeaders, STATUS_KEY};
use http::StatusCode;

/// Separator between a header name and its value.
const HEADER_SEPARATOR: &str = ": ";

/// Parsed status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub version: HttpVersion,
    pub status: StatusCode,
    pub reason: String,
}

/// Authoritative response head after interim blocks are skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub version: HttpVersion,
    pub status: StatusCode,
    pub reason: String,
    /// Lower-cased header table, including the synthetic `status` entry.
    pub headers: ResponseHeaders,
    /// Number of interim blocks dropped in front of this head.
    pub interim_skipped: usize,
}

impl ResponseHead {
    /// Wrap this head in the uniform response contract.
    pub fn into_response(self, backend: Backend) -> HttpResponse {
        HttpResponse::new(
            backend,
            self.status,
            Some(self.reason),
            self.version,
            self.headers,
        )
    }
}

/// Whether a block with this status is an interim acknowledgement to skip.
pub fn is_interim(status: StatusCode) -> bool {
    status == StatusCode::CONTINUE
}

/// Parse `HTTP/<ver> <status> <reason...>`.
pub fn parse_status_line(line: &str) -> Result<StatusLine, NetError> {
    // Only the terminator goes; trailing blanks belong to the reason.
    let trimmed = line.trim_end_matches(['\r', '\n']);
    let (protocol, rest) = match trimmed.split_once(' ') {
        Some((protocol, rest)) => (protocol, rest.trim_start_matches(' ')),
        None => (trimmed, ""),
    };

    let version_token = match protocol.get(..5) {
        Some(prefix) if prefix.eq_ignore_ascii_case("HTTP/") => &protocol[5..],
        _ => return Err(NetError::malformed_status_line(line)),
    };
    let version = match version_token {
        "1.0" => HttpVersion::Http10,
        "1.1" => HttpVersion::Http11,
        other => {
            return Err(NetError::UnsupportedVersion {
                version: other.to_string(),
            })
        }
    };

    let (code, reason) = rest.split_once(' ').unwrap_or((rest, ""));
    if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(NetError::malformed_status_line(line));
    }
    let status = code
        .parse::<u16>()
        .ok()
        .and_then(|c| StatusCode::from_u16(c).ok())
        .ok_or_else(|| NetError::malformed_status_line(line))?;

    Ok(StatusLine {
        version,
        status,
        reason: reason.to_string(),
    })
}

/// Split `Name: value` on the first separator, lower-casing the name.
pub fn parse_header_line(line: &str) -> Result<(String, &str), NetError> {
    match line.split_once(HEADER_SEPARATOR) {
        Some((name, value)) if !name.is_empty() => Ok((name.to_ascii_lowercase(), value)),
        _ => Err(NetError::malformed_header_line(line)),
    }
}

/// Parse raw header bytes into the authoritative response head.
///
/// Bytes after the blank line that ends the authoritative block are ignored.
pub fn parse_response_head(raw: &[u8]) -> Result<ResponseHead, NetError> {
    let text = String::from_utf8_lossy(raw);
    let mut lines = text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line));

    let mut interim_skipped = 0;
    loop {
        // Blank lines between blocks are what is left of the previous
        // block's terminator.
        let status_line = loop {
            match lines.next() {
                Some("") => continue,
                Some(line) => break line,
                None => return Err(NetError::EmptyResponse),
            }
        };

        let parsed = parse_status_line(status_line)?;

        if is_interim(parsed.status) {
            tracing::debug!(status = %parsed.status, "skipping interim response block");
            interim_skipped += 1;
            for line in lines.by_ref() {
                if line.is_empty() {
                    break;
                }
            }
            continue;
        }

        let mut headers = ResponseHeaders::new();
        for line in lines.by_ref() {
            if line.is_empty() {
                break;
            }
            let (name, value) = parse_header_line(line)?;
            headers.insert(&name, value);
        }
        headers.insert(STATUS_KEY, parsed.status.as_u16().to_string());

        return Ok(ResponseHead {
            version: parsed.version,
            status: parsed.status,
            reason: parsed.reason,
            headers,
            interim_skipped,
        });
    }
}

/// Locate the end of the first header block in `buf`.
///
/// Returns the offset just past the blank line, accepting `\r\n\r\n`,
/// `\n\n` and mixed terminators.
pub fn find_head_end(buf: &[u8]) -> Option<usize> {
    let mut line_start = 0;
    for (i, &b) in buf.iter().enumerate() {
        if b != b'\n' {
            continue;
        }
        let line = &buf[line_start..i];
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.is_empty() && line_start > 0 {
            return Some(i + 1);
        }
        line_start = i + 1;
    }
    None
}
