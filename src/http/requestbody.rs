//! Request body: absent for GET/DELETE, present (maybe empty) for POST/PUT.

use bytes::Bytes;

/// Request body for HTTP methods that send data.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    /// No body (GET, DELETE).
    #[default]
    Empty,
    /// Body with raw bytes. May hold zero bytes for an empty POST/PUT.
    Bytes(Bytes),
}

impl From<String> for RequestBody {
    fn from(s: String) -> Self {
        RequestBody::Bytes(Bytes::from(s))
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(v: Vec<u8>) -> Self {
        RequestBody::Bytes(Bytes::from(v))
    }
}

impl From<&str> for RequestBody {
    fn from(s: &str) -> Self {
        RequestBody::Bytes(Bytes::from(s.to_owned()))
    }
}

impl From<Bytes> for RequestBody {
    fn from(b: Bytes) -> Self {
        RequestBody::Bytes(b)
    }
}

impl From<Option<Bytes>> for RequestBody {
    fn from(b: Option<Bytes>) -> Self {
        b.map(RequestBody::Bytes).unwrap_or_default()
    }
}

impl RequestBody {
    /// Check if the body is absent.
    pub fn is_empty(&self) -> bool {
        matches!(self, RequestBody::Empty)
    }

    /// Whether a body (possibly zero-length) is present.
    pub fn is_present(&self) -> bool {
        !self.is_empty()
    }

    /// Get the length of the body in bytes.
    pub fn len(&self) -> usize {
        match self {
            RequestBody::Empty => 0,
            RequestBody::Bytes(b) => b.len(),
        }
    }

    /// Borrow the raw bytes, empty for [`RequestBody::Empty`].
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            RequestBody::Empty => &[],
            RequestBody::Bytes(b) => b.as_ref(),
        }
    }

    /// Take the bytes, empty for [`RequestBody::Empty`].
    pub fn into_bytes(self) -> Bytes {
        match self {
            RequestBody::Empty => Bytes::new(),
            RequestBody::Bytes(b) => b,
        }
    }

    /// Split into chunks of at most `size` bytes for streamed writes.
    pub fn chunks(&self, size: usize) -> impl Iterator<Item = &[u8]> {
        self.as_bytes().chunks(size.max(1))
    }
}
