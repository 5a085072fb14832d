//! Credentials applied preemptively by every backend.
//!
//! Only `Basic` is supported: the header is sent on the first round trip
//! instead of waiting for a `401` challenge.

use crate::base::neterror::NetError;
use base64::{engine::general_purpose, Engine as _};
use http::HeaderValue;
use std::fmt;
use zeroize::Zeroizing;

/// Username and password owned by one adapter.
#[derive(Clone)]
pub struct Credentials {
    /// Username
    pub username: String,
    /// Password (zeroized on drop)
    password: Zeroizing<String>,
}

impl Credentials {
    pub fn basic(username: impl Into<String>, password: &str) -> Self {
        Self {
            username: username.into(),
            password: Zeroizing::new(password.to_string()),
        }
    }

    pub fn password(&self) -> &str {
        self.password.as_str()
    }

    /// Generate the Authorization header value.
    pub fn to_header_value(&self) -> String {
        let creds = Zeroizing::new(format!("{}:{}", self.username, self.password.as_str()));
        let encoded = general_purpose::STANDARD.encode(creds.as_bytes());
        format!("Basic {}", encoded)
    }

    /// Same as [`Credentials::to_header_value`], marked sensitive so it is
    /// never printed by `Debug` impls downstream.
    pub fn header_value(&self) -> Result<HeaderValue, NetError> {
        let mut value =
            HeaderValue::from_str(&self.to_header_value()).map_err(|_| NetError::InvalidHeader)?;
        value.set_sensitive(true);
        Ok(value)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
