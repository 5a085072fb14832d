//! Backend adapters.
//!
//! Each adapter wraps one engine and turns its native response into an
//! [`HttpResponse`](crate::http::response::HttpResponse):
//! - [`cached`]: reqwest client fronted by the in-memory HTTP cache
//! - [`opener`]: handler-chain opener that signals non-2xx as errors
//! - [`transfer`]: raw socket transfer fed through the raw response parser

pub mod cached;
pub mod opener;
pub mod transfer;

use crate::base::neterror::NetError;
use crate::http::credentials::Credentials;
use crate::http::request::TransportRequest;
use http::header::AUTHORIZATION;

/// Add `Basic` credentials unless the caller set `Authorization` already.
pub(crate) fn authorize(
    request: &mut TransportRequest,
    credentials: Option<&Credentials>,
) -> Result<(), NetError> {
    if let Some(credentials) = credentials {
        if !request.has_authorization() {
            request
                .headers
                .insert_value(AUTHORIZATION, credentials.header_value()?);
        }
    }
    Ok(())
}
