//! Error context helpers.
//!
//! Turns I/O failures and elapsed deadlines into `NetError` values that
//! name what was being attempted.

use crate::base::neterror::NetError;
use std::io;
use tokio::time::error::Elapsed;

pub trait IoResultExt<T> {
    /// Tag a connect failure with the origin it was aimed at.
    ///
    /// ```ignore
    /// use swordnet::base::context::IoResultExt;
    ///
    /// let stream = TcpStream::connect(addr).await
    ///     .connection_context("sword.example.org", 443)?;
    /// ```
    fn connection_context(self, host: &str, port: u16) -> Result<T, NetError>;

    fn dns_context(self, domain: &str) -> Result<T, NetError>;
}

impl<T> IoResultExt<T> for Result<T, io::Error> {
    fn connection_context(self, host: &str, port: u16) -> Result<T, NetError> {
        self.map_err(|e| NetError::connection_failed_to(host, port, e))
    }

    fn dns_context(self, domain: &str) -> Result<T, NetError> {
        self.map_err(|e| NetError::dns_failed(domain, e))
    }
}

/// Flattens the result of a `tokio::time::timeout` around a fallible step.
pub trait DeadlineExt<T> {
    /// An elapsed deadline becomes `ConnectionTimedOut`; `stage` is logged.
    fn within_deadline(self, stage: &'static str) -> Result<T, NetError>;
}

impl<T, E> DeadlineExt<T> for Result<Result<T, E>, Elapsed>
where
    E: Into<NetError>,
{
    fn within_deadline(self, stage: &'static str) -> Result<T, NetError> {
        match self {
            Ok(inner) => inner.map_err(Into::into),
            Err(_) => {
                tracing::debug!(stage, "deadline elapsed");
                Err(NetError::ConnectionTimedOut)
            }
        }
    }
}
