//! Sockets and the raw transfer primitive:
//! - [`connectjob`]: DNS -> TCP -> TLS connection flow
//! - [`tls`]: rustls client configuration
//! - [`transfer`]: raw request/response transfer with header and body callbacks

pub mod client;
pub mod connectjob;
pub mod tls;
pub mod transfer;
