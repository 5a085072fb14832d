//! # swordnet
//!
//! HTTP transport layer for deposit-protocol clients.
//!
//! Protocol code issues requests through one interface, [`HttpLayer`], and
//! gets back a uniform [`HttpResponse`] no matter which engine did the work:
//!
//! - **Cached**: reqwest with an in-memory HTTP cache in front
//! - **Opener**: a handler-chain opener on hyper's HTTP/1.1 client, whose
//!   non-2xx errors are converted back into ordinary responses
//! - **Transfer**: a raw socket transfer whose header bytes are rebuilt into
//!   a response by the raw response parser (interim `100 Continue` blocks
//!   are skipped)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use swordnet::{Backend, HttpLayer, OrderedHeaderMap, Transport};
//! use bytes::Bytes;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), swordnet::NetError> {
//!     let mut transport = Transport::builder().backend(Backend::Transfer).build()?;
//!     transport.add_credentials("sword", "sword");
//!
//!     let headers = OrderedHeaderMap::from_pairs([("Content-Type", "application/atom+xml;type=entry")])?;
//!     let (resp, _content) = transport
//!         .request(
//!             "http://localhost:8080/col-uri/c1",
//!             "POST",
//!             Some(&headers),
//!             Some(Bytes::from_static(b"<entry/>")),
//!         )
//!         .await?;
//!     println!("{} {:?}", &resp["status"], resp.location());
//!     Ok(())
//! }
//! ```
//!
//! A synchronous caller uses [`blocking::BlockingTransport`] instead.
//!
//! ## Modules
//!
//! - [`base`] - Error type, error context helpers, per-request load state
//! - [`http`] - Uniform response, raw response parser, request descriptor,
//!   HTTP cache and the handler-chain opener
//! - [`socket`] - Connection setup, TLS and the raw transfer primitive
//! - [`transport`] - The three backend adapters
//! - [`client`] - The façade: [`HttpLayer`], [`Transport`], configuration
//!
//! Logging goes through `tracing`; installing a subscriber is up to the
//! application.

pub mod base;
pub mod blocking;
pub mod client;
pub mod http;
pub mod socket;
pub mod transport;

pub use crate::base::neterror::NetError;
pub use crate::client::{HttpLayer, Transport, TransportBuilder, TransportConfig};
pub use crate::http::orderedheaders::OrderedHeaderMap;
pub use crate::http::response::{Backend, HttpResponse, HttpVersion};
