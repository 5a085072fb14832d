//! HTTP-level types: the uniform response, the raw response parser, the
//! request descriptor and the engines that are not plain sockets.

pub mod credentials;
pub mod httpcache;
pub mod opener;
pub mod orderedheaders;
pub mod rawresponse;
pub mod request;
pub mod requestbody;
pub mod response;

// Re-exports for convenience
pub use credentials::Credentials;
pub use orderedheaders::OrderedHeaderMap;
pub use rawresponse::{parse_response_head, ResponseHead};
pub use request::TransportRequest;
pub use requestbody::RequestBody;
pub use response::{Backend, HttpResponse, HttpVersion};
