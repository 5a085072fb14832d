//! Validated request descriptor shared by every backend.

use crate::base::neterror::NetError;
use crate::http::orderedheaders::OrderedHeaderMap;
use crate::http::requestbody::RequestBody;
use bytes::Bytes;
use http::Method;
use url::Url;

/// Methods the transport accepts. Matching is case-sensitive.
pub const SUPPORTED_METHODS: [&str; 4] = ["GET", "POST", "PUT", "DELETE"];

/// Parse a method name, rejecting anything outside [`SUPPORTED_METHODS`].
pub fn parse_method(method: &str) -> Result<Method, NetError> {
    match method {
        "GET" => Ok(Method::GET),
        "POST" => Ok(Method::POST),
        "PUT" => Ok(Method::PUT),
        "DELETE" => Ok(Method::DELETE),
        other => Err(NetError::UnsupportedMethod {
            method: other.to_string(),
        }),
    }
}

/// Parse an absolute http(s) URL.
pub fn parse_url(uri: &str) -> Result<Url, NetError> {
    let url = Url::parse(uri).map_err(|_| NetError::InvalidUrl)?;
    match url.scheme() {
        "http" | "https" => {}
        _ => return Err(NetError::DisallowedUrlScheme),
    }
    if url.host_str().is_none() {
        return Err(NetError::InvalidUrl);
    }
    Ok(url)
}

/// One request, checked before any network I/O.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub url: Url,
    pub method: Method,
    pub headers: OrderedHeaderMap,
    pub body: RequestBody,
}

impl TransportRequest {
    /// Validate method, URL and body presence, in that order.
    pub fn new(
        uri: &str,
        method: &str,
        headers: Option<&OrderedHeaderMap>,
        body: Option<Bytes>,
    ) -> Result<Self, NetError> {
        let method = parse_method(method)?;
        let url = parse_url(uri)?;

        let body = RequestBody::from(body);
        let needs_body = method == Method::POST || method == Method::PUT;
        if needs_body != body.is_present() {
            return Err(NetError::RequestBodyMismatch {
                method: method.to_string(),
            });
        }

        Ok(Self {
            url,
            method,
            headers: headers.cloned().unwrap_or_default(),
            body,
        })
    }

    /// `path?query` as written on an HTTP/1.1 request line.
    pub fn origin_form(&self) -> String {
        origin_form(&self.url)
    }

    /// Value of the `Host` header for this URL.
    pub fn host_header(&self) -> Result<String, NetError> {
        host_header(&self.url)
    }

    /// Whether the caller supplied an `Authorization` header.
    pub fn has_authorization(&self) -> bool {
        self.headers.contains("authorization")
    }
}

pub fn origin_form(url: &Url) -> String {
    match url.query() {
        Some(q) => format!("{}?{}", url.path(), q),
        None => url.path().to_string(),
    }
}

/// `host[:port]`, with the port omitted when it is the scheme default.
pub fn host_header(url: &Url) -> Result<String, NetError> {
    let host = url.host_str().ok_or(NetError::InvalidUrl)?;
    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_get() {
        let req = TransportRequest::new("http://example.org/sd-uri?a=1", "GET", None, None).unwrap();
        assert_eq!(req.method, Method::GET);
        assert_eq!(req.origin_form(), "/sd-uri?a=1");
        assert_eq!(req.host_header().unwrap(), "example.org");
        assert!(req.headers.is_empty());
    }

    #[test]
    fn test_unsupported_method() {
        for method in ["PATCH", "HEAD", "get", ""] {
            match TransportRequest::new("http://example.org/", method, None, None) {
                Err(NetError::UnsupportedMethod { method: m }) => assert_eq!(m, method),
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn test_method_checked_before_url() {
        let err = TransportRequest::new("not a url", "PATCH", None, None).unwrap_err();
        assert!(matches!(err, NetError::UnsupportedMethod { .. }));
    }

    #[test]
    fn test_url_validation() {
        assert!(matches!(
            TransportRequest::new("/relative", "GET", None, None),
            Err(NetError::InvalidUrl)
        ));
        assert!(matches!(
            TransportRequest::new("ftp://example.org/file", "GET", None, None),
            Err(NetError::DisallowedUrlScheme)
        ));
    }

    #[test]
    fn test_body_presence_rules() {
        let body = Some(Bytes::from_static(b"<entry/>"));
        assert!(TransportRequest::new("http://h/", "POST", None, body.clone()).is_ok());
        assert!(TransportRequest::new("http://h/", "PUT", None, Some(Bytes::new())).is_ok());
        assert!(TransportRequest::new("http://h/", "DELETE", None, None).is_ok());

        for (method, body) in [
            ("GET", body.clone()),
            ("DELETE", body),
            ("POST", None),
            ("PUT", None),
        ] {
            match TransportRequest::new("http://h/", method, None, body) {
                Err(NetError::RequestBodyMismatch { method: m }) => assert_eq!(m, method),
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn test_host_header_keeps_explicit_port() {
        let url = Url::parse("http://127.0.0.1:8080/col").unwrap();
        assert_eq!(host_header(&url).unwrap(), "127.0.0.1:8080");
        let url = Url::parse("https://example.org:443/col").unwrap();
        assert_eq!(host_header(&url).unwrap(), "example.org");
    }

    #[test]
    fn test_caller_authorization_detected() {
        let headers = OrderedHeaderMap::from_pairs([("Authorization", "Bearer x")]).unwrap();
        let req = TransportRequest::new("http://h/", "GET", Some(&headers), None).unwrap();
        assert!(req.has_authorization());
    }
}
