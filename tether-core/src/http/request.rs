//! In-memory request adapter built on the `http` crate

use super::{RequestAttributes, RequestHead};
use http::uri::Scheme;
use http::{HeaderMap, Method, Uri};
use std::net::{IpAddr, SocketAddr};

/// Represents an inbound HTTP request as seen by the session layer
///
/// # Example
///
/// ```rust
/// use tether_core::http::HttpRequest;
///
/// let request = http::Request::builder()
///     .uri("https://example.com/app/cart")
///     .header("Cookie", "SESSION=YWJj")
///     .body(())
///     .unwrap();
/// let request = HttpRequest::from(request).with_context_path("/app");
/// ```
#[derive(Debug)]
pub struct HttpRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    remote_addr: Option<SocketAddr>,
    secure: bool,
    context_path: String,
    attributes: RequestAttributes,
}

impl HttpRequest {
    /// Create a request without headers
    pub fn new(method: Method, uri: Uri) -> Self {
        let secure = uri.scheme() == Some(&Scheme::HTTPS);
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            remote_addr: None,
            secure,
            context_path: String::new(),
            attributes: RequestAttributes::new(),
        }
    }

    /// Set the connecting client address
    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Mark the request as received over TLS (e.g. behind a terminating proxy)
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Set the application mount point. A trailing slash is dropped.
    pub fn with_context_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.context_path = path.trim_end_matches('/').to_string();
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }
}

impl<B> From<http::Request<B>> for HttpRequest {
    fn from(request: http::Request<B>) -> Self {
        let (parts, _body) = request.into_parts();
        let mut converted = HttpRequest::new(parts.method, parts.uri);
        converted.headers = parts.headers;
        if let Some(addr) = parts.extensions.get::<SocketAddr>() {
            converted.remote_addr = Some(*addr);
        }
        converted
    }
}

impl RequestHead for HttpRequest {
    fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers.get_all(name).iter().filter_map(|value| value.to_str().ok()).collect()
    }

    fn is_secure(&self) -> bool {
        self.secure
    }

    fn context_path(&self) -> &str {
        &self.context_path
    }

    fn server_name(&self) -> Option<&str> {
        if let Some(host) = self.header("host") {
            return Some(strip_port(host));
        }
        self.uri.host()
    }

    fn remote_addr(&self) -> Option<IpAddr> {
        self.remote_addr.map(|addr| addr.ip())
    }

    fn attributes(&self) -> &RequestAttributes {
        &self.attributes
    }
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        // IPv6 literal
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}
