//! HTTP capability layer
//!
//! The session core never depends on a concrete server. It talks to two small
//! capability traits instead:
//!
//! - [`RequestHead`] - read-only view of headers, cookies and connection facts,
//!   plus the request-scoped [`RequestAttributes`]
//! - [`ResponseSink`] - header mutation, body output and the operations that
//!   commit a response (errors, redirects, flushes)
//!
//! [`HttpRequest`] and [`HttpResponse`] implement both on top of the `http`
//! crate. Adapters for other servers implement the traits by composition.

mod attributes;
mod request;
mod response;

pub use attributes::RequestAttributes;
pub use request::HttpRequest;
pub use response::{HttpResponse, DEFAULT_BUFFER_SIZE};

use crate::error::SessionResult;
use std::net::IpAddr;

/// Read access to an inbound request
pub trait RequestHead {
    /// All values of a header, in arrival order. Names are case-insensitive.
    fn header_values(&self, name: &str) -> Vec<&str>;

    /// First value of a header
    fn header(&self, name: &str) -> Option<&str> {
        self.header_values(name).into_iter().next()
    }

    /// Cookies sent with the request as `(name, value)` pairs, in order.
    /// Entries without a value are skipped.
    fn cookies(&self) -> Vec<(String, String)> {
        parse_cookie_headers(&self.header_values("cookie"))
    }

    /// Whether the request arrived over a secure channel
    fn is_secure(&self) -> bool;

    /// Path prefix the application is mounted under, without trailing slash
    fn context_path(&self) -> &str;

    /// Host name the request was addressed to
    fn server_name(&self) -> Option<&str>;

    /// Address of the connecting client
    fn remote_addr(&self) -> Option<IpAddr>;

    /// Request-scoped attributes
    fn attributes(&self) -> &RequestAttributes;
}

/// Write access to an outbound response
pub trait ResponseSink {
    /// Replace all values of a header
    fn set_header(&mut self, name: &str, value: &str) -> SessionResult<()>;

    /// Append a header value
    fn add_header(&mut self, name: &str, value: &str) -> SessionResult<()>;

    fn header(&self, name: &str) -> Option<String> {
        self.header_values(name).into_iter().next()
    }

    fn header_values(&self, name: &str) -> Vec<String>;

    /// Declare the body length
    fn set_content_length(&mut self, length: u64) -> SessionResult<()>;

    /// Size of the output buffer; reaching it flushes the response. 0 = unbuffered.
    fn buffer_size(&self) -> usize;

    fn send_error(&mut self, status: u16, message: Option<&str>) -> SessionResult<()>;

    fn send_redirect(&mut self, location: &str) -> SessionResult<()>;

    fn flush_buffer(&mut self) -> SessionResult<()>;

    /// Append bytes to the body
    fn write_body(&mut self, bytes: &[u8]) -> SessionResult<()>;

    /// Flush the body stream
    fn flush_body(&mut self) -> SessionResult<()>;

    /// Close the body stream
    fn close_body(&mut self) -> SessionResult<()>;

    /// Whether status and headers have been sent
    fn is_committed(&self) -> bool;
}

/// Parse raw `Cookie` header values into name/value pairs
pub fn parse_cookie_headers(headers: &[&str]) -> Vec<(String, String)> {
    headers
        .iter()
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().to_string()))
        })
        .collect()
}
