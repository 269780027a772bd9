//! Session cookie serialization
//!
//! A [`CookieSerializer`] turns a logical session id into a `Set-Cookie`
//! header and recovers ids from the `Cookie` header. [`DefaultCookieSerializer`]
//! handles Base64 encoding, sticky-routing suffixes and the cookie attribute
//! policy (path, domain, secure, HttpOnly, SameSite, Max-Age).

mod default;
mod validation;

pub use default::DefaultCookieSerializer;

use crate::error::SessionResult;
use crate::http::{RequestHead, ResponseSink};

/// Cookie max-age meaning "until the browser closes"
pub const SESSION_COOKIE_MAX_AGE: i32 = -1;

/// One cookie write: the request/response pair, the value and an optional max-age
pub struct CookieValue<'a> {
    request: &'a dyn RequestHead,
    response: &'a mut dyn ResponseSink,
    cookie_value: String,
    cookie_max_age: i32,
}

impl<'a> CookieValue<'a> {
    /// An empty value is a deletion and gets max-age 0.
    pub fn new(
        request: &'a dyn RequestHead,
        response: &'a mut dyn ResponseSink,
        cookie_value: impl Into<String>,
    ) -> Self {
        let cookie_value = cookie_value.into();
        let cookie_max_age = if cookie_value.is_empty() { 0 } else { SESSION_COOKIE_MAX_AGE };
        Self { request, response, cookie_value, cookie_max_age }
    }

    /// Override the max-age for this write
    pub fn with_cookie_max_age(mut self, max_age: i32) -> Self {
        self.cookie_max_age = max_age;
        self
    }

    pub fn request(&self) -> &dyn RequestHead {
        self.request
    }

    pub fn response(&mut self) -> &mut dyn ResponseSink {
        &mut *self.response
    }

    pub fn cookie_value(&self) -> &str {
        &self.cookie_value
    }

    /// Per-write max-age; negative means "not set"
    pub fn cookie_max_age(&self) -> i32 {
        self.cookie_max_age
    }
}

/// Reads and writes the session cookie
pub trait CookieSerializer: Send + Sync {
    /// Logical values of every matching cookie, in request order.
    /// Undecodable values are skipped.
    fn read_cookie_values(&self, request: &dyn RequestHead) -> Vec<String>;

    /// Write exactly one cookie to the response
    fn write_cookie_value(&self, value: CookieValue<'_>) -> SessionResult<()>;
}
