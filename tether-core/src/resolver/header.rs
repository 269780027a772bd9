//! Header transport

use super::SessionIdResolver;
use crate::error::{SessionError, SessionResult};
use crate::http::{RequestHead, ResponseSink};

pub const X_AUTH_TOKEN: &str = "X-Auth-Token";
pub const AUTHENTICATION_INFO: &str = "Authentication-Info";

/// Carries the session id in a single header, echoed on the response
#[derive(Debug, Clone)]
pub struct HeaderSessionIdResolver {
    header_name: String,
}

impl HeaderSessionIdResolver {
    pub fn new(header_name: impl Into<String>) -> SessionResult<Self> {
        let header_name = header_name.into();
        if header_name.trim().is_empty() {
            return Err(SessionError::Config("headerName cannot be null".to_string()));
        }
        Ok(Self { header_name })
    }

    /// `X-Auth-Token`
    pub fn x_auth_token() -> Self {
        Self { header_name: X_AUTH_TOKEN.to_string() }
    }

    /// `Authentication-Info`
    pub fn authentication_info() -> Self {
        Self { header_name: AUTHENTICATION_INFO.to_string() }
    }

    pub fn header_name(&self) -> &str {
        &self.header_name
    }
}

impl SessionIdResolver for HeaderSessionIdResolver {
    fn resolve_session_ids(&self, request: &dyn RequestHead) -> Vec<String> {
        match request.header(&self.header_name) {
            Some(value) if !value.is_empty() => vec![value.to_string()],
            _ => Vec::new(),
        }
    }

    fn set_session_id(
        &self,
        _request: &dyn RequestHead,
        response: &mut dyn ResponseSink,
        session_id: &str,
    ) -> SessionResult<()> {
        response.set_header(&self.header_name, session_id)
    }

    fn expire_session(&self, _request: &dyn RequestHead, response: &mut dyn ResponseSink) -> SessionResult<()> {
        response.set_header(&self.header_name, "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpRequest, HttpResponse};

    fn request(token: Option<&str>) -> HttpRequest {
        let mut builder = http::Request::builder().uri("/");
        if let Some(token) = token {
            builder = builder.header(X_AUTH_TOKEN, token);
        }
        HttpRequest::from(builder.body(()).unwrap())
    }

    #[test]
    fn test_resolve() {
        let resolver = HeaderSessionIdResolver::x_auth_token();
        assert!(resolver.resolve_session_ids(&request(None)).is_empty());
        assert!(resolver.resolve_session_ids(&request(Some(""))).is_empty());
        assert_eq!(resolver.resolve_session_ids(&request(Some("abc"))), vec!["abc"]);
    }

    #[test]
    fn test_set_replaces_header() {
        let resolver = HeaderSessionIdResolver::x_auth_token();
        let request = request(None);
        let mut response = HttpResponse::new();

        resolver.set_session_id(&request, &mut response, "abc").unwrap();
        resolver.set_session_id(&request, &mut response, "def").unwrap();
        assert_eq!(response.header_values(X_AUTH_TOKEN), vec!["def"]);

        resolver.expire_session(&request, &mut response).unwrap();
        assert_eq!(response.header_values(X_AUTH_TOKEN), vec![""]);
    }

    #[test]
    fn test_constructors() {
        assert_eq!(HeaderSessionIdResolver::authentication_info().header_name(), AUTHENTICATION_INFO);
        assert_eq!(HeaderSessionIdResolver::new("X-Session").unwrap().header_name(), "X-Session");
        assert!(matches!(HeaderSessionIdResolver::new(""), Err(SessionError::Config(_))));
    }
}
