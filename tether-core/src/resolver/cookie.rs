//! Cookie transport

use super::SessionIdResolver;
use crate::cookie::{CookieSerializer, CookieValue, DefaultCookieSerializer};
use crate::error::SessionResult;
use crate::http::{RequestHead, ResponseSink};
use std::sync::Arc;

/// Request attribute holding the last value written by this resolver
const WRITTEN_SESSION_ID_ATTR: &str = "tether.CookieSessionIdResolver.writtenSessionId";

/// Carries the session id in a cookie
///
/// Writes at most one cookie per distinct value per request, so committing a
/// session twice does not emit duplicate `Set-Cookie` headers.
#[derive(Clone)]
pub struct CookieSessionIdResolver {
    serializer: Arc<dyn CookieSerializer>,
}

impl CookieSessionIdResolver {
    /// Use the default `SESSION` cookie
    pub fn new() -> Self {
        Self::with_serializer(Arc::new(DefaultCookieSerializer::new()))
    }

    pub fn with_serializer(serializer: Arc<dyn CookieSerializer>) -> Self {
        Self { serializer }
    }

    fn write(&self, request: &dyn RequestHead, response: &mut dyn ResponseSink, value: &str) -> SessionResult<()> {
        let attributes = request.attributes();
        if attributes.get(WRITTEN_SESSION_ID_ATTR).as_ref().and_then(|v| v.as_str()) == Some(value) {
            return Ok(());
        }
        self.serializer.write_cookie_value(CookieValue::new(request, response, value))?;
        attributes.set(WRITTEN_SESSION_ID_ATTR, value);
        Ok(())
    }
}

impl Default for CookieSessionIdResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionIdResolver for CookieSessionIdResolver {
    fn resolve_session_ids(&self, request: &dyn RequestHead) -> Vec<String> {
        self.serializer.read_cookie_values(request)
    }

    fn set_session_id(
        &self,
        request: &dyn RequestHead,
        response: &mut dyn ResponseSink,
        session_id: &str,
    ) -> SessionResult<()> {
        self.write(request, response, session_id)
    }

    fn expire_session(&self, request: &dyn RequestHead, response: &mut dyn ResponseSink) -> SessionResult<()> {
        self.write(request, response, "")
    }
}
