//! Session id transport strategies
//!
//! A [`SessionIdResolver`] decides how a session id travels between client
//! and server:
//!
//! - [`CookieSessionIdResolver`] - a session cookie (browser clients)
//! - [`HeaderSessionIdResolver`] - a request/response header (API clients)
//! - [`CompositeSessionIdResolver`] - several transports at once
//! - [`CrawlerSessionIdResolver`] - pins crawlers to one session per client IP

mod composite;
mod cookie;
mod crawler;
mod header;

pub use composite::CompositeSessionIdResolver;
pub use cookie::CookieSessionIdResolver;
pub use crawler::{CrawlerSessionIdResolver, DEFAULT_CRAWLER_USER_AGENTS};
pub use header::{HeaderSessionIdResolver, AUTHENTICATION_INFO, X_AUTH_TOKEN};

use crate::error::SessionResult;
use crate::http::{RequestHead, ResponseSink};

/// Reads session ids from requests and writes them to responses
pub trait SessionIdResolver: Send + Sync {
    /// Candidate session ids carried by the request, most preferred first
    fn resolve_session_ids(&self, request: &dyn RequestHead) -> Vec<String>;

    /// Tell the client to use `session_id` from now on
    fn set_session_id(
        &self,
        request: &dyn RequestHead,
        response: &mut dyn ResponseSink,
        session_id: &str,
    ) -> SessionResult<()>;

    /// Tell the client to forget its session id
    fn expire_session(&self, request: &dyn RequestHead, response: &mut dyn ResponseSink) -> SessionResult<()>;

    /// Called once per request before the application sees it
    fn prepare_request(&self, _request: &dyn RequestHead) -> SessionResult<()> {
        Ok(())
    }
}
