//! Session-backed request wrapper
//!
//! [`SessionRequest`] decorates any [`RequestHead`] with a lazily loaded
//! session. Nothing touches the repository until the application asks for the
//! session or for the validity of the requested id.
//!
//! ```
//! use std::sync::Arc;
//! use tether_core::filter::SessionRepositoryFilter;
//! use tether_core::http::{HttpRequest, HttpResponse};
//! use tether_core::session::MapSessionRepository;
//!
//! let filter = SessionRepositoryFilter::new(Arc::new(MapSessionRepository::new()));
//! let request = HttpRequest::from(http::Request::get("/").body(()).unwrap());
//! let mut response = HttpResponse::new();
//!
//! filter.do_filter(&request, &mut response, |request, _response| {
//!     let session = request.session()?;
//!     session.set("visits", 1)?;
//!     Ok::<_, tether_core::SessionError>(())
//! })?;
//! # Ok::<(), tether_core::SessionError>(())
//! ```

mod context;
mod facade;

pub use facade::HttpSession;

pub(crate) use context::SessionContext;

use crate::error::{SessionError, SessionResult};
use crate::http::{RequestAttributes, RequestHead, ResponseSink};
use crate::session::SessionRepository;
use std::net::IpAddr;
use std::rc::Rc;
use std::sync::Arc;

/// Request attribute set once a lookup for the requested id missed
pub const INVALID_SESSION_ID_ATTR: &str = "tether.SessionRepository.invalidSessionId";

/// Log target for session creation and lifecycle tracing
pub const SESSION_LOG_TARGET: &str = "tether::session";

/// A request whose session is backed by a [`SessionRepository`]
pub struct SessionRequest<'r, Req> {
    request: &'r Req,
    context: Rc<SessionContext>,
}

impl<'r, Req: RequestHead> SessionRequest<'r, Req> {
    pub(crate) fn new(request: &'r Req, context: Rc<SessionContext>) -> Self {
        Self { request, context }
    }

    /// The wrapped request
    pub fn inner(&self) -> &'r Req {
        self.request
    }

    /// The current session, created if needed
    pub fn session(&self) -> SessionResult<HttpSession> {
        self.context
            .get_session(self.request, true)?
            .ok_or_else(|| SessionError::IllegalState("Session could not be created".to_string()))
    }

    /// The current session; `None` when there is none and `create` is false
    pub fn get_session(&self, create: bool) -> SessionResult<Option<HttpSession>> {
        self.context.get_session(self.request, create)
    }

    /// First session id carried by the request
    pub fn requested_session_id(&self) -> Option<String> {
        self.context.requested_session_id(self.request)
    }

    pub fn is_requested_session_id_valid(&self) -> SessionResult<bool> {
        self.context.is_requested_session_id_valid(self.request)
    }

    /// Give the current session a new id, keeping its attributes
    pub fn change_session_id(&self) -> SessionResult<String> {
        self.context.change_session_id(self.request)
    }

    /// Save the session and write or expire the client id
    pub fn commit_session(&self, response: &mut dyn ResponseSink) -> SessionResult<()> {
        self.context.commit_session(self.request, response)
    }

    pub fn repository(&self) -> Arc<dyn SessionRepository> {
        self.context.repository()
    }
}

impl<Req: RequestHead> RequestHead for SessionRequest<'_, Req> {
    fn header_values(&self, name: &str) -> Vec<&str> {
        self.request.header_values(name)
    }

    fn cookies(&self) -> Vec<(String, String)> {
        self.request.cookies()
    }

    fn is_secure(&self) -> bool {
        self.request.is_secure()
    }

    fn context_path(&self) -> &str {
        self.request.context_path()
    }

    fn server_name(&self) -> Option<&str> {
        self.request.server_name()
    }

    fn remote_addr(&self) -> Option<IpAddr> {
        self.request.remote_addr()
    }

    fn attributes(&self) -> &RequestAttributes {
        self.request.attributes()
    }
}
