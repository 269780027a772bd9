//! Prelude module for convenient imports.
//!
//! ```rust,ignore
//! use tether_core::prelude::*;
//! ```

// === Configuration ===
pub use crate::config::{LoggingConfig, SessionTransport, SessionsConfig, TetherConfig};

// === Errors ===
pub use crate::error::{SessionError, SessionResult};

// === HTTP capability layer ===
pub use crate::http::{HttpRequest, HttpResponse, RequestAttributes, RequestHead, ResponseSink};

// === Sessions ===
pub use crate::request::{HttpSession, SessionRequest};
pub use crate::session::{
    AttributeValue, MapSessionRepository, Session, SessionBindingEvent, SessionBindingListener, SessionManager,
    SessionRepository,
};

// === Id transport ===
pub use crate::cookie::{CookieSerializer, CookieValue, DefaultCookieSerializer};
pub use crate::resolver::{
    CompositeSessionIdResolver, CookieSessionIdResolver, CrawlerSessionIdResolver, HeaderSessionIdResolver,
    SessionIdResolver,
};

// === Request lifecycle ===
pub use crate::filter::SessionRepositoryFilter;
pub use crate::response::CommitAwareResponse;
