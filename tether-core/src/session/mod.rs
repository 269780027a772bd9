//! Session records and storage
//!
//! - [`Session`] - the server-side record: id, attributes, timestamps, inactivity policy
//! - [`SessionRepository`] - the CRUD + expiry contract every backend satisfies
//! - [`MapSessionRepository`] - in-memory backend
//! - [`SessionManager`] - background sweep of expired sessions
//! - [`SessionBindingListener`] - attribute values notified on bind/unbind
//!
//! The request-facing side (lazy loading, the session facade, commit-time
//! save) lives in [`crate::request`].

mod binding;
mod manager;
mod memory;
mod store;


pub use binding::{AttributeValue, ListenerSlot, SessionBindingEvent, SessionBindingListener};
pub use manager::{SessionManager, SessionManagerConfig};
pub use memory::MapSessionRepository;
pub use store::{Session, SessionRepository, DEFAULT_MAX_INACTIVE_INTERVAL_SECS};
