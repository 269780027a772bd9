//! Tether - Core
//!
//! A pluggable session layer for HTTP servers. Tether decides how a session id
//! travels between client and server, loads the session lazily when a handler
//! asks for it, and saves it exactly when the response is about to commit.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tether_core::prelude::*;
//!
//! let repository = Arc::new(MapSessionRepository::new());
//! let filter = SessionRepositoryFilter::new(repository);
//!
//! let request = HttpRequest::from(http::Request::get("/cart").body(())?);
//! let mut response = HttpResponse::new();
//!
//! filter.do_filter(&request, &mut response, |request, response| {
//!     let session = request.session()?;
//!     session.set("items", vec!["book"])?;
//!     response.writer().println("added")
//! })?;
//! ```
//!
//! # Architecture
//!
//! - [`http`] - capability traits the core depends on, plus `http` crate adapters
//! - [`session`] - session record, repository contract and in-memory backend
//! - [`cookie`] - session cookie serialization
//! - [`resolver`] - session id transports (cookie, header, composite, crawler)
//! - [`response`] - commit-aware response decorator
//! - [`request`] - session-backed request wrapper and session facade
//! - [`filter`] - per-request composition root
//! - [`config`] - TOML + environment configuration
//! - [`logging`] - `env_logger` setup

pub mod cache; // Bounded LRU backing the crawler IP table
pub mod config; // Configuration system with TOML support
pub mod cookie;
pub mod error;
pub mod filter;
pub mod http;
pub mod logging;
pub mod prelude;
pub mod request;
pub mod resolver;
pub mod response;
pub mod session;

pub use error::{SessionError, SessionResult};
