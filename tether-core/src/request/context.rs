//! Per-request session state
//!
//! One [`SessionContext`] is attached to each request as a typed extension and
//! survives re-dispatches of that request. It memoizes the requested id, the
//! validity check and the current session, and performs the commit-time save.

use super::facade::HttpSession;
use super::{INVALID_SESSION_ID_ATTR, SESSION_LOG_TARGET};
use crate::error::{SessionError, SessionResult};
use crate::http::{RequestHead, ResponseSink};
use crate::resolver::SessionIdResolver;
use crate::session::{Session, SessionRepository};
use chrono::Utc;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

#[derive(Default)]
struct RequestSessionState {
    current: Option<HttpSession>,
    /// Ids carried by the request; resolved once
    resolved_ids: Option<Vec<String>>,
    /// Lookup result for the requested id; `None` = not looked up yet
    requested_session: Option<Option<Session>>,
    requested_session_id_valid: Option<bool>,
    requested_session_invalidated: bool,
}

pub(crate) struct SessionContext {
    repository: Arc<dyn SessionRepository>,
    resolver: Arc<dyn SessionIdResolver>,
    state: RefCell<RequestSessionState>,
    dispatch_depth: Cell<usize>,
}

impl SessionContext {
    pub(crate) fn new(repository: Arc<dyn SessionRepository>, resolver: Arc<dyn SessionIdResolver>) -> Self {
        Self {
            repository,
            resolver,
            state: RefCell::new(RequestSessionState::default()),
            dispatch_depth: Cell::new(0),
        }
    }

    pub(crate) fn repository(&self) -> Arc<dyn SessionRepository> {
        Arc::clone(&self.repository)
    }

    fn current(&self) -> Option<HttpSession> {
        self.state.borrow().current.clone()
    }

    /// First id carried by the request
    pub(crate) fn requested_session_id(&self, request: &dyn RequestHead) -> Option<String> {
        if let Some(ids) = &self.state.borrow().resolved_ids {
            return ids.first().cloned();
        }
        let ids = self.resolver.resolve_session_ids(request);
        let first = ids.first().cloned();
        self.state.borrow_mut().resolved_ids = Some(ids);
        first
    }

    fn load_requested_session(&self, request: &dyn RequestHead) -> SessionResult<()> {
        if self.state.borrow().requested_session.is_some() {
            return Ok(());
        }
        let loaded = match self.requested_session_id(request) {
            Some(id) => self.repository.find_by_id(&id)?,
            None => None,
        };
        self.state.borrow_mut().requested_session = Some(loaded);
        Ok(())
    }

    fn clear_requested_session_cache(&self) {
        self.state.borrow_mut().requested_session = None;
    }

    /// Whether the requested id maps to a stored session. Memoized.
    pub(crate) fn is_requested_session_id_valid(&self, request: &dyn RequestHead) -> SessionResult<bool> {
        if let Some(valid) = self.state.borrow().requested_session_id_valid {
            return Ok(valid);
        }
        self.load_requested_session(request)?;
        let mut state = self.state.borrow_mut();
        let valid = match state.requested_session.as_mut().and_then(Option::as_mut) {
            Some(session) => {
                session.set_last_accessed_time(Utc::now());
                true
            }
            None => false,
        };
        state.requested_session_id_valid = Some(valid);
        Ok(valid)
    }

    /// The current session, loading the requested one or creating a new one on demand
    pub(crate) fn get_session(
        self: &Rc<Self>,
        request: &dyn RequestHead,
        create: bool,
    ) -> SessionResult<Option<HttpSession>> {
        if let Some(current) = self.current() {
            return Ok(Some(current));
        }

        if !request.attributes().contains(INVALID_SESSION_ID_ATTR) {
            self.load_requested_session(request)?;
            let found = {
                let mut state = self.state.borrow_mut();
                match state.requested_session.take() {
                    Some(Some(session)) => Some(session),
                    other => {
                        state.requested_session = other;
                        None
                    }
                }
            };
            match found {
                Some(mut session) => {
                    session.set_last_accessed_time(Utc::now());
                    let wrapped = HttpSession::new(session, false, self);
                    let mut state = self.state.borrow_mut();
                    state.requested_session_id_valid = Some(true);
                    state.current = Some(wrapped.clone());
                    return Ok(Some(wrapped));
                }
                None => {
                    log::debug!(
                        target: SESSION_LOG_TARGET,
                        "No session found by id: caching result for getSession(false) for this request"
                    );
                    request.attributes().set(INVALID_SESSION_ID_ATTR, true);
                }
            }
        }

        if !create {
            return Ok(None);
        }

        let mut session = self.repository.create_session()?;
        session.set_last_accessed_time(Utc::now());
        log::debug!(target: SESSION_LOG_TARGET, "A new session was created with id {}", session.id());
        let wrapped = HttpSession::new(session, true, self);
        self.state.borrow_mut().current = Some(wrapped.clone());
        Ok(Some(wrapped))
    }

    /// Give the current session a fresh id. The old record goes away on save.
    pub(crate) fn change_session_id(self: &Rc<Self>, request: &dyn RequestHead) -> SessionResult<String> {
        let session = self.get_session(request, false)?.ok_or_else(|| {
            SessionError::IllegalState(
                "Cannot change session ID. There is no session associated with this request.".to_string(),
            )
        })?;
        let new_id = session.change_id();
        log::debug!(target: SESSION_LOG_TARGET, "Session id changed to {}", new_id);
        Ok(new_id)
    }

    pub(crate) fn on_invalidate(&self) {
        let mut state = self.state.borrow_mut();
        state.requested_session_invalidated = true;
        state.current = None;
        state.requested_session = None;
    }

    /// Save the current session and tell the client its id, or expire the
    /// client id after an invalidation. Safe to call more than once.
    pub(crate) fn commit_session(&self, request: &dyn RequestHead, response: &mut dyn ResponseSink) -> SessionResult<()> {
        let Some(session) = self.current() else {
            if self.state.borrow().requested_session_invalidated {
                log::debug!(target: SESSION_LOG_TARGET, "Expiring client session id after invalidation");
                self.resolver.expire_session(request, response)?;
            }
            return Ok(());
        };

        let requested_id = self.requested_session_id(request);
        self.clear_requested_session_cache();
        let session_id = session.save(self.repository.as_ref())?;
        if !self.is_requested_session_id_valid(request)? || requested_id.as_deref() != Some(session_id.as_str()) {
            self.resolver.set_session_id(request, response, &session_id)?;
        }
        Ok(())
    }

    pub(crate) fn is_dispatching(&self) -> bool {
        self.dispatch_depth.get() > 0
    }

    /// Mark a top-level dispatch as running until the guard drops
    pub(crate) fn enter_dispatch(self: &Rc<Self>) -> DispatchGuard {
        self.dispatch_depth.set(self.dispatch_depth.get() + 1);
        DispatchGuard { context: Rc::clone(self) }
    }
}

pub(crate) struct DispatchGuard {
    context: Rc<SessionContext>,
}

impl Drop for DispatchGuard {
    fn drop(&mut self) {
        let depth = self.context.dispatch_depth.get();
        self.context.dispatch_depth.set(depth.saturating_sub(1));
    }
}
