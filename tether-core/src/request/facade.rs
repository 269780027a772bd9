//! Session facade handed to application code

use super::context::SessionContext;
use crate::error::{SessionError, SessionResult};
use crate::session::{AttributeValue, Session, SessionBindingEvent, SessionRepository};
use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;

struct SessionInner {
    session: RefCell<Session>,
    invalidated: Cell<bool>,
    is_new: Cell<bool>,
    context: Weak<SessionContext>,
    repository: Arc<dyn SessionRepository>,
}

/// The current request's session
///
/// Clones share state. Once [`invalidate`](Self::invalidate) is called every
/// accessor except [`id`](Self::id) and the max-inactive-interval pair fails
/// with an illegal-state error.
#[derive(Clone)]
pub struct HttpSession {
    inner: Rc<SessionInner>,
}

impl HttpSession {
    pub(crate) fn new(session: Session, is_new: bool, context: &Rc<SessionContext>) -> Self {
        Self {
            inner: Rc::new(SessionInner {
                session: RefCell::new(session),
                invalidated: Cell::new(false),
                is_new: Cell::new(is_new),
                context: Rc::downgrade(context),
                repository: context.repository(),
            }),
        }
    }

    fn check_state(&self) -> SessionResult<()> {
        if self.inner.invalidated.get() {
            return Err(SessionError::invalidated());
        }
        Ok(())
    }

    pub fn id(&self) -> String {
        self.inner.session.borrow().id().to_string()
    }

    pub fn creation_time(&self) -> SessionResult<DateTime<Utc>> {
        self.check_state()?;
        Ok(self.inner.session.borrow().creation_time())
    }

    pub fn last_accessed_time(&self) -> SessionResult<DateTime<Utc>> {
        self.check_state()?;
        Ok(self.inner.session.borrow().last_accessed_time())
    }

    pub fn max_inactive_interval(&self) -> Duration {
        self.inner.session.borrow().max_inactive_interval()
    }

    pub fn set_max_inactive_interval(&self, interval: Duration) {
        self.inner.session.borrow_mut().set_max_inactive_interval(interval);
    }

    /// True until the session has been stored by an earlier request
    pub fn is_new(&self) -> SessionResult<bool> {
        self.check_state()?;
        Ok(self.inner.is_new.get())
    }

    pub fn is_invalidated(&self) -> bool {
        self.inner.invalidated.get()
    }

    pub fn attribute(&self, name: &str) -> SessionResult<Option<AttributeValue>> {
        self.check_state()?;
        Ok(self.inner.session.borrow().attribute(name).cloned())
    }

    /// Plain attribute decoded into `T`
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> SessionResult<Option<T>> {
        self.check_state()?;
        Ok(self.inner.session.borrow().get(name))
    }

    pub fn attribute_names(&self) -> SessionResult<Vec<String>> {
        self.check_state()?;
        Ok(self.inner.session.borrow().attribute_names())
    }

    /// Encode `value` as JSON and store it
    pub fn set<T: Serialize>(&self, name: &str, value: T) -> SessionResult<()> {
        self.set_attribute(name, serde_json::to_value(value)?)
    }

    /// Store an attribute, notifying binding listeners. JSON `null` removes it.
    pub fn set_attribute(&self, name: &str, value: impl Into<AttributeValue>) -> SessionResult<()> {
        self.check_state()?;
        let value = value.into();
        if matches!(value, AttributeValue::Value(Value::Null)) {
            return self.remove_attribute(name).map(|_| ());
        }

        let same_listener = self
            .inner
            .session
            .borrow()
            .attribute(name)
            .is_some_and(|previous| previous.is_same_listener(&value));
        if same_listener {
            return Ok(());
        }

        let binds = value.as_listener().map(|slot| Arc::clone(slot.listener()));
        let previous = self.inner.session.borrow_mut().set_attribute(name, value);

        let session_id = self.id();
        let event = SessionBindingEvent { session_id: &session_id, name };
        if let Some(slot) = previous.as_ref().and_then(AttributeValue::as_listener) {
            if slot.is_bound() {
                if let Err(e) = slot.listener().value_unbound(&event) {
                    log::warn!("Error invoking session binding event listener: {:#}", e);
                }
            }
        }
        if let Some(listener) = binds {
            match listener.value_bound(&event) {
                Ok(()) => self.update_bound(name, true),
                Err(e) => log::warn!("Error invoking session binding event listener: {:#}", e),
            }
        }
        Ok(())
    }

    /// Remove an attribute, unbinding a bound listener
    pub fn remove_attribute(&self, name: &str) -> SessionResult<Option<AttributeValue>> {
        self.check_state()?;
        let removed = self.inner.session.borrow_mut().remove_attribute(name);
        if let Some(slot) = removed.as_ref().and_then(AttributeValue::as_listener) {
            if slot.is_bound() {
                let session_id = self.id();
                let event = SessionBindingEvent { session_id: &session_id, name };
                if let Err(e) = slot.listener().value_unbound(&event) {
                    log::warn!("Error invoking session binding event listener: {:#}", e);
                }
            }
        }
        Ok(removed)
    }

    fn update_bound(&self, name: &str, bound: bool) {
        let mut session = self.inner.session.borrow_mut();
        if let Some(slot) = session.attribute_mut(name).and_then(AttributeValue::as_listener_mut) {
            slot.set_bound(bound);
        }
    }

    /// Invalidate the session and delete it from the repository
    pub fn invalidate(&self) -> SessionResult<()> {
        self.check_state()?;
        self.inner.invalidated.set(true);
        if let Some(context) = self.inner.context.upgrade() {
            context.on_invalidate();
        }

        let (id, original_id) = {
            let session = self.inner.session.borrow();
            (session.id().to_string(), session.original_id().to_string())
        };
        self.inner.repository.delete_by_id(&id)?;
        if original_id != id {
            self.inner.repository.delete_by_id(&original_id)?;
        }
        log::debug!(target: super::SESSION_LOG_TARGET, "Session {} invalidated", id);
        Ok(())
    }

    /// Copy of the underlying session record
    pub fn snapshot(&self) -> Session {
        self.inner.session.borrow().clone()
    }

    pub(crate) fn change_id(&self) -> String {
        self.inner.session.borrow_mut().change_session_id()
    }

    /// Save the record and mark it stored under its current id
    pub(crate) fn save(&self, repository: &dyn SessionRepository) -> SessionResult<String> {
        let mut session = self.inner.session.borrow_mut();
        repository.save(&session)?;
        session.mark_persisted();
        Ok(session.id().to_string())
    }
}

impl fmt::Debug for HttpSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpSession")
            .field("id", &self.id())
            .field("is_new", &self.inner.is_new.get())
            .field("invalidated", &self.inner.invalidated.get())
            .finish()
    }
}
