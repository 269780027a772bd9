//! In-memory session repository
//!
//! Uses a thread-safe HashMap behind an RwLock. Suitable for development,
//! tests and single-node deployments. Sessions are lost on restart.

use super::store::{Session, SessionRepository};
use crate::error::{SessionError, SessionResult};
use chrono::Duration;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// In-memory session repository
///
/// # Example
///
/// ```
/// use tether_core::session::{MapSessionRepository, SessionRepository};
///
/// let repository = MapSessionRepository::new()
///     .with_default_max_inactive_interval(chrono::Duration::minutes(15));
/// let session = repository.create_session()?;
/// repository.save(&session)?;
/// # Ok::<(), tether_core::SessionError>(())
/// ```
#[derive(Clone, Default)]
pub struct MapSessionRepository {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    default_max_inactive_interval: Option<Duration>,
}

impl MapSessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interval applied to every session created by this repository
    pub fn with_default_max_inactive_interval(mut self, interval: Duration) -> Self {
        self.default_max_inactive_interval = Some(interval);
        self
    }

    /// Number of stored sessions, expired ones included
    pub fn count(&self) -> SessionResult<usize> {
        Ok(self.read()?.len())
    }

    fn read(&self) -> SessionResult<RwLockReadGuard<'_, HashMap<String, Session>>> {
        self.sessions.read().map_err(|_| poisoned())
    }

    fn write(&self) -> SessionResult<RwLockWriteGuard<'_, HashMap<String, Session>>> {
        self.sessions.write().map_err(|_| poisoned())
    }
}

fn poisoned() -> SessionError {
    SessionError::Storage("session map lock poisoned".to_string())
}

impl SessionRepository for MapSessionRepository {
    fn create_session(&self) -> SessionResult<Session> {
        let mut session = Session::new();
        if let Some(interval) = self.default_max_inactive_interval {
            session.set_max_inactive_interval(interval);
        }
        Ok(session)
    }

    fn save(&self, session: &Session) -> SessionResult<()> {
        let mut stored = session.clone();
        stored.mark_persisted();

        let mut sessions = self.write()?;
        if session.is_renamed() {
            sessions.remove(session.original_id());
        }
        sessions.insert(stored.id().to_string(), stored);
        Ok(())
    }

    fn find_by_id(&self, id: &str) -> SessionResult<Option<Session>> {
        let session = match self.read()?.get(id) {
            Some(session) => session.clone(),
            None => return Ok(None),
        };

        if session.is_expired() {
            log::debug!("Session {} expired, removing", id);
            self.delete_by_id(id)?;
            return Ok(None);
        }
        Ok(Some(session))
    }

    fn delete_by_id(&self, id: &str) -> SessionResult<()> {
        self.write()?.remove(id);
        Ok(())
    }

    fn clean_up_expired_sessions(&self) -> SessionResult<usize> {
        let mut sessions = self.write()?;
        let initial_count = sessions.len();

        sessions.retain(|_, session| !session.is_expired());

        Ok(initial_count - sessions.len())
    }
}
