//! Session record and storage contract

use super::binding::AttributeValue;
use crate::error::{SessionError, SessionResult};
use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;

/// Default max inactive interval: 30 minutes
pub const DEFAULT_MAX_INACTIVE_INTERVAL_SECS: i64 = 1800;

/// Server-side session record
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    original_id: String,
    attributes: HashMap<String, AttributeValue>,
    creation_time: DateTime<Utc>,
    last_accessed_time: DateTime<Utc>,
    max_inactive_interval: Duration,
}

impl Session {
    /// Create a session with a random id
    pub fn new() -> Self {
        Self::with_id(generate_id())
    }

    /// Create a session with the given id
    pub fn with_id(id: impl Into<String>) -> Self {
        let id = id.into();
        let now = Utc::now();
        Self {
            original_id: id.clone(),
            id,
            attributes: HashMap::new(),
            creation_time: now,
            last_accessed_time: now,
            max_inactive_interval: Duration::seconds(DEFAULT_MAX_INACTIVE_INTERVAL_SECS),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Id this session was last stored under
    pub fn original_id(&self) -> &str {
        &self.original_id
    }

    /// Whether the id changed since the session was last stored
    pub fn is_renamed(&self) -> bool {
        self.id != self.original_id
    }

    /// Assign a fresh random id, keeping all attributes. Returns the new id.
    pub fn change_session_id(&mut self) -> String {
        self.id = generate_id();
        self.id.clone()
    }

    /// Record that the session is now stored under its current id
    pub fn mark_persisted(&mut self) {
        self.original_id = self.id.clone();
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    pub(crate) fn attribute_mut(&mut self, name: &str) -> Option<&mut AttributeValue> {
        self.attributes.get_mut(name)
    }

    /// Store a raw attribute value, returning the previous one
    pub fn set_attribute(
        &mut self,
        name: impl Into<String>,
        value: AttributeValue,
    ) -> Option<AttributeValue> {
        self.attributes.insert(name.into(), value)
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<AttributeValue> {
        self.attributes.remove(name)
    }

    /// Attribute names, sorted
    pub fn attribute_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.attributes.keys().cloned().collect();
        names.sort();
        names
    }

    /// Get a plain attribute decoded into `T`
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let value = self.attributes.get(name)?.as_value()?;
        serde_json::from_value(value.clone()).ok()
    }

    /// Get a plain attribute, failing when it is absent or has another shape
    pub fn required_attribute<T: DeserializeOwned>(&self, name: &str) -> SessionResult<T> {
        let value = self
            .attributes
            .get(name)
            .and_then(AttributeValue::as_value)
            .ok_or_else(|| SessionError::IllegalState(format!("Required attribute '{}' is missing", name)))?;
        Ok(serde_json::from_value(value.clone())?)
    }

    /// Get a plain attribute or a default
    pub fn attribute_or<T: DeserializeOwned>(&self, name: &str, default: T) -> T {
        self.get(name).unwrap_or(default)
    }

    /// Encode `value` as JSON and store it
    pub fn set<T: Serialize>(&mut self, name: impl Into<String>, value: T) -> SessionResult<()> {
        let value = serde_json::to_value(value)?;
        self.attributes.insert(name.into(), AttributeValue::Value(value));
        Ok(())
    }

    pub fn creation_time(&self) -> DateTime<Utc> {
        self.creation_time
    }

    pub fn set_creation_time(&mut self, time: DateTime<Utc>) {
        self.creation_time = time;
    }

    pub fn last_accessed_time(&self) -> DateTime<Utc> {
        self.last_accessed_time
    }

    pub fn set_last_accessed_time(&mut self, time: DateTime<Utc>) {
        self.last_accessed_time = time;
    }

    /// Inactivity allowed before expiry. Negative = never expires.
    pub fn max_inactive_interval(&self) -> Duration {
        self.max_inactive_interval
    }

    pub fn set_max_inactive_interval(&mut self, interval: Duration) {
        self.max_inactive_interval = interval;
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Expired when the interval is non-negative and has fully elapsed since last access
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        if self.max_inactive_interval < Duration::zero() {
            return false;
        }
        now - self.last_accessed_time >= self.max_inactive_interval
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Session storage contract
///
/// Implement this trait to plug a storage backend (memory, Redis, SQL, ...)
/// into the session layer. Calls happen on the request thread.
pub trait SessionRepository: Send + Sync {
    /// Create a session with a server-assigned id and the default max inactive interval.
    /// The session is not stored until [`save`](Self::save) is called.
    fn create_session(&self) -> SessionResult<Session>;

    /// Store a session. When the id changed since load, the record under the
    /// previous id is replaced by one under the new id.
    fn save(&self, session: &Session) -> SessionResult<()>;

    /// Load a session. Expired sessions are deleted and reported as absent.
    fn find_by_id(&self, id: &str) -> SessionResult<Option<Session>>;

    fn delete_by_id(&self, id: &str) -> SessionResult<()>;

    /// Remove every expired session, returning how many were removed
    fn clean_up_expired_sessions(&self) -> SessionResult<usize> {
        Ok(0)
    }
}

// Implement SessionRepository for Arc<R> to allow sharing one backend
impl<R: SessionRepository + ?Sized> SessionRepository for std::sync::Arc<R> {
    fn create_session(&self) -> SessionResult<Session> {
        (**self).create_session()
    }

    fn save(&self, session: &Session) -> SessionResult<()> {
        (**self).save(session)
    }

    fn find_by_id(&self, id: &str) -> SessionResult<Option<Session>> {
        (**self).find_by_id(id)
    }

    fn delete_by_id(&self, id: &str) -> SessionResult<()> {
        (**self).delete_by_id(id)
    }

    fn clean_up_expired_sessions(&self) -> SessionResult<usize> {
        (**self).clean_up_expired_sessions()
    }
}
