//! Error types shared by every session component

/// Errors raised by session id transport, session lifecycle and storage
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    /// A required configuration value is missing or malformed
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Two mutually exclusive options were set
    #[error("Conflicting configuration: {0}")]
    ConflictingConfig(String),

    /// A session operation was invoked in a state that does not allow it
    #[error("{0}")]
    IllegalState(String),

    /// A cookie attribute would produce an invalid Set-Cookie header
    #[error("Invalid cookie: {0}")]
    InvalidCookie(String),

    /// A header name or value rejected by the response
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Failure reported by a session repository
    #[error("Storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

impl SessionError {
    /// The error returned by any access to an invalidated session
    pub(crate) fn invalidated() -> Self {
        SessionError::IllegalState("Session already invalidated".to_string())
    }
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;
