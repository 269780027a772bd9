//! Background sweep of expired sessions
//!
//! Expiry is enforced lazily on load; the manager additionally purges
//! sessions that are never requested again so a backend does not grow
//! without bound.

use super::SessionRepository;
use crate::error::SessionResult;
use std::sync::Arc;
use std::time::Duration;

/// Session manager configuration
#[derive(Debug, Clone)]
pub struct SessionManagerConfig {
    /// Enable the background sweep
    pub auto_cleanup: bool,

    /// Interval between sweeps
    pub cleanup_interval: Duration,

    /// Log sweeps that removed sessions
    pub log_cleanup: bool,
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self {
            auto_cleanup: true,
            cleanup_interval: Duration::from_secs(300), // 5 minutes
            log_cleanup: true,
        }
    }
}

impl SessionManagerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_auto_cleanup(mut self, enabled: bool) -> Self {
        self.auto_cleanup = enabled;
        self
    }

    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    pub fn with_log_cleanup(mut self, enabled: bool) -> Self {
        self.log_cleanup = enabled;
        self
    }
}

/// Owns a repository and sweeps it on a tokio interval
///
/// Must be created inside a tokio runtime when auto cleanup is enabled.
/// The sweep task is aborted when the manager is dropped.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use tether_core::session::{MapSessionRepository, SessionManager};
///
/// # async fn example() {
/// let manager = SessionManager::new(Arc::new(MapSessionRepository::new()));
/// let repository = manager.repository();
/// # }
/// ```
pub struct SessionManager {
    repository: Arc<dyn SessionRepository>,
    cleanup_task: Option<tokio::task::JoinHandle<()>>,
    config: SessionManagerConfig,
}

impl SessionManager {
    pub fn new(repository: Arc<dyn SessionRepository>) -> Self {
        Self::with_config(repository, SessionManagerConfig::default())
    }

    pub fn with_config(repository: Arc<dyn SessionRepository>, config: SessionManagerConfig) -> Self {
        let cleanup_task = if config.auto_cleanup {
            let cleanup_repository = Arc::clone(&repository);
            let interval = config.cleanup_interval;
            let log_cleanup = config.log_cleanup;

            Some(tokio::spawn(async move {
                let mut interval_timer = tokio::time::interval(interval);
                loop {
                    interval_timer.tick().await;

                    match cleanup_repository.clean_up_expired_sessions() {
                        Ok(count) if count > 0 && log_cleanup => {
                            log::info!("Cleaned up {} expired sessions", count);
                        }
                        Ok(_) => {}
                        Err(e) => {
                            log::error!("Session cleanup failed: {}", e);
                        }
                    }
                }
            }))
        } else {
            None
        };

        Self { repository, cleanup_task, config }
    }

    pub fn repository(&self) -> Arc<dyn SessionRepository> {
        Arc::clone(&self.repository)
    }

    pub fn config(&self) -> &SessionManagerConfig {
        &self.config
    }

    /// Run a sweep immediately
    pub fn cleanup_now(&self) -> SessionResult<usize> {
        self.repository.clean_up_expired_sessions()
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if let Some(task) = self.cleanup_task.take() {
            task.abort();
        }
    }
}
