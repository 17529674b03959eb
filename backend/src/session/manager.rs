//! Session lifecycle operations used by the transport handlers.

use crate::storage::{SessionStore, StoreError};
use mcpgate_types::{QueuedEvent, Session, SessionId};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Errors surfaced by the session manager.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Absent, evicted or terminated.
    #[error("Session not found: {0}")]
    NotFound(SessionId),

    #[error("Session {0} was already initialised")]
    AlreadyInitialised(SessionId),

    #[error("Session store error: {0}")]
    Store(StoreError),

    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => SessionError::NotFound(id),
            StoreError::InvalidTransition { id, .. } => SessionError::AlreadyInitialised(id),
            other => SessionError::Store(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;

/// Business operations on the sessions of one service.
///
/// Never touches session fields directly; every mutation goes through the store.
pub struct SessionManager {
    service_id: String,
    store: Arc<dyn SessionStore>,
}

impl SessionManager {
    pub fn new(service_id: impl Into<String>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            service_id: service_id.into(),
            store,
        }
    }

    /// The service this manager is scoped to.
    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    /// Create a new session and return its ID.
    pub async fn create_session(&self) -> Result<SessionId> {
        let id = self.store.create_session().await?;
        info!("[{}] Created MCP session: {}", self.service_id, id);
        Ok(id)
    }

    /// Load a session that is still usable, optionally marking it active.
    pub async fn get_active_session(&self, id: &SessionId, touch: bool) -> Result<Session> {
        let mut session = self.store.get_session(id).await?;
        if session.is_terminated() {
            debug!("[{}] Session {} is terminated", self.service_id, id);
            return Err(SessionError::NotFound(*id));
        }
        if touch {
            self.store.ping_session(id).await?;
            session.touch();
        }
        Ok(session)
    }

    /// Mark a session as initialised (NEW -> INITIALISED).
    pub async fn initialise_session(&self, id: &SessionId) -> Result<()> {
        self.store.initialise_session(id).await?;
        debug!("[{}] MCP session {} marked as initialised", self.service_id, id);
        Ok(())
    }

    /// Queue a JSON-RPC message for delivery on the session's stream.
    pub async fn enqueue_message<T: Serialize>(&self, id: &SessionId, message: &T) -> Result<()> {
        let data = serde_json::to_value(message)?;
        self.store.queue_event(id, QueuedEvent::message(data)).await?;
        Ok(())
    }

    /// Pop the next event waiting for the session's stream.
    pub async fn next_event(&self, id: &SessionId) -> Result<Option<QueuedEvent>> {
        Ok(self.store.next_event(id).await?)
    }

    /// Terminate a session. Subsequent `get_active_session` calls fail.
    pub async fn terminate_session(&self, id: &SessionId) -> Result<()> {
        let mut session = self.store.get_session(id).await?;
        if session.is_terminated() {
            return Err(SessionError::NotFound(*id));
        }
        session.status = mcpgate_types::SessionStatus::Terminated;
        session.touch();
        self.store.save_session(&session).await?;
        info!("[{}] Terminated MCP session: {}", self.service_id, id);
        Ok(())
    }

    /// Evict sessions idle for longer than `idle_timeout`.
    pub async fn purge_expired(&self, idle_timeout: Duration) -> Result<usize> {
        Ok(self.store.purge_expired(idle_timeout).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FileSessionStore;
    use mcpgate_types::{JsonRpcResponse, SessionStatus};
    use serde_json::json;
    use tempfile::tempdir;

    fn manager(dir: &std::path::Path) -> SessionManager {
        SessionManager::new("assistant", Arc::new(FileSessionStore::new(dir)))
    }

    #[tokio::test]
    async fn test_terminated_session_is_not_active() {
        let dir = tempdir().unwrap();
        let manager = manager(dir.path());

        let id = manager.create_session().await.unwrap();
        assert!(manager.get_active_session(&id, true).await.is_ok());

        manager.terminate_session(&id).await.unwrap();
        assert!(matches!(
            manager.get_active_session(&id, false).await,
            Err(SessionError::NotFound(_))
        ));
        // Terminating twice reports the session as gone
        assert!(matches!(
            manager.terminate_session(&id).await,
            Err(SessionError::NotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_terminate_wins_over_concurrent_liveness_checks() {
        let dir = tempdir().unwrap();
        let manager = Arc::new(manager(dir.path()));

        let mut revived = 0;
        for _ in 0..100 {
            let id = manager.create_session().await.unwrap();
            manager.initialise_session(&id).await.unwrap();

            let checker = {
                let manager = manager.clone();
                tokio::spawn(async move { manager.get_active_session(&id, true).await })
            };
            manager.terminate_session(&id).await.unwrap();
            let _ = checker.await.unwrap();

            if manager.get_active_session(&id, false).await.is_ok() {
                revived += 1;
            }
        }
        assert_eq!(revived, 0);
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let dir = tempdir().unwrap();
        let manager = manager(dir.path());

        let id = uuid::Uuid::new_v4();
        assert!(matches!(
            manager.get_active_session(&id, true).await,
            Err(SessionError::NotFound(missing)) if missing == id
        ));
        assert!(matches!(
            manager.terminate_session(&id).await,
            Err(SessionError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_initialise_twice() {
        let dir = tempdir().unwrap();
        let manager = manager(dir.path());
        let id = manager.create_session().await.unwrap();

        manager.initialise_session(&id).await.unwrap();
        let session = manager.get_active_session(&id, false).await.unwrap();
        assert_eq!(session.status, SessionStatus::Initialised);

        assert!(matches!(
            manager.initialise_session(&id).await,
            Err(SessionError::AlreadyInitialised(_))
        ));
    }

    #[tokio::test]
    async fn test_enqueue_message_wraps_as_message_event() {
        let dir = tempdir().unwrap();
        let manager = manager(dir.path());
        let id = manager.create_session().await.unwrap();

        let response = JsonRpcResponse::success(json!(1), json!({"ok": true}));
        manager.enqueue_message(&id, &response).await.unwrap();

        let event = manager.next_event(&id).await.unwrap().unwrap();
        assert_eq!(event.event, "message");
        assert_eq!(
            event.data,
            json!({"jsonrpc": "2.0", "id": 1, "result": {"ok": true}})
        );
        assert!(manager.next_event(&id).await.unwrap().is_none());
    }
}
