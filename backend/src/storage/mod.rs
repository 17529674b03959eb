//! Storage layer for MCP sessions and their event queues.

mod file_store;
mod postgres_store;

pub use file_store::FileSessionStore;
pub use postgres_store::PostgresSessionStore;

use async_trait::async_trait;
use mcpgate_types::{QueuedEvent, Session, SessionId, SessionStatus};
use std::time::Duration;

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Session not found: {0}")]
    NotFound(SessionId),

    #[error("Session {id} is {from}, expected NEW")]
    InvalidTransition { id: SessionId, from: SessionStatus },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Whether the error means the session does not exist (or can no longer be used).
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::NotFound(_) | StoreError::InvalidTransition { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Trait for session storage backends.
///
/// A store holds the session records and one FIFO event queue per session.
/// It may be shared by several server processes, so implementations must not
/// rely on in-memory coordination.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Allocate and persist a NEW session.
    async fn create_session(&self) -> Result<SessionId>;

    /// Load a session record.
    async fn get_session(&self, id: &SessionId) -> Result<Session>;

    /// Overwrite a session record. A session once saved as TERMINATED stays
    /// TERMINATED whatever is saved later.
    async fn save_session(&self, session: &Session) -> Result<()>;

    /// Bump the session's `last_active`. Never changes its status.
    async fn ping_session(&self, id: &SessionId) -> Result<()>;

    /// Move a session from NEW to INITIALISED.
    async fn initialise_session(&self, id: &SessionId) -> Result<()>;

    /// Append one event to the session queue.
    async fn queue_event(&self, id: &SessionId, event: QueuedEvent) -> Result<()> {
        self.queue_events(id, vec![event]).await
    }

    /// Append several events, preserving their order.
    async fn queue_events(&self, id: &SessionId, events: Vec<QueuedEvent>) -> Result<()>;

    /// Pop the oldest queued event, if any.
    async fn next_event(&self, id: &SessionId) -> Result<Option<QueuedEvent>>;

    /// Remove a session and everything queued for it.
    async fn delete_session(&self, id: &SessionId) -> Result<()>;

    /// Delete every session idle for longer than `idle_timeout`.
    async fn purge_expired(&self, idle_timeout: Duration) -> Result<usize>;
}

/// Whether a session last active at `session.last_active` has outlived `idle_timeout`.
pub(crate) fn is_expired(session: &Session, idle_timeout: Duration) -> bool {
    let idle = chrono::Utc::now() - session.last_active;
    match idle.to_std() {
        Ok(idle) => idle > idle_timeout,
        // last_active in the future (clock skew between processes)
        Err(_) => false,
    }
}
