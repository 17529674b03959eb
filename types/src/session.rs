//! Session data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Unique identifier for an MCP session.
pub type SessionId = Uuid;

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    /// Created, `initialize` not yet completed.
    New,
    /// `initialize` completed.
    Initialised,
    /// Closed for good; never resurrected.
    Terminated,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::New => "NEW",
            SessionStatus::Initialised => "INITIALISED",
            SessionStatus::Terminated => "TERMINATED",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(SessionStatus::New),
            "INITIALISED" => Ok(SessionStatus::Initialised),
            "TERMINATED" => Ok(SessionStatus::Terminated),
            other => Err(format!("unknown session status: {}", other)),
        }
    }
}

/// Persisted session record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct Session {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = Uuid))]
    pub session_id: SessionId,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl Session {
    /// Create a fresh NEW session with a random id.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4(),
            status: SessionStatus::New,
            created_at: now,
            last_active: now,
        }
    }

    /// Bump `last_active` to now.
    pub fn touch(&mut self) {
        self.last_active = Utc::now();
    }

    pub fn is_terminated(&self) -> bool {
        self.status == SessionStatus::Terminated
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// An opaque unit of server-to-client push content waiting in a session queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct QueuedEvent {
    /// SSE event name (`message` for JSON-RPC traffic).
    pub event: String,
    pub data: Value,
}

impl QueuedEvent {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// A JSON-RPC message destined for the client.
    pub fn message(data: Value) -> Self {
        Self::new("message", data)
    }
}
