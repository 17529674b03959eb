//! MCP session management.
//!
//! Sessions are persisted through a [`SessionStore`](crate::storage::SessionStore);
//! the manager layers the lifecycle rules on top and the registry hands out
//! one manager per service.

mod manager;
mod reaper;
mod registry;

pub use manager::{SessionError, SessionManager};
pub use reaper::spawn_reaper;
pub use registry::{SessionManagerRegistry, StoreProvider};
