//! Shared types for the mcpgate MCP gateway.
//!
//! This crate contains the JSON-RPC wire types, the session data model and
//! the HTTP-level constants shared between the server and its clients.

/// Default port for the mcpgate server.
pub const DEFAULT_PORT: u16 = 8080;

/// MCP protocol revision announced by the server.
pub const PROTOCOL_VERSION: &str = "2025-06-18";

/// Header carrying the MCP session id (Streamable HTTP transport).
pub const MCP_SESSION_ID_HEADER: &str = "mcp-session-id";

/// Header carrying the negotiated MCP protocol revision.
pub const MCP_PROTOCOL_VERSION_HEADER: &str = "mcp-protocol-version";

/// Extra session id header sent by the legacy SSE transport.
pub const X_MCP_SESSION_ID_HEADER: &str = "x-mcp-session-id";

pub mod api;
pub mod jsonrpc;
pub mod session;

// Re-export commonly used types
pub use api::ErrorResponse;
pub use jsonrpc::{JsonRpcError, JsonRpcResponse, JSONRPC_VERSION};
pub use session::{QueuedEvent, Session, SessionId, SessionStatus};
