//! MCP (Model Context Protocol) command handling.
//!
//! Transport-independent: both the Streamable HTTP and the legacy SSE
//! handlers feed payloads through the [`CommandDispatcher`].

pub mod dispatcher;

pub use dispatcher::{CommandDispatcher, DispatchError};
pub(crate) use dispatcher::first_message;
