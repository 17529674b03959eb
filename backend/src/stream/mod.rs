//! Server-sent event streaming for MCP sessions.

mod handler;
mod writer;

pub use handler::{StreamHandler, StreamSettings, StreamState};
pub use writer::{channel, PingStyle, StreamError, StreamWriter};

pub(crate) use writer::event_stream_headers;
