//! API handlers.

pub mod error;
pub mod mcp;
pub mod oauth;
pub mod sse;

pub use error::ApiError;
