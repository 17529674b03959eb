//! Workflow services executing MCP payloads.
//!
//! A service is addressed by `(service_id, variant)`. The gateway never
//! interprets the payload itself; it hands it to a [`WorkflowService`] and
//! wraps whatever platform result comes back.

mod builtin;
mod catalog;
mod webhook;

pub use builtin::ProtocolService;
pub use catalog::{CatalogError, ResolvedService, ServiceCatalog, ServiceEntry};
pub use webhook::WebhookService;

use async_trait::async_trait;
use mcpgate_types::SessionId;
use serde_json::Value;
use std::fmt;

/// Role a request is executed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialRole {
    /// Requests arriving through the MCP transports.
    McpServer,
}

impl SpecialRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpecialRole::McpServer => "mcp-server",
        }
    }
}

impl fmt::Display for SpecialRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request handed to a workflow service.
#[derive(Debug, Clone)]
pub struct ServiceRequest {
    /// The raw JSON-RPC message, unchanged.
    pub payload: Value,
    pub role: SpecialRole,
    pub session_id: SessionId,
    pub service_id: String,
    pub variant: String,
}

impl ServiceRequest {
    pub fn mcp(payload: Value, session_id: SessionId, service_id: &str, variant: &str) -> Self {
        Self {
            payload,
            role: SpecialRole::McpServer,
            session_id,
            service_id: service_id.to_string(),
            variant: variant.to_string(),
        }
    }

    /// JSON-RPC method of the payload, or an empty string.
    pub fn method(&self) -> &str {
        mcpgate_types::jsonrpc::message_method(&self.payload).unwrap_or_default()
    }
}

/// Response slot filled by a workflow service.
#[derive(Debug, Default)]
pub struct ServiceResponse {
    platform_result: Option<Value>,
}

impl ServiceResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the platform-level result returned to the MCP client.
    pub fn set_platform_result(&mut self, result: Value) {
        self.platform_result = Some(result);
    }

    pub fn platform_result(&self) -> Option<&Value> {
        self.platform_result.as_ref()
    }

    pub fn into_platform_result(self) -> Option<Value> {
        self.platform_result
    }
}

/// Errors raised while executing a service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Workflow request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Workflow returned HTTP {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Execution failed: {0}")]
    Execution(String),
}

/// Executor for one service variant.
#[async_trait]
pub trait WorkflowService: Send + Sync {
    /// Execute the request, writing any result into `response`.
    async fn execute(
        &self,
        request: &ServiceRequest,
        response: &mut ServiceResponse,
    ) -> Result<(), ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_name() {
        assert_eq!(SpecialRole::McpServer.to_string(), "mcp-server");
    }

    #[test]
    fn test_request_method() {
        let id = uuid::Uuid::new_v4();
        let request = ServiceRequest::mcp(json!({"method": "tools/list"}), id, "a", "live");
        assert_eq!(request.method(), "tools/list");
        assert_eq!(request.role, SpecialRole::McpServer);

        let request = ServiceRequest::mcp(json!([1, 2]), id, "a", "live");
        assert_eq!(request.method(), "");
    }
}
