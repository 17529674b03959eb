//! Built-in MCP protocol service.
//!
//! Answers the protocol-level methods directly so a service can be exposed
//! over MCP without an external workflow engine.

use super::{ServiceError, ServiceRequest, ServiceResponse, WorkflowService};
use async_trait::async_trait;
use mcpgate_types::PROTOCOL_VERSION;
use serde_json::{json, Value};
use tracing::debug;

/// Workflow service answering `initialize`, `ping` and the list methods.
pub struct ProtocolService {
    server_name: String,
    tools: Vec<Value>,
}

impl ProtocolService {
    pub fn new(server_name: impl Into<String>) -> Self {
        Self {
            server_name: server_name.into(),
            tools: Vec::new(),
        }
    }

    /// Tools advertised by `tools/list`, already in MCP wire shape.
    pub fn with_tools(mut self, tools: Vec<Value>) -> Self {
        self.tools = tools;
        self
    }

    fn initialize(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {}
            },
            "serverInfo": {
                "name": self.server_name,
                "version": env!("CARGO_PKG_VERSION")
            }
        })
    }
}

#[async_trait]
impl WorkflowService for ProtocolService {
    async fn execute(
        &self,
        request: &ServiceRequest,
        response: &mut ServiceResponse,
    ) -> Result<(), ServiceError> {
        let method = request.method();
        debug!("[{}] Builtin handling method: {}", request.service_id, method);

        // Notifications (initialized, cancelled, ...) need no answer
        if method.starts_with("notifications/") {
            return Ok(());
        }

        let result = match method {
            "initialize" => self.initialize(),
            // Empty on purpose; the envelope turns it into {}
            "ping" => json!([]),
            "tools/list" => json!({ "tools": self.tools }),
            "resources/list" => json!({ "resources": [] }),
            "prompts/list" => json!({ "prompts": [] }),
            other => return Err(ServiceError::MethodNotFound(other.to_string())),
        };

        response.set_platform_result(result);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    async fn run(service: &ProtocolService, payload: Value) -> Result<Option<Value>, ServiceError> {
        let request = ServiceRequest::mcp(payload, Uuid::new_v4(), "assistant", "live");
        let mut response = ServiceResponse::new();
        service.execute(&request, &mut response).await?;
        Ok(response.into_platform_result())
    }

    #[tokio::test]
    async fn test_initialize() {
        let service = ProtocolService::new("Assistant");
        let result = run(
            &service,
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(result["protocolVersion"], "2025-06-18");
        assert_eq!(result["serverInfo"]["name"], "Assistant");
        assert!(result["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn test_ping_and_lists() {
        let tool = json!({"name": "search", "description": "Search", "inputSchema": {"type": "object"}});
        let service = ProtocolService::new("Assistant").with_tools(vec![tool.clone()]);

        let ping = run(&service, json!({"id": 1, "method": "ping"})).await.unwrap();
        assert_eq!(ping, Some(json!([])));

        let tools = run(&service, json!({"id": 2, "method": "tools/list"})).await.unwrap();
        assert_eq!(tools, Some(json!({"tools": [tool]})));

        let prompts = run(&service, json!({"id": 3, "method": "prompts/list"})).await.unwrap();
        assert_eq!(prompts, Some(json!({"prompts": []})));
    }

    #[tokio::test]
    async fn test_notification_is_noop() {
        let service = ProtocolService::new("Assistant");
        let result = run(&service, json!({"method": "notifications/initialized"}))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let service = ProtocolService::new("Assistant");
        let err = run(&service, json!({"id": 1, "method": "tools/call"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::MethodNotFound(m) if m == "tools/call"));
    }
}
