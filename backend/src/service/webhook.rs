//! Webhook service forwarding payloads to an external workflow engine.

use super::{ServiceError, ServiceRequest, ServiceResponse, WorkflowService};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// POSTs each payload to a fixed URL and uses the JSON reply as the result.
pub struct WebhookService {
    client: reqwest::Client,
    url: String,
}

impl WebhookService {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl WorkflowService for WebhookService {
    async fn execute(
        &self,
        request: &ServiceRequest,
        response: &mut ServiceResponse,
    ) -> Result<(), ServiceError> {
        debug!(
            "[{}] Forwarding '{}' to {}",
            request.service_id,
            request.method(),
            self.url
        );

        let reply = self
            .client
            .post(&self.url)
            .header("X-Mcp-Session-Id", request.session_id.to_string())
            .header("X-Mcp-Role", request.role.as_str())
            .header("X-Mcp-Variant", &request.variant)
            .json(&request.payload)
            .send()
            .await?;

        let status = reply.status();
        if !status.is_success() {
            let body = reply.text().await.unwrap_or_default();
            return Err(ServiceError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = reply.bytes().await?;
        if bytes.is_empty() {
            // Accepted with nothing to say, e.g. for notifications
            return Ok(());
        }
        let result: Value = serde_json::from_slice(&bytes)
            .map_err(|e| ServiceError::Execution(format!("Invalid workflow response: {}", e)))?;
        response.set_platform_result(result);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, routing::post, Json, Router};
    use serde_json::json;
    use uuid::Uuid;

    async fn spawn_upstream(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/run", addr)
    }

    #[tokio::test]
    async fn test_forwards_payload_and_headers() {
        let router = Router::new().route(
            "/run",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                Json(json!({
                    "echo": body["method"],
                    "role": headers["x-mcp-role"].to_str().unwrap(),
                    "variant": headers["x-mcp-variant"].to_str().unwrap(),
                }))
            }),
        );
        let url = spawn_upstream(router).await;
        let service = WebhookService::new(url, Duration::from_secs(5)).unwrap();

        let request = ServiceRequest::mcp(
            json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}),
            Uuid::new_v4(),
            "assistant",
            "draft",
        );
        let mut response = ServiceResponse::new();
        service.execute(&request, &mut response).await.unwrap();

        assert_eq!(
            response.platform_result(),
            Some(&json!({"echo": "tools/list", "role": "mcp-server", "variant": "draft"}))
        );
    }

    #[tokio::test]
    async fn test_upstream_failure_is_error() {
        let router = Router::new().route(
            "/run",
            post(|| async { (axum::http::StatusCode::BAD_GATEWAY, "down") }),
        );
        let url = spawn_upstream(router).await;
        let service = WebhookService::new(url, Duration::from_secs(5)).unwrap();

        let request = ServiceRequest::mcp(json!({"id": 1, "method": "x"}), Uuid::new_v4(), "a", "b");
        let mut response = ServiceResponse::new();
        let err = service.execute(&request, &mut response).await.unwrap_err();

        assert!(matches!(err, ServiceError::Upstream { status: 502, .. }));
        assert!(response.platform_result().is_none());
    }
}
