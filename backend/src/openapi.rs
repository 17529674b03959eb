//! OpenAPI documentation configuration.

use mcpgate_types::jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use mcpgate_types::ErrorResponse;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::mcp::mcp_post,
        crate::api::mcp::mcp_get,
        crate::api::mcp::mcp_delete,
        crate::api::sse::sse_connect,
        crate::api::sse::sse_message,
        crate::api::oauth::protected_resource,
        crate::api::oauth::authorization_server,
        crate::api::oauth::register,
    ),
    components(
        schemas(
            JsonRpcRequest,
            JsonRpcResponse,
            JsonRpcError,
            ErrorResponse,
        )
    ),
    tags(
        (name = "mcp", description = "MCP Streamable HTTP and legacy SSE transports"),
        (name = "oauth", description = "OAuth discovery stubs")
    ),
    info(
        title = "mcpgate MCP Gateway API",
        version = "0.3.0",
        description = "Model Context Protocol endpoints for conversational workflow services",
        license(
            name = "MIT OR Apache-2.0"
        )
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_mcp_paths() {
        let doc = ApiDoc::openapi();
        assert!(doc
            .paths
            .paths
            .contains_key("/api/mcp-server/{variant}/{service_id}"));
        assert!(doc
            .paths
            .paths
            .contains_key("/api/mcp-server/{variant}/{service_id}/sse/message"));
    }
}
