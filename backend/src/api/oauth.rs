//! OAuth discovery stubs.
//!
//! MCP clients probe these before connecting. The gateway does not do OAuth,
//! so discovery returns empty documents and registration is refused.

use axum::{http::StatusCode, Json};
use mcpgate_types::ErrorResponse;
use serde_json::{json, Value};

/// Empty OAuth protected-resource metadata.
#[utoipa::path(
    get,
    path = "/.well-known/oauth-protected-resource",
    tag = "oauth",
    responses((status = 200, description = "Empty metadata document"))
)]
pub async fn protected_resource() -> Json<Value> {
    Json(json!({}))
}

/// Empty OAuth authorization-server metadata.
#[utoipa::path(
    get,
    path = "/.well-known/oauth-authorization-server",
    tag = "oauth",
    responses((status = 200, description = "Empty metadata document"))
)]
pub async fn authorization_server() -> Json<Value> {
    Json(json!({}))
}

/// Dynamic client registration is not supported.
#[utoipa::path(
    post,
    path = "/register",
    tag = "oauth",
    responses((status = 400, description = "OAuth not supported", body = ErrorResponse))
)]
pub async fn register() -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::new("OAuth not supported")),
    )
}
