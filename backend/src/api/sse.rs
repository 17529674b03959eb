//! Legacy HTTP+SSE transport.
//!
//! The client opens a long-lived stream first; the server announces where to
//! POST messages with an `endpoint` event, and every reply travels back over
//! the stream as a `message` event.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::Response,
};
use mcpgate_types::{ErrorResponse, X_MCP_SESSION_ID_HEADER};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::error::ApiError;
use super::mcp::{authorize, insert_session_headers, parse_session_id, STREAM_BUFFER};
use crate::state::AppState;
use crate::stream::{self, StreamHandler};

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MessageQuery {
    /// Session announced by the `endpoint` event
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// URL the client should POST its messages to.
pub fn message_endpoint(variant: &str, service_id: &str, session_id: &impl std::fmt::Display) -> String {
    format!(
        "/api/mcp-server/{}/{}/sse/message?sessionId={}",
        variant, service_id, session_id
    )
}

/// Open a legacy event stream, creating its session.
#[utoipa::path(
    get,
    path = "/api/mcp-server/{variant}/{service_id}/sse",
    tag = "mcp",
    params(
        ("variant" = String, Path, description = "Service variant"),
        ("service_id" = String, Path, description = "Service ID")
    ),
    responses(
        (status = 200, description = "Event stream starting with an endpoint event", body = String, content_type = "text/event-stream"),
        (status = 400, description = "MCP not enabled", body = ErrorResponse),
        (status = 401, description = "Authentication required", body = ErrorResponse),
        (status = 404, description = "Unknown service or variant", body = ErrorResponse)
    )
)]
pub async fn sse_connect(
    State(state): State<AppState>,
    Path((variant, service_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    authorize(&state, &service_id, &variant, &headers)?;

    let manager = state.sessions().manager(&service_id);
    let session_id = manager.create_session().await?;

    let mut writer = stream::channel(STREAM_BUFFER);
    let mut stream_headers = stream::event_stream_headers();
    insert_session_headers(&mut stream_headers, &session_id);
    if let Ok(value) = HeaderValue::from_str(&session_id.to_string()) {
        stream_headers.insert(HeaderName::from_static(X_MCP_SESSION_ID_HEADER), value);
    }
    let response = writer.send_headers(stream_headers)?;

    let endpoint = message_endpoint(&variant, &service_id, &session_id);
    StreamHandler::new(manager, session_id, writer, state.stream_settings())
        .with_initial_event("endpoint", Value::String(endpoint))
        .terminate_on_disconnect(true)
        .spawn();

    Ok(response)
}

/// Post a message to a legacy session. The reply arrives on the stream.
#[utoipa::path(
    post,
    path = "/api/mcp-server/{variant}/{service_id}/sse/message",
    tag = "mcp",
    params(
        ("variant" = String, Path, description = "Service variant"),
        ("service_id" = String, Path, description = "Service ID"),
        MessageQuery
    ),
    request_body = mcpgate_types::jsonrpc::JsonRpcRequest,
    responses(
        (status = 202, description = "Message accepted"),
        (status = 400, description = "Missing sessionId or malformed message", body = ErrorResponse),
        (status = 401, description = "Authentication required", body = ErrorResponse),
        (status = 404, description = "Unknown service, variant or session", body = ErrorResponse)
    )
)]
pub async fn sse_message(
    State(state): State<AppState>,
    Path((variant, service_id)): Path<(String, String)>,
    Query(query): Query<MessageQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    authorize(&state, &service_id, &variant, &headers)?;

    let raw = query
        .session_id
        .ok_or_else(|| ApiError::BadRequest("sessionId query parameter required".to_string()))?;
    let session_id = parse_session_id(&raw)?;

    let payload: Value =
        serde_json::from_slice(&body).map_err(|e| ApiError::Parse(e.to_string()))?;
    debug!("[{}] Legacy message for session {}", service_id, session_id);

    let manager = state.sessions().manager(&service_id);
    state
        .dispatcher()
        .process_message(&manager, &session_id, payload, &variant, &service_id)
        .await?;

    Ok(StatusCode::ACCEPTED)
}
