//! MCP Streamable HTTP endpoint handlers.
//!
//! ## Endpoints
//!
//! - `POST /api/mcp-server/{variant}/{service_id}` - Send a JSON-RPC message
//! - `GET /api/mcp-server/{variant}/{service_id}` - Open the session's event stream
//! - `DELETE /api/mcp-server/{variant}/{service_id}` - Terminate a session

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use mcpgate_types::{
    ErrorResponse, JsonRpcResponse, SessionId, MCP_PROTOCOL_VERSION_HEADER,
    MCP_SESSION_ID_HEADER, PROTOCOL_VERSION,
};
use serde_json::Value;
use tracing::{debug, warn};

use super::error::ApiError;
use crate::mcp::first_message;
use crate::service::ResolvedService;
use crate::state::AppState;
use crate::stream::{self, StreamHandler};

/// Frames buffered ahead of a slow client.
pub(crate) const STREAM_BUFFER: usize = 64;

/// Resolve the addressed service and enforce its auth requirement.
pub(crate) fn authorize(
    state: &AppState,
    service_id: &str,
    variant: &str,
    headers: &HeaderMap,
) -> Result<ResolvedService, ApiError> {
    let resolved = state.catalog().resolve(service_id, variant)?;

    if resolved.entry.auth_required && !state.auth().verify_headers(headers) {
        warn!("[{}] Rejected unauthenticated MCP request", service_id);
        return Err(ApiError::Unauthorized);
    }

    Ok(resolved)
}

/// Parse a client-supplied session id. Malformed ids cannot exist.
pub(crate) fn parse_session_id(raw: &str) -> Result<SessionId, ApiError> {
    raw.trim()
        .parse::<SessionId>()
        .map_err(|_| ApiError::session_not_found())
}

fn session_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(MCP_SESSION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
}

/// Headers every MCP response carries.
pub(crate) fn insert_session_headers(headers: &mut HeaderMap, session_id: &SessionId) {
    if let Ok(value) = HeaderValue::from_str(&session_id.to_string()) {
        headers.insert(HeaderName::from_static(MCP_SESSION_ID_HEADER), value);
    }
    headers.insert(
        HeaderName::from_static(MCP_PROTOCOL_VERSION_HEADER),
        HeaderValue::from_static(PROTOCOL_VERSION),
    );
}

/// Send a JSON-RPC message.
///
/// Without an `mcp-session-id` header a new session is created. Requests get
/// the JSON-RPC reply with `200`, notifications an empty `204`.
#[utoipa::path(
    post,
    path = "/api/mcp-server/{variant}/{service_id}",
    tag = "mcp",
    params(
        ("variant" = String, Path, description = "Service variant"),
        ("service_id" = String, Path, description = "Service ID"),
        ("mcp-session-id" = Option<String>, Header, description = "Session ID; omitted on the first request")
    ),
    request_body = mcpgate_types::jsonrpc::JsonRpcRequest,
    responses(
        (status = 200, description = "JSON-RPC reply", body = JsonRpcResponse),
        (status = 204, description = "Notification accepted"),
        (status = 400, description = "Malformed message or MCP not enabled", body = JsonRpcResponse),
        (status = 401, description = "Authentication required", body = ErrorResponse),
        (status = 404, description = "Unknown service, variant or session", body = ErrorResponse)
    )
)]
pub async fn mcp_post(
    State(state): State<AppState>,
    Path((variant, service_id)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    authorize(&state, &service_id, &variant, &headers)?;

    let payload: Value =
        serde_json::from_slice(&body).map_err(|e| ApiError::Parse(e.to_string()))?;
    // Reject unusable payloads before a session is created for them
    let message = first_message(payload, &service_id)?;

    let manager = state.sessions().manager(&service_id);
    let session_id = match session_header(&headers) {
        Some(raw) => parse_session_id(raw)?,
        None => manager.create_session().await?,
    };
    debug!("[{}] MCP POST for session {}", service_id, session_id);

    let reply = state
        .dispatcher()
        .dispatch(&manager, &session_id, message, &variant, &service_id)
        .await?;

    let mut response = match reply {
        Some(reply) => (StatusCode::OK, Json(reply)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    };
    insert_session_headers(response.headers_mut(), &session_id);
    Ok(response)
}

/// Open the event stream of an existing session.
#[utoipa::path(
    get,
    path = "/api/mcp-server/{variant}/{service_id}",
    tag = "mcp",
    params(
        ("variant" = String, Path, description = "Service variant"),
        ("service_id" = String, Path, description = "Service ID"),
        ("mcp-session-id" = String, Header, description = "Session ID")
    ),
    responses(
        (status = 200, description = "Event stream", body = String, content_type = "text/event-stream"),
        (status = 400, description = "Missing session header or MCP not enabled", body = ErrorResponse),
        (status = 401, description = "Authentication required", body = ErrorResponse),
        (status = 404, description = "Unknown service, variant or session", body = ErrorResponse)
    )
)]
pub async fn mcp_get(
    State(state): State<AppState>,
    Path((variant, service_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    authorize(&state, &service_id, &variant, &headers)?;

    let raw = session_header(&headers).ok_or_else(|| {
        ApiError::BadRequest("Mcp-Session-Id header required for event stream".to_string())
    })?;
    let session_id = parse_session_id(raw)?;

    let manager = state.sessions().manager(&service_id);
    manager.get_active_session(&session_id, true).await?;

    let mut writer = stream::channel(STREAM_BUFFER);
    let mut stream_headers = stream::event_stream_headers();
    insert_session_headers(&mut stream_headers, &session_id);
    let response = writer.send_headers(stream_headers)?;

    StreamHandler::new(manager, session_id, writer, state.stream_settings()).spawn();
    Ok(response)
}

/// Terminate a session.
#[utoipa::path(
    delete,
    path = "/api/mcp-server/{variant}/{service_id}",
    tag = "mcp",
    params(
        ("variant" = String, Path, description = "Service variant"),
        ("service_id" = String, Path, description = "Service ID"),
        ("mcp-session-id" = String, Header, description = "Session ID")
    ),
    responses(
        (status = 204, description = "Session terminated"),
        (status = 400, description = "Missing session header or MCP not enabled", body = ErrorResponse),
        (status = 401, description = "Authentication required", body = ErrorResponse),
        (status = 404, description = "Unknown service, variant or session", body = ErrorResponse)
    )
)]
pub async fn mcp_delete(
    State(state): State<AppState>,
    Path((variant, service_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    authorize(&state, &service_id, &variant, &headers)?;

    let raw = session_header(&headers)
        .ok_or_else(|| ApiError::BadRequest("Mcp-Session-Id header required".to_string()))?;
    let session_id = parse_session_id(raw)?;

    state
        .sessions()
        .manager(&service_id)
        .terminate_session(&session_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
