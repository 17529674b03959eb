//! HTTP error responses for the MCP endpoints.

use crate::auth::WWW_AUTHENTICATE_VALUE;
use crate::mcp::DispatchError;
use crate::service::CatalogError;
use crate::session::SessionError;
use crate::stream::StreamError;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use mcpgate_types::jsonrpc::error_codes;
use mcpgate_types::{ErrorResponse, JsonRpcResponse};
use serde_json::Value;
use tracing::error;

/// Errors returned by the transport handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    /// Body is not JSON; answered with a JSON-RPC parse error.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Body is JSON but not a usable JSON-RPC message.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Parse(_) | ApiError::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn session_not_found() -> Self {
        ApiError::NotFound("Session not found".to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ApiError::Parse(message) => {
                (status, Json(JsonRpcResponse::parse_error(message))).into_response()
            }
            ApiError::InvalidRequest(message) => (
                status,
                Json(JsonRpcResponse::error(
                    Value::Null,
                    error_codes::INVALID_REQUEST,
                    message,
                )),
            )
                .into_response(),
            ApiError::Unauthorized => {
                let mut response =
                    (status, Json(ErrorResponse::new("Authentication required"))).into_response();
                response.headers_mut().insert(
                    header::WWW_AUTHENTICATE,
                    HeaderValue::from_static(WWW_AUTHENTICATE_VALUE),
                );
                response
            }
            ApiError::Internal(details) => {
                error!("Internal error: {}", details);
                (
                    status,
                    Json(ErrorResponse::with_details("Internal server error", details)),
                )
                    .into_response()
            }
            ApiError::BadRequest(message) | ApiError::NotFound(message) => {
                (status, Json(ErrorResponse::new(message))).into_response()
            }
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::PlatformDisabled(_) => ApiError::BadRequest(err.to_string()),
            CatalogError::UnknownService(_) | CatalogError::UnknownVariant { .. } => {
                ApiError::NotFound(err.to_string())
            }
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound(_) => ApiError::session_not_found(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Session(e) => e.into(),
            DispatchError::InvalidPayload(message) => ApiError::InvalidRequest(message),
            DispatchError::Catalog(e) => e.into(),
        }
    }
}

impl From<StreamError> for ApiError {
    fn from(err: StreamError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
