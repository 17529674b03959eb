//! mcpgate backend library.
//!
//! Exposes the application builder for use by the binary and by tests.

use axum::http::HeaderValue;
use axum::http::{header, HeaderName, Method};
use axum::{
    routing::{get, post},
    Router,
};
use mcpgate_types::{MCP_PROTOCOL_VERSION_HEADER, MCP_SESSION_ID_HEADER, X_MCP_SESSION_ID_HEADER};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod api;
pub mod auth;
pub mod config;
pub mod mcp;
pub mod openapi;
pub mod paths;
pub mod service;
pub mod session;
pub mod state;
pub mod storage;
pub mod stream;

use state::AppState;

/// Create the Axum application router with a given state.
///
/// Any origin is allowed.
pub fn create_app(state: AppState) -> Router {
    create_app_with_config(state, Vec::new())
}

/// Create the Axum application router with a given state and CORS origins.
///
/// If `cors_allowed_origins` is empty, any origin is allowed.
/// Otherwise, only the specified origins are allowed.
pub fn create_app_with_config(state: AppState, cors_allowed_origins: Vec<String>) -> Router {
    let protected = state
        .catalog()
        .entries()
        .filter(|entry| entry.auth_required)
        .count();
    if protected > 0 {
        tracing::info!("{} service(s) require Basic authentication", protected);
    }

    let api_router = Router::new()
        .route(
            "/mcp-server/{variant}/{service_id}",
            post(api::mcp::mcp_post)
                .get(api::mcp::mcp_get)
                .delete(api::mcp::mcp_delete),
        )
        .route(
            "/mcp-server/{variant}/{service_id}/sse",
            get(api::sse::sse_connect),
        )
        .route(
            "/mcp-server/{variant}/{service_id}/sse/message",
            post(api::sse::sse_message),
        );

    let discovery_router = Router::new()
        .route(
            "/.well-known/oauth-protected-resource",
            get(api::oauth::protected_resource),
        )
        .route(
            "/.well-known/oauth-authorization-server",
            get(api::oauth::authorization_server),
        )
        .route("/register", post(api::oauth::register));

    Router::new()
        .route("/health", get(health))
        .merge(
            SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()),
        )
        .merge(discovery_router)
        .nest("/api", api_router)
        .layer(TraceLayer::new_for_http())
        .layer({
            let cors = CorsLayer::new()
                .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
                .allow_headers([
                    header::CONTENT_TYPE,
                    header::AUTHORIZATION,
                    header::ACCEPT,
                    HeaderName::from_static(MCP_SESSION_ID_HEADER),
                    HeaderName::from_static(MCP_PROTOCOL_VERSION_HEADER),
                ])
                .expose_headers([
                    HeaderName::from_static(MCP_SESSION_ID_HEADER),
                    HeaderName::from_static(MCP_PROTOCOL_VERSION_HEADER),
                    HeaderName::from_static(X_MCP_SESSION_ID_HEADER),
                ]);

            if cors_allowed_origins.is_empty() {
                cors.allow_origin(Any)
            } else {
                let origins: Vec<HeaderValue> = cors_allowed_origins
                    .iter()
                    .filter_map(|o| o.parse::<HeaderValue>().ok())
                    .collect();
                cors.allow_origin(origins).allow_credentials(true)
            }
        })
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "OK"
}
