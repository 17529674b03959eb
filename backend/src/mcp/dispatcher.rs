//! JSON-RPC command dispatch for MCP sessions.
//!
//! The dispatcher validates the session, splits requests from notifications,
//! runs the payload through the resolved workflow service and wraps the
//! outcome in a JSON-RPC envelope. Service failures never escape as HTTP
//! errors: requests get a `-32603` envelope, notifications are logged.

use crate::service::{
    CatalogError, ServiceCatalog, ServiceError, ServiceRequest, ServiceResponse,
};
use crate::session::{SessionError, SessionManager};
use futures::FutureExt;
use mcpgate_types::jsonrpc::{message_id, message_method};
use mcpgate_types::{JsonRpcResponse, SessionId};
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Invalid JSON-RPC payload: {0}")]
    InvalidPayload(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Routes JSON-RPC payloads of one session to the workflow service.
#[derive(Clone)]
pub struct CommandDispatcher {
    catalog: Arc<ServiceCatalog>,
}

impl CommandDispatcher {
    pub fn new(catalog: Arc<ServiceCatalog>) -> Self {
        Self { catalog }
    }

    /// Handle one payload and return the reply for requests.
    ///
    /// Notifications always yield `Ok(None)`.
    pub async fn dispatch(
        &self,
        manager: &SessionManager,
        session_id: &SessionId,
        body: Value,
        variant: &str,
        service_id: &str,
    ) -> Result<Option<JsonRpcResponse>, DispatchError> {
        manager.get_active_session(session_id, true).await?;

        let message = first_message(body, service_id)?;
        let method = message_method(&message).unwrap_or_default().to_string();

        let Some(id) = message_id(&message).cloned() else {
            debug!("[{}] Notification '{}'", service_id, method);
            if let Err(e) = self.execute(message, session_id, variant, service_id).await {
                warn!(
                    "[{}] Notification '{}' failed for session {}: {}",
                    service_id, method, session_id, e
                );
            }
            return Ok(None);
        };

        debug!("[{}] Request '{}' (id {})", service_id, method, id);
        let response = match self.execute(message, session_id, variant, service_id).await {
            Ok(result) => {
                if method == "initialize" {
                    self.mark_initialised(manager, session_id).await?;
                }
                JsonRpcResponse::success(id, result.unwrap_or(Value::Null))
            }
            Err(e) => {
                warn!(
                    "[{}] Request '{}' failed for session {}: {}",
                    service_id, method, session_id, e
                );
                JsonRpcResponse::internal_error(id, e.to_string())
            }
        };

        Ok(Some(response))
    }

    /// Like [`dispatch`](Self::dispatch), but queue the reply on the
    /// session's stream instead of returning it.
    pub async fn process_message(
        &self,
        manager: &SessionManager,
        session_id: &SessionId,
        body: Value,
        variant: &str,
        service_id: &str,
    ) -> Result<(), DispatchError> {
        if let Some(response) = self
            .dispatch(manager, session_id, body, variant, service_id)
            .await?
        {
            manager.enqueue_message(session_id, &response).await?;
        }
        Ok(())
    }

    /// Run the payload through the service; a panic counts as a failure.
    async fn execute(
        &self,
        payload: Value,
        session_id: &SessionId,
        variant: &str,
        service_id: &str,
    ) -> Result<Option<Value>, ExecuteError> {
        let resolved = self.catalog.resolve(service_id, variant)?;
        let request = ServiceRequest::mcp(payload, *session_id, service_id, variant);
        let mut response = ServiceResponse::new();

        AssertUnwindSafe(resolved.executor.execute(&request, &mut response))
            .catch_unwind()
            .await
            .map_err(|panic| ExecuteError::Panic(panic_message(panic.as_ref())))??;

        Ok(response.into_platform_result())
    }

    async fn mark_initialised(
        &self,
        manager: &SessionManager,
        session_id: &SessionId,
    ) -> Result<(), SessionError> {
        match manager.initialise_session(session_id).await {
            Ok(()) => Ok(()),
            Err(SessionError::AlreadyInitialised(_)) => {
                debug!("Session {} re-sent initialize", session_id);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum ExecuteError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("Service panicked: {0}")]
    Panic(String),
}

/// Batches are not supported; only the first element is processed.
pub(crate) fn first_message(body: Value, service_id: &str) -> Result<Value, DispatchError> {
    let message = match body {
        Value::Array(mut items) => {
            if items.is_empty() {
                return Err(DispatchError::InvalidPayload("empty batch".to_string()));
            }
            if items.len() > 1 {
                warn!(
                    "[{}] JSON-RPC batch of {} messages, only the first is processed",
                    service_id,
                    items.len()
                );
            }
            items.swap_remove(0)
        }
        other => other,
    };

    if !message.is_object() {
        return Err(DispatchError::InvalidPayload(
            "message must be a JSON object".to_string(),
        ));
    }
    Ok(message)
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
