//! Lookup of `(service_id, variant)` to an executor.

use super::{ProtocolService, ServiceError, WebhookService, WorkflowService};
use crate::config::{ServiceConfig, ToolConfig, VariantKind};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Service not found: {0}")]
    UnknownService(String),

    #[error("Variant '{variant}' not found for service {service_id}")]
    UnknownVariant { service_id: String, variant: String },

    #[error("MCP platform is not enabled for service {0}")]
    PlatformDisabled(String),
}

/// A configured service and its executable variants.
pub struct ServiceEntry {
    pub id: String,
    pub name: String,
    pub mcp_enabled: bool,
    pub auth_required: bool,
    variants: HashMap<String, Arc<dyn WorkflowService>>,
}

impl ServiceEntry {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            mcp_enabled: true,
            auth_required: false,
            variants: HashMap::new(),
        }
    }

    pub fn mcp_enabled(mut self, enabled: bool) -> Self {
        self.mcp_enabled = enabled;
        self
    }

    pub fn auth_required(mut self, required: bool) -> Self {
        self.auth_required = required;
        self
    }

    pub fn with_variant(mut self, name: impl Into<String>, executor: Arc<dyn WorkflowService>) -> Self {
        self.variants.insert(name.into(), executor);
        self
    }

    pub fn executor(&self, variant: &str) -> Option<Arc<dyn WorkflowService>> {
        self.variants.get(variant).cloned()
    }

    fn from_config(config: &ServiceConfig) -> Result<Self, ServiceError> {
        let mut entry = Self::new(&config.id, config.display_name())
            .mcp_enabled(config.mcp_enabled)
            .auth_required(config.auth_required);

        for variant in &config.variants {
            let executor: Arc<dyn WorkflowService> = match variant.kind {
                VariantKind::Builtin => Arc::new(
                    ProtocolService::new(config.display_name())
                        .with_tools(variant.tools.iter().map(tool_definition).collect()),
                ),
                VariantKind::Webhook => {
                    let url = variant.url.clone().ok_or_else(|| {
                        ServiceError::Execution(format!(
                            "Webhook variant '{}' has no url",
                            variant.name
                        ))
                    })?;
                    Arc::new(WebhookService::new(
                        url,
                        Duration::from_secs(variant.timeout_secs),
                    )?)
                }
            };
            entry = entry.with_variant(&variant.name, executor);
        }

        Ok(entry)
    }
}

/// MCP wire shape of a configured tool.
fn tool_definition(tool: &ToolConfig) -> Value {
    json!({
        "name": tool.name,
        "description": tool.description,
        "inputSchema": tool
            .input_schema
            .clone()
            .unwrap_or_else(|| json!({"type": "object", "properties": {}})),
    })
}

/// A resolved service together with the executor for the requested variant.
#[derive(Clone)]
pub struct ResolvedService {
    pub entry: Arc<ServiceEntry>,
    pub executor: Arc<dyn WorkflowService>,
}

/// All services known to this gateway.
#[derive(Default)]
pub struct ServiceCatalog {
    services: HashMap<String, Arc<ServiceEntry>>,
}

impl ServiceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(services: &[ServiceConfig]) -> Result<Self, ServiceError> {
        let mut catalog = Self::new();
        for service in services {
            catalog.insert(ServiceEntry::from_config(service)?);
        }
        Ok(catalog)
    }

    pub fn insert(&mut self, entry: ServiceEntry) {
        self.services.insert(entry.id.clone(), Arc::new(entry));
    }

    pub fn get(&self, service_id: &str) -> Option<Arc<ServiceEntry>> {
        self.services.get(service_id).cloned()
    }

    /// Resolve the executor for a request on `service_id` / `variant`.
    pub fn resolve(&self, service_id: &str, variant: &str) -> Result<ResolvedService, CatalogError> {
        let entry = self
            .get(service_id)
            .ok_or_else(|| CatalogError::UnknownService(service_id.to_string()))?;

        if !entry.mcp_enabled {
            return Err(CatalogError::PlatformDisabled(service_id.to_string()));
        }

        let executor = entry
            .executor(variant)
            .ok_or_else(|| CatalogError::UnknownVariant {
                service_id: service_id.to_string(),
                variant: variant.to_string(),
            })?;

        Ok(ResolvedService { entry, executor })
    }

    pub fn entries(&self) -> impl Iterator<Item = &Arc<ServiceEntry>> {
        self.services.values()
    }

    pub fn service_ids(&self) -> Vec<String> {
        self.services.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::service::{ServiceRequest, ServiceResponse};

    fn catalog() -> ServiceCatalog {
        let config = Config::from_toml(
            r#"
[[services]]
id = "assistant"
name = "Assistant"

  [[services.variants]]
  name = "live"

    [[services.variants.tools]]
    name = "search"
    description = "Search the knowledge base"

  [[services.variants]]
  name = "draft"
  kind = "webhook"
  url = "http://127.0.0.1:9/run"

[[services]]
id = "internal"
mcp_enabled = false

  [[services.variants]]
  name = "live"
"#,
        )
        .unwrap();
        ServiceCatalog::from_config(&config.services).unwrap()
    }

    #[test]
    fn test_resolve_errors() {
        let catalog = catalog();
        assert_eq!(catalog.len(), 2);

        assert!(catalog.resolve("assistant", "live").is_ok());
        assert!(catalog.resolve("assistant", "draft").is_ok());
        assert_eq!(
            catalog.resolve("missing", "live").err(),
            Some(CatalogError::UnknownService("missing".to_string()))
        );
        assert_eq!(
            catalog.resolve("assistant", "beta").err(),
            Some(CatalogError::UnknownVariant {
                service_id: "assistant".to_string(),
                variant: "beta".to_string()
            })
        );
        assert_eq!(
            catalog.resolve("internal", "live").err(),
            Some(CatalogError::PlatformDisabled("internal".to_string()))
        );
    }

    #[tokio::test]
    async fn test_builtin_variant_lists_configured_tools() {
        let resolved = catalog().resolve("assistant", "live").unwrap();
        assert_eq!(resolved.entry.name, "Assistant");

        let request = ServiceRequest::mcp(
            json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}),
            uuid::Uuid::new_v4(),
            "assistant",
            "live",
        );
        let mut response = ServiceResponse::new();
        resolved.executor.execute(&request, &mut response).await.unwrap();

        assert_eq!(
            response.into_platform_result().unwrap()["tools"][0],
            json!({
                "name": "search",
                "description": "Search the knowledge base",
                "inputSchema": {"type": "object", "properties": {}}
            })
        );
    }
}
