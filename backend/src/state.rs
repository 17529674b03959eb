//! Application state management.

use crate::auth::AuthConfig;
use crate::config::Config;
use crate::mcp::CommandDispatcher;
use crate::service::ServiceCatalog;
use crate::session::{SessionManagerRegistry, StoreProvider};
use crate::storage::PostgresSessionStore;
use crate::stream::StreamSettings;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// One session manager per service
    sessions: Arc<SessionManagerRegistry>,
    /// Configured services and their executors
    catalog: Arc<ServiceCatalog>,
    dispatcher: CommandDispatcher,
    auth: AuthConfig,
    stream: StreamSettings,
}

impl AppState {
    pub fn new(
        provider: StoreProvider,
        catalog: ServiceCatalog,
        auth: AuthConfig,
        stream: StreamSettings,
    ) -> Self {
        let catalog = Arc::new(catalog);
        Self {
            inner: Arc::new(AppStateInner {
                sessions: Arc::new(SessionManagerRegistry::new(provider)),
                dispatcher: CommandDispatcher::new(catalog.clone()),
                catalog,
                auth,
                stream,
            }),
        }
    }

    /// Create application state with the filesystem session store.
    pub fn with_file_store(
        session_path: impl Into<PathBuf>,
        catalog: ServiceCatalog,
        auth: AuthConfig,
        stream: StreamSettings,
    ) -> Self {
        Self::new(
            StoreProvider::Files {
                root: session_path.into(),
            },
            catalog,
            auth,
            stream,
        )
    }

    /// Build the state described by `config`, connecting to PostgreSQL when
    /// a database URL is configured.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let catalog = ServiceCatalog::from_config(&config.services)?;

        let provider = match &config.database_url {
            Some(url) => {
                info!("Using PostgreSQL session store");
                let pool = PostgresSessionStore::connect(url).await?;
                PostgresSessionStore::run_migrations(&pool).await?;
                StoreProvider::Postgres { pool }
            }
            None => {
                info!(
                    "Using filesystem session store at {}",
                    config.session_path.display()
                );
                StoreProvider::Files {
                    root: config.session_path.clone(),
                }
            }
        };

        Ok(Self::new(
            provider,
            catalog,
            config.auth.clone(),
            config.stream,
        ))
    }

    /// Get the per-service session manager registry.
    pub fn sessions(&self) -> &Arc<SessionManagerRegistry> {
        &self.inner.sessions
    }

    pub fn catalog(&self) -> &ServiceCatalog {
        &self.inner.catalog
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.inner.dispatcher
    }

    pub fn auth(&self) -> &AuthConfig {
        &self.inner.auth
    }

    /// Timing used by every stream opened through this state.
    pub fn stream_settings(&self) -> StreamSettings {
        self.inner.stream
    }
}
