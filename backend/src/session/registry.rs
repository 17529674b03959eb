//! Per-service session manager registry.

use super::SessionManager;
use crate::storage::{FileSessionStore, PostgresSessionStore, SessionStore};
use parking_lot::RwLock;
use sqlx::PgPool;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Where session stores for each service are opened.
#[derive(Clone)]
pub enum StoreProvider {
    /// One directory per service below `root`.
    Files { root: PathBuf },
    /// One namespace per service in a shared database.
    Postgres { pool: PgPool },
}

impl StoreProvider {
    /// Open the store for one service.
    ///
    /// `service_id` must already be validated as a path-safe segment.
    pub fn open(&self, service_id: &str) -> Arc<dyn SessionStore> {
        match self {
            StoreProvider::Files { root } => Arc::new(FileSessionStore::new(root.join(service_id))),
            StoreProvider::Postgres { pool } => {
                Arc::new(PostgresSessionStore::scoped(pool.clone(), service_id))
            }
        }
    }
}

/// Keyed registry memoising one [`SessionManager`] per service id.
///
/// Owned by the application state and passed to whoever needs it; each
/// manager gets its own store namespace, so a session id issued for one
/// service is unknown to every other one.
pub struct SessionManagerRegistry {
    provider: StoreProvider,
    managers: RwLock<HashMap<String, Arc<SessionManager>>>,
}

impl SessionManagerRegistry {
    pub fn new(provider: StoreProvider) -> Self {
        Self {
            provider,
            managers: RwLock::new(HashMap::new()),
        }
    }

    /// Get the manager for `service_id`, creating it on first use.
    pub fn manager(&self, service_id: &str) -> Arc<SessionManager> {
        if let Some(manager) = self.managers.read().get(service_id) {
            return manager.clone();
        }

        let mut managers = self.managers.write();
        managers
            .entry(service_id.to_string())
            .or_insert_with(|| {
                debug!("Opening session store for service '{}'", service_id);
                Arc::new(SessionManager::new(
                    service_id,
                    self.provider.open(service_id),
                ))
            })
            .clone()
    }

    /// Number of managers created so far.
    pub fn len(&self) -> usize {
        self.managers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionError;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_manager_is_memoised_per_service() {
        let dir = tempdir().unwrap();
        let registry = SessionManagerRegistry::new(StoreProvider::Files {
            root: dir.path().to_path_buf(),
        });

        let first = registry.manager("assistant");
        let again = registry.manager("assistant");
        let other = registry.manager("support");

        assert!(Arc::ptr_eq(&first, &again));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(registry.len(), 2);
        assert_eq!(other.service_id(), "support");
    }

    #[tokio::test]
    async fn test_sessions_do_not_leak_across_services() {
        let dir = tempdir().unwrap();
        let registry = SessionManagerRegistry::new(StoreProvider::Files {
            root: dir.path().to_path_buf(),
        });

        let id = registry.manager("assistant").create_session().await.unwrap();

        assert!(registry
            .manager("assistant")
            .get_active_session(&id, false)
            .await
            .is_ok());
        assert!(matches!(
            registry.manager("support").get_active_session(&id, false).await,
            Err(SessionError::NotFound(_))
        ));
        assert!(dir.path().join("assistant").join(format!("{}.json", id)).exists());
    }
}
