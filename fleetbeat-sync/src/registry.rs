//! Idempotent device registration.

use std::sync::Arc;

use fleetbeat_common::NodePaths;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::store::{CoordinationClient, CreateMode};

/// Value written into namespace and device nodes, which carry no data.
pub const PLACEHOLDER: &[u8] = b"nothing";

/// Makes sure the namespace root and a device's node exist.
#[derive(Clone)]
pub struct DeviceRegistry {
    store: Arc<dyn CoordinationClient>,
    paths: NodePaths,
}

impl DeviceRegistry {
    pub fn new(store: Arc<dyn CoordinationClient>, paths: NodePaths) -> Self {
        Self { store, paths }
    }

    pub fn paths(&self) -> &NodePaths {
        &self.paths
    }

    /// Register a device, returning whether its node already existed.
    ///
    /// Best-effort: store failures are logged and reported as "not existing",
    /// callers proceed either way.
    pub async fn register(&self, device_name: &str) -> bool {
        self.try_register(device_name).await.unwrap_or(false)
    }

    /// Register a device, failing unless both the root and the device node
    /// are confirmed to exist afterwards.
    pub async fn try_register(&self, device_name: &str) -> StoreResult<bool> {
        self.ensure(&self.paths.root()).await?;
        let existed = self.ensure(&self.paths.device(device_name)).await?;

        if existed {
            debug!(device = %device_name, "Device already registered");
        } else {
            info!(device = %device_name, "Device registered");
        }
        Ok(existed)
    }

    async fn ensure(&self, path: &str) -> StoreResult<bool> {
        match self.store.exists(path).await {
            Err(e) => {
                warn!(path = %path, error = %e, "Error checking node");
                Err(e)
            }
            Ok(Some(_)) => Ok(true),
            Ok(None) => match self
                .store
                .create(path, PLACEHOLDER, CreateMode::Persistent)
                .await
            {
                Ok(_) => Ok(false),
                // Another registrar won the race.
                Err(StoreError::NodeExists { .. }) => Ok(true),
                Err(e) => {
                    warn!(path = %path, error = %e, "Failed to create node");
                    Err(e)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn setup() -> (Arc<MemoryStore>, DeviceRegistry) {
        let store = Arc::new(MemoryStore::new());
        let registry = DeviceRegistry::new(store.clone(), NodePaths::new("heartbeats"));
        (store, registry)
    }

    #[tokio::test]
    async fn test_register_twice() {
        let (store, registry) = setup();

        assert!(!registry.register("edge-01").await);
        assert!(registry.register("edge-01").await);

        assert_eq!(store.paths(), vec!["/heartbeats", "/heartbeats/edge-01"]);
        assert_eq!(store.value("/heartbeats/edge-01").as_deref(), Some("nothing"));
    }

    #[tokio::test]
    async fn test_register_second_device_reuses_root() {
        let (store, registry) = setup();

        registry.register("edge-01").await;
        assert!(!registry.register("edge-02").await);
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn test_register_offline_is_best_effort() {
        let (store, registry) = setup();
        store.set_offline(true);

        assert!(!registry.register("edge-01").await);

        store.set_offline(false);
        assert!(store.is_empty());
        assert!(!registry.register("edge-01").await);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_try_register_reports_outage() {
        let (store, registry) = setup();
        store.set_offline(true);

        assert!(registry.try_register("edge-01").await.is_err());

        store.set_offline(false);
        assert!(!registry.try_register("edge-01").await.unwrap());
        assert!(registry.try_register("edge-01").await.unwrap());
    }
}
