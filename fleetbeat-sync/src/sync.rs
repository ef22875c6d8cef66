//! Create-or-update of property nodes.

use std::sync::Arc;

use fleetbeat_common::{NodePaths, Property};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::store::{CoordinationClient, CreateMode, Version};

/// Result of a single property write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Created,
    Updated,
    Failed { existed: bool },
}

impl Outcome {
    fn existed(&self) -> bool {
        match self {
            Outcome::Created => false,
            Outcome::Updated => true,
            Outcome::Failed { existed } => *existed,
        }
    }
}

/// Tally of a batch of property writes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UpsertReport {
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
}

impl UpsertReport {
    pub fn total(&self) -> usize {
        self.created + self.updated + self.failed
    }

    fn add(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Created => self.created += 1,
            Outcome::Updated => self.updated += 1,
            Outcome::Failed { .. } => self.failed += 1,
        }
    }
}

/// The upsert primitive shared by the edge agent and the ingestion server.
///
/// Existence is checked before writing so that creation flags are applied
/// only once and the version check only guards updates.
#[derive(Clone)]
pub struct PropertySync {
    store: Arc<dyn CoordinationClient>,
    paths: NodePaths,
    create_mode: CreateMode,
}

impl PropertySync {
    /// Create a sync engine that creates persistent nodes.
    pub fn new(store: Arc<dyn CoordinationClient>, paths: NodePaths) -> Self {
        Self {
            store,
            paths,
            create_mode: CreateMode::Persistent,
        }
    }

    /// Use a different lifetime flag for newly created nodes.
    pub fn with_create_mode(mut self, mode: CreateMode) -> Self {
        self.create_mode = mode;
        self
    }

    pub fn paths(&self) -> &NodePaths {
        &self.paths
    }

    /// Create the property node if absent, otherwise set it under `version`.
    ///
    /// Returns whether the node existed before the call. Failures are logged
    /// and swallowed.
    pub async fn upsert(
        &self,
        device_name: &str,
        property: Property,
        value: &str,
        version: Version,
    ) -> bool {
        self.apply(device_name, property, value, version)
            .await
            .existed()
    }

    /// Upsert several properties in order, independently of each other.
    pub async fn upsert_all(
        &self,
        device_name: &str,
        properties: &[(Property, String)],
        version: Version,
    ) -> UpsertReport {
        let mut report = UpsertReport::default();
        for (property, value) in properties {
            report.add(self.apply(device_name, *property, value, version).await);
        }
        report
    }

    async fn apply(
        &self,
        device_name: &str,
        property: Property,
        value: &str,
        version: Version,
    ) -> Outcome {
        let path = self.paths.property(device_name, property);

        let exists = match self.store.exists(&path).await {
            Ok(stat) => stat.is_some(),
            Err(e) => {
                warn!(path = %path, error = %e, "Error checking node");
                return Outcome::Failed { existed: false };
            }
        };

        if !exists {
            match self
                .store
                .create(&path, value.as_bytes(), self.create_mode)
                .await
            {
                Ok(_) => {
                    debug!(path = %path, value = %value, "Created property");
                    return Outcome::Created;
                }
                // Lost a race with a concurrent writer; update instead.
                Err(StoreError::NodeExists { .. }) => {}
                Err(e) => {
                    warn!(path = %path, error = %e, "Failed to create node");
                    return Outcome::Failed { existed: false };
                }
            }
        }

        match self.store.set(&path, value.as_bytes(), version).await {
            Ok(stat) => {
                debug!(path = %path, value = %value, version = stat.version, "Updated property");
                Outcome::Updated
            }
            Err(e) => {
                warn!(path = %path, value = %value, error = %e, "Error in setting node");
                Outcome::Failed { existed: true }
            }
        }
    }
}
