//! Store writes on behalf of sensor devices.

use std::sync::Arc;

use fleetbeat_common::{HeartbeatReport, NodePaths};
use fleetbeat_sync::{CoordinationClient, DeviceRegistry, PropertySync, UpsertReport, Version};
use tracing::{debug, warn};

/// What one ingested report did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOutcome {
    /// The device node did not exist before this report.
    pub new_device: bool,
    pub writes: UpsertReport,
}

/// Registers sensor devices and writes their reports.
///
/// A new device gets the full property set, a known device only the
/// properties that change between reports. Writes are unconditioned, so
/// concurrent reports for the same device resolve last-writer-wins.
#[derive(Clone)]
pub struct ReportIngestor {
    registry: DeviceRegistry,
    sync: PropertySync,
}

impl ReportIngestor {
    pub fn new(store: Arc<dyn CoordinationClient>, paths: NodePaths) -> Self {
        Self {
            registry: DeviceRegistry::new(store.clone(), paths.clone()),
            sync: PropertySync::new(store, paths),
        }
    }

    pub fn paths(&self) -> &NodePaths {
        self.sync.paths()
    }

    pub async fn ingest(&self, device: &str, report: &HeartbeatReport) -> IngestOutcome {
        let existed = self.registry.register(device).await;

        let props = if existed {
            report.mutable_properties()
        } else {
            debug!(device = %device, role = %report.device_role, "Writing full property set");
            report.full_properties()
        };

        let writes = self.sync.upsert_all(device, &props, Version::Any).await;
        if writes.failed > 0 {
            warn!(
                device = %device,
                failed = writes.failed,
                total = writes.total(),
                "Some property writes failed"
            );
        } else {
            debug!(device = %device, writes = writes.total(), "Heartbeat ingested");
        }

        IngestOutcome {
            new_device: !existed,
            writes,
        }
    }
}
