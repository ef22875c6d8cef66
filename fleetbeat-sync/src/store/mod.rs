//! Coordination store abstraction.
//!
//! A hierarchical key/value store with path-addressed nodes. Every node holds
//! an opaque byte value and a version counter that increases on each
//! successful [`set`](CoordinationClient::set).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::StoreResult;

mod events;
mod memory;
mod zenoh_store;

pub use events::spawn_event_listener;
pub use memory::{MemoryStore, Operation};
pub use zenoh_store::ZenohStore;

/// Optimistic concurrency token for conditional updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Version {
    /// Skip the version check (last writer wins).
    #[default]
    Any,
    /// Only apply the update if the node is at exactly this version.
    Exact(i32),
}

impl Version {
    /// Check a node's current version against this token.
    pub fn matches(&self, actual: i32) -> bool {
        match self {
            Version::Any => true,
            Version::Exact(expected) => *expected == actual,
        }
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Version::Any => f.write_str("any"),
            Version::Exact(v) => write!(f, "{}", v),
        }
    }
}

/// Lifetime flag applied when a node is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreateMode {
    /// Node outlives the creating session.
    #[default]
    Persistent,
    /// Node is tied to the creating session; expiry is up to the store.
    Ephemeral,
}

/// Metadata of a stored node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStat {
    /// Number of successful sets since creation (starts at 0).
    pub version: i32,
    /// Whether the node was created ephemeral.
    pub ephemeral: bool,
    /// Creation time (millis since epoch).
    pub created_at: i64,
    /// Last modification time (millis since epoch).
    pub modified_at: i64,
}

/// Connection-health notification emitted by a store client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// The store became reachable (again).
    Connected,
    /// A store call failed at the transport level.
    Disconnected { reason: String },
}

/// Receiving side of a store's health notifications.
pub type StoreEvents = mpsc::UnboundedReceiver<StoreEvent>;

/// Client for a hierarchical coordination store.
///
/// Implementations must be safe to share between tasks; callers hold them as
/// `Arc<dyn CoordinationClient>` and issue calls concurrently.
#[async_trait]
pub trait CoordinationClient: Send + Sync {
    /// Return the node's metadata if it exists.
    async fn exists(&self, path: &str) -> StoreResult<Option<NodeStat>>;

    /// Create a node. Fails with `NodeExists` if present, `NoNode` if the
    /// parent is missing. Returns the created path.
    async fn create(&self, path: &str, data: &[u8], mode: CreateMode) -> StoreResult<String>;

    /// Replace a node's value if `version` matches. Fails with `NoNode` if
    /// absent and `BadVersion` on mismatch.
    async fn set(&self, path: &str, data: &[u8], version: Version) -> StoreResult<NodeStat>;

    /// Read a node's value and metadata.
    async fn get(&self, path: &str) -> StoreResult<(Vec<u8>, NodeStat)>;

    /// Names of the node's direct children, sorted.
    async fn children(&self, path: &str) -> StoreResult<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_matches() {
        assert!(Version::Any.matches(0));
        assert!(Version::Any.matches(42));
        assert!(Version::Exact(3).matches(3));
        assert!(!Version::Exact(3).matches(4));
        assert_eq!(Version::default(), Version::Any);
    }

    #[test]
    fn test_version_display() {
        assert_eq!(Version::Any.to_string(), "any");
        assert_eq!(Version::Exact(7).to_string(), "7");
    }
}
