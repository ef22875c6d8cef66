//! In-process coordination store.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use fleetbeat_common::paths::parent;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;

use super::{CoordinationClient, CreateMode, NodeStat, StoreEvent, StoreEvents, Version};
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Clone)]
struct Node {
    data: Vec<u8>,
    stat: NodeStat,
}

/// A store call as seen by [`MemoryStore`], in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Exists(String),
    Create(String, CreateMode),
    Set(String, Version),
    Get(String),
    Children(String),
}

/// Linearizable in-memory store.
///
/// Every call is applied under one lock, so conditional creates and
/// version-checked sets behave like a single-server coordination service.
/// Calls are journaled for inspection, and the store can be switched
/// offline to simulate connection loss.
#[derive(Debug, Default)]
pub struct MemoryStore {
    nodes: RwLock<BTreeMap<String, Node>>,
    journal: Mutex<Vec<Operation>>,
    offline: AtomicBool,
    events: Option<mpsc::UnboundedSender<StoreEvent>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store that reports health transitions.
    pub fn with_events() -> (Self, StoreEvents) {
        let (tx, rx) = mpsc::unbounded_channel();
        let store = Self {
            events: Some(tx),
            ..Self::default()
        };
        (store, rx)
    }

    /// Simulate losing (or regaining) the store connection.
    pub fn set_offline(&self, offline: bool) {
        let was = self.offline.swap(offline, Ordering::SeqCst);
        if was == offline {
            return;
        }
        let event = if offline {
            StoreEvent::Disconnected {
                reason: "connection lost".to_string(),
            }
        } else {
            StoreEvent::Connected
        };
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    /// Calls received so far.
    pub fn journal(&self) -> Vec<Operation> {
        self.journal.lock().clone()
    }

    /// Forget recorded calls.
    pub fn clear_journal(&self) {
        self.journal.lock().clear();
    }

    /// Number of stored nodes.
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    /// Whether the store holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    /// All node paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        self.nodes.read().keys().cloned().collect()
    }

    /// A node's value as text, if present.
    pub fn value(&self, path: &str) -> Option<String> {
        self.nodes
            .read()
            .get(path)
            .map(|n| String::from_utf8_lossy(&n.data).into_owned())
    }

    fn record(&self, op: Operation) -> StoreResult<()> {
        self.journal.lock().push(op);
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::backend("connection lost"));
        }
        Ok(())
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[async_trait]
impl CoordinationClient for MemoryStore {
    async fn exists(&self, path: &str) -> StoreResult<Option<NodeStat>> {
        self.record(Operation::Exists(path.to_string()))?;
        Ok(self.nodes.read().get(path).map(|n| n.stat))
    }

    async fn create(&self, path: &str, data: &[u8], mode: CreateMode) -> StoreResult<String> {
        self.record(Operation::Create(path.to_string(), mode))?;

        let mut nodes = self.nodes.write();
        if nodes.contains_key(path) {
            return Err(StoreError::NodeExists {
                path: path.to_string(),
            });
        }
        if let Some(parent) = parent(path) {
            if !nodes.contains_key(parent) {
                return Err(StoreError::NoNode {
                    path: parent.to_string(),
                });
            }
        }

        let now = now_millis();
        nodes.insert(
            path.to_string(),
            Node {
                data: data.to_vec(),
                stat: NodeStat {
                    version: 0,
                    ephemeral: mode == CreateMode::Ephemeral,
                    created_at: now,
                    modified_at: now,
                },
            },
        );
        Ok(path.to_string())
    }

    async fn set(&self, path: &str, data: &[u8], version: Version) -> StoreResult<NodeStat> {
        self.record(Operation::Set(path.to_string(), version))?;

        let mut nodes = self.nodes.write();
        let node = nodes.get_mut(path).ok_or_else(|| StoreError::NoNode {
            path: path.to_string(),
        })?;

        if !version.matches(node.stat.version) {
            return Err(StoreError::BadVersion {
                path: path.to_string(),
                expected: match version {
                    Version::Exact(v) => v,
                    Version::Any => -1,
                },
                actual: node.stat.version,
            });
        }

        node.data = data.to_vec();
        node.stat.version += 1;
        node.stat.modified_at = now_millis();
        Ok(node.stat)
    }

    async fn get(&self, path: &str) -> StoreResult<(Vec<u8>, NodeStat)> {
        self.record(Operation::Get(path.to_string()))?;
        self.nodes
            .read()
            .get(path)
            .map(|n| (n.data.clone(), n.stat))
            .ok_or_else(|| StoreError::NoNode {
                path: path.to_string(),
            })
    }

    async fn children(&self, path: &str) -> StoreResult<Vec<String>> {
        self.record(Operation::Children(path.to_string()))?;

        let nodes = self.nodes.read();
        if !nodes.contains_key(path) {
            return Err(StoreError::NoNode {
                path: path.to_string(),
            });
        }

        let prefix = format!("{}/", path);
        Ok(nodes
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .filter_map(|(k, _)| {
                let rest = &k[prefix.len()..];
                (!rest.contains('/')).then(|| rest.to_string())
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_get() {
        let store = MemoryStore::new();
        store
            .create("/heartbeats", b"nothing", CreateMode::Persistent)
            .await
            .unwrap();

        let (data, stat) = store.get("/heartbeats").await.unwrap();
        assert_eq!(data, b"nothing");
        assert_eq!(stat.version, 0);
        assert!(!stat.ephemeral);
    }

    #[tokio::test]
    async fn test_create_requires_parent() {
        let store = MemoryStore::new();
        let err = store
            .create("/heartbeats/edge-01", b"nothing", CreateMode::Persistent)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::NoNode {
                path: "/heartbeats".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_create_twice_fails() {
        let store = MemoryStore::new();
        store.create("/a", b"1", CreateMode::Persistent).await.unwrap();
        let err = store
            .create("/a", b"2", CreateMode::Persistent)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NodeExists { .. }));
        assert_eq!(store.value("/a").as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_set_bumps_version() {
        let store = MemoryStore::new();
        store.create("/a", b"1", CreateMode::Ephemeral).await.unwrap();

        let stat = store.set("/a", b"2", Version::Any).await.unwrap();
        assert_eq!(stat.version, 1);
        assert!(stat.ephemeral);

        let stat = store.set("/a", b"3", Version::Exact(1)).await.unwrap();
        assert_eq!(stat.version, 2);
        assert_eq!(store.value("/a").as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn test_set_version_mismatch() {
        let store = MemoryStore::new();
        store.create("/a", b"1", CreateMode::Persistent).await.unwrap();

        let err = store.set("/a", b"2", Version::Exact(5)).await.unwrap_err();
        assert_eq!(
            err,
            StoreError::BadVersion {
                path: "/a".to_string(),
                expected: 5,
                actual: 0
            }
        );
        assert_eq!(store.value("/a").as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_set_missing_node() {
        let store = MemoryStore::new();
        let err = store.set("/missing", b"x", Version::Any).await.unwrap_err();
        assert!(matches!(err, StoreError::NoNode { .. }));
    }

    #[tokio::test]
    async fn test_children() {
        let store = MemoryStore::new();
        store.create("/r", b"", CreateMode::Persistent).await.unwrap();
        store.create("/r/b", b"", CreateMode::Persistent).await.unwrap();
        store.create("/r/a", b"", CreateMode::Persistent).await.unwrap();
        store.create("/r/a/cpu", b"", CreateMode::Persistent).await.unwrap();
        store.create("/rx", b"", CreateMode::Persistent).await.unwrap();

        assert_eq!(store.children("/r").await.unwrap(), vec!["a", "b"]);
        assert_eq!(store.children("/r/a").await.unwrap(), vec!["cpu"]);
        assert!(store.children("/nope").await.is_err());
    }

    #[tokio::test]
    async fn test_offline_store_fails_and_reports() {
        let (store, mut events) = MemoryStore::with_events();

        store.set_offline(true);
        let err = store.exists("/a").await.unwrap_err();
        assert!(err.is_connectivity());

        store.set_offline(false);
        assert!(store.exists("/a").await.unwrap().is_none());

        assert!(matches!(
            events.recv().await,
            Some(StoreEvent::Disconnected { .. })
        ));
        assert_eq!(events.recv().await, Some(StoreEvent::Connected));
    }

    #[tokio::test]
    async fn test_journal_records_calls() {
        let store = MemoryStore::new();
        let _ = store.exists("/a").await;
        store.create("/a", b"", CreateMode::Persistent).await.unwrap();
        store.set("/a", b"x", Version::Exact(0)).await.unwrap();

        assert_eq!(
            store.journal(),
            vec![
                Operation::Exists("/a".to_string()),
                Operation::Create("/a".to_string(), CreateMode::Persistent),
                Operation::Set("/a".to_string(), Version::Exact(0)),
            ]
        );

        store.clear_journal();
        assert!(store.journal().is_empty());
    }
}
