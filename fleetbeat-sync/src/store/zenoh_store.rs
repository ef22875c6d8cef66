//! Coordination store on top of a Zenoh storage.
//!
//! Node `/<root>/<device>/<property>` lives at key
//! `<key_prefix>/<root>/<device>/<property>`. The stored payload is a JSON
//! envelope carrying the node value together with its version and flags, so
//! a Zenoh storage (e.g. the `zenohd` storage manager with a memory backend)
//! must be configured for `<key_prefix>/**`.
//!
//! Zenoh offers no compare-and-swap. Creates and version-checked sets are a
//! read followed by a put, which is exact within one process and best-effort
//! across processes writing the same node.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use fleetbeat_common::paths::{basename, parent};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};
use zenoh::Session;
use zenoh::liveliness::LivelinessToken;

use super::{CoordinationClient, CreateMode, NodeStat, StoreEvent, StoreEvents, Version};
use crate::error::{StoreError, StoreResult};

/// Default timeout for storage queries.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Stored form of a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Envelope {
    version: i32,
    #[serde(default)]
    ephemeral: bool,
    created_at: i64,
    modified_at: i64,
    data: Vec<u8>,
}

impl Envelope {
    fn stat(&self) -> NodeStat {
        NodeStat {
            version: self.version,
            ephemeral: self.ephemeral,
            created_at: self.created_at,
            modified_at: self.modified_at,
        }
    }

    /// Pick the newest of two replies for the same key.
    fn newer_than(&self, other: &Envelope) -> bool {
        (self.version, self.modified_at) > (other.version, other.modified_at)
    }
}

/// [`CoordinationClient`] backed by a shared Zenoh session.
pub struct ZenohStore {
    session: Arc<Session>,
    key_prefix: String,
    query_timeout: Duration,
    healthy: AtomicBool,
    events: mpsc::UnboundedSender<StoreEvent>,
    /// Liveliness tokens of ephemeral nodes created by this process.
    ephemeral_tokens: Mutex<HashMap<String, LivelinessToken>>,
}

impl std::fmt::Debug for ZenohStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZenohStore")
            .field("zid", &self.session.zid())
            .field("key_prefix", &self.key_prefix)
            .field("healthy", &self.healthy.load(Ordering::Relaxed))
            .finish()
    }
}

impl ZenohStore {
    /// Create a store client on an open session.
    ///
    /// Returns the receiving side of the client's health notifications.
    pub fn new(session: Arc<Session>, key_prefix: impl Into<String>) -> (Self, StoreEvents) {
        let (tx, rx) = mpsc::unbounded_channel();
        let store = Self {
            session,
            key_prefix: key_prefix.into().trim_matches('/').to_string(),
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            healthy: AtomicBool::new(true),
            events: tx,
            ephemeral_tokens: Mutex::new(HashMap::new()),
        };
        (store, rx)
    }

    /// Override the storage query timeout.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Zenoh key of a node path.
    pub fn key_for(&self, path: &str) -> String {
        build_key(&self.key_prefix, path)
    }

    fn mark_healthy(&self) {
        if !self.healthy.swap(true, Ordering::SeqCst) {
            let _ = self.events.send(StoreEvent::Connected);
        }
    }

    fn backend_error(&self, err: impl std::fmt::Display) -> StoreError {
        let reason = err.to_string();
        if self.healthy.swap(false, Ordering::SeqCst) {
            let _ = self.events.send(StoreEvent::Disconnected {
                reason: reason.clone(),
            });
        }
        StoreError::Backend(reason)
    }

    async fn fetch(&self, path: &str) -> StoreResult<Option<Envelope>> {
        let key = self.key_for(path);
        let replies = self
            .session
            .get(key.as_str())
            .timeout(self.query_timeout)
            .await
            .map_err(|e| self.backend_error(e))?;

        let mut latest: Option<Envelope> = None;
        while let Ok(reply) = replies.recv_async().await {
            match reply.result() {
                Ok(sample) => merge_reply(&mut latest, path, &sample.payload().to_bytes()),
                Err(err) => {
                    warn!(key = %key, error = ?err, "Storage replied with an error");
                }
            }
        }

        self.mark_healthy();
        Ok(latest)
    }

    async fn store(&self, path: &str, envelope: &Envelope) -> StoreResult<()> {
        let key = self.key_for(path);
        let payload = serde_json::to_vec(envelope).map_err(|e| StoreError::Encoding {
            path: path.to_string(),
            message: e.to_string(),
        })?;

        self.session
            .put(key.as_str(), payload)
            .await
            .map_err(|e| self.backend_error(e))?;

        self.mark_healthy();
        debug!(key = %key, version = envelope.version, "Stored node");
        Ok(())
    }

    async fn hold_ephemeral(&self, path: &str) {
        let key = self.key_for(path);
        match self.session.liveliness().declare_token(key.as_str()).await {
            Ok(token) => {
                self.ephemeral_tokens.lock().await.insert(key, token);
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to declare liveliness for ephemeral node");
            }
        }
    }
}

fn build_key(prefix: &str, path: &str) -> String {
    let path = path.trim_start_matches('/');
    if prefix.is_empty() {
        path.to_string()
    } else {
        format!("{}/{}", prefix, path)
    }
}

fn decode_envelope(path: &str, bytes: &[u8]) -> StoreResult<Envelope> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Encoding {
        path: path.to_string(),
        message: e.to_string(),
    })
}

/// Fold one storage reply into the newest envelope seen so far.
///
/// Payloads that are not envelopes, e.g. from a foreign publisher on the
/// key, are logged and skipped.
fn merge_reply(latest: &mut Option<Envelope>, path: &str, bytes: &[u8]) {
    match decode_envelope(path, bytes) {
        Ok(envelope) => {
            if latest.as_ref().is_none_or(|l| envelope.newer_than(l)) {
                *latest = Some(envelope);
            }
        }
        Err(e) => warn!(path = %path, error = %e, "Skipping undecodable storage reply"),
    }
}

#[async_trait]
impl CoordinationClient for ZenohStore {
    async fn exists(&self, path: &str) -> StoreResult<Option<NodeStat>> {
        Ok(self.fetch(path).await?.map(|e| e.stat()))
    }

    async fn create(&self, path: &str, data: &[u8], mode: CreateMode) -> StoreResult<String> {
        if self.fetch(path).await?.is_some() {
            return Err(StoreError::NodeExists {
                path: path.to_string(),
            });
        }
        if let Some(parent) = parent(path) {
            if self.fetch(parent).await?.is_none() {
                return Err(StoreError::NoNode {
                    path: parent.to_string(),
                });
            }
        }

        let now = chrono::Utc::now().timestamp_millis();
        let envelope = Envelope {
            version: 0,
            ephemeral: mode == CreateMode::Ephemeral,
            created_at: now,
            modified_at: now,
            data: data.to_vec(),
        };
        self.store(path, &envelope).await?;

        if mode == CreateMode::Ephemeral {
            self.hold_ephemeral(path).await;
        }

        Ok(path.to_string())
    }

    async fn set(&self, path: &str, data: &[u8], version: Version) -> StoreResult<NodeStat> {
        let mut envelope = self.fetch(path).await?.ok_or_else(|| StoreError::NoNode {
            path: path.to_string(),
        })?;

        if !version.matches(envelope.version) {
            return Err(StoreError::BadVersion {
                path: path.to_string(),
                expected: match version {
                    Version::Exact(v) => v,
                    Version::Any => -1,
                },
                actual: envelope.version,
            });
        }

        envelope.version += 1;
        envelope.modified_at = chrono::Utc::now().timestamp_millis();
        envelope.data = data.to_vec();
        self.store(path, &envelope).await?;

        Ok(envelope.stat())
    }

    async fn get(&self, path: &str) -> StoreResult<(Vec<u8>, NodeStat)> {
        let envelope = self.fetch(path).await?.ok_or_else(|| StoreError::NoNode {
            path: path.to_string(),
        })?;
        let stat = envelope.stat();
        Ok((envelope.data, stat))
    }

    async fn children(&self, path: &str) -> StoreResult<Vec<String>> {
        let selector = format!("{}/*", self.key_for(path));
        let replies = self
            .session
            .get(selector.as_str())
            .timeout(self.query_timeout)
            .await
            .map_err(|e| self.backend_error(e))?;

        let mut names = Vec::new();
        while let Ok(reply) = replies.recv_async().await {
            if let Ok(sample) = reply.result() {
                names.push(basename(sample.key_expr().as_str()).to_string());
            }
        }
        self.mark_healthy();

        names.sort();
        names.dedup();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_key() {
        assert_eq!(
            build_key("fleetbeat/store", "/heartbeats/edge-01/cpu"),
            "fleetbeat/store/heartbeats/edge-01/cpu"
        );
        assert_eq!(build_key("", "/heartbeats"), "heartbeats");
    }

    #[test]
    fn test_envelope_roundtrip() {
        let envelope = Envelope {
            version: 3,
            ephemeral: true,
            created_at: 1,
            modified_at: 2,
            data: b"0.310000".to_vec(),
        };
        let bytes = serde_json::to_vec(&envelope).unwrap();
        let decoded = decode_envelope("/x", &bytes).unwrap();

        assert_eq!(decoded.stat().version, 3);
        assert!(decoded.stat().ephemeral);
        assert_eq!(decoded.data, b"0.310000");
    }

    #[test]
    fn test_undecodable_reply_is_skipped() {
        let good = serde_json::to_vec(&Envelope {
            version: 4,
            ephemeral: false,
            created_at: 1,
            modified_at: 5,
            data: b"0.500000".to_vec(),
        })
        .unwrap();

        let mut latest = None;
        merge_reply(&mut latest, "/heartbeats/edge-01/cpu", b"0.7");
        assert!(latest.is_none());
        merge_reply(&mut latest, "/heartbeats/edge-01/cpu", &good);
        merge_reply(&mut latest, "/heartbeats/edge-01/cpu", b"{\"version\":");

        let envelope = latest.unwrap();
        assert_eq!(envelope.version, 4);
        assert_eq!(envelope.data, b"0.500000");
    }

    #[test]
    fn test_decode_garbage() {
        let err = decode_envelope("/heartbeats/x", b"not json").unwrap_err();
        assert!(matches!(err, StoreError::Encoding { .. }));
    }

    #[test]
    fn test_newest_reply_wins() {
        let older = Envelope {
            version: 1,
            ephemeral: false,
            created_at: 0,
            modified_at: 10,
            data: Vec::new(),
        };
        let newer = Envelope {
            version: 2,
            modified_at: 5,
            ..older.clone()
        };
        assert!(newer.newer_than(&older));
        assert!(!older.newer_than(&newer));
    }
}
