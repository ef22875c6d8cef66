//! End-to-end tests of the Zenoh-backed store.
//!
//! A subscriber and a queryable on the test prefix stand in for a Zenoh
//! storage, so the store's put/get round trips run through a real session.
//!
//! Note: Zenoh requires multi-thread tokio runtime.
//! Each test uses a unique key prefix to avoid interference.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fleetbeat_sync::{
    CoordinationClient, CreateMode, DeviceRegistry, NodePaths, Property, PropertySync,
    StoreError, Version, ZenohStore,
};
use zenoh::Wait;
use zenoh::key_expr::KeyExpr;

/// Generate a unique test prefix to avoid test interference.
fn unique_prefix() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("test_{}", nanos)
}

type Storage = Arc<Mutex<HashMap<String, Vec<u8>>>>;

/// Open a session and serve `<prefix>/**` from an in-process map.
async fn open_with_storage(
    prefix: &str,
) -> (
    Arc<zenoh::Session>,
    Storage,
    zenoh::pubsub::Subscriber<()>,
    zenoh::query::Queryable<()>,
) {
    let session = Arc::new(
        zenoh::open(zenoh::Config::default())
            .await
            .expect("Failed to open Zenoh session"),
    );
    let storage: Storage = Arc::new(Mutex::new(HashMap::new()));
    let selector = format!("{}/**", prefix);

    let sink = storage.clone();
    let subscriber = session
        .declare_subscriber(&selector)
        .callback(move |sample| {
            sink.lock().unwrap().insert(
                sample.key_expr().to_string(),
                sample.payload().to_bytes().to_vec(),
            );
        })
        .await
        .expect("Failed to create subscriber");

    let source = storage.clone();
    let queryable = session
        .declare_queryable(&selector)
        .callback(move |query| {
            let matches: Vec<(String, Vec<u8>)> = source
                .lock()
                .unwrap()
                .iter()
                .filter(|(key, _)| {
                    KeyExpr::try_from(key.as_str())
                        .map(|ke| ke.intersects(query.key_expr()))
                        .unwrap_or(false)
                })
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            for (key, value) in matches {
                let _ = query.reply(key, value).wait();
            }
        })
        .await
        .expect("Failed to create queryable");

    tokio::time::sleep(Duration::from_millis(100)).await;

    (session, storage, subscriber, queryable)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_register_and_upsert_through_zenoh() {
    let prefix = unique_prefix();
    let (session, storage, subscriber, queryable) = open_with_storage(&prefix).await;

    let (store, _events) = ZenohStore::new(session.clone(), prefix.as_str());
    let store = Arc::new(store.with_query_timeout(Duration::from_secs(2)));
    let paths = NodePaths::default();

    let registry = DeviceRegistry::new(store.clone(), paths.clone());
    assert!(!registry.register("edge-01").await);
    assert!(registry.register("edge-01").await);

    let sync = PropertySync::new(store.clone(), paths);
    assert!(
        !sync
            .upsert("edge-01", Property::Cpu, "0.250000", Version::Any)
            .await
    );
    assert!(
        sync.upsert("edge-01", Property::Cpu, "0.500000", Version::Any)
            .await
    );

    let (data, stat) = store.get("/heartbeats/edge-01/cpu").await.unwrap();
    assert_eq!(data, b"0.500000");
    assert_eq!(stat.version, 1);
    assert!(!stat.ephemeral);

    let (data, _) = store.get("/heartbeats/edge-01").await.unwrap();
    assert_eq!(data, b"nothing");

    assert_eq!(
        store.children("/heartbeats").await.unwrap(),
        vec!["edge-01"]
    );
    assert!(
        storage
            .lock()
            .unwrap()
            .contains_key(&format!("{}/heartbeats/edge-01/cpu", prefix))
    );

    drop(subscriber);
    drop(queryable);
    session.close().await.expect("Failed to close session");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_conditional_writes_through_zenoh() {
    let prefix = unique_prefix();
    let (session, _storage, subscriber, queryable) = open_with_storage(&prefix).await;

    let (store, _events) = ZenohStore::new(session.clone(), prefix.as_str());
    let store = store.with_query_timeout(Duration::from_secs(2));

    assert!(matches!(
        store.create("/heartbeats/edge-01", b"nothing", CreateMode::Persistent).await,
        Err(StoreError::NoNode { .. })
    ));

    store
        .create("/heartbeats", b"nothing", CreateMode::Persistent)
        .await
        .unwrap();
    assert!(matches!(
        store.create("/heartbeats", b"nothing", CreateMode::Persistent).await,
        Err(StoreError::NodeExists { .. })
    ));

    store
        .create("/heartbeats/edge-01", b"nothing", CreateMode::Ephemeral)
        .await
        .unwrap();
    let stat = store.exists("/heartbeats/edge-01").await.unwrap().unwrap();
    assert!(stat.ephemeral);
    assert_eq!(stat.version, 0);

    assert!(matches!(
        store.set("/heartbeats/edge-01", b"x", Version::Exact(3)).await,
        Err(StoreError::BadVersion {
            expected: 3,
            actual: 0,
            ..
        })
    ));
    let stat = store
        .set("/heartbeats/edge-01", b"x", Version::Exact(0))
        .await
        .unwrap();
    assert_eq!(stat.version, 1);

    assert!(store.exists("/heartbeats/missing").await.unwrap().is_none());

    drop(subscriber);
    drop(queryable);
    session.close().await.expect("Failed to close session");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_foreign_replies_are_ignored() {
    let prefix = unique_prefix();
    let (session, _storage, subscriber, queryable) = open_with_storage(&prefix).await;

    // A second responder on the same keys answering with raw values.
    let foreign = session
        .declare_queryable(format!("{}/**", prefix))
        .callback(|query| {
            let key = query.key_expr().clone();
            if !key.as_str().contains('*') {
                let _ = query.reply(key, "0.990000").wait();
            }
        })
        .await
        .expect("Failed to create queryable");
    tokio::time::sleep(Duration::from_millis(100)).await;

    let (store, _events) = ZenohStore::new(session.clone(), prefix.as_str());
    let store = Arc::new(store.with_query_timeout(Duration::from_secs(2)));
    let paths = NodePaths::default();

    let registry = DeviceRegistry::new(store.clone(), paths.clone());
    assert!(!registry.try_register("edge-01").await.unwrap());

    let sync = PropertySync::new(store.clone(), paths);
    assert!(
        !sync
            .upsert("edge-01", Property::Mem, "0.250000", Version::Any)
            .await
    );
    assert!(
        sync.upsert("edge-01", Property::Mem, "0.500000", Version::Any)
            .await
    );

    let (data, stat) = store.get("/heartbeats/edge-01/mem").await.unwrap();
    assert_eq!(data, b"0.500000");
    assert_eq!(stat.version, 1);

    drop(foreign);
    drop(subscriber);
    drop(queryable);
    session.close().await.expect("Failed to close session");
}
