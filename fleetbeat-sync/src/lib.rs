//! Fleetbeat device-state synchronization.
//!
//! This crate provides:
//! - [`CoordinationClient`], the hierarchical store interface, with
//!   [`MemoryStore`] and [`ZenohStore`] implementations
//! - [`DeviceRegistry`] for idempotent device registration
//! - [`PropertySync`], the create-or-update primitive used by every writer
//! - [`ServiceArgs`], [`ServiceConfig`] and [`Service`] for process setup
//!
//! # Example
//!
//! ```ignore
//! use fleetbeat_sync::{DeviceRegistry, MemoryStore, PropertySync, Version};
//!
//! let store = Arc::new(MemoryStore::new());
//! let paths = NodePaths::new("heartbeats");
//!
//! DeviceRegistry::new(store.clone(), paths.clone()).register("edge-01").await;
//! PropertySync::new(store, paths)
//!     .upsert("edge-01", Property::Cpu, "0.250000", Version::Any)
//!     .await;
//! ```

mod args;
mod config;
mod error;
mod registry;
mod runner;
pub mod store;
mod sync;

pub use args::ServiceArgs;
pub use config::{ServiceConfig, apply_args, validate_base};
pub use error::{Result, StoreError, StoreResult, SyncError};
pub use registry::{DeviceRegistry, PLACEHOLDER};
pub use runner::{OpenedStore, Service, open_store};
pub use store::{
    CoordinationClient, CreateMode, MemoryStore, NodeStat, StoreEvent, StoreEvents, Version,
    ZenohStore,
};
pub use sync::{PropertySync, UpsertReport};

pub use fleetbeat_common::{BaseConfig, HeartbeatReport, NodePaths, Property};
