//! HTTP ingestion server for sensor heartbeats.
//!
//! Sensor devices cannot reach the coordination store, so they POST their
//! snapshots here and the server performs the same register-then-upsert
//! sequence the edge agent runs locally.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │  Sensor agents  │────>│ /heartbeat      │────>│  Coordination   │
//! │  (HTTP POST)    │     │ (ReportIngestor)│     │  store          │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```bash
//! fleetbeat-ingest --config ingest.json5
//! ```
//!
//! See [`config::IngestConfig`] for configuration options.

pub mod config;
pub mod http;
pub mod ingest;

pub use config::{IngestArgs, IngestConfig, IngestSettings};
pub use http::{IngestionServer, create_router};
pub use ingest::{IngestOutcome, ReportIngestor};
