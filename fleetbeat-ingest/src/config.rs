//! Configuration for the ingestion server.

use std::net::SocketAddr;

use clap::Parser;
use fleetbeat_common::BaseConfig;
use fleetbeat_sync::{Result, ServiceArgs, ServiceConfig, SyncError, validate_base};
use serde::{Deserialize, Serialize};

/// Complete ingestion server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(flatten)]
    pub base: BaseConfig,

    #[serde(default)]
    pub ingest: IngestSettings,
}

/// HTTP endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestSettings {
    /// Address to listen on (default: "0.0.0.0:18969").
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Reject undecodable payloads with 400 (default: true).
    ///
    /// When false, a payload that fails to decode is ingested as an all-zero
    /// report.
    #[serde(default = "default_strict")]
    pub strict_payload: bool,
}

fn default_listen() -> String {
    "0.0.0.0:18969".to_string()
}

fn default_strict() -> bool {
    true
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            strict_payload: default_strict(),
        }
    }
}

impl IngestSettings {
    /// Parsed listen address.
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen.parse().map_err(|e| {
            SyncError::validation(format!("invalid ingest.listen '{}': {}", self.listen, e))
        })
    }
}

impl ServiceConfig for IngestConfig {
    fn base(&self) -> &BaseConfig {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseConfig {
        &mut self.base
    }

    fn validate(&self) -> Result<()> {
        validate_base(&self.base)?;
        self.ingest.listen_addr()?;
        Ok(())
    }
}

/// Command-line arguments of the ingestion server.
#[derive(Parser, Debug, Clone)]
#[command(name = "fleetbeat-ingest")]
#[command(about = "Accept sensor heartbeats over HTTP and write them to the coordination store")]
#[command(version)]
pub struct IngestArgs {
    #[command(flatten)]
    pub service: ServiceArgs,

    /// HTTP listen address (overrides config).
    #[arg(long)]
    pub listen: Option<String>,
}

impl IngestConfig {
    /// Effective configuration from file, defaults and all CLI flags.
    pub fn from_ingest_args(args: &IngestArgs) -> Result<Self> {
        let mut config = Self::read_with_args(&args.service)?;
        if let Some(listen) = &args.listen {
            config.ingest.listen = listen.clone();
        }
        config.validate()?;
        Ok(config)
    }
}
