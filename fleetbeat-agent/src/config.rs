//! Configuration for the heartbeat agent.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use fleetbeat_common::{BaseConfig, validate_device_name};
use fleetbeat_sync::{Result, ServiceArgs, ServiceConfig, SyncError, validate_base};
use serde::{Deserialize, Serialize};

use crate::role::DeviceRole;
use crate::stats::{HostFiles, StatProvider, UNKNOWN};

/// Marker for values resolved from the host at startup.
pub const AUTO: &str = "auto";

/// Default port of the ingestion server on the gateway.
pub const DEFAULT_INGEST_PORT: u16 = 18969;

/// Complete agent configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(flatten)]
    pub base: BaseConfig,

    #[serde(default)]
    pub agent: AgentSettings,
}

/// Agent-specific settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Report interval in seconds (default: 10).
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Device name. `auto` reads `/var/device_name`, then the hostname.
    #[serde(default = "default_auto")]
    pub device_name: String,

    /// `edge`, `sensor`, or `auto` to read the role file.
    #[serde(default = "default_auto")]
    pub role: String,

    /// Gateway address. `auto` reads the gateway file.
    #[serde(default = "default_auto")]
    pub gateway: String,

    #[serde(default = "default_ingest_port")]
    pub ingest_port: u16,

    /// Full heartbeat URL, overriding gateway and port.
    #[serde(default)]
    pub ingest_url: Option<String>,

    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// Host files read by the stat provider.
    #[serde(default)]
    pub files: HostFiles,
}

fn default_interval() -> u64 {
    10
}

fn default_auto() -> String {
    AUTO.to_string()
}

fn default_ingest_port() -> u16 {
    DEFAULT_INGEST_PORT
}

fn default_http_timeout() -> u64 {
    10
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            device_name: default_auto(),
            role: default_auto(),
            gateway: default_auto(),
            ingest_port: default_ingest_port(),
            ingest_url: None,
            http_timeout_secs: default_http_timeout(),
            files: HostFiles::default(),
        }
    }
}

impl AgentSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Resolve the device name: configured value, device name file, hostname.
    pub fn resolve_device_name(&self, stats: &dyn StatProvider) -> String {
        if self.device_name != AUTO {
            return self.device_name.clone();
        }
        let from_file = stats.device_name();
        if !from_file.is_empty() && from_file != UNKNOWN {
            return from_file;
        }
        hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    /// Resolve the role: configured value or the role file.
    pub fn resolve_role(&self, stats: &dyn StatProvider) -> DeviceRole {
        if self.role != AUTO {
            DeviceRole::parse(&self.role)
        } else {
            DeviceRole::parse(&stats.device_role())
        }
    }

    /// Heartbeat URL of the ingestion server, without query string.
    pub fn resolve_ingest_url(&self, stats: &dyn StatProvider) -> String {
        if let Some(url) = &self.ingest_url {
            return url.clone();
        }
        let gateway = if self.gateway != AUTO {
            self.gateway.clone()
        } else {
            stats.gateway()
        };
        format!("http://{}:{}/heartbeat", gateway, self.ingest_port)
    }
}

impl ServiceConfig for AgentConfig {
    fn base(&self) -> &BaseConfig {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseConfig {
        &mut self.base
    }

    fn validate(&self) -> Result<()> {
        validate_base(&self.base)?;

        if self.agent.interval_secs == 0 {
            return Err(SyncError::validation("agent.interval_secs must be > 0"));
        }
        if self.agent.http_timeout_secs == 0 {
            return Err(SyncError::validation("agent.http_timeout_secs must be > 0"));
        }
        if self.agent.device_name != AUTO {
            validate_device_name(&self.agent.device_name)
                .map_err(|e| SyncError::validation(format!("agent.device_name: {}", e)))?;
        }
        if self.agent.role != AUTO && !DeviceRole::parse(&self.agent.role).is_valid() {
            return Err(SyncError::validation(format!(
                "agent.role must be 'edge', 'sensor' or 'auto', got '{}'",
                self.agent.role
            )));
        }
        Ok(())
    }
}

/// Command-line arguments of the agent.
#[derive(Parser, Debug, Clone)]
#[command(name = "fleetbeat-agent", version, about = "Device heartbeat agent")]
pub struct AgentArgs {
    #[command(flatten)]
    pub service: ServiceArgs,

    /// Report interval in seconds.
    #[arg(long)]
    pub interval: Option<u64>,

    /// Device name (defaults to /var/device_name, then the hostname).
    #[arg(long)]
    pub device_name: Option<String>,

    /// Device role (edge or sensor), overriding the role file.
    #[arg(long)]
    pub role: Option<String>,

    /// Path of the device role file.
    #[arg(long, value_name = "PATH")]
    pub role_file: Option<PathBuf>,
}

impl AgentConfig {
    /// Effective configuration from file, defaults and all CLI flags.
    pub fn from_agent_args(args: &AgentArgs) -> Result<Self> {
        let mut config = Self::read_with_args(&args.service)?;
        if let Some(interval) = args.interval {
            config.agent.interval_secs = interval;
        }
        if let Some(name) = &args.device_name {
            config.agent.device_name = name.clone();
        }
        if let Some(role) = &args.role {
            config.agent.role = role.clone();
        }
        if let Some(path) = &args.role_file {
            config.agent.files.role = path.clone();
        }
        config.validate()?;
        Ok(config)
    }
}
