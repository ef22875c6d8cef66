//! Fleetbeat Common Library
//!
//! Shared types and utilities for the Fleetbeat agent and ingestion server:
//!
//! - [`config`] - Configuration loading (JSON5 format)
//! - [`paths`] - Coordination store node paths
//! - [`report`] - Property names, value encoding and the heartbeat wire type
//! - [`session`] - Zenoh session management
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod paths;
pub mod report;
pub mod session;

pub use config::{
    BaseConfig, LogFormat, LoggingConfig, StoreBackend, StoreConfig, ZenohConfig, load_config,
    parse_config,
};
pub use error::{Error, Result};
pub use paths::{NodePaths, validate_device_name};
pub use report::{HeartbeatReport, Property, current_unix_secs, encode_fraction, encode_integer};
pub use session::connect;

/// Initialize tracing with the given configuration.
///
/// `RUST_LOG` takes precedence over the configured level.
///
/// # Example
///
/// ```ignore
/// use fleetbeat_common::{LoggingConfig, LogFormat, init_tracing};
///
/// let config = LoggingConfig {
///     level: "info".to_string(),
///     format: LogFormat::Json,
/// };
/// init_tracing(&config)?;
/// ```
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let result = match config.format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .try_init(),
    };

    result.map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))
}
