//! Configuration traits and utilities.

use std::path::Path;

use fleetbeat_common::{BaseConfig, validate_device_name};
use serde::de::DeserializeOwned;

use crate::args::ServiceArgs;
use crate::error::{Result, SyncError};

/// Trait for service configuration types.
///
/// Implementors embed a [`BaseConfig`] (usually via `#[serde(flatten)]`) and
/// get file loading, CLI overrides and validation of the shared sections.
///
/// # Example
///
/// ```ignore
/// #[derive(Debug, Default, Deserialize)]
/// pub struct MyConfig {
///     #[serde(flatten)]
///     pub base: BaseConfig,
///     #[serde(default)]
///     pub mine: MySettings,
/// }
///
/// impl ServiceConfig for MyConfig {
///     fn base(&self) -> &BaseConfig { &self.base }
///     fn base_mut(&mut self) -> &mut BaseConfig { &mut self.base }
/// }
/// ```
pub trait ServiceConfig: Sized + DeserializeOwned + Default {
    /// Shared sections.
    fn base(&self) -> &BaseConfig;

    /// Shared sections, mutable.
    fn base_mut(&mut self) -> &mut BaseConfig;

    /// Validate the configuration.
    ///
    /// Implementors overriding this should call [`validate_base`].
    fn validate(&self) -> Result<()> {
        validate_base(self.base())
    }

    /// Load configuration from a JSON5 file and validate it.
    fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON5 file without validating it.
    fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(SyncError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path)?;
        Ok(json5::from_str(&content)?)
    }

    /// File (or defaults) plus the shared CLI flags, not yet validated.
    ///
    /// Services with their own flags apply them on top, then validate once.
    fn read_with_args(args: &ServiceArgs) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::read(path)?,
            None => Self::default(),
        };
        apply_args(config.base_mut(), args);
        Ok(config)
    }

    /// Build the effective configuration: file (or defaults) plus CLI flags.
    fn from_args(args: &ServiceArgs) -> Result<Self> {
        let config = Self::read_with_args(args)?;
        config.validate()?;
        Ok(config)
    }
}

/// Apply CLI overrides to the shared sections.
pub fn apply_args(base: &mut BaseConfig, args: &ServiceArgs) {
    if let Some(level) = &args.log_level {
        base.logging.level = level.clone();
    }
    if let Some(root) = &args.root_name {
        base.store.root_name = root.clone();
    }
    if let Some(backend) = args.store {
        base.store.backend = backend;
    }
    if let Some(addr) = &args.store_addr {
        base.zenoh.mode = "client".to_string();
        base.zenoh.connect = vec![addr.clone()];
    }
}

/// Validate the shared sections.
pub fn validate_base(base: &BaseConfig) -> Result<()> {
    let root = base.store.root_name.trim_matches('/');
    if root.is_empty() {
        return Err(SyncError::validation("store.root_name must not be empty"));
    }
    validate_device_name(root)
        .map_err(|e| SyncError::validation(format!("store.root_name: {}", e)))?;

    if !matches!(base.zenoh.mode.as_str(), "client" | "peer" | "router") {
        return Err(SyncError::validation(format!(
            "zenoh.mode must be 'client', 'peer' or 'router', got '{}'",
            base.zenoh.mode
        )));
    }
    Ok(())
}
