//! Point-in-time device readings.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Value returned for identity files that cannot be read.
pub const UNKNOWN: &str = "unknown";

/// Errors while reading device statistics.
#[derive(Debug, Error)]
pub enum StatError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {what}: {message}")]
    Parse { what: String, message: String },
    #[error("procfs error: {0}")]
    Procfs(String),
    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),
}

/// A used/total pair.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Usage {
    pub used: f64,
    pub total: f64,
}

impl Usage {
    pub fn new(used: f64, total: f64) -> Self {
        Self { used, total }
    }

    /// Used share of the total, clamped to `[0, 1]`. Zero when total is zero.
    pub fn fraction(&self) -> f64 {
        if self.total <= 0.0 || !self.used.is_finite() || !self.total.is_finite() {
            return 0.0;
        }
        (self.used / self.total).clamp(0.0, 1.0)
    }
}

/// Board family, derived from the device-tree model string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HardwareType {
    JetsonNano,
    Pi3,
    Pi4,
    Pi0,
    Unknown,
}

impl HardwareType {
    /// Classify a device-tree model string.
    pub fn from_model(model: &str) -> Self {
        const MODELS: [(&str, HardwareType); 4] = [
            ("NVIDIA Jetson Nano", HardwareType::JetsonNano),
            ("Raspberry Pi 3", HardwareType::Pi3),
            ("Raspberry Pi 4", HardwareType::Pi4),
            ("Raspberry Pi Zero", HardwareType::Pi0),
        ];
        MODELS
            .iter()
            .find(|(prefix, _)| model.starts_with(prefix))
            .map(|(_, hw)| *hw)
            .unwrap_or(HardwareType::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HardwareType::JetsonNano => "jetson_nano",
            HardwareType::Pi3 => "pi3",
            HardwareType::Pi4 => "pi4",
            HardwareType::Pi0 => "pi0",
            HardwareType::Unknown => UNKNOWN,
        }
    }

    /// Whether the board reports GPU load.
    pub fn is_gpu_capable(&self) -> bool {
        matches!(self, HardwareType::JetsonNano)
    }

    /// Number of GPU cores, zero for boards without a GPU.
    pub fn gpu_cores(&self) -> u32 {
        match self {
            HardwareType::JetsonNano => 128,
            _ => 0,
        }
    }
}

impl std::fmt::Display for HardwareType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of device readings and identity.
pub trait StatProvider: Send + Sync {
    /// CPU busy/total ticks.
    fn cpu_usage(&self) -> Result<Usage, StatError>;

    /// Memory used/total in bytes.
    fn memory(&self) -> Result<Usage, StatError>;

    /// GPU load.
    fn gpu_usage(&self) -> Result<Usage, StatError>;

    fn cpu_cores(&self) -> u32;

    fn hardware_type(&self) -> HardwareType;

    /// Role string as configured on the device.
    fn device_role(&self) -> String;

    /// Address of the gateway running the ingestion server.
    fn gateway(&self) -> String;

    /// Device name as configured on the device.
    fn device_name(&self) -> String;
}

/// Locations of the files read by [`HostStats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostFiles {
    /// GPU load in per-mille.
    #[serde(default = "default_gpu_load")]
    pub gpu_load: PathBuf,

    /// Device-tree model files, tried in order.
    #[serde(default = "default_model")]
    pub model: Vec<PathBuf>,

    #[serde(default = "default_role_file")]
    pub role: PathBuf,

    #[serde(default = "default_gateway_file")]
    pub gateway: PathBuf,

    #[serde(default = "default_name_file")]
    pub device_name: PathBuf,
}

fn default_gpu_load() -> PathBuf {
    PathBuf::from("/sys/devices/gpu.0/load")
}

fn default_model() -> Vec<PathBuf> {
    vec![
        PathBuf::from("/proc/device-tree/model"),
        PathBuf::from("/var/device-tree/model"),
    ]
}

fn default_role_file() -> PathBuf {
    PathBuf::from("/var/device_role")
}

fn default_gateway_file() -> PathBuf {
    PathBuf::from("/var/device_gateway")
}

fn default_name_file() -> PathBuf {
    PathBuf::from("/var/device_name")
}

impl Default for HostFiles {
    fn default() -> Self {
        Self {
            gpu_load: default_gpu_load(),
            model: default_model(),
            role: default_role_file(),
            gateway: default_gateway_file(),
            device_name: default_name_file(),
        }
    }
}

/// Readings of the local host: procfs for CPU and memory, plain files for
/// everything else.
#[derive(Debug, Clone, Default)]
pub struct HostStats {
    files: HostFiles,
}

impl HostStats {
    pub fn new(files: HostFiles) -> Self {
        Self { files }
    }
}

/// Read a file and trim surrounding spaces and newlines.
pub fn read_trimmed(path: &Path) -> Result<String, StatError> {
    std::fs::read_to_string(path)
        .map(|s| s.trim_matches(|c| c == ' ' || c == '\n').to_string())
        .map_err(|source| StatError::Io {
            path: path.display().to_string(),
            source,
        })
}

fn read_or_unknown(path: &Path) -> String {
    read_trimmed(path).unwrap_or_else(|e| {
        debug!(error = %e, "Identity file unavailable");
        UNKNOWN.to_string()
    })
}

/// Parse a per-mille GPU load file (`0`..=`1000`).
pub fn parse_gpu_load(content: &str) -> Result<Usage, StatError> {
    let used: f64 = content.trim().parse().map_err(|e: std::num::ParseFloatError| {
        StatError::Parse {
            what: "GPU load".to_string(),
            message: e.to_string(),
        }
    })?;
    Ok(Usage::new(used, 1000.0))
}

impl StatProvider for HostStats {
    fn cpu_usage(&self) -> Result<Usage, StatError> {
        crate::linux::cpu_usage()
    }

    fn memory(&self) -> Result<Usage, StatError> {
        crate::linux::memory()
    }

    fn gpu_usage(&self) -> Result<Usage, StatError> {
        let content = std::fs::read_to_string(&self.files.gpu_load).map_err(|source| {
            StatError::Io {
                path: self.files.gpu_load.display().to_string(),
                source,
            }
        })?;
        parse_gpu_load(&content)
    }

    fn cpu_cores(&self) -> u32 {
        crate::linux::cpu_cores()
    }

    fn hardware_type(&self) -> HardwareType {
        for path in &self.files.model {
            if let Ok(model) = std::fs::read_to_string(path) {
                let hw = HardwareType::from_model(&model);
                if hw == HardwareType::Unknown {
                    debug!(model = %model.trim_end_matches('\0'), "Unrecognized device model");
                }
                return hw;
            }
        }
        debug!("No device-tree model file found");
        HardwareType::Unknown
    }

    fn device_role(&self) -> String {
        read_or_unknown(&self.files.role)
    }

    fn gateway(&self) -> String {
        read_or_unknown(&self.files.gateway)
    }

    fn device_name(&self) -> String {
        read_or_unknown(&self.files.device_name)
    }
}
