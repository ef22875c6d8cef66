use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// A property node under a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Property {
    DeviceType,
    DeviceRole,
    CpuCores,
    MemCap,
    Cpu,
    Mem,
    GpuCores,
    Gpu,
    Heartbeat,
}

impl Property {
    /// Every property, in the order nodes are usually written.
    pub const ALL: [Property; 9] = [
        Property::DeviceType,
        Property::DeviceRole,
        Property::CpuCores,
        Property::MemCap,
        Property::Cpu,
        Property::Mem,
        Property::GpuCores,
        Property::Gpu,
        Property::Heartbeat,
    ];

    /// Node name of this property.
    pub fn as_str(&self) -> &'static str {
        match self {
            Property::DeviceType => "device_type",
            Property::DeviceRole => "device_role",
            Property::CpuCores => "cpu_cores",
            Property::MemCap => "mem_cap",
            Property::Cpu => "cpu",
            Property::Mem => "mem",
            Property::GpuCores => "gpu_cores",
            Property::Gpu => "gpu",
            Property::Heartbeat => "heartbeat",
        }
    }

    /// Whether the property changes on every report cycle.
    pub fn is_mutable(&self) -> bool {
        matches!(
            self,
            Property::Cpu | Property::Mem | Property::Gpu | Property::Heartbeat
        )
    }
}

impl std::fmt::Display for Property {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Property {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Property::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown property '{}'", s))
    }
}

/// Encode a usage fraction the way node values are stored (`0.310000`).
pub fn encode_fraction(value: f64) -> String {
    format!("{:.6}", value)
}

/// Encode an integer node value.
pub fn encode_integer(value: impl Into<i128>) -> String {
    value.into().to_string()
}

/// Current unix time in seconds.
pub fn current_unix_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Snapshot pushed by a sensor device to the ingestion server.
///
/// Missing fields decode to zero values. The timestamp travels as
/// `heatbeat` on the wire; deployed sensors send that spelling.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatReport {
    pub device_type: String,
    pub device_role: String,

    /// CPU usage fraction (0..=1).
    pub cpu: f64,
    /// Memory usage fraction (0..=1).
    pub mem: f64,

    /// Unsigned: negative or fractional counts fail to decode.
    pub cpu_cores: u32,
    /// Memory capacity in bytes.
    pub mem_cap: u64,

    /// Unix seconds of the report.
    #[serde(rename = "heatbeat")]
    pub last_heartbeat: i64,
}

impl HeartbeatReport {
    /// Every property carried by the report, encoded as node values.
    pub fn full_properties(&self) -> Vec<(Property, String)> {
        vec![
            (Property::DeviceRole, self.device_role.clone()),
            (Property::DeviceType, self.device_type.clone()),
            (Property::CpuCores, encode_integer(self.cpu_cores)),
            (Property::MemCap, encode_integer(self.mem_cap)),
            (Property::Cpu, encode_fraction(self.cpu)),
            (Property::Mem, encode_fraction(self.mem)),
            (Property::Heartbeat, encode_integer(self.last_heartbeat)),
        ]
    }

    /// Only the properties that change between reports.
    pub fn mutable_properties(&self) -> Vec<(Property, String)> {
        self.full_properties()
            .into_iter()
            .filter(|(p, _)| p.is_mutable())
            .collect()
    }
}
