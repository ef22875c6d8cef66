//! Device roles.

use std::fmt;

/// Which reporting path a device takes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceRole {
    /// Writes directly to the coordination store.
    Edge,
    /// Posts snapshots to the ingestion server on its gateway.
    Sensor,
    /// Anything else. Fatal at startup.
    Invalid(String),
}

impl DeviceRole {
    /// Parse a role string. Surrounding whitespace is ignored. Matching is
    /// case-sensitive.
    pub fn parse(role: &str) -> Self {
        match role.trim() {
            "edge" => DeviceRole::Edge,
            "sensor" => DeviceRole::Sensor,
            other => DeviceRole::Invalid(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            DeviceRole::Edge => "edge",
            DeviceRole::Sensor => "sensor",
            DeviceRole::Invalid(s) => s,
        }
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self, DeviceRole::Invalid(_))
    }
}

impl fmt::Display for DeviceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
