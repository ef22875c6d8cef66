//! Coordination store path layout.
//!
//! ```text
//! /<root>                         namespace root
//! /<root>/<device>                device node
//! /<root>/<device>/<property>     property node
//! ```

use crate::error::{Error, Result};
use crate::report::Property;

/// Default namespace root name.
pub const DEFAULT_ROOT: &str = "heartbeats";

/// Builder for node paths under a namespace root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePaths {
    root: String,
}

impl NodePaths {
    /// Create a path builder for the given root name (without leading slash).
    pub fn new(root_name: impl Into<String>) -> Self {
        let root = root_name.into();
        Self {
            root: root.trim_matches('/').to_string(),
        }
    }

    /// The root name without a leading slash.
    pub fn root_name(&self) -> &str {
        &self.root
    }

    /// Path of the namespace root.
    ///
    /// ```
    /// use fleetbeat_common::paths::NodePaths;
    ///
    /// assert_eq!(NodePaths::new("heartbeats").root(), "/heartbeats");
    /// ```
    pub fn root(&self) -> String {
        format!("/{}", self.root)
    }

    /// Path of a device node.
    ///
    /// ```
    /// use fleetbeat_common::paths::NodePaths;
    ///
    /// assert_eq!(NodePaths::new("heartbeats").device("edge-01"), "/heartbeats/edge-01");
    /// ```
    pub fn device(&self, device_name: &str) -> String {
        format!("/{}/{}", self.root, device_name)
    }

    /// Path of a property node.
    pub fn property(&self, device_name: &str, property: Property) -> String {
        format!("/{}/{}/{}", self.root, device_name, property.as_str())
    }
}

impl Default for NodePaths {
    fn default() -> Self {
        Self::new(DEFAULT_ROOT)
    }
}

/// Check that a device name can be used as a single path segment.
pub fn validate_device_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::Path("device name is empty".to_string()));
    }
    if name == "." || name == ".." {
        return Err(Error::Path(format!("'{}' is not a valid device name", name)));
    }
    if let Some(c) = name
        .chars()
        .find(|c| matches!(c, '/' | '*' | '$' | '?' | '#') || c.is_whitespace())
    {
        return Err(Error::Path(format!(
            "device name '{}' contains forbidden character {:?}",
            name, c
        )));
    }
    Ok(())
}

/// Parent of a path, `None` for a top-level node.
pub fn parent(path: &str) -> Option<&str> {
    let idx = path.rfind('/')?;
    if idx == 0 { None } else { Some(&path[..idx]) }
}

/// Last segment of a path.
pub fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
