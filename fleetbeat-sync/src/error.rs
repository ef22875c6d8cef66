//! Error types for store access and service plumbing.

use thiserror::Error;

/// Result type alias using [`SyncError`].
pub type Result<T> = std::result::Result<T, SyncError>;

/// Result type alias for coordination store calls.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors returned by a [`CoordinationClient`](crate::CoordinationClient).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The node (or its parent, on create) does not exist.
    #[error("node does not exist: {path}")]
    NoNode { path: String },

    /// Create was called for a node that already exists.
    #[error("node already exists: {path}")]
    NodeExists { path: String },

    /// Conditional set saw a different version than the caller expected.
    #[error("version mismatch on {path}: expected {expected}, found {actual}")]
    BadVersion {
        path: String,
        expected: i32,
        actual: i32,
    },

    /// Transport or backend failure.
    #[error("store backend error: {0}")]
    Backend(String),

    /// A stored node could not be decoded.
    #[error("failed to decode node {path}: {message}")]
    Encoding { path: String, message: String },
}

impl StoreError {
    /// Create a backend error.
    pub fn backend(msg: impl std::fmt::Display) -> Self {
        Self::Backend(msg.to_string())
    }

    /// Whether this error means the store could not be reached at all.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Backend(_))
    }
}

/// Errors that can occur while setting up a service.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file not found.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration parse error.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Configuration validation error.
    #[error("Configuration validation failed: {0}")]
    ConfigValidation(String),

    /// Zenoh connection error.
    #[error("Zenoh connection error: {0}")]
    ZenohConnection(String),

    /// Coordination store error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a configuration validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ConfigValidation(msg.into())
    }
}

impl From<fleetbeat_common::Error> for SyncError {
    fn from(err: fleetbeat_common::Error) -> Self {
        match err {
            fleetbeat_common::Error::Zenoh(e) => Self::ZenohConnection(e.to_string()),
            fleetbeat_common::Error::Io(e) => Self::Io(e),
            other => Self::Config(other.to_string()),
        }
    }
}

impl From<json5::Error> for SyncError {
    fn from(err: json5::Error) -> Self {
        Self::ConfigParse(err.to_string())
    }
}
