use thiserror::Error;

/// Common error type for Fleetbeat components.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Zenoh error: {0}")]
    Zenoh(#[from] zenoh::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid node path: {0}")]
    Path(String),
}

/// Result type alias using Fleetbeat's Error.
pub type Result<T> = std::result::Result<T, Error>;
