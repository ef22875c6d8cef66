//! Error types for the heartbeat agent.

use thiserror::Error;

use crate::stats::StatError;

/// Errors raised by the agent.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("invalid device role '{0}', expected 'edge' or 'sensor'")]
    InvalidRole(String),

    #[error("stat read failed: {0}")]
    Stat(#[from] StatError),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("ingestion server replied {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("store error: {0}")]
    Store(#[from] fleetbeat_sync::StoreError),

    #[error("{failed} of {total} property writes failed")]
    Incomplete { failed: usize, total: usize },
}

pub type Result<T> = std::result::Result<T, AgentError>;
