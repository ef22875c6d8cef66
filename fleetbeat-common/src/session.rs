use zenoh::Session;

use crate::config::ZenohConfig;
use crate::error::{Error, Result};

/// Build a native Zenoh configuration from ours.
pub fn zenoh_config(config: &ZenohConfig) -> Result<zenoh::Config> {
    let mut zenoh_config = zenoh::Config::default();

    if !matches!(config.mode.as_str(), "client" | "peer" | "router") {
        return Err(Error::Config(format!(
            "Invalid Zenoh mode: '{}'. Expected 'client', 'peer', or 'router'",
            config.mode
        )));
    }

    zenoh_config
        .insert_json5("mode", &format!("\"{}\"", config.mode))
        .map_err(|e| Error::Config(format!("Failed to set mode: {}", e)))?;

    for (key, endpoints) in [
        ("connect/endpoints", &config.connect),
        ("listen/endpoints", &config.listen),
    ] {
        if endpoints.is_empty() {
            continue;
        }
        let endpoints_json = serde_json::to_string(endpoints)?;
        zenoh_config
            .insert_json5(key, &endpoints_json)
            .map_err(|e| Error::Config(format!("Failed to set {}: {}", key, e)))?;
    }

    Ok(zenoh_config)
}

/// Open the process-wide Zenoh session.
pub async fn connect(config: &ZenohConfig) -> Result<Session> {
    let zenoh_config = zenoh_config(config)?;

    tracing::info!(
        mode = %config.mode,
        connect = ?config.connect,
        listen = ?config.listen,
        "Connecting to Zenoh"
    );

    let session = zenoh::open(zenoh_config).await?;

    tracing::info!(zid = %session.zid(), "Connected to Zenoh");

    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_unknown_mode() {
        let config = ZenohConfig {
            mode: "leader".to_string(),
            ..Default::default()
        };
        assert!(matches!(zenoh_config(&config), Err(Error::Config(_))));
    }

    #[test]
    fn test_client_mode_with_endpoints() {
        let config = ZenohConfig {
            mode: "client".to_string(),
            connect: vec!["tcp/127.0.0.1:7447".to_string()],
            listen: Vec::new(),
        };
        assert!(zenoh_config(&config).is_ok());
    }
}
