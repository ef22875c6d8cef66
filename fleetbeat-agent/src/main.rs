//! Fleetbeat heartbeat agent.
//!
//! Edge devices write to the coordination store, sensor devices post to the
//! ingestion server on their gateway.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use fleetbeat_common::{NodePaths, init_tracing, validate_device_name};
use fleetbeat_sync::Service;

use fleetbeat_agent::{
    AgentArgs, AgentConfig, AgentError, DeviceRole, EdgeReporter, HeartbeatAgent, HostStats,
    SensorReporter, StatProvider,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = AgentArgs::parse();
    let config = AgentConfig::from_agent_args(&args)?;

    let stats: Arc<dyn StatProvider> = Arc::new(HostStats::new(config.agent.files.clone()));
    let role = config.agent.resolve_role(stats.as_ref());
    let device = config.agent.resolve_device_name(stats.as_ref());
    let interval = config.agent.interval();

    validate_device_name(&device)
        .map_err(|e| anyhow::anyhow!("invalid device name '{}': {}", device, e))?;

    match role {
        DeviceRole::Edge => {
            let mut service = Service::new("fleetbeat-agent", config).await?;
            let paths = NodePaths::new(&service.config().base.store.root_name);

            tracing::info!(
                device = %device,
                root = %paths.root(),
                interval_secs = interval.as_secs(),
                "Edge agent running"
            );

            let reporter = EdgeReporter::new(device, stats, service.store(), paths);
            let agent = HeartbeatAgent::new(Box::new(reporter), interval);
            service.spawn(agent.run());

            service.run().await?;
        }
        DeviceRole::Sensor => {
            init_tracing(&config.base.logging)?;

            let url = config.agent.resolve_ingest_url(stats.as_ref());
            tracing::info!(
                device = %device,
                url = %url,
                interval_secs = interval.as_secs(),
                "Sensor agent running"
            );

            let reporter =
                SensorReporter::new(device, url, stats, config.agent.http_timeout())?;
            let agent = HeartbeatAgent::new(Box::new(reporter), interval);

            tokio::select! {
                _ = agent.run() => {}
                result = tokio::signal::ctrl_c() => {
                    if let Err(e) = result {
                        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                    }
                    tracing::info!("Received shutdown signal");
                }
            }
        }
        DeviceRole::Invalid(role) => {
            return Err(AgentError::InvalidRole(role).into());
        }
    }

    Ok(())
}
