//! Fleetbeat ingestion server.

use clap::Parser;
use fleetbeat_common::NodePaths;
use fleetbeat_sync::Service;
use tracing::info;

use fleetbeat_ingest::{IngestArgs, IngestConfig, IngestionServer, ReportIngestor};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = IngestArgs::parse();
    let config = IngestConfig::from_ingest_args(&args)?;

    let listen_addr = config.ingest.listen_addr()?;
    let strict_payload = config.ingest.strict_payload;

    let service = Service::new("fleetbeat-ingest", config).await?;
    let paths = NodePaths::new(&service.config().base.store.root_name);

    let ingestor = ReportIngestor::new(service.store(), paths);
    let server = IngestionServer::new(ingestor, listen_addr, strict_payload);

    let result = server
        .run(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received Ctrl+C, shutting down..."),
                Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C"),
            }
        })
        .await;

    service.shutdown().await?;
    result
}
