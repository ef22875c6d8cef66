//! CLI arguments shared by the agent and the ingestion server.

use std::path::PathBuf;

use clap::Args;
use fleetbeat_common::StoreBackend;

/// Common CLI arguments. Every flag overrides the matching config field.
#[derive(Args, Debug, Clone, Default)]
pub struct ServiceArgs {
    /// Path to configuration file (JSON5).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Root node of the store for device info.
    #[arg(long)]
    pub root_name: Option<String>,

    /// Zenoh endpoint of the coordination store (e.g. tcp/10.0.0.1:7447).
    #[arg(long)]
    pub store_addr: Option<String>,

    /// Store backend (zenoh or memory).
    #[arg(long, value_name = "BACKEND")]
    pub store: Option<StoreBackend>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct Cli {
        #[command(flatten)]
        service: ServiceArgs,
    }

    #[test]
    fn test_parse_flags() {
        let cli = Cli::try_parse_from([
            "fleetbeat",
            "--config",
            "agent.json5",
            "--root-name",
            "devices",
            "--store-addr",
            "tcp/10.0.0.1:7447",
            "--store",
            "memory",
        ])
        .unwrap();

        assert_eq!(cli.service.config, Some(PathBuf::from("agent.json5")));
        assert_eq!(cli.service.root_name.as_deref(), Some("devices"));
        assert_eq!(cli.service.store_addr.as_deref(), Some("tcp/10.0.0.1:7447"));
        assert_eq!(cli.service.store, Some(StoreBackend::Memory));
        assert!(cli.service.log_level.is_none());
    }

    #[test]
    fn test_rejects_unknown_backend() {
        assert!(Cli::try_parse_from(["fleetbeat", "--store", "etcd"]).is_err());
    }
}
