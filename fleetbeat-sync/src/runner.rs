//! Service runner for lifecycle management.

use std::future::Future;
use std::sync::Arc;

use fleetbeat_common::{BaseConfig, StoreBackend, connect, init_tracing};
use tokio::signal;
use tokio::task::JoinHandle;

use crate::config::ServiceConfig;
use crate::error::{Result, SyncError};
use crate::store::{
    CoordinationClient, MemoryStore, StoreEvents, ZenohStore, spawn_event_listener,
};

/// An opened coordination store and what keeps it alive.
pub struct OpenedStore {
    pub client: Arc<dyn CoordinationClient>,
    pub events: StoreEvents,
    /// Zenoh session backing the client, if any.
    pub session: Option<Arc<zenoh::Session>>,
}

/// Open the process-wide store client selected by the configuration.
pub async fn open_store(base: &BaseConfig) -> Result<OpenedStore> {
    match base.store.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; state is lost on exit");
            let (store, events) = MemoryStore::with_events();
            Ok(OpenedStore {
                client: Arc::new(store),
                events,
                session: None,
            })
        }
        StoreBackend::Zenoh => {
            let session = Arc::new(
                connect(&base.zenoh)
                    .await
                    .map_err(|e| SyncError::ZenohConnection(e.to_string()))?,
            );
            let (store, events) = ZenohStore::new(session.clone(), &base.store.key_prefix);
            Ok(OpenedStore {
                client: Arc::new(store),
                events,
                session: Some(session),
            })
        }
    }
}

/// Runs a service: logging, store connection, worker tasks, Ctrl+C.
///
/// # Example
///
/// ```ignore
/// let config = AgentConfig::from_args(&cli.service)?;
/// let mut service = Service::new("fleetbeat-agent", config).await?;
///
/// let store = service.store();
/// service.spawn(async move {
///     // Worker logic here
/// });
///
/// service.run().await
/// ```
pub struct Service<C: ServiceConfig> {
    name: String,
    config: C,
    store: Arc<dyn CoordinationClient>,
    session: Option<Arc<zenoh::Session>>,
    tasks: Vec<JoinHandle<()>>,
}

impl<C: ServiceConfig> Service<C> {
    /// Initialize logging, open the store and start the store event listener.
    pub async fn new(name: impl Into<String>, config: C) -> Result<Self> {
        let name = name.into();
        let version = env!("CARGO_PKG_VERSION");

        init_tracing(&config.base().logging).map_err(|e| SyncError::config(e.to_string()))?;

        tracing::info!(service = %name, version = %version, "Starting service");

        let opened = open_store(config.base()).await?;
        let listener = spawn_event_listener(opened.events);

        Ok(Self {
            name,
            config,
            store: opened.client,
            session: opened.session,
            tasks: vec![listener],
        })
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    /// The shared store client.
    pub fn store(&self) -> Arc<dyn CoordinationClient> {
        self.store.clone()
    }

    /// Spawn a worker task, aborted on shutdown.
    pub fn spawn<F>(&mut self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.push(tokio::spawn(future));
    }

    /// Run until Ctrl+C, then abort workers and close the store session.
    pub async fn run(self) -> Result<()> {
        tracing::info!(
            service = %self.name,
            tasks = self.tasks.len(),
            "Service running. Press Ctrl+C to stop."
        );

        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }

        tracing::info!(service = %self.name, "Received shutdown signal");

        self.shutdown().await
    }

    /// Abort workers and close the store session.
    pub async fn shutdown(self) -> Result<()> {
        for task in &self.tasks {
            task.abort();
        }

        if let Some(session) = &self.session {
            if let Err(e) = session.close().await {
                tracing::warn!(error = %e, "Error closing Zenoh session");
            }
        }

        tracing::info!(service = %self.name, "Goodbye!");

        Ok(())
    }
}
