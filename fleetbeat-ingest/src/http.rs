//! HTTP endpoint for sensor heartbeats.

use std::future::Future;
use std::net::SocketAddr;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use fleetbeat_common::{HeartbeatReport, validate_device_name};
use serde::Deserialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::ingest::ReportIngestor;

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    ingestor: ReportIngestor,
    strict_payload: bool,
}

#[derive(Debug, Deserialize)]
struct HeartbeatQuery {
    device_name: Option<String>,
}

/// Create the HTTP router.
pub fn create_router(ingestor: ReportIngestor, strict_payload: bool) -> Router {
    let state = AppState {
        ingestor,
        strict_payload,
    };

    Router::new()
        .route("/heartbeat", post(heartbeat_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handler for `POST /heartbeat?device_name=<name>`.
async fn heartbeat_handler(
    State(state): State<AppState>,
    Query(query): Query<HeartbeatQuery>,
    body: Bytes,
) -> Response {
    let device = match query.device_name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => {
            warn!("Heartbeat without device_name");
            return (StatusCode::BAD_REQUEST, "missing device_name\n").into_response();
        }
    };

    if let Err(e) = validate_device_name(&device) {
        warn!(device = %device, error = %e, "Rejected device name");
        return (StatusCode::BAD_REQUEST, format!("invalid device_name: {}\n", e)).into_response();
    }

    let report = match serde_json::from_slice::<HeartbeatReport>(&body) {
        Ok(report) => report,
        Err(e) if state.strict_payload => {
            warn!(device = %device, error = %e, "Rejected heartbeat payload");
            return (StatusCode::BAD_REQUEST, "invalid heartbeat payload\n").into_response();
        }
        Err(e) => {
            warn!(device = %device, error = %e, "Undecodable heartbeat, using zero values");
            HeartbeatReport::default()
        }
    };

    state.ingestor.ingest(&device, &report).await;

    StatusCode::OK.into_response()
}

/// Handler for the /health endpoint.
async fn health_handler() -> Response {
    (StatusCode::OK, "healthy\n").into_response()
}

/// The ingestion HTTP server.
pub struct IngestionServer {
    ingestor: ReportIngestor,
    listen_addr: SocketAddr,
    strict_payload: bool,
}

impl IngestionServer {
    pub fn new(ingestor: ReportIngestor, listen_addr: SocketAddr, strict_payload: bool) -> Self {
        Self {
            ingestor,
            listen_addr,
            strict_payload,
        }
    }

    pub fn router(&self) -> Router {
        create_router(self.ingestor.clone(), self.strict_payload)
    }

    /// Bind the listen address and serve until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.listen_addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", self.listen_addr, e))?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = self.router();
        let addr = listener.local_addr()?;

        info!(
            addr = %addr,
            root = %self.ingestor.paths().root(),
            strict_payload = self.strict_payload,
            "Ingestion server listening"
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown.await;
                info!("Ingestion server shutting down");
            })
            .await
            .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

        info!("Ingestion server stopped");
        Ok(())
    }
}
