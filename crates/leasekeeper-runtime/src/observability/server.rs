use std::sync::Arc;

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use leasekeeper_core::config::ObservabilityConfig;
use leasekeeper_core::Result;

use super::prometheus;
use crate::manager::{InstanceStatus, Manager};

/// Shared state of the observability handlers.
#[derive(Clone)]
pub struct ObservabilityState {
    pub manager: Arc<Manager>,
    /// Static configuration served on `/info`.
    pub info: Arc<serde_json::Value>,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// HTTP server exposing metrics and the instance listing.
pub struct ObservabilityServer {
    host: String,
    port: u16,
    state: ObservabilityState,
}

impl ObservabilityServer {
    pub fn new(config: &ObservabilityConfig, state: ObservabilityState) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            state,
        }
    }

    /// Bind the configured host and port. The host may be a name like `localhost`.
    pub async fn bind(&self) -> Result<TcpListener> {
        Ok(TcpListener::bind((self.host.as_str(), self.port)).await?)
    }

    /// Build the router.
    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    /// Bind the configured address and serve until `shutdown` fires.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let listener = self.bind().await?;
        self.run_on(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` fires.
    pub async fn run_on(self, listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
        tracing::info!(addr = %listener.local_addr()?, "Observability server listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        tracing::debug!("Observability server stopped");
        Ok(())
    }
}

/// Routes: `/metrics`, `/info`, `/instances` and `/health`.
pub fn router(state: ObservabilityState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/info", get(info_handler))
        .route("/instances", get(instances_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn metrics_handler(State(state): State<ObservabilityState>) -> impl IntoResponse {
    let body = prometheus::render(&state.manager.metrics().snapshot());
    ([(header::CONTENT_TYPE, prometheus::CONTENT_TYPE)], body)
}

async fn info_handler(State(state): State<ObservabilityState>) -> Json<serde_json::Value> {
    Json(state.info.as_ref().clone())
}

async fn instances_handler(State(state): State<ObservabilityState>) -> Json<Vec<InstanceStatus>> {
    Json(state.manager.list().await)
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
