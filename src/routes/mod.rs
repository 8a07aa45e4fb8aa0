// ============================================================================
// Axum Routes Module
// ============================================================================
//
// Operational HTTP surface of the worker. The worker itself is driven by
// the broker, not by HTTP.
//
// ============================================================================

mod health;

use crate::queue::BrokerConnection;
use anyhow::{Context, Result};
use axum::{Router, routing::get};
use crawler_redis::DedupStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Dependencies probed by /health
pub struct HealthContext {
    pub store: Arc<DedupStore>,
    pub broker: Arc<BrokerConnection>,
}

pub fn create_router(context: Arc<HealthContext>) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        .with_state(context)
}

/// Serve /health and /metrics until `shutdown` is cancelled
pub async fn serve(
    port: u16,
    context: Arc<HealthContext>,
    shutdown: CancellationToken,
) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind health endpoint on {}", addr))?;

    info!(addr = %addr, "Health endpoint listening");

    axum::serve(listener, create_router(context))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("Health endpoint failed")
}
