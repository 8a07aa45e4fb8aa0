// ============================================================================
// Health and Metrics Routes
// ============================================================================
//
// Endpoints:
// - GET /health - Health check (dedup store PING, broker connection)
// - GET /metrics - Prometheus metrics
//
// ============================================================================

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use std::sync::Arc;

use super::HealthContext;
use crate::health;
use crate::metrics;

/// GET /health
pub async fn health_check(State(context): State<Arc<HealthContext>>) -> impl IntoResponse {
    match health::health_check(&context.store, &context.broker).await {
        Ok(()) => (StatusCode::OK, "OK"),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable")
        }
    }
}

/// GET /metrics
pub async fn metrics(State(context): State<Arc<HealthContext>>) -> impl IntoResponse {
    let reconnects = i64::try_from(context.store.reconnect_count()).unwrap_or(i64::MAX);
    metrics::DEDUP_RECONNECTS.set(reconnects);

    match metrics::gather_metrics() {
        Ok(metrics_data) => (
            StatusCode::OK,
            [("Content-Type", "text/plain; version=0.0.4")],
            metrics_data,
        ),
        Err(e) => {
            tracing::error!("Failed to gather metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("Content-Type", "text/plain")],
                "Internal Server Error".to_string(),
            )
        }
    }
}
