//! Prometheus metrics endpoint.

use axum::{extract::State, http::StatusCode, response::IntoResponse};

use crate::metrics;
use crate::server::AppState;

/// GET /metrics - Prometheus metrics endpoint
pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    sample_gauges(&state).await;

    match metrics::encode_metrics() {
        Ok(output) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            output,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode Prometheus metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(axum::http::header::CONTENT_TYPE, "text/plain")],
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}

async fn sample_gauges(state: &AppState) {
    match state.queue.len().await {
        Ok(depth) => metrics::QUEUE_DEPTH.set(depth as i64),
        Err(e) => tracing::debug!(error = %e, "Queue depth unavailable"),
    }

    if state.redis_pool.is_some() {
        let healthy = state.redis_health.is_healthy();
        metrics::REDIS_CONNECTION_STATUS.set(if healthy { 1 } else { 0 });
    }
}
