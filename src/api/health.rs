//! Home and health endpoints.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HomeResponse {
    pub service: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis: Option<RedisHealthResponse>,
    pub queue: QueueHealthResponse,
    pub storage: String,
    pub otp_backend: String,
    pub gateway: String,
    pub worker_enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct RedisHealthResponse {
    pub status: String,
    pub connected: bool,
    pub consecutive_failures: u32,
}

#[derive(Debug, Serialize)]
pub struct QueueHealthResponse {
    pub backend: String,
    /// `None` when the queue store cannot be reached
    pub depth: Option<usize>,
}

/// GET / - Service banner
pub async fn home() -> Json<HomeResponse> {
    Json(HomeResponse {
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /health - Service and store status
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let depth = match state.queue.len().await {
        Ok(depth) => Some(depth),
        Err(e) => {
            tracing::warn!(error = %e, "Health check could not read queue depth");
            None
        }
    };

    let redis = state.redis_pool.as_ref().map(|_| {
        let health = &state.redis_health;
        RedisHealthResponse {
            status: health.status().as_str().to_string(),
            connected: health.is_healthy(),
            consecutive_failures: health.consecutive_failures(),
        }
    });

    let redis_ok = redis.as_ref().map(|r| r.connected).unwrap_or(true);
    let status = if depth.is_some() && redis_ok {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        redis,
        queue: QueueHealthResponse {
            backend: state.queue.backend_type().to_string(),
            depth,
        },
        storage: state.templates.backend_type().to_string(),
        otp_backend: state.otp.backend_type().to_string(),
        gateway: state.gateway.name().to_string(),
        worker_enabled: state.settings.worker.enabled,
    })
}
