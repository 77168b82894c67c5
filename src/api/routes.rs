use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::server::AppState;

use super::health::{health, home};
use super::messages::{list_message_logs, send_message};
use super::metrics::prometheus_metrics;
use super::otp::{send_otp, validate_otp};
use super::template::{create_template, delete_template, list_templates};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .route("/metrics", get(prometheus_metrics))
        // Templates
        .route("/templates", get(list_templates).post(create_template))
        .route("/templates/send-message", post(send_message))
        .route("/templates/{id}", delete(delete_template))
        // OTP
        .route("/otp/send", post(send_otp))
        .route("/otp/validate", post(validate_otp))
        // Delivery log
        .route("/message-logs", get(list_message_logs))
}
