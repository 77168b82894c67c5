//! Prometheus metrics for the dispatch service.
//!
//! - Dispatch metrics (jobs enqueued, sent, failed, gateway latency)
//! - Queue health (dequeue errors, depth, Redis status)
//! - OTP metrics (issued, validation results)
//! - Delivery log write failures

mod helpers;

pub use helpers::{encode_metrics, DispatchMetrics, OtpMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "whatsapp_dispatch";

lazy_static! {
    /// Jobs pushed onto the dispatch queue
    pub static ref JOBS_ENQUEUED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_jobs_enqueued_total", METRIC_PREFIX),
        "Total dispatch jobs enqueued"
    ).unwrap();

    /// Jobs finished by the worker, by outcome
    pub static ref JOBS_COMPLETED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_jobs_completed_total", METRIC_PREFIX),
        "Total dispatch jobs completed by outcome",
        &["outcome"]
    ).unwrap();

    /// Extra gateway attempts made by the immediate-retry policy
    pub static ref GATEWAY_RETRIES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_gateway_retries_total", METRIC_PREFIX),
        "Total gateway send retries"
    ).unwrap();

    /// Latency of a single gateway send call
    pub static ref GATEWAY_LATENCY: Histogram = register_histogram!(
        format!("{}_gateway_latency_seconds", METRIC_PREFIX),
        "Gateway send latency in seconds",
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    ).unwrap();

    /// Failed dequeue attempts (store unreachable)
    pub static ref QUEUE_ERRORS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_queue_errors_total", METRIC_PREFIX),
        "Total dequeue failures"
    ).unwrap();

    /// Delivery log entries that could not be written
    pub static ref DELIVERY_LOG_ERRORS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_delivery_log_errors_total", METRIC_PREFIX),
        "Total delivery log write failures"
    ).unwrap();

    /// Jobs waiting in the queue, sampled on scrape
    pub static ref QUEUE_DEPTH: IntGauge = register_int_gauge!(
        format!("{}_queue_depth", METRIC_PREFIX),
        "Jobs waiting in the dispatch queue"
    ).unwrap();

    /// Redis connection status (1 = healthy, 0 = reconnecting), sampled on scrape
    pub static ref REDIS_CONNECTION_STATUS: IntGauge = register_int_gauge!(
        format!("{}_redis_connection_status", METRIC_PREFIX),
        "Redis connection status"
    ).unwrap();

    /// OTP codes issued
    pub static ref OTP_ISSUED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_otp_issued_total", METRIC_PREFIX),
        "Total OTP codes issued"
    ).unwrap();

    /// OTP validations by result (accepted / rejected)
    pub static ref OTP_VALIDATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_otp_validations_total", METRIC_PREFIX),
        "Total OTP validations by result",
        &["result"]
    ).unwrap();
}
