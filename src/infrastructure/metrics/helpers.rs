//! Metrics helper structs for convenient metric recording

use std::time::Duration;

use prometheus::{Encoder, TextEncoder};

use super::{
    DELIVERY_LOG_ERRORS_TOTAL, GATEWAY_LATENCY, GATEWAY_RETRIES_TOTAL, JOBS_COMPLETED_TOTAL,
    JOBS_ENQUEUED_TOTAL, OTP_ISSUED_TOTAL, OTP_VALIDATIONS_TOTAL, QUEUE_ERRORS_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Dispatch queue and worker metrics
pub struct DispatchMetrics;

impl DispatchMetrics {
    pub fn record_enqueued(count: usize) {
        JOBS_ENQUEUED_TOTAL.inc_by(count as u64);
    }

    pub fn record_sent() {
        JOBS_COMPLETED_TOTAL.with_label_values(&["sent"]).inc();
    }

    pub fn record_failed() {
        JOBS_COMPLETED_TOTAL.with_label_values(&["failed"]).inc();
    }

    pub fn record_retry() {
        GATEWAY_RETRIES_TOTAL.inc();
    }

    pub fn record_gateway_latency(elapsed: Duration) {
        GATEWAY_LATENCY.observe(elapsed.as_secs_f64());
    }

    pub fn record_queue_error() {
        QUEUE_ERRORS_TOTAL.inc();
    }

    pub fn record_log_write_failure() {
        DELIVERY_LOG_ERRORS_TOTAL.inc();
    }
}

/// OTP issuance and validation metrics
pub struct OtpMetrics;

impl OtpMetrics {
    pub fn record_issued() {
        OTP_ISSUED_TOTAL.inc();
    }

    pub fn record_validation(accepted: bool) {
        let result = if accepted { "accepted" } else { "rejected" };
        OTP_VALIDATIONS_TOTAL.with_label_values(&[result]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_contains_recorded_metrics() {
        DispatchMetrics::record_enqueued(2);
        DispatchMetrics::record_sent();
        OtpMetrics::record_validation(false);

        let text = encode_metrics().unwrap();
        assert!(text.contains("whatsapp_dispatch_jobs_enqueued_total"));
        assert!(text.contains("whatsapp_dispatch_jobs_completed_total"));
        assert!(text.contains("whatsapp_dispatch_otp_validations_total"));
    }
}
