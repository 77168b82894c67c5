//! OTP backend factory

use std::sync::Arc;

use crate::config::OtpConfig;
use crate::redis::RedisPool;

use super::backend::OtpBackend;
use super::memory_backend::MemoryOtpBackend;
use super::redis_backend::RedisOtpBackend;

/// Create the OTP backend selected by `otp.backend`.
pub fn create_otp_backend(
    settings: &OtpConfig,
    redis_pool: Option<Arc<RedisPool>>,
) -> Arc<dyn OtpBackend> {
    match (settings.backend.as_str(), redis_pool) {
        ("redis", Some(pool)) => {
            tracing::info!(
                backend = "redis",
                prefix = %settings.redis_prefix,
                "Creating Redis OTP backend"
            );
            Arc::new(RedisOtpBackend::new(pool, settings.redis_prefix.clone()))
        }
        ("redis", None) => {
            tracing::warn!("Redis OTP backend requested but no pool provided, falling back to memory");
            Arc::new(MemoryOtpBackend::new())
        }
        _ => {
            tracing::info!(backend = "memory", "Creating memory OTP backend");
            Arc::new(MemoryOtpBackend::new())
        }
    }
}
