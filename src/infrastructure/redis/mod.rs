//! Redis connectivity shared by the dispatch queue and the OTP store.
//!
//! - `RedisPool`: lazily connected multiplexed connection with reconnect on drop
//! - `RedisHealth`: connection status reported by `/health`

mod health;
pub mod pool;

pub use health::{RedisHealth, RedisHealthStatus};
pub use pool::{PoolError, RedisPool};

/// Get current time in milliseconds since epoch
pub(crate) fn current_time_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
