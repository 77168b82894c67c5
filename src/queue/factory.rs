//! Queue backend factory

use std::sync::Arc;

use crate::config::QueueConfig;
use crate::redis::RedisPool;

use super::backend::DispatchQueue;
use super::memory_backend::MemoryDispatchQueue;
use super::redis_backend::RedisDispatchQueue;

/// Create the dispatch queue selected by `queue.backend`.
///
/// - `"redis"`: `RedisDispatchQueue` if a Redis pool is provided
/// - `"memory"` (default): `MemoryDispatchQueue`
pub fn create_dispatch_queue(
    settings: &QueueConfig,
    redis_pool: Option<Arc<RedisPool>>,
) -> Arc<dyn DispatchQueue> {
    match (settings.backend.as_str(), redis_pool) {
        ("redis", Some(pool)) => {
            tracing::info!(
                backend = "redis",
                key = %settings.redis_key,
                "Creating Redis dispatch queue"
            );
            Arc::new(RedisDispatchQueue::new(pool, settings.redis_key.clone()))
        }
        ("redis", None) => {
            tracing::warn!("Redis queue requested but no pool provided, falling back to memory");
            Arc::new(MemoryDispatchQueue::new())
        }
        (other, _) => {
            if other != "memory" {
                tracing::warn!(backend = %other, "Unknown queue backend, using memory");
            }
            tracing::info!(backend = "memory", "Creating memory dispatch queue");
            Arc::new(MemoryDispatchQueue::new())
        }
    }
}
