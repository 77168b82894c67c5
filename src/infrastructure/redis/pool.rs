//! Redis connection pool for the queue and OTP backends.
//!
//! Commands share one multiplexed connection. Blocking commands (`BLPOP`)
//! must not run on it since they would stall every other caller, so
//! `dedicated_connection` hands out a private connection for those.

use std::sync::Arc;

use redis::aio::MultiplexedConnection;
use redis::{Client, RedisError, RedisResult};
use tokio::sync::RwLock;

use crate::config::RedisConfig;

use super::RedisHealth;

/// Error type for Redis pool operations.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// Redis operation failed
    #[error("Redis error: {0}")]
    Redis(#[from] RedisError),

    /// Connection not available
    #[error("Connection not available: {0}")]
    ConnectionUnavailable(String),
}

/// Shared Redis connection with health tracking.
pub struct RedisPool {
    client: Client,

    /// Multiplexed connection (shared across tasks)
    connection: RwLock<Option<MultiplexedConnection>>,

    health: Arc<RedisHealth>,

    config: RedisConfig,
}

impl RedisPool {
    /// Create a new pool. No connection is made until first use.
    pub fn new(config: RedisConfig, health: Arc<RedisHealth>) -> Result<Self, PoolError> {
        let client = Client::open(config.url.as_str())?;

        Ok(Self {
            client,
            connection: RwLock::new(None),
            health,
            config,
        })
    }

    /// Get the shared connection, establishing it if needed.
    pub async fn get_connection(&self) -> Result<MultiplexedConnection, PoolError> {
        {
            let conn = self.connection.read().await;
            if let Some(ref c) = *conn {
                return Ok(c.clone());
            }
        }

        let mut conn_guard = self.connection.write().await;

        // Another task may have connected while we waited for the lock
        if let Some(ref c) = *conn_guard {
            return Ok(c.clone());
        }

        match self.client.get_multiplexed_tokio_connection().await {
            Ok(conn) => {
                *conn_guard = Some(conn.clone());
                self.health.record_success();
                tracing::info!("Redis pool connection established");
                Ok(conn)
            }
            Err(e) => {
                self.health.record_failure();
                tracing::error!(error = %e, "Failed to connect to Redis");
                Err(PoolError::Redis(e))
            }
        }
    }

    /// Open a connection owned by a single caller, for blocking commands.
    pub async fn dedicated_connection(&self) -> Result<MultiplexedConnection, PoolError> {
        match self.client.get_multiplexed_tokio_connection().await {
            Ok(conn) => {
                self.health.record_success();
                Ok(conn)
            }
            Err(e) => {
                self.health.record_failure();
                Err(PoolError::Redis(e))
            }
        }
    }

    /// Run a command on the shared connection.
    ///
    /// A dropped or broken connection is discarded so the next call
    /// reconnects.
    pub async fn execute<F, T, Fut>(&self, f: F) -> Result<T, PoolError>
    where
        F: FnOnce(MultiplexedConnection) -> Fut,
        Fut: std::future::Future<Output = RedisResult<T>>,
    {
        let conn = self.get_connection().await?;

        match f(conn).await {
            Ok(result) => {
                self.health.record_success();
                Ok(result)
            }
            Err(e) => {
                if is_connection_error(&e) {
                    self.reset().await;
                }
                Err(PoolError::Redis(e))
            }
        }
    }

    /// Forget the shared connection after a connection-level failure.
    pub async fn reset(&self) {
        let mut conn_guard = self.connection.write().await;
        *conn_guard = None;
        self.health.record_failure();
    }

    pub fn health(&self) -> &Arc<RedisHealth> {
        &self.health
    }

    pub fn is_healthy(&self) -> bool {
        self.health.is_healthy()
    }

    /// Get the Redis URL (for debugging).
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Ping Redis to check connectivity.
    pub async fn ping(&self) -> Result<(), PoolError> {
        let _pong: String = self
            .execute(|mut conn| async move { redis::cmd("PING").query_async(&mut conn).await })
            .await?;
        Ok(())
    }
}

/// Whether an error means the connection itself is gone.
pub fn is_connection_error(err: &RedisError) -> bool {
    err.is_connection_dropped() || err.is_io_error() || err.is_connection_refusal()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> RedisConfig {
        RedisConfig {
            url: "redis://localhost:6379".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_pool_creation_is_lazy() {
        let health = Arc::new(RedisHealth::new());
        let pool = RedisPool::new(create_test_config(), health.clone()).unwrap();

        assert_eq!(pool.url(), "redis://localhost:6379");
        assert!(!pool.is_healthy());
    }

    #[test]
    fn test_invalid_url_rejected() {
        let config = RedisConfig {
            url: "not-a-redis-url".to_string(),
            ..Default::default()
        };
        let result = RedisPool::new(config, Arc::new(RedisHealth::new()));
        assert!(matches!(result, Err(PoolError::Redis(_))));
    }

    #[test]
    fn test_pool_error_display() {
        let err = PoolError::ConnectionUnavailable("test".to_string());
        assert!(format!("{}", err).contains("test"));
    }

    #[tokio::test]
    #[ignore = "requires a running Redis"]
    async fn test_ping() {
        let pool = RedisPool::new(create_test_config(), Arc::new(RedisHealth::new())).unwrap();
        pool.ping().await.unwrap();
        assert!(pool.is_healthy());
    }
}
