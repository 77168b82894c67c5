//! Redis-backed dispatch queue.
//!
//! Jobs are JSON strings in a Redis list. `RPUSH` appends a whole batch in
//! one command; `BLPOP` pops the head, which claims it atomically. Jobs
//! survive a service restart.
//!
//! If a `BLPOP` reply does not arrive within the timeout plus a grace
//! period, the connection is dropped. A job Redis popped just before is
//! then lost without a delivery log entry.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use tokio::sync::Mutex;

use super::backend::{DispatchQueue, QueueError};
use super::job::DispatchJob;
use crate::redis::pool::{is_connection_error, RedisPool};

/// Extra client-side wait on top of the server-side `BLPOP` timeout
const BLOCKING_GRACE: Duration = Duration::from_secs(2);

pub struct RedisDispatchQueue {
    pool: Arc<RedisPool>,

    /// List key
    key: String,

    /// Private connection for `BLPOP`, opened on first claim
    blocking: Mutex<Option<MultiplexedConnection>>,
}

impl RedisDispatchQueue {
    pub fn new(pool: Arc<RedisPool>, key: impl Into<String>) -> Self {
        Self {
            pool,
            key: key.into(),
            blocking: Mutex::new(None),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    fn decode(&self, raw: &str) -> Option<DispatchJob> {
        match serde_json::from_str::<DispatchJob>(raw) {
            Ok(job) => Some(job),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    key = %self.key,
                    "Discarding malformed job payload"
                );
                None
            }
        }
    }

    async fn pop_now(&self) -> Result<Option<String>, QueueError> {
        let key = self.key.clone();
        let raw: Option<String> = self
            .pool
            .execute(|mut conn| async move {
                redis::cmd("LPOP").arg(&key).query_async(&mut conn).await
            })
            .await?;
        Ok(raw)
    }

    async fn pop_blocking(&self, timeout: Duration) -> Result<Option<String>, QueueError> {
        let mut guard = self.blocking.lock().await;

        if guard.is_none() {
            *guard = Some(self.pool.dedicated_connection().await?);
        }
        let Some(conn) = guard.as_mut() else {
            return Err(QueueError::Unavailable(
                "blocking connection not established".to_string(),
            ));
        };

        let mut blpop = redis::cmd("BLPOP");
        blpop.arg(&self.key).arg(timeout.as_secs_f64());

        let result: Result<redis::RedisResult<Option<(String, String)>>, _> =
            tokio::time::timeout(timeout + BLOCKING_GRACE, blpop.query_async(conn)).await;

        match result {
            Ok(Ok(popped)) => Ok(popped.map(|(_, raw)| raw)),
            Ok(Err(e)) => {
                if is_connection_error(&e) {
                    *guard = None;
                }
                Err(QueueError::Redis(e))
            }
            Err(_) => {
                // The server may already have popped a job whose reply is
                // now lost with this connection
                tracing::warn!(
                    key = %self.key,
                    timeout_ms = (timeout + BLOCKING_GRACE).as_millis() as u64,
                    "BLPOP reply overdue, dropping connection; a job popped by the server may be lost"
                );
                *guard = None;
                Err(QueueError::Unavailable(
                    "blocking pop did not return in time".to_string(),
                ))
            }
        }
    }
}

#[async_trait]
impl DispatchQueue for RedisDispatchQueue {
    fn backend_type(&self) -> &'static str {
        "redis"
    }

    async fn enqueue_batch(&self, jobs: Vec<DispatchJob>) -> Result<(), QueueError> {
        if jobs.is_empty() {
            return Ok(());
        }

        let payloads = jobs
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?;
        let count = payloads.len();

        let key = self.key.clone();
        let depth: usize = self
            .pool
            .execute(|mut conn| async move {
                redis::cmd("RPUSH")
                    .arg(&key)
                    .arg(&payloads)
                    .query_async(&mut conn)
                    .await
            })
            .await?;

        tracing::debug!(count, depth, key = %self.key, "Jobs enqueued to Redis list");
        Ok(())
    }

    async fn dequeue(&self, timeout: Duration) -> Result<Option<DispatchJob>, QueueError> {
        // BLPOP treats 0 as "wait forever"
        let raw = if timeout.is_zero() {
            self.pop_now().await?
        } else {
            self.pop_blocking(timeout).await?
        };

        Ok(raw.and_then(|raw| self.decode(&raw)))
    }

    async fn len(&self) -> Result<usize, QueueError> {
        let key = self.key.clone();
        let len: usize = self
            .pool
            .execute(|mut conn| async move {
                redis::cmd("LLEN").arg(&key).query_async(&mut conn).await
            })
            .await?;
        Ok(len)
    }
}
