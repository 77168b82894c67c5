//! Backend trait for dispatch queue storage.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use super::job::DispatchJob;
use crate::redis::PoolError;

/// Errors that can occur during queue operations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Redis operation failed
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backing store cannot be reached
    #[error("Queue unavailable: {0}")]
    Unavailable(String),
}

impl From<PoolError> for QueueError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Redis(e) => QueueError::Redis(e),
            PoolError::ConnectionUnavailable(msg) => QueueError::Unavailable(msg),
        }
    }
}

/// FIFO of pending dispatch jobs.
///
/// # Thread Safety
///
/// Producers call `enqueue*` from request handlers concurrently with the
/// worker's `dequeue`. Every operation is atomic at the store level; no
/// caller-side locking is required.
#[async_trait]
pub trait DispatchQueue: Send + Sync {
    /// Backend type identifier
    fn backend_type(&self) -> &'static str;

    /// Append one job at the tail.
    async fn enqueue(&self, job: DispatchJob) -> Result<(), QueueError> {
        self.enqueue_batch(vec![job]).await
    }

    /// Append jobs at the tail, in order, as a single atomic operation:
    /// either all of them become visible or none does.
    async fn enqueue_batch(&self, jobs: Vec<DispatchJob>) -> Result<(), QueueError>;

    /// Claim the job at the head, waiting up to `timeout` for one.
    ///
    /// The returned job has already been removed from the queue.
    async fn dequeue(&self, timeout: Duration) -> Result<Option<DispatchJob>, QueueError>;

    /// Number of jobs waiting.
    async fn len(&self) -> Result<usize, QueueError>;
}
