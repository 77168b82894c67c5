//! In-memory dispatch queue.
//!
//! Jobs live in a single `VecDeque` and are lost on restart. Waiting
//! consumers are woken through a `Notify`.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use super::backend::{DispatchQueue, QueueError};
use super::job::DispatchJob;

pub struct MemoryDispatchQueue {
    jobs: Mutex<VecDeque<DispatchJob>>,
    notify: Notify,
}

impl Default for MemoryDispatchQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDispatchQueue {
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }
}

#[async_trait]
impl DispatchQueue for MemoryDispatchQueue {
    fn backend_type(&self) -> &'static str {
        "memory"
    }

    async fn enqueue_batch(&self, jobs: Vec<DispatchJob>) -> Result<(), QueueError> {
        if jobs.is_empty() {
            return Ok(());
        }

        let count = jobs.len();
        let depth = {
            let mut queue = self.jobs.lock().await;
            queue.extend(jobs);
            queue.len()
        };

        for _ in 0..count {
            self.notify.notify_one();
        }

        tracing::debug!(count, depth, "Jobs enqueued to memory queue");
        Ok(())
    }

    async fn dequeue(&self, timeout: Duration) -> Result<Option<DispatchJob>, QueueError> {
        let deadline = Instant::now() + timeout;

        loop {
            // Register interest before checking, so an enqueue between the
            // check and the wait is not missed.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(job) = self.jobs.lock().await.pop_front() {
                return Ok(Some(job));
            }

            if timeout.is_zero() {
                return Ok(None);
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn len(&self) -> Result<usize, QueueError> {
        Ok(self.jobs.lock().await.len())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn job(payload: &str) -> DispatchJob {
        DispatchJob::new(payload, "+15550001", "test")
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = MemoryDispatchQueue::new();
        queue.enqueue(job("a")).await.unwrap();
        queue.enqueue(job("b")).await.unwrap();
        queue.enqueue(job("c")).await.unwrap();

        let zero = Duration::ZERO;
        assert_eq!(queue.dequeue(zero).await.unwrap().unwrap().payload, "a");
        assert_eq!(queue.dequeue(zero).await.unwrap().unwrap().payload, "b");
        assert_eq!(queue.dequeue(zero).await.unwrap().unwrap().payload, "c");
        assert!(queue.dequeue(zero).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_batch_is_contiguous_and_ordered() {
        let queue = MemoryDispatchQueue::new();
        queue
            .enqueue_batch(vec![job("1"), job("2"), job("3")])
            .await
            .unwrap();

        assert_eq!(queue.len().await.unwrap(), 3);
        for expected in ["1", "2", "3"] {
            let claimed = queue.dequeue(Duration::ZERO).await.unwrap().unwrap();
            assert_eq!(claimed.payload, expected);
        }
    }

    #[tokio::test]
    async fn test_claim_removes_job() {
        let queue = MemoryDispatchQueue::new();
        queue.enqueue(job("only")).await.unwrap();

        assert!(queue.dequeue(Duration::ZERO).await.unwrap().is_some());
        assert_eq!(queue.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_dequeue_times_out_when_empty() {
        let queue = MemoryDispatchQueue::new();
        let started = Instant::now();

        let claimed = queue.dequeue(Duration::from_millis(50)).await.unwrap();

        assert!(claimed.is_none());
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_waiting_consumer_wakes_on_enqueue() {
        let queue = Arc::new(MemoryDispatchQueue::new());

        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.dequeue(Duration::from_secs(5)).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.enqueue(job("late")).await.unwrap();

        let claimed = consumer.await.unwrap().unwrap().unwrap();
        assert_eq!(claimed.payload, "late");
    }

    #[tokio::test]
    async fn test_concurrent_producers_lose_nothing() {
        let queue = Arc::new(MemoryDispatchQueue::new());

        let mut producers = Vec::new();
        for p in 0..4 {
            let queue = queue.clone();
            producers.push(tokio::spawn(async move {
                for i in 0..25 {
                    queue.enqueue(job(&format!("{}-{}", p, i))).await.unwrap();
                }
            }));
        }
        for producer in producers {
            producer.await.unwrap();
        }

        assert_eq!(queue.len().await.unwrap(), 100);
    }
}
