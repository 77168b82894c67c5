//! The single consumer that drains the dispatch queue.
//!
//! Per job: `Claimed -> Sending -> {Sent, Failed}`. A failed job is
//! terminal and never re-enqueued; the loop only pauses (with backoff)
//! when the queue itself is unreachable.
//!
//! A job claimed right before a crash is lost, and a crash between the
//! gateway call and the log write leaves a sent message unlogged. Neither
//! the queue nor the log is transactional with the other. The Redis queue
//! has the same loss window when a blocking pop reply times out client-side
//! (see `queue::redis_backend`).

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::task::{JoinError, JoinHandle};

use super::backoff::{BackoffConfig, ExponentialBackoff};
use crate::delivery_log::{DeliveryLog, DeliveryLogEntry, DeliveryOutcome};
use crate::gateway::{GatewayError, MessageGateway, SendReceipt};
use crate::metrics::DispatchMetrics;
use crate::queue::{DispatchJob, DispatchQueue};

const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(5);

/// Shortest wait per dequeue, so an idle worker never spins
const MIN_POLL_TIMEOUT: Duration = Duration::from_millis(10);

/// Counters reported when the worker stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    pub processed: u64,
    pub sent: u64,
    pub failed: u64,
    pub queue_errors: u64,
}

/// Owned handle to a running worker.
///
/// Dropping the handle without calling `shutdown` also stops the worker
/// after its current job.
pub struct WorkerHandle {
    shutdown_tx: broadcast::Sender<()>,
    join: JoinHandle<WorkerSummary>,
}

impl WorkerHandle {
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Signal shutdown and wait for the worker to finish the job in
    /// flight and exit.
    pub async fn shutdown(self) -> Result<WorkerSummary, JoinError> {
        let _ = self.shutdown_tx.send(());
        self.join.await
    }
}

pub struct DispatchWorker {
    queue: Arc<dyn DispatchQueue>,
    gateway: Arc<dyn MessageGateway>,
    log: Arc<dyn DeliveryLog>,

    /// Gateway calls per job, including the first (1 = no retry)
    max_attempts: u32,

    /// Longest single wait for a job before re-checking for shutdown
    poll_timeout: Duration,

    backoff: BackoffConfig,
}

impl DispatchWorker {
    pub fn new(
        queue: Arc<dyn DispatchQueue>,
        gateway: Arc<dyn MessageGateway>,
        log: Arc<dyn DeliveryLog>,
    ) -> Self {
        Self {
            queue,
            gateway,
            log,
            max_attempts: 1,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            backoff: BackoffConfig::default(),
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout.max(MIN_POLL_TIMEOUT);
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Start the worker on the tokio runtime.
    pub fn spawn(self) -> WorkerHandle {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let join = tokio::spawn(self.run(shutdown_rx));

        WorkerHandle { shutdown_tx, join }
    }

    /// Drain the queue until a shutdown signal arrives.
    ///
    /// Shutdown is observed between claims: a claim in progress completes,
    /// and a claimed job is always carried through to its log entry.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> WorkerSummary {
        let mut summary = WorkerSummary::default();
        let mut backoff = ExponentialBackoff::new(self.backoff.clone());

        tracing::info!(
            queue = self.queue.backend_type(),
            gateway = self.gateway.name(),
            max_attempts = self.max_attempts,
            "Dispatch worker started"
        );

        loop {
            match shutdown.try_recv() {
                Err(TryRecvError::Empty) => {}
                Ok(()) | Err(TryRecvError::Closed) | Err(TryRecvError::Lagged(_)) => break,
            }

            match self.queue.dequeue(self.poll_timeout).await {
                Ok(Some(job)) => {
                    backoff.reset();
                    summary.processed += 1;
                    match self.process_job(job).await {
                        DeliveryOutcome::Sent => summary.sent += 1,
                        DeliveryOutcome::Failed => summary.failed += 1,
                    }
                }
                Ok(None) => {
                    backoff.reset();
                }
                Err(e) => {
                    summary.queue_errors += 1;
                    DispatchMetrics::record_queue_error();

                    let delay = backoff.next_delay();
                    tracing::warn!(
                        error = %e,
                        attempt = backoff.attempt(),
                        retry_in_ms = delay.as_millis() as u64,
                        "Dispatch queue unavailable, pausing"
                    );

                    tokio::select! {
                        _ = shutdown.recv() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        tracing::info!(
            processed = summary.processed,
            sent = summary.sent,
            failed = summary.failed,
            "Dispatch worker stopped"
        );

        summary
    }

    /// Send one claimed job and record its outcome. Never fails: every
    /// error ends up in the delivery log.
    pub async fn process_job(&self, job: DispatchJob) -> DeliveryOutcome {
        tracing::debug!(job_id = %job.id, recipient = %job.recipient, "Job claimed");

        let (result, attempts) = self.send_with_retry(&job).await;

        let entry = match &result {
            Ok(receipt) => {
                DispatchMetrics::record_sent();
                tracing::info!(
                    job_id = %job.id,
                    recipient = %job.recipient,
                    message_id = %receipt.message_id,
                    attempts,
                    "Message sent"
                );
                DeliveryLogEntry::sent(&job, receipt.message_id.clone(), attempts)
            }
            Err(e) => {
                DispatchMetrics::record_failed();
                tracing::warn!(
                    job_id = %job.id,
                    recipient = %job.recipient,
                    error = %e,
                    attempts,
                    "Message failed"
                );
                DeliveryLogEntry::failed(&job, e.to_string(), attempts)
            }
        };

        let outcome = entry.outcome;
        if let Err(e) = self.log.append(entry).await {
            DispatchMetrics::record_log_write_failure();
            tracing::error!(
                job_id = %job.id,
                outcome = %outcome,
                error = %e,
                "Failed to write delivery log entry"
            );
        }

        outcome
    }

    async fn send_with_retry(&self, job: &DispatchJob) -> (Result<SendReceipt, GatewayError>, u32) {
        let mut attempts = 0;

        loop {
            attempts += 1;
            tracing::trace!(job_id = %job.id, attempt = attempts, "Sending");

            let started = Instant::now();
            let result = self.gateway.send(&job.recipient, &job.payload).await;
            DispatchMetrics::record_gateway_latency(started.elapsed());

            match result {
                Err(e) if e.is_transient() && attempts < self.max_attempts => {
                    DispatchMetrics::record_retry();
                    tracing::debug!(
                        job_id = %job.id,
                        attempt = attempts,
                        error = %e,
                        "Transient gateway error, retrying"
                    );
                }
                other => return (other, attempts),
            }
        }
    }
}
