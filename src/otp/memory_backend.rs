//! In-memory OTP backend.
//!
//! Deadlines use the tokio clock, so paused-time tests can step past a
//! TTL. Expired records are removed when touched and swept on every store.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::time::Instant;

use super::backend::{codes_match, OtpBackend, OtpError, OtpRecord};

struct StoredOtp {
    record: OtpRecord,
    deadline: Instant,
}

pub struct MemoryOtpBackend {
    records: DashMap<String, StoredOtp>,
}

impl Default for MemoryOtpBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryOtpBackend {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    /// Number of records held, live or not yet swept.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn purge_expired(&self) {
        let now = Instant::now();
        self.records.retain(|_, stored| stored.deadline > now);
    }
}

#[async_trait]
impl OtpBackend for MemoryOtpBackend {
    fn backend_type(&self) -> &'static str {
        "memory"
    }

    async fn store(&self, record: OtpRecord, ttl: Duration) -> Result<(), OtpError> {
        self.purge_expired();

        let deadline = Instant::now() + ttl;
        self.records
            .insert(record.subject.clone(), StoredOtp { record, deadline });
        Ok(())
    }

    async fn consume(
        &self,
        subject: &str,
        code: &str,
        max_attempts: u32,
    ) -> Result<bool, OtpError> {
        // The entry guard holds the shard lock for the whole compare-and-set
        let Entry::Occupied(mut slot) = self.records.entry(subject.to_string()) else {
            return Ok(false);
        };

        if slot.get().deadline <= Instant::now() {
            slot.remove();
            return Ok(false);
        }

        let record = &mut slot.get_mut().record;
        if record.consumed {
            return Ok(false);
        }

        if codes_match(&record.code, code) {
            record.consumed = true;
            return Ok(true);
        }

        record.attempts += 1;
        if record.attempts >= max_attempts {
            tracing::debug!(subject = %subject, "OTP attempts exhausted, record deleted");
            slot.remove();
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(300);

    async fn issue(backend: &MemoryOtpBackend, subject: &str, code: &str) {
        backend
            .store(OtpRecord::new(subject, code, TTL), TTL)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_valid_code_consumed_once() {
        let backend = MemoryOtpBackend::new();
        issue(&backend, "+15550001", "123456").await;

        assert!(backend.consume("+15550001", "123456", 5).await.unwrap());
        assert!(!backend.consume("+15550001", "123456", 5).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_subject() {
        let backend = MemoryOtpBackend::new();
        assert!(!backend.consume("+15550009", "123456", 5).await.unwrap());
    }

    #[tokio::test]
    async fn test_overwrite_invalidates_previous_code() {
        let backend = MemoryOtpBackend::new();
        issue(&backend, "+15550001", "111111").await;
        issue(&backend, "+15550001", "222222").await;

        assert!(!backend.consume("+15550001", "111111", 5).await.unwrap());
        assert!(backend.consume("+15550001", "222222", 5).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_code_rejected_and_removed() {
        let backend = MemoryOtpBackend::new();
        issue(&backend, "+15550001", "123456").await;

        tokio::time::advance(TTL + Duration::from_secs(1)).await;

        assert!(!backend.consume("+15550001", "123456", 5).await.unwrap());
        assert!(backend.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_code_valid_just_before_expiry() {
        let backend = MemoryOtpBackend::new();
        issue(&backend, "+15550001", "123456").await;

        tokio::time::advance(TTL - Duration::from_secs(1)).await;

        assert!(backend.consume("+15550001", "123456", 5).await.unwrap());
    }

    #[tokio::test]
    async fn test_attempts_exhausted_deletes_record() {
        let backend = MemoryOtpBackend::new();
        issue(&backend, "+15550001", "123456").await;

        for _ in 0..3 {
            assert!(!backend.consume("+15550001", "000000", 3).await.unwrap());
        }

        // Correct code no longer works
        assert!(!backend.consume("+15550001", "123456", 3).await.unwrap());
        assert!(backend.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_sweeps_expired_records() {
        let backend = MemoryOtpBackend::new();
        issue(&backend, "+15550001", "111111").await;
        issue(&backend, "+15550002", "222222").await;

        tokio::time::advance(TTL + Duration::from_secs(1)).await;
        issue(&backend, "+15550003", "333333").await;

        assert_eq!(backend.len(), 1);
    }
}
