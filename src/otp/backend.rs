//! Backend trait for OTP storage.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::redis::PoolError;

#[derive(Debug, Error)]
pub enum OtpError {
    /// Subject (phone identifier) missing or blank
    #[error("OTP subject is required")]
    InvalidSubject,

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("OTP store unavailable: {0}")]
    Unavailable(String),
}

impl From<PoolError> for OtpError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Redis(e) => OtpError::Redis(e),
            PoolError::ConnectionUnavailable(msg) => OtpError::Unavailable(msg),
        }
    }
}

/// A verification code issued to one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OtpRecord {
    pub subject: String,
    pub code: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub consumed: bool,

    /// Wrong codes supplied so far
    pub attempts: u32,
}

impl OtpRecord {
    pub fn new(subject: impl Into<String>, code: impl Into<String>, ttl: Duration) -> Self {
        let issued_at = Utc::now();
        let expires_at = issued_at
            + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::zero());

        Self {
            subject: subject.into(),
            code: code.into(),
            issued_at,
            expires_at,
            consumed: false,
            attempts: 0,
        }
    }
}

/// Storage for OTP records.
///
/// Expiry is enforced by the store: an expired record is gone, not stale.
#[async_trait]
pub trait OtpBackend: Send + Sync {
    /// Backend type identifier
    fn backend_type(&self) -> &'static str;

    /// Store `record` for its subject, replacing any previous record, and
    /// expire it after `ttl`.
    async fn store(&self, record: OtpRecord, ttl: Duration) -> Result<(), OtpError>;

    /// Atomically compare `code` with the live record for `subject` and
    /// mark it consumed on a match.
    ///
    /// Returns `false` if no live record exists, it is already consumed or
    /// the code differs. A mismatch counts as an attempt; the record is
    /// deleted once `max_attempts` wrong codes have been supplied.
    async fn consume(&self, subject: &str, code: &str, max_attempts: u32)
        -> Result<bool, OtpError>;
}

/// Equality that does not short-circuit on the first differing byte.
pub(crate) fn codes_match(stored: &str, supplied: &str) -> bool {
    let (a, b) = (stored.as_bytes(), supplied.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
