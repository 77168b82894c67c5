//! OTP issuance and verification

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use super::backend::{OtpBackend, OtpError, OtpRecord};
use crate::config::OtpConfig;
use crate::metrics::OtpMetrics;

/// Issues and validates one-time codes on top of an `OtpBackend`.
pub struct OtpService {
    backend: Arc<dyn OtpBackend>,
    ttl: Duration,
    code_length: usize,
    max_attempts: u32,
}

impl OtpService {
    pub fn new(
        backend: Arc<dyn OtpBackend>,
        ttl: Duration,
        code_length: usize,
        max_attempts: u32,
    ) -> Self {
        Self {
            backend,
            ttl,
            code_length,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn from_config(config: &OtpConfig, backend: Arc<dyn OtpBackend>) -> Self {
        Self::new(
            backend,
            config.ttl(),
            config.code_length,
            config.max_attempts,
        )
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn backend_type(&self) -> &'static str {
        self.backend.backend_type()
    }

    /// Issue a fresh code for `subject`, replacing any live one.
    ///
    /// The code is returned for out-of-band delivery and must never be
    /// echoed to the requester.
    pub async fn issue(&self, subject: &str) -> Result<String, OtpError> {
        let subject = subject.trim();
        if subject.is_empty() {
            return Err(OtpError::InvalidSubject);
        }

        let code = generate_code(self.code_length);
        let record = OtpRecord::new(subject, code.clone(), self.ttl);
        self.backend.store(record, self.ttl).await?;

        OtpMetrics::record_issued();
        tracing::info!(
            subject = %subject,
            ttl_secs = self.ttl.as_secs(),
            "OTP issued"
        );

        Ok(code)
    }

    /// Check `code` against the live code for `subject`, consuming it on
    /// success. Fails closed: blank input is simply invalid.
    pub async fn validate(&self, subject: &str, code: &str) -> Result<bool, OtpError> {
        // Subjects are normalized like on issue; codes must match exactly
        let subject = subject.trim();

        let valid = if subject.is_empty() || code.is_empty() {
            false
        } else {
            self.backend
                .consume(subject, code, self.max_attempts)
                .await?
        };

        OtpMetrics::record_validation(valid);
        tracing::debug!(subject = %subject, valid, "OTP validation");

        Ok(valid)
    }
}

/// Uniformly random decimal digits.
fn generate_code(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::otp::MemoryOtpBackend;

    fn service() -> OtpService {
        OtpService::new(
            Arc::new(MemoryOtpBackend::new()),
            Duration::from_secs(300),
            6,
            5,
        )
    }

    #[test]
    fn test_generate_code_is_numeric_with_fixed_length() {
        for _ in 0..50 {
            let code = generate_code(6);
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
        assert_eq!(generate_code(4).len(), 4);
    }

    #[tokio::test]
    async fn test_issue_then_validate_once() {
        let otp = service();
        let code = otp.issue("+15550001").await.unwrap();

        assert!(otp.validate("+15550001", &code).await.unwrap());
        assert!(!otp.validate("+15550001", &code).await.unwrap());
    }

    #[tokio::test]
    async fn test_issue_blank_subject_rejected() {
        let otp = service();
        assert!(matches!(otp.issue("   ").await, Err(OtpError::InvalidSubject)));
    }

    #[tokio::test]
    async fn test_validate_blank_input_is_false() {
        let otp = service();
        otp.issue("+15550001").await.unwrap();

        assert!(!otp.validate("", "123456").await.unwrap());
        assert!(!otp.validate("+15550001", "").await.unwrap());
    }

    #[tokio::test]
    async fn test_subject_is_trimmed() {
        let otp = service();
        let code = otp.issue(" +15550001 ").await.unwrap();
        assert!(otp.validate("+15550001", &code).await.unwrap());
    }

    #[tokio::test]
    async fn test_code_must_match_exactly() {
        let otp = service();
        let code = otp.issue("+15550001").await.unwrap();

        assert!(!otp.validate("+15550001", &format!(" {}", code)).await.unwrap());
        assert!(!otp.validate("+15550001", &format!("{}\n", code)).await.unwrap());
        assert!(otp.validate("+15550001", &code).await.unwrap());
    }

    #[tokio::test]
    async fn test_reissue_invalidates_old_code() {
        let otp = service();
        let first = otp.issue("+15550001").await.unwrap();
        let second = otp.issue("+15550001").await.unwrap();

        if first != second {
            assert!(!otp.validate("+15550001", &first).await.unwrap());
        }
        assert!(otp.validate("+15550001", &second).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_code_rejected() {
        let otp = service();
        let code = otp.issue("+15550001").await.unwrap();

        tokio::time::advance(Duration::from_secs(301)).await;

        assert!(!otp.validate("+15550001", &code).await.unwrap());
    }
}
