//! Dispatch job model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One rendered message for one recipient.
///
/// The payload is materialized at enqueue time; the job holds no
/// reference to the template it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchJob {
    pub id: Uuid,

    /// Rendered message text
    pub payload: String,

    /// Phone identifier of the single recipient
    pub recipient: String,

    /// Template name the payload was rendered from, or `otp`
    pub source: String,

    pub enqueued_at: DateTime<Utc>,

    /// Payload carries a secret and must not be persisted outside the queue
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub sensitive: bool,
}

impl DispatchJob {
    pub fn new(
        payload: impl Into<String>,
        recipient: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload: payload.into(),
            recipient: recipient.into(),
            source: source.into(),
            enqueued_at: Utc::now(),
            sensitive: false,
        }
    }

    pub fn into_sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// One independent job per recipient, all carrying the same payload.
    pub fn fan_out(payload: &str, recipients: &[String], source: &str) -> Vec<DispatchJob> {
        recipients
            .iter()
            .map(|recipient| DispatchJob::new(payload, recipient.as_str(), source))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fan_out_one_job_per_recipient() {
        let recipients = vec![
            "+15550001".to_string(),
            "+15550002".to_string(),
            "+15550003".to_string(),
        ];
        let jobs = DispatchJob::fan_out("Hello", &recipients, "welcome");

        assert_eq!(jobs.len(), 3);
        for (job, recipient) in jobs.iter().zip(&recipients) {
            assert_eq!(&job.recipient, recipient);
            assert_eq!(job.payload, "Hello");
            assert_eq!(job.source, "welcome");
        }

        // Independent jobs, distinct identities
        assert_ne!(jobs[0].id, jobs[1].id);
        assert_ne!(jobs[1].id, jobs[2].id);
    }

    #[test]
    fn test_serialization_shape() {
        let job = DispatchJob::new("Hi", "+15550001", "otp");
        let value = serde_json::to_value(&job).unwrap();

        assert_eq!(value["payload"], "Hi");
        assert_eq!(value["recipient"], "+15550001");
        assert_eq!(value["source"], "otp");
        assert!(value.get("enqueued_at").is_some());
        assert!(value.get("sensitive").is_none());
    }

    #[test]
    fn test_sensitive_flag_survives_the_wire() {
        let job = DispatchJob::new("Your code is 123456", "+15550001", "otp").into_sensitive();
        let raw = serde_json::to_string(&job).unwrap();

        let decoded: DispatchJob = serde_json::from_str(&raw).unwrap();
        assert!(decoded.sensitive);

        let legacy = raw.replace(",\"sensitive\":true", "");
        let decoded: DispatchJob = serde_json::from_str(&legacy).unwrap();
        assert!(!decoded.sensitive);
    }
}
