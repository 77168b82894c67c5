use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::queue::DispatchJob;

pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const MAX_PAGE_SIZE: usize = 200;

/// Stored in place of the payload of a sensitive job
pub const REDACTED_PAYLOAD: &str = "[redacted]";

#[derive(Debug, Error)]
pub enum DeliveryLogError {
    #[error("Delivery log storage error: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for DeliveryLogError {
    fn from(err: sqlx::Error) -> Self {
        DeliveryLogError::Storage(err.to_string())
    }
}

/// Terminal state of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryOutcome {
    Sent,
    Failed,
}

impl DeliveryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryOutcome::Sent => "sent",
            DeliveryOutcome::Failed => "failed",
        }
    }
}

impl fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryOutcome {
    type Err = DeliveryLogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent" => Ok(DeliveryOutcome::Sent),
            "failed" => Ok(DeliveryOutcome::Failed),
            other => Err(DeliveryLogError::Storage(format!(
                "unknown delivery outcome `{}`",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryLogEntry {
    pub id: Uuid,
    pub job_id: Uuid,
    pub recipient: String,

    /// Template name, or `otp`
    pub source: String,

    pub payload: String,
    pub outcome: DeliveryOutcome,

    /// Gateway-assigned id, on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,

    /// Last gateway error, on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Gateway calls made for this job
    pub attempts: u32,

    pub enqueued_at: DateTime<Utc>,
    pub logged_at: DateTime<Utc>,
}

impl DeliveryLogEntry {
    fn from_job(job: &DispatchJob, outcome: DeliveryOutcome, attempts: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id: job.id,
            recipient: job.recipient.clone(),
            source: job.source.clone(),
            payload: if job.sensitive {
                REDACTED_PAYLOAD.to_string()
            } else {
                job.payload.clone()
            },
            outcome,
            message_id: None,
            error: None,
            attempts,
            enqueued_at: job.enqueued_at,
            logged_at: Utc::now(),
        }
    }

    pub fn sent(job: &DispatchJob, message_id: impl Into<String>, attempts: u32) -> Self {
        Self {
            message_id: Some(message_id.into()),
            ..Self::from_job(job, DeliveryOutcome::Sent, attempts)
        }
    }

    pub fn failed(job: &DispatchJob, error: impl Into<String>, attempts: u32) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::from_job(job, DeliveryOutcome::Failed, attempts)
        }
    }
}

/// Query string of `GET /message-logs`
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl ListQuery {
    /// `(limit, offset)` with the default applied and the limit clamped
    /// to `1..=MAX_PAGE_SIZE`.
    pub fn bounds(&self) -> (usize, usize) {
        let limit = self
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        (limit, self.offset.unwrap_or(0))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeliveryLogPage {
    pub entries: Vec<DeliveryLogEntry>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}
