//! Render-and-enqueue: the producer side of the pipeline.

use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use crate::metrics::DispatchMetrics;
use crate::queue::{DispatchJob, DispatchQueue, QueueError};
use crate::template::{self, TemplateError, TemplateRepository, Variables};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Request rejected before anything was enqueued
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// A request to render one template for a list of recipients.
///
/// Wire shape: `{"id": <template name>, "variables": {..}, "phone": [..]}`.
#[derive(Debug, Clone, Deserialize)]
pub struct RenderRequest {
    #[serde(rename = "id")]
    pub template_name: String,

    #[serde(default)]
    pub variables: Variables,

    #[serde(rename = "phone", default)]
    pub recipients: Vec<String>,
}

impl RenderRequest {
    pub fn new(
        template_name: impl Into<String>,
        variables: Variables,
        recipients: Vec<String>,
    ) -> Self {
        Self {
            template_name: template_name.into(),
            variables,
            recipients,
        }
    }
}

/// Trimmed recipients, or one message per problem.
fn clean_recipients(recipients: &[String]) -> Result<Vec<String>, Vec<String>> {
    if recipients.is_empty() {
        return Err(vec!["Phone number is required".to_string()]);
    }

    let mut cleaned = Vec::with_capacity(recipients.len());
    let mut errors = Vec::new();
    for (index, recipient) in recipients.iter().enumerate() {
        let trimmed = recipient.trim();
        if trimmed.is_empty() {
            errors.push(format!("recipient {} is blank", index));
        } else {
            cleaned.push(trimmed.to_string());
        }
    }

    if errors.is_empty() {
        Ok(cleaned)
    } else {
        Err(errors)
    }
}

fn clean_recipient(recipient: &str) -> Result<String, DispatchError> {
    let mut cleaned =
        clean_recipients(&[recipient.to_string()]).map_err(DispatchError::Validation)?;
    cleaned.pop().ok_or_else(|| {
        DispatchError::Validation(vec!["Phone number is required".to_string()])
    })
}

pub struct DispatchService {
    templates: Arc<dyn TemplateRepository>,
    queue: Arc<dyn DispatchQueue>,
}

impl DispatchService {
    pub fn new(templates: Arc<dyn TemplateRepository>, queue: Arc<dyn DispatchQueue>) -> Self {
        Self { templates, queue }
    }

    pub fn queue(&self) -> &Arc<dyn DispatchQueue> {
        &self.queue
    }

    /// Validate, render once and enqueue one job per recipient.
    ///
    /// Returns the number of jobs enqueued. On any error nothing is
    /// enqueued: the batch is appended in a single atomic operation.
    #[tracing::instrument(skip(self, request), fields(template = %request.template_name, recipients = request.recipients.len()))]
    pub async fn render_and_enqueue(&self, request: &RenderRequest) -> Result<usize, DispatchError> {
        let recipients = clean_recipients(&request.recipients);

        let template = self.templates.get_by_name(&request.template_name).await?;

        let mut errors = match &recipients {
            Ok(_) => Vec::new(),
            Err(errors) => errors.clone(),
        };
        errors.extend(template::validate(&template, &request.variables));

        let recipients = match recipients {
            Ok(recipients) if errors.is_empty() => recipients,
            _ => {
                tracing::debug!(errors = ?errors, "Render request rejected");
                return Err(DispatchError::Validation(errors));
            }
        };

        let payload = template::render(&template, &request.variables);
        let jobs = DispatchJob::fan_out(&payload, &recipients, &template.name);
        let count = jobs.len();

        if let Err(e) = self.queue.enqueue_batch(jobs).await {
            DispatchMetrics::record_queue_error();
            tracing::error!(error = %e, "Failed to enqueue dispatch jobs");
            return Err(e.into());
        }

        DispatchMetrics::record_enqueued(count);
        tracing::info!(jobs = count, "Dispatch jobs enqueued");

        Ok(count)
    }

    /// Enqueue already-rendered text for a single recipient.
    pub async fn enqueue_text(
        &self,
        payload: &str,
        recipient: &str,
        source: &str,
    ) -> Result<(), DispatchError> {
        let job = DispatchJob::new(payload, clean_recipient(recipient)?, source);
        self.enqueue_one(job).await
    }

    /// Queue a message carrying a secret, such as an OTP code. The
    /// delivery log records the job without its payload.
    pub async fn enqueue_sensitive_text(
        &self,
        payload: &str,
        recipient: &str,
        source: &str,
    ) -> Result<(), DispatchError> {
        let job = DispatchJob::new(payload, clean_recipient(recipient)?, source).into_sensitive();
        self.enqueue_one(job).await
    }

    async fn enqueue_one(&self, job: DispatchJob) -> Result<(), DispatchError> {
        let source = job.source.clone();
        if let Err(e) = self.queue.enqueue(job).await {
            DispatchMetrics::record_queue_error();
            tracing::error!(error = %e, source = %source, "Failed to enqueue dispatch job");
            return Err(e.into());
        }

        DispatchMetrics::record_enqueued(1);
        tracing::debug!(source = %source, "Dispatch job enqueued");
        Ok(())
    }
}
