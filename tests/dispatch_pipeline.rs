//! End-to-end tests of the dispatch pipeline
//!
//! Templates, queue, worker and delivery log wired together with the
//! in-memory backends and a recording gateway. No Redis or server needed.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use whatsapp_dispatch_service::delivery_log::{
    DeliveryLog, DeliveryOutcome, MemoryDeliveryLog, REDACTED_PAYLOAD,
};
use whatsapp_dispatch_service::dispatch::{
    DispatchError, DispatchService, DispatchWorker, RenderRequest,
};
use whatsapp_dispatch_service::gateway::{GatewayError, MessageGateway, SendReceipt};
use whatsapp_dispatch_service::otp::{MemoryOtpBackend, OtpService};
use whatsapp_dispatch_service::queue::{DispatchQueue, MemoryDispatchQueue};
use whatsapp_dispatch_service::template::{
    render_str, MemoryTemplateStore, Template, TemplateRepository, Variables,
};

/// Records every send; fails for the configured recipients.
#[derive(Default)]
struct RecordingGateway {
    sent: Mutex<Vec<(String, String)>>,
    failing: HashSet<String>,
    delay: Option<Duration>,
    started: Notify,
}

impl RecordingGateway {
    fn failing_for(recipients: &[&str]) -> Self {
        Self {
            failing: recipients.iter().map(|r| r.to_string()).collect(),
            ..Default::default()
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageGateway for RecordingGateway {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, recipient: &str, text: &str) -> Result<SendReceipt, GatewayError> {
        self.started.notify_one();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), text.to_string()));

        if self.failing.contains(recipient) {
            return Err(GatewayError::Rejected {
                status: 400,
                body: "recipient not on WhatsApp".to_string(),
            });
        }

        Ok(SendReceipt {
            message_id: format!("wamid.{}", recipient),
        })
    }
}

struct Pipeline {
    templates: Arc<MemoryTemplateStore>,
    queue: Arc<MemoryDispatchQueue>,
    log: Arc<MemoryDeliveryLog>,
    gateway: Arc<RecordingGateway>,
    dispatch: DispatchService,
}

impl Pipeline {
    async fn new(gateway: RecordingGateway) -> Self {
        let templates = Arc::new(MemoryTemplateStore::new());
        templates
            .create(
                Template::new(
                    "verification",
                    "Hello {{name}}, your code is {{code}}",
                    vec![],
                    None,
                )
                .unwrap(),
            )
            .await
            .unwrap();

        let queue = Arc::new(MemoryDispatchQueue::new());
        let dispatch = DispatchService::new(templates.clone(), queue.clone());

        Self {
            templates,
            queue,
            log: Arc::new(MemoryDeliveryLog::new()),
            gateway: Arc::new(gateway),
            dispatch,
        }
    }

    fn worker(&self) -> DispatchWorker {
        DispatchWorker::new(self.queue.clone(), self.gateway.clone(), self.log.clone())
            .with_poll_timeout(Duration::from_millis(20))
    }

    /// Run a worker until the queue is empty and `expected` entries are logged.
    async fn drain(&self, expected: usize) {
        let handle = self.worker().spawn();
        for _ in 0..200 {
            if self.log.snapshot().await.len() >= expected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.shutdown().await.unwrap();
    }
}

fn vars(pairs: &[(&str, &str)]) -> Variables {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn phones(list: &[&str]) -> Vec<String> {
    list.iter().map(|p| p.to_string()).collect()
}

#[tokio::test]
async fn test_missing_variable_is_rejected_before_queueing() {
    let pipeline = Pipeline::new(RecordingGateway::default()).await;

    let request = RenderRequest::new(
        "verification",
        vars(&[("name", "Ana")]),
        phones(&["+15550001"]),
    );
    let result = pipeline.dispatch.render_and_enqueue(&request).await;

    match result {
        Err(DispatchError::Validation(errors)) => {
            assert_eq!(errors, vec!["missing variable: code".to_string()])
        }
        other => panic!("expected validation error, got {:?}", other),
    }
    assert_eq!(pipeline.queue.len().await.unwrap(), 0);
}

#[tokio::test]
async fn test_two_recipients_are_sent_and_logged() {
    let pipeline = Pipeline::new(RecordingGateway::default()).await;

    let request = RenderRequest::new(
        "verification",
        vars(&[("name", "Ana"), ("code", "4821")]),
        phones(&["+15550001", "+15560001"]),
    );
    assert_eq!(pipeline.dispatch.render_and_enqueue(&request).await.unwrap(), 2);

    pipeline.drain(2).await;

    let sent = pipeline.gateway.sent();
    assert_eq!(
        sent,
        vec![
            ("+15550001".to_string(), "Hello Ana, your code is 4821".to_string()),
            ("+15560001".to_string(), "Hello Ana, your code is 4821".to_string()),
        ]
    );

    let entries = pipeline.log.snapshot().await;
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.outcome == DeliveryOutcome::Sent));
    assert!(entries.iter().all(|e| e.source == "verification"));
    assert_eq!(entries[0].message_id.as_deref(), Some("wamid.+15550001"));
}

#[tokio::test]
async fn test_jobs_are_sent_in_enqueue_order() {
    let pipeline = Pipeline::new(RecordingGateway::default()).await;

    for (name, phone) in [("First", "+15550001"), ("Second", "+15550002"), ("Third", "+15550003")] {
        let request = RenderRequest::new(
            "verification",
            vars(&[("name", name), ("code", "1")]),
            phones(&[phone]),
        );
        pipeline.dispatch.render_and_enqueue(&request).await.unwrap();
    }

    pipeline.drain(3).await;

    let recipients: Vec<String> = pipeline.gateway.sent().into_iter().map(|(r, _)| r).collect();
    assert_eq!(recipients, phones(&["+15550001", "+15550002", "+15550003"]));
}

#[tokio::test]
async fn test_partial_failure_does_not_affect_other_recipients() {
    let pipeline = Pipeline::new(RecordingGateway::failing_for(&["+15550002"])).await;

    let request = RenderRequest::new(
        "verification",
        vars(&[("name", "Ana"), ("code", "4821")]),
        phones(&["+15550001", "+15550002", "+15550003"]),
    );
    pipeline.dispatch.render_and_enqueue(&request).await.unwrap();

    pipeline.drain(3).await;

    let entries = pipeline.log.snapshot().await;
    assert_eq!(entries.len(), 3);

    let failed: Vec<_> = entries
        .iter()
        .filter(|e| e.outcome == DeliveryOutcome::Failed)
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].recipient, "+15550002");
    assert!(failed[0].error.as_deref().unwrap().contains("400"));

    // Failed jobs are terminal, never re-enqueued
    assert_eq!(pipeline.queue.len().await.unwrap(), 0);
    assert_eq!(pipeline.gateway.sent().len(), 3);
}

#[tokio::test]
async fn test_deleting_template_keeps_queued_jobs() {
    let pipeline = Pipeline::new(RecordingGateway::default()).await;

    let request = RenderRequest::new(
        "verification",
        vars(&[("name", "Ana"), ("code", "4821")]),
        phones(&["+15550001"]),
    );
    pipeline.dispatch.render_and_enqueue(&request).await.unwrap();

    let template = pipeline.templates.get_by_name("verification").await.unwrap();
    pipeline.templates.delete(template.id).await.unwrap();

    pipeline.drain(1).await;

    assert_eq!(
        pipeline.gateway.sent(),
        vec![("+15550001".to_string(), "Hello Ana, your code is 4821".to_string())]
    );
}

#[tokio::test]
async fn test_shutdown_finishes_in_flight_job() {
    let pipeline = Pipeline::new(RecordingGateway::slow(Duration::from_millis(200))).await;

    pipeline
        .dispatch
        .enqueue_text("slow message", "+15550001", "manual")
        .await
        .unwrap();
    pipeline
        .dispatch
        .enqueue_text("never claimed", "+15550002", "manual")
        .await
        .unwrap();

    let handle = pipeline.worker().spawn();

    // Wait until the first send is under way, then ask the worker to stop
    pipeline.gateway.started.notified().await;
    let summary = handle.shutdown().await.unwrap();

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.sent, 1);

    let entries = pipeline.log.snapshot().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].payload, "slow message");

    // The second job was never claimed
    assert_eq!(pipeline.queue.len().await.unwrap(), 1);
}

#[tokio::test]
async fn test_otp_delivered_through_dispatch_path() {
    let pipeline = Pipeline::new(RecordingGateway::default()).await;
    let otp = OtpService::new(
        Arc::new(MemoryOtpBackend::new()),
        Duration::from_secs(300),
        6,
        5,
    );

    let code = otp.issue("+15550001").await.unwrap();
    let text = render_str(
        "Your verification code is {{code}}",
        &vars(&[("code", code.as_str())]),
    );
    pipeline
        .dispatch
        .enqueue_sensitive_text(&text, "+15550001", "otp")
        .await
        .unwrap();

    pipeline.drain(1).await;

    let sent = pipeline.gateway.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1, format!("Your verification code is {}", code));

    let entries = pipeline.log.list(10, 0).await.unwrap();
    assert_eq!(entries.entries[0].source, "otp");
    assert_eq!(entries.entries[0].payload, REDACTED_PAYLOAD);
    assert!(!entries.entries[0].payload.contains(&code));

    assert!(otp.validate("+15550001", &code).await.unwrap());
    assert!(!otp.validate("+15550001", &code).await.unwrap());
}

mod otp_properties {
    use super::*;

    fn service(ttl: Duration) -> OtpService {
        OtpService::new(Arc::new(MemoryOtpBackend::new()), ttl, 6, 5)
    }

    #[tokio::test]
    async fn test_single_use() {
        let otp = service(Duration::from_secs(300));
        let code = otp.issue("+15550001").await.unwrap();

        assert!(otp.validate("+15550001", &code).await.unwrap());
        assert!(!otp.validate("+15550001", &code).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry() {
        let otp = service(Duration::from_secs(60));
        let code = otp.issue("+15550001").await.unwrap();

        tokio::time::advance(Duration::from_secs(61)).await;

        assert!(!otp.validate("+15550001", &code).await.unwrap());
    }

    #[tokio::test]
    async fn test_overwrite() {
        let otp = service(Duration::from_secs(300));
        let mut first = otp.issue("+15550001").await.unwrap();
        let mut second = otp.issue("+15550001").await.unwrap();
        while first == second {
            first = second;
            second = otp.issue("+15550001").await.unwrap();
        }

        assert!(!otp.validate("+15550001", &first).await.unwrap());
        assert!(otp.validate("+15550001", &second).await.unwrap());
    }

    #[tokio::test]
    async fn test_wrong_code_and_unknown_subject() {
        let otp = service(Duration::from_secs(300));
        let code = otp.issue("+15550001").await.unwrap();
        let wrong = if code == "000000" { "111111" } else { "000000" };

        assert!(!otp.validate("+15550001", wrong).await.unwrap());
        assert!(!otp.validate("+15559999", &code).await.unwrap());
        assert!(otp.validate("+15550001", &code).await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_validations_accept_once() {
        let otp = Arc::new(service(Duration::from_secs(300)));
        let code = otp.issue("+15550001").await.unwrap();

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let otp = otp.clone();
            let code = code.clone();
            tasks.push(tokio::spawn(async move {
                otp.validate("+15550001", &code).await.unwrap()
            }));
        }

        let mut accepted = 0;
        for task in tasks {
            if task.await.unwrap() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 1);
    }
}
