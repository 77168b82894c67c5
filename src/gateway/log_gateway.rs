//! Development gateway: logs the message instead of sending it.

use async_trait::async_trait;
use uuid::Uuid;

use super::{normalize_recipient, GatewayError, MessageGateway, SendReceipt};

#[derive(Debug, Default)]
pub struct LogGateway;

impl LogGateway {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MessageGateway for LogGateway {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, recipient: &str, text: &str) -> Result<SendReceipt, GatewayError> {
        let to = normalize_recipient(recipient)?;
        let message_id = format!("log.{}", Uuid::new_v4().simple());

        tracing::info!(
            to = %to,
            message_id = %message_id,
            chars = text.chars().count(),
            "Message logged instead of sent"
        );

        Ok(SendReceipt { message_id })
    }
}
