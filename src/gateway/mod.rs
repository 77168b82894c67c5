//! Outbound message gateway.
//!
//! The worker hands each rendered payload to a `MessageGateway`. The
//! gateway is a black box with its own latency and failure modes; the
//! only thing the worker needs from an error is whether it is transient.

mod factory;
mod log_gateway;
mod whatsapp;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub use factory::create_gateway;
pub use log_gateway::LogGateway;
pub use whatsapp::WhatsAppGateway;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("gateway request timed out")]
    Timeout,

    #[error("gateway transport error: {0}")]
    Transport(String),

    /// The gateway answered with a non-success status
    #[error("gateway rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The gateway accepted the request but the reply was unreadable
    #[error("unexpected gateway response: {0}")]
    InvalidResponse(String),

    #[error("gateway misconfigured: {0}")]
    Config(String),
}

impl GatewayError {
    /// Whether an immediate retry may succeed.
    ///
    /// 5xx and 429 replies, timeouts and transport failures are transient.
    /// An unreadable success reply is not, since the message may be out.
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayError::Timeout | GatewayError::Transport(_) => true,
            GatewayError::Rejected { status, .. } => *status >= 500 || *status == 429,
            GatewayError::InvalidRecipient(_)
            | GatewayError::InvalidResponse(_)
            | GatewayError::Config(_) => false,
        }
    }
}

/// Acknowledgement of an accepted message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendReceipt {
    /// Gateway-assigned message identifier
    pub message_id: String,
}

#[async_trait]
pub trait MessageGateway: Send + Sync {
    /// Gateway identifier, for logs and `/health`
    fn name(&self) -> &'static str;

    async fn send(&self, recipient: &str, text: &str) -> Result<SendReceipt, GatewayError>;
}

/// Normalize a phone identifier to bare international digits.
///
/// Accepts an optional leading `+` and common separators (space, dash,
/// dot, parentheses); requires 6-15 digits.
pub fn normalize_recipient(recipient: &str) -> Result<String, GatewayError> {
    let trimmed = recipient.trim();
    let without_plus = trimmed.strip_prefix('+').unwrap_or(trimmed);

    let mut digits = String::with_capacity(without_plus.len());
    for c in without_plus.chars() {
        match c {
            '0'..='9' => digits.push(c),
            ' ' | '-' | '.' | '(' | ')' => {}
            _ => return Err(GatewayError::InvalidRecipient(recipient.to_string())),
        }
    }

    if !(6..=15).contains(&digits.len()) {
        return Err(GatewayError::InvalidRecipient(recipient.to_string()));
    }

    Ok(digits)
}
