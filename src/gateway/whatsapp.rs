//! WhatsApp Cloud API gateway.
//!
//! Sends plain text messages through
//! `POST {base_url}/{api_version}/{phone_number_id}/messages`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{normalize_recipient, GatewayError, MessageGateway, SendReceipt};
use crate::config::GatewayConfig;

/// Longest error body kept in a `Rejected` error
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Serialize)]
struct TextMessageRequest<'a> {
    messaging_product: &'static str,
    recipient_type: &'static str,
    to: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    text: TextBody<'a>,
}

#[derive(Debug, Serialize)]
struct TextBody<'a> {
    preview_url: bool,
    body: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

pub struct WhatsAppGateway {
    client: Client,
    endpoint: String,
    access_token: String,
}

impl WhatsAppGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let access_token = config
            .access_token
            .clone()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| GatewayError::Config("access_token is required".to_string()))?;

        if config.phone_number_id.is_empty() {
            return Err(GatewayError::Config(
                "phone_number_id is required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        let endpoint = format!(
            "{}/{}/{}/messages",
            config.base_url.trim_end_matches('/'),
            config.api_version,
            config.phone_number_id
        );

        Ok(Self {
            client,
            endpoint,
            access_token,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn map_transport_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Transport(err.to_string())
    }
}

#[async_trait]
impl MessageGateway for WhatsAppGateway {
    fn name(&self) -> &'static str {
        "whatsapp"
    }

    async fn send(&self, recipient: &str, text: &str) -> Result<SendReceipt, GatewayError> {
        let to = normalize_recipient(recipient)?;

        let request = TextMessageRequest {
            messaging_product: "whatsapp",
            recipient_type: "individual",
            to: &to,
            kind: "text",
            text: TextBody {
                preview_url: false,
                body: text,
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.access_token)
            .json(&request)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY)
                    .rev()
                    .find(|i| body.is_char_boundary(*i))
                    .unwrap_or(0);
                body.truncate(cut);
            }
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SendMessageResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        let message_id = parsed
            .messages
            .into_iter()
            .next()
            .map(|m| m.id)
            .ok_or_else(|| GatewayError::InvalidResponse("no message id in reply".to_string()))?;

        Ok(SendReceipt { message_id })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn config(base_url: &str) -> GatewayConfig {
        GatewayConfig {
            kind: "whatsapp".to_string(),
            base_url: base_url.to_string(),
            api_version: "v19.0".to_string(),
            phone_number_id: "1234567890".to_string(),
            access_token: Some("test-token".to_string()),
            timeout_ms: 500,
        }
    }

    #[test]
    fn test_requires_credentials() {
        let mut cfg = config("http://localhost");
        cfg.access_token = None;
        assert!(matches!(WhatsAppGateway::new(&cfg), Err(GatewayError::Config(_))));

        let mut cfg = config("http://localhost");
        cfg.phone_number_id = String::new();
        assert!(matches!(WhatsAppGateway::new(&cfg), Err(GatewayError::Config(_))));
    }

    #[test]
    fn test_endpoint_format() {
        let gateway = WhatsAppGateway::new(&config("https://graph.example.com/")).unwrap();
        assert_eq!(
            gateway.endpoint(),
            "https://graph.example.com/v19.0/1234567890/messages"
        );
    }

    #[tokio::test]
    async fn test_send_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v19.0/1234567890/messages"))
            .and(header("authorization", "Bearer test-token"))
            .and(body_partial_json(json!({
                "messaging_product": "whatsapp",
                "to": "15550001234",
                "type": "text",
                "text": { "body": "Hello Ana" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "messaging_product": "whatsapp",
                "contacts": [{ "input": "15550001234", "wa_id": "15550001234" }],
                "messages": [{ "id": "wamid.ABC123" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = WhatsAppGateway::new(&config(&server.uri())).unwrap();
        let receipt = gateway.send("+15550001234", "Hello Ana").await.unwrap();

        assert_eq!(receipt.message_id, "wamid.ABC123");
    }

    #[tokio::test]
    async fn test_client_error_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": { "message": "Invalid parameter", "code": 100 }
            })))
            .mount(&server)
            .await;

        let gateway = WhatsAppGateway::new(&config(&server.uri())).unwrap();
        let err = gateway.send("+15550001234", "Hi").await.unwrap_err();

        assert!(matches!(err, GatewayError::Rejected { status: 400, .. }));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let gateway = WhatsAppGateway::new(&config(&server.uri())).unwrap();
        let err = gateway.send("+15550001234", "Hi").await.unwrap_err();

        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_slow_gateway_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "messages": [{ "id": "late" }] }))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let gateway = WhatsAppGateway::new(&config(&server.uri())).unwrap();
        let err = gateway.send("+15550001234", "Hi").await.unwrap_err();

        assert!(matches!(err, GatewayError::Timeout));
    }

    #[tokio::test]
    async fn test_missing_message_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "messages": [] })))
            .mount(&server)
            .await;

        let gateway = WhatsAppGateway::new(&config(&server.uri())).unwrap();
        let err = gateway.send("+15550001234", "Hi").await.unwrap_err();

        assert!(matches!(err, GatewayError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_invalid_recipient_not_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let gateway = WhatsAppGateway::new(&config(&server.uri())).unwrap();
        let err = gateway.send("abc", "Hi").await.unwrap_err();

        assert!(matches!(err, GatewayError::InvalidRecipient(_)));
    }
}
