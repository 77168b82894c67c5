//! Gateway factory

use std::sync::Arc;

use crate::config::GatewayConfig;

use super::log_gateway::LogGateway;
use super::whatsapp::WhatsAppGateway;
use super::{GatewayError, MessageGateway};

/// Create the gateway selected by `gateway.kind`.
///
/// A `whatsapp` gateway with missing credentials is an error; it never
/// falls back to logging.
pub fn create_gateway(config: &GatewayConfig) -> Result<Arc<dyn MessageGateway>, GatewayError> {
    match config.kind.as_str() {
        "whatsapp" => {
            let gateway = WhatsAppGateway::new(config)?;
            tracing::info!(endpoint = %gateway.endpoint(), "Using WhatsApp Cloud API gateway");
            Ok(Arc::new(gateway))
        }
        "log" => {
            tracing::info!("Using log gateway, messages will not leave the process");
            Ok(Arc::new(LogGateway::new()))
        }
        other => {
            tracing::warn!(kind = %other, "Unknown gateway kind, using log gateway");
            Ok(Arc::new(LogGateway::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_log_gateway() {
        let gateway = create_gateway(&GatewayConfig::default()).unwrap();
        assert_eq!(gateway.name(), "log");
    }

    #[test]
    fn test_whatsapp_without_token_fails() {
        let config = GatewayConfig {
            kind: "whatsapp".to_string(),
            phone_number_id: "123".to_string(),
            access_token: None,
            ..Default::default()
        };
        assert!(create_gateway(&config).is_err());
    }
}
