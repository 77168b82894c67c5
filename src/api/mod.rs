//! API layer - HTTP endpoint handlers organized by domain.

mod health;
mod messages;
mod metrics;
mod otp;
mod routes;
mod template;

pub use health::{health, home};
pub use messages::{list_message_logs, send_message, SendMessageResponse};
pub use metrics::prometheus_metrics;
pub use otp::{send_otp, validate_otp, OtpSendRequest, OtpValidateRequest, OtpValidateResponse};
pub use routes::api_routes;
pub use template::{create_template, delete_template, list_templates};
