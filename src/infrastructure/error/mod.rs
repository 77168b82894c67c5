use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::delivery_log::DeliveryLogError;
use crate::dispatch::DispatchError;
use crate::otp::OtpError;
use crate::queue::QueueError;
use crate::template::TemplateError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// One entry per problem found in the request
    #[error("Validation error: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    details: Vec<String>,
}

/// Check if running in production mode (based on RUN_MODE env var)
fn is_production() -> bool {
    std::env::var("RUN_MODE")
        .map(|m| m == "production" || m == "prod")
        .unwrap_or(false)
}

fn masked(detail: &str, public: &str) -> String {
    if is_production() {
        public.to_string()
    } else {
        detail.to_string()
    }
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(vec![message.into()])
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::TemplateNotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Config(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let log_message = self.to_string();

        let (code, client_message, details) = match self {
            AppError::Config(e) => (
                "CONFIG_ERROR",
                masked(&e.to_string(), "Configuration error"),
                vec![],
            ),
            // One problem per line
            AppError::Validation(errors) => ("VALIDATION_ERROR", errors.join("\n"), errors),
            AppError::TemplateNotFound(name) => (
                "TEMPLATE_NOT_FOUND",
                format!("Template not found: {}", name),
                vec![],
            ),
            AppError::Conflict(msg) => ("TEMPLATE_EXISTS", msg, vec![]),
            AppError::StoreUnavailable(msg) => (
                "STORE_UNAVAILABLE",
                masked(&msg, "Service temporarily unavailable"),
                vec![],
            ),
            AppError::Internal(msg) => (
                "INTERNAL_ERROR",
                masked(&msg, "Internal server error"),
                vec![],
            ),
        };

        // Always log the detailed error server-side
        if status.is_server_error() {
            tracing::error!(
                code = %code,
                status = %status.as_u16(),
                message = %log_message,
                "API error"
            );
        } else {
            tracing::debug!(
                code = %code,
                status = %status.as_u16(),
                message = %log_message,
                "Request rejected"
            );
        }

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: client_message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<TemplateError> for AppError {
    fn from(err: TemplateError) -> Self {
        match err {
            TemplateError::NotFound(name) => AppError::TemplateNotFound(name),
            TemplateError::AlreadyExists(name) => {
                AppError::Conflict(format!("Template already exists: {}", name))
            }
            TemplateError::InvalidName(msg) | TemplateError::InvalidTemplate(msg) => {
                AppError::Validation(vec![msg])
            }
            TemplateError::Storage(msg) => AppError::StoreUnavailable(msg),
        }
    }
}

impl From<QueueError> for AppError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Serialization(e) => AppError::Internal(e.to_string()),
            other => AppError::StoreUnavailable(other.to_string()),
        }
    }
}

impl From<OtpError> for AppError {
    fn from(err: OtpError) -> Self {
        match err {
            OtpError::InvalidSubject => AppError::validation("Phone number is required"),
            other => AppError::StoreUnavailable(other.to_string()),
        }
    }
}

impl From<DeliveryLogError> for AppError {
    fn from(err: DeliveryLogError) -> Self {
        AppError::StoreUnavailable(err.to_string())
    }
}

impl From<DispatchError> for AppError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Validation(errors) => AppError::Validation(errors),
            DispatchError::Template(e) => e.into(),
            DispatchError::Queue(e) => e.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
