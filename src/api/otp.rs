//! OTP issue and validation endpoints.
//!
//! Issuing never returns the code; it is delivered through the dispatch
//! queue and kept out of the delivery log. Validation answers only valid
//! or invalid.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::Result;
use crate::server::AppState;
use crate::template::{render_str, Variables};

/// Source recorded on jobs carrying an OTP
const OTP_SOURCE: &str = "otp";

#[derive(Debug, Deserialize)]
pub struct OtpSendRequest {
    pub phone: String,
}

#[derive(Debug, Deserialize)]
pub struct OtpValidateRequest {
    pub phone: String,
    pub otp: String,
}

#[derive(Debug, Serialize)]
pub struct OtpValidateResponse {
    pub valid: bool,
}

/// POST /otp/send - Issue a code and queue it for delivery
#[tracing::instrument(name = "http.send_otp", skip(state, request))]
pub async fn send_otp(
    State(state): State<AppState>,
    Json(request): Json<OtpSendRequest>,
) -> Result<Json<Value>> {
    let code = state.otp.issue(&request.phone).await?;

    let mut variables = Variables::new();
    variables.insert("code".to_string(), code);
    let text = render_str(&state.settings.otp.message_template, &variables);

    state
        .dispatch
        .enqueue_sensitive_text(&text, &request.phone, OTP_SOURCE)
        .await?;

    Ok(Json(json!({ "message": "OTP sent" })))
}

/// POST /otp/validate - Check and consume a code
#[tracing::instrument(name = "http.validate_otp", skip(state, request))]
pub async fn validate_otp(
    State(state): State<AppState>,
    Json(request): Json<OtpValidateRequest>,
) -> Result<(StatusCode, Json<OtpValidateResponse>)> {
    let valid = state.otp.validate(&request.phone, &request.otp).await?;

    let status = if valid {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };

    Ok((status, Json(OtpValidateResponse { valid })))
}
