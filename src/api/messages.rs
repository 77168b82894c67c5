//! Render-and-enqueue and delivery log endpoints.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Serialize;

use crate::delivery_log::{DeliveryLogPage, ListQuery};
use crate::dispatch::RenderRequest;
use crate::error::Result;
use crate::server::AppState;

const QUEUED_MESSAGE: &str = "Message in queue... will be sent soon";

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub message: String,
    /// Jobs enqueued, one per recipient
    pub jobs: usize,
}

/// POST /templates/send-message - Render a template and queue it per recipient
#[tracing::instrument(
    name = "http.send_message",
    skip(state, request),
    fields(template = %request.template_name, recipients = request.recipients.len())
)]
pub async fn send_message(
    State(state): State<AppState>,
    Json(request): Json<RenderRequest>,
) -> Result<Json<SendMessageResponse>> {
    let jobs = state.dispatch.render_and_enqueue(&request).await?;

    Ok(Json(SendMessageResponse {
        message: QUEUED_MESSAGE.to_string(),
        jobs,
    }))
}

/// GET /message-logs - Delivery log, newest first
#[tracing::instrument(name = "http.list_message_logs", skip(state))]
pub async fn list_message_logs(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<DeliveryLogPage>> {
    let (limit, offset) = query.bounds();
    let page = state.delivery_log.list(limit, offset).await?;

    Ok(Json(page))
}
