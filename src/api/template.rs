//! Template administration endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::Result;
use crate::server::AppState;
use crate::template::{CreateTemplateRequest, Template, TemplateListResponse};

/// POST /templates - Create a new template
#[tracing::instrument(
    name = "http.create_template",
    skip(state, request),
    fields(template = %request.name)
)]
pub async fn create_template(
    State(state): State<AppState>,
    Json(request): Json<CreateTemplateRequest>,
) -> Result<(StatusCode, Json<Template>)> {
    let template = Template::try_from(request)?;
    let created = state.templates.create(template).await?;

    tracing::info!(id = %created.id, "Template created");
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /templates - List all templates
#[tracing::instrument(name = "http.list_templates", skip(state))]
pub async fn list_templates(State(state): State<AppState>) -> Result<Json<TemplateListResponse>> {
    let templates = state.templates.list().await?;
    let total = templates.len();

    Ok(Json(TemplateListResponse { templates, total }))
}

/// DELETE /templates/{id} - Delete a template
#[tracing::instrument(name = "http.delete_template", skip(state))]
pub async fn delete_template(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.templates.delete(id).await?;

    tracing::info!("Template deleted");
    Ok(StatusCode::NO_CONTENT)
}
