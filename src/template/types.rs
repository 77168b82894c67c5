//! Template types and errors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::engine::{is_valid_variable_name, placeholders};

const MAX_NAME_LEN: usize = 128;
const MAX_BODY_LEN: usize = 4096;

/// Template-specific error type
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template not found: {0}")]
    NotFound(String),

    #[error("Template already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid template name: {0}")]
    InvalidName(String),

    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    /// The backing store could not be reached
    #[error("Template storage error: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for TemplateError {
    fn from(err: sqlx::Error) -> Self {
        TemplateError::Storage(err.to_string())
    }
}

/// Result type for template operations
pub type TemplateResult<T> = Result<T, TemplateError>;

/// A named message body with `{{variable}}` placeholders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    /// Storage identifier, used for deletion
    pub id: Uuid,

    /// Unique name callers render by
    pub name: String,

    /// Text with placeholders
    pub body: String,

    /// Every variable a render request must bind: declared names plus
    /// placeholders found in the body, in first-appearance order
    pub required_variables: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl Template {
    /// Build a template, rejecting bad names and malformed bodies.
    pub fn new(
        name: impl Into<String>,
        body: impl Into<String>,
        declared_variables: Vec<String>,
        description: Option<String>,
    ) -> TemplateResult<Self> {
        let name = name.into();
        let body = body.into();

        validate_name(&name)?;

        if body.len() > MAX_BODY_LEN {
            return Err(TemplateError::InvalidTemplate(format!(
                "Body must be at most {} bytes",
                MAX_BODY_LEN
            )));
        }

        let mut required_variables = Vec::new();
        for declared in declared_variables {
            let declared = declared.trim().to_string();
            if !is_valid_variable_name(&declared) {
                return Err(TemplateError::InvalidTemplate(format!(
                    "invalid variable name `{}`",
                    declared
                )));
            }
            if !required_variables.contains(&declared) {
                required_variables.push(declared);
            }
        }
        for found in placeholders(&body)? {
            if !required_variables.contains(&found) {
                required_variables.push(found);
            }
        }

        Ok(Self {
            id: Uuid::new_v4(),
            name,
            body,
            required_variables,
            description,
            created_at: Utc::now(),
        })
    }
}

fn validate_name(name: &str) -> TemplateResult<()> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(TemplateError::InvalidName(format!(
            "Name must be 1-{} characters",
            MAX_NAME_LEN
        )));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(TemplateError::InvalidName(
            "Name must contain only alphanumeric, dash, underscore or dot".to_string(),
        ));
    }

    Ok(())
}

/// Request to create a new template
#[derive(Debug, Deserialize)]
pub struct CreateTemplateRequest {
    pub name: String,

    pub body: String,

    /// Variables required in addition to those found in the body
    #[serde(default, alias = "required_variables")]
    pub variables: Vec<String>,

    pub description: Option<String>,
}

impl TryFrom<CreateTemplateRequest> for Template {
    type Error = TemplateError;

    fn try_from(req: CreateTemplateRequest) -> TemplateResult<Self> {
        Template::new(req.name, req.body, req.variables, req.description)
    }
}

/// Response for listing templates
#[derive(Debug, Serialize)]
pub struct TemplateListResponse {
    pub templates: Vec<Template>,
    pub total: usize,
}
