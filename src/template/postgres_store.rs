//! PostgreSQL-backed template storage.
//!
//! Table `whatsapp_templates` (see `migrations/001_init.sql`); the
//! unique constraint on `name` enforces one template per name.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::Row;
use uuid::Uuid;

use super::store::TemplateRepository;
use super::types::{Template, TemplateError, TemplateResult};
use crate::postgres::PostgresPool;

pub struct PostgresTemplateStore {
    pool: PostgresPool,
}

impl PostgresTemplateStore {
    pub fn new(pool: PostgresPool) -> Self {
        Self { pool }
    }
}

fn row_to_template(row: &PgRow) -> Result<Template, sqlx::Error> {
    let required: Json<Vec<String>> = row.try_get("required_variables")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;

    Ok(Template {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        body: row.try_get("body")?,
        required_variables: required.0,
        description: row.try_get("description")?,
        created_at,
    })
}

#[async_trait]
impl TemplateRepository for PostgresTemplateStore {
    fn backend_type(&self) -> &'static str {
        "postgres"
    }

    async fn create(&self, template: Template) -> TemplateResult<Template> {
        let inserted: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO whatsapp_templates (id, name, body, required_variables, description, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (name) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(template.id)
        .bind(&template.name)
        .bind(&template.body)
        .bind(Json(&template.required_variables))
        .bind(&template.description)
        .bind(template.created_at)
        .fetch_optional(self.pool.pool())
        .await?;

        match inserted {
            Some(_) => {
                tracing::debug!(template = %template.name, "Template stored in PostgreSQL");
                Ok(template)
            }
            None => Err(TemplateError::AlreadyExists(template.name)),
        }
    }

    async fn get_by_name(&self, name: &str) -> TemplateResult<Template> {
        let row = sqlx::query(
            r#"
            SELECT id, name, body, required_variables, description, created_at
            FROM whatsapp_templates
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(self.pool.pool())
        .await?;

        match row {
            Some(row) => Ok(row_to_template(&row)?),
            None => Err(TemplateError::NotFound(name.to_string())),
        }
    }

    async fn delete(&self, id: Uuid) -> TemplateResult<()> {
        let result = sqlx::query("DELETE FROM whatsapp_templates WHERE id = $1")
            .bind(id)
            .execute(self.pool.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(TemplateError::NotFound(id.to_string()));
        }

        Ok(())
    }

    async fn list(&self) -> TemplateResult<Vec<Template>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, body, required_variables, description, created_at
            FROM whatsapp_templates
            ORDER BY created_at ASC, name ASC
            "#,
        )
        .fetch_all(self.pool.pool())
        .await?;

        rows.iter()
            .map(|row| row_to_template(row).map_err(TemplateError::from))
            .collect()
    }
}
