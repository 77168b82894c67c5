//! Template storage with CRUD operations

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use super::postgres_store::PostgresTemplateStore;
use super::types::{Template, TemplateError, TemplateResult};
use crate::postgres::PostgresPool;

/// Storage for templates.
///
/// Templates are immutable once created; a queued job carries its own
/// rendered text, so deletion never affects work already enqueued.
#[async_trait]
pub trait TemplateRepository: Send + Sync {
    /// Backend type identifier
    fn backend_type(&self) -> &'static str;

    /// Store a new template. Names are unique.
    async fn create(&self, template: Template) -> TemplateResult<Template>;

    /// Resolve a template by its name.
    async fn get_by_name(&self, name: &str) -> TemplateResult<Template>;

    /// Delete a template by id, immediately and unconditionally.
    async fn delete(&self, id: Uuid) -> TemplateResult<()>;

    /// All templates, oldest first.
    async fn list(&self) -> TemplateResult<Vec<Template>>;
}

/// In-memory template storage keyed by name
pub struct MemoryTemplateStore {
    templates: DashMap<String, Template>,
}

impl Default for MemoryTemplateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self {
            templates: DashMap::new(),
        }
    }

    pub fn count(&self) -> usize {
        self.templates.len()
    }
}

#[async_trait]
impl TemplateRepository for MemoryTemplateStore {
    fn backend_type(&self) -> &'static str {
        "memory"
    }

    async fn create(&self, template: Template) -> TemplateResult<Template> {
        match self.templates.entry(template.name.clone()) {
            Entry::Occupied(_) => Err(TemplateError::AlreadyExists(template.name)),
            Entry::Vacant(slot) => {
                slot.insert(template.clone());
                Ok(template)
            }
        }
    }

    async fn get_by_name(&self, name: &str) -> TemplateResult<Template> {
        self.templates
            .get(name)
            .map(|t| t.clone())
            .ok_or_else(|| TemplateError::NotFound(name.to_string()))
    }

    async fn delete(&self, id: Uuid) -> TemplateResult<()> {
        let name = self
            .templates
            .iter()
            .find(|entry| entry.value().id == id)
            .map(|entry| entry.key().clone())
            .ok_or_else(|| TemplateError::NotFound(id.to_string()))?;

        self.templates
            .remove_if(&name, |_, t| t.id == id)
            .map(|_| ())
            .ok_or_else(|| TemplateError::NotFound(id.to_string()))
    }

    async fn list(&self) -> TemplateResult<Vec<Template>> {
        let mut templates: Vec<Template> = self
            .templates
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        templates.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(templates)
    }
}

/// Create the template store selected by `storage.backend`.
pub fn create_template_store(
    backend: &str,
    postgres_pool: Option<PostgresPool>,
) -> Arc<dyn TemplateRepository> {
    match (backend, postgres_pool) {
        ("postgres", Some(pool)) => {
            tracing::info!(backend = "postgres", "Creating PostgreSQL template store");
            Arc::new(PostgresTemplateStore::new(pool))
        }
        ("postgres", None) => {
            tracing::warn!(
                "PostgreSQL template store requested but no pool provided, falling back to memory"
            );
            Arc::new(MemoryTemplateStore::new())
        }
        _ => {
            tracing::info!(backend = "memory", "Creating memory template store");
            Arc::new(MemoryTemplateStore::new())
        }
    }
}
