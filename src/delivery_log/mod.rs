//! Append-only audit log of send attempts.
//!
//! The worker writes one entry per claimed job, after the final attempt.
//! The read side lists entries newest first, in pages.

mod memory;
mod postgres;
mod types;

use std::sync::Arc;

use async_trait::async_trait;

pub use memory::MemoryDeliveryLog;
pub use postgres::PostgresDeliveryLog;
pub use types::{
    DeliveryLogEntry, DeliveryLogError, DeliveryLogPage, DeliveryOutcome, ListQuery,
    DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, REDACTED_PAYLOAD,
};

use crate::postgres::PostgresPool;

#[async_trait]
pub trait DeliveryLog: Send + Sync {
    /// Backend type identifier
    fn backend_type(&self) -> &'static str;

    async fn append(&self, entry: DeliveryLogEntry) -> Result<(), DeliveryLogError>;

    /// Entries newest first. Callers pass already-clamped bounds.
    async fn list(&self, limit: usize, offset: usize) -> Result<DeliveryLogPage, DeliveryLogError>;
}

/// Create the delivery log selected by `storage.backend`.
pub fn create_delivery_log(
    backend: &str,
    postgres_pool: Option<PostgresPool>,
) -> Arc<dyn DeliveryLog> {
    match (backend, postgres_pool) {
        ("postgres", Some(pool)) => {
            tracing::info!(backend = "postgres", "Creating PostgreSQL delivery log");
            Arc::new(PostgresDeliveryLog::new(pool))
        }
        ("postgres", None) => {
            tracing::warn!(
                "PostgreSQL delivery log requested but no pool provided, falling back to memory"
            );
            Arc::new(MemoryDeliveryLog::new())
        }
        _ => {
            tracing::info!(backend = "memory", "Creating memory delivery log");
            Arc::new(MemoryDeliveryLog::new())
        }
    }
}
