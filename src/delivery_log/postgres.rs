//! PostgreSQL delivery log (table `message_logs`)

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::Row;

use super::types::{DeliveryLogEntry, DeliveryLogError, DeliveryLogPage};
use super::DeliveryLog;
use crate::postgres::PostgresPool;

pub struct PostgresDeliveryLog {
    pool: PostgresPool,
}

impl PostgresDeliveryLog {
    pub fn new(pool: PostgresPool) -> Self {
        Self { pool }
    }
}

fn row_to_entry(row: &PgRow) -> Result<DeliveryLogEntry, DeliveryLogError> {
    let outcome: String = row.try_get("outcome")?;
    let attempts: i32 = row.try_get("attempts")?;

    Ok(DeliveryLogEntry {
        id: row.try_get("id")?,
        job_id: row.try_get("job_id")?,
        recipient: row.try_get("recipient")?,
        source: row.try_get("source")?,
        payload: row.try_get("payload")?,
        outcome: outcome.parse()?,
        message_id: row.try_get("message_id")?,
        error: row.try_get("error")?,
        attempts: attempts.max(0) as u32,
        enqueued_at: row.try_get("enqueued_at")?,
        logged_at: row.try_get("logged_at")?,
    })
}

#[async_trait]
impl DeliveryLog for PostgresDeliveryLog {
    fn backend_type(&self) -> &'static str {
        "postgres"
    }

    async fn append(&self, entry: DeliveryLogEntry) -> Result<(), DeliveryLogError> {
        sqlx::query(
            r#"
            INSERT INTO message_logs
                (id, job_id, recipient, source, payload, outcome, message_id, error,
                 attempts, enqueued_at, logged_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(entry.id)
        .bind(entry.job_id)
        .bind(&entry.recipient)
        .bind(&entry.source)
        .bind(&entry.payload)
        .bind(entry.outcome.as_str())
        .bind(&entry.message_id)
        .bind(&entry.error)
        .bind(i32::try_from(entry.attempts).unwrap_or(i32::MAX))
        .bind(entry.enqueued_at)
        .bind(entry.logged_at)
        .execute(self.pool.pool())
        .await?;

        Ok(())
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<DeliveryLogPage, DeliveryLogError> {
        let rows = sqlx::query(
            r#"
            SELECT id, job_id, recipient, source, payload, outcome, message_id, error,
                   attempts, enqueued_at, logged_at
            FROM message_logs
            ORDER BY logged_at DESC, id DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(self.pool.pool())
        .await?;

        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM message_logs")
            .fetch_one(self.pool.pool())
            .await?;

        let entries = rows
            .iter()
            .map(row_to_entry)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DeliveryLogPage {
            entries,
            total: total.max(0) as usize,
            limit,
            offset,
        })
    }
}
