//! PostgreSQL implementation of the correlation store

use crate::domain::correlation::{CallRecord, CorrelationStore};
use crate::domain::shared::{CorrelationId, DomainError, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{debug, error};

pub struct PgCorrelationStore {
    pool: PgPool,
}

impl PgCorrelationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Delete expired records, returning how many were removed
    pub async fn purge_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM call_correlations WHERE expires_at <= now()")
            .execute(&self.pool)
            .await
            .map_err(|e| store_error("purge expired records", e))?;

        Ok(result.rows_affected())
    }
}

fn store_error(operation: &str, e: sqlx::Error) -> DomainError {
    error!("Failed to {}: {}", operation, e);
    DomainError::Store(format!("{}: {}", operation, e))
}

fn expiry_after(ttl: Duration) -> chrono::DateTime<Utc> {
    let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::hours(1));
    Utc::now() + ttl
}

#[async_trait]
impl CorrelationStore for PgCorrelationStore {
    async fn put(&self, key: &CorrelationId, patch: CallRecord, ttl: Duration) -> Result<CallRecord> {
        debug!("Writing correlation record: {}", key);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| store_error("begin transaction", e))?;

        // Row lock serialises writers of an existing key; two writers creating the
        // same key concurrently still race and the last upsert wins.
        let existing: Option<Json<CallRecord>> = sqlx::query_scalar(
            r#"
            SELECT record FROM call_correlations
            WHERE key = $1 AND expires_at > now()
            FOR UPDATE
            "#,
        )
        .bind(key.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| store_error("read correlation record", e))?;

        let mut record = existing.map(|Json(record)| record).unwrap_or_default();
        record.merge(patch);

        sqlx::query(
            r#"
            INSERT INTO call_correlations (key, record, expires_at, updated_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (key) DO UPDATE
            SET record = EXCLUDED.record,
                expires_at = EXCLUDED.expires_at,
                updated_at = now()
            "#,
        )
        .bind(key.as_str())
        .bind(Json(&record))
        .bind(expiry_after(ttl))
        .execute(&mut *tx)
        .await
        .map_err(|e| store_error("write correlation record", e))?;

        tx.commit()
            .await
            .map_err(|e| store_error("commit correlation record", e))?;

        debug!("Correlation record written: {}", key);
        Ok(record)
    }

    async fn get(&self, key: &CorrelationId) -> Result<Option<CallRecord>> {
        let record: Option<Json<CallRecord>> = sqlx::query_scalar(
            "SELECT record FROM call_correlations WHERE key = $1 AND expires_at > now()",
        )
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_error("read correlation record", e))?;

        Ok(record.map(|Json(record)| record))
    }

    async fn delete(&self, key: &CorrelationId) -> Result<()> {
        debug!("Evicting correlation record: {}", key);

        sqlx::query("DELETE FROM call_correlations WHERE key = $1")
            .bind(key.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| store_error("evict correlation record", e))?;

        Ok(())
    }

    async fn size(&self) -> Result<usize> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM call_correlations WHERE expires_at > now()")
                .fetch_one(&self.pool)
                .await
                .map_err(|e| store_error("count correlation records", e))?;

        Ok(count.max(0) as usize)
    }
}
