use crate::IdempotencyResult;
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use sqlx::PgPool;
use tracing::info;

/// Persistence for processed event keys.
#[async_trait]
pub trait ProcessedEventStore: Send + Sync {
    /// Record `key` if absent. Returns `true` when this call recorded it.
    async fn claim(&self, key: &str, metadata: Option<serde_json::Value>) -> IdempotencyResult<bool>;

    /// Forget `key` so the event can be processed again.
    async fn release(&self, key: &str) -> IdempotencyResult<()>;

    async fn contains(&self, key: &str) -> IdempotencyResult<bool>;

    /// Delete keys recorded before `cutoff`. Returns how many were deleted.
    async fn delete_before(&self, cutoff: DateTime<Utc>) -> IdempotencyResult<u64>;
}

/// PostgreSQL store in the `processed_events` table.
#[derive(Clone)]
pub struct SqlxProcessedEventStore {
    pool: PgPool,
}

impl SqlxProcessedEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create `processed_events` if missing.
    pub async fn ensure_schema(&self) -> IdempotencyResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS processed_events (
                event_id     VARCHAR(255) PRIMARY KEY,
                metadata     JSONB,
                processed_at TIMESTAMPTZ  NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_processed_events_processed_at
                ON processed_events (processed_at)
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("Processed events schema ready");
        Ok(())
    }
}

#[async_trait]
impl ProcessedEventStore for SqlxProcessedEventStore {
    async fn claim(&self, key: &str, metadata: Option<serde_json::Value>) -> IdempotencyResult<bool> {
        // ON CONFLICT DO NOTHING: concurrent claimers see 0 rows affected.
        let result = sqlx::query(
            r#"
            INSERT INTO processed_events (event_id, metadata, processed_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(key)
        .bind(&metadata)
        .execute(&self.pool)
        .await
        .context("Failed to mark event as processed")?;

        Ok(result.rows_affected() > 0)
    }

    async fn release(&self, key: &str) -> IdempotencyResult<()> {
        sqlx::query("DELETE FROM processed_events WHERE event_id = $1")
            .bind(key)
            .execute(&self.pool)
            .await
            .context("Failed to release processed event")?;
        Ok(())
    }

    async fn contains(&self, key: &str) -> IdempotencyResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM processed_events WHERE event_id = $1
            )
            "#,
        )
        .bind(key)
        .fetch_one(&self.pool)
        .await
        .context("Failed to check if event is processed")?;

        Ok(exists)
    }

    async fn delete_before(&self, cutoff: DateTime<Utc>) -> IdempotencyResult<u64> {
        let result = sqlx::query("DELETE FROM processed_events WHERE processed_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .context("Failed to cleanup old events")?;

        Ok(result.rows_affected())
    }
}

/// In-process store for tests and `STORE_BACKEND=memory`.
#[derive(Default)]
pub struct InMemoryProcessedEventStore {
    keys: DashMap<String, DateTime<Utc>>,
}

impl InMemoryProcessedEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[async_trait]
impl ProcessedEventStore for InMemoryProcessedEventStore {
    async fn claim(&self, key: &str, _metadata: Option<serde_json::Value>) -> IdempotencyResult<bool> {
        match self.keys.entry(key.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(Utc::now());
                Ok(true)
            }
        }
    }

    async fn release(&self, key: &str) -> IdempotencyResult<()> {
        self.keys.remove(key);
        Ok(())
    }

    async fn contains(&self, key: &str) -> IdempotencyResult<bool> {
        Ok(self.keys.contains_key(key))
    }

    async fn delete_before(&self, cutoff: DateTime<Utc>) -> IdempotencyResult<u64> {
        let before = self.keys.len();
        self.keys.retain(|_, processed_at| *processed_at >= cutoff);
        Ok((before - self.keys.len()) as u64)
    }
}
