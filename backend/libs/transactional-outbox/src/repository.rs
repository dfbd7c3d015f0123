use crate::{OutboxError, OutboxEvent, OutboxRepository, OutboxResult};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// PostgreSQL outbox in the `outbox_events` table.
pub struct SqlxOutboxRepository {
    pool: PgPool,
}

impl SqlxOutboxRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create `outbox_events` and its pending index if missing.
    pub async fn ensure_schema(&self) -> OutboxResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS outbox_events (
                id              UUID        PRIMARY KEY,
                event_id        UUID        NOT NULL,
                destination     TEXT        NOT NULL,
                event_type      TEXT        NOT NULL,
                aggregate_id    TEXT        NOT NULL,
                payload         JSONB       NOT NULL,
                metadata        JSONB,
                created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                published_at    TIMESTAMPTZ,
                retry_count     INTEGER     NOT NULL DEFAULT 0,
                last_error      TEXT,
                last_attempt_at TIMESTAMPTZ
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_outbox_events_pending
                ON outbox_events (retry_count, created_at)
                WHERE published_at IS NULL
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("Outbox schema ready");
        Ok(())
    }

    /// Re-queue everything created since `ts`, delivered or not.
    pub async fn replay_since(&self, ts: DateTime<Utc>) -> OutboxResult<u64> {
        let res = sqlx::query(
            r#"
            UPDATE outbox_events
            SET published_at = NULL,
                retry_count = 0,
                last_error = NULL,
                last_attempt_at = NULL
            WHERE created_at >= $1
            "#,
        )
        .bind(ts)
        .execute(&self.pool)
        .await
        .context("Failed to replay events since timestamp")?;

        Ok(res.rows_affected())
    }

    /// Re-queue every record of one logical event.
    pub async fn replay_event(&self, event_id: Uuid) -> OutboxResult<u64> {
        let res = sqlx::query(
            r#"
            UPDATE outbox_events
            SET published_at = NULL,
                retry_count = 0,
                last_error = NULL,
                last_attempt_at = NULL
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .execute(&self.pool)
        .await
        .context("Failed to replay event")?;

        Ok(res.rows_affected())
    }

    /// Re-queue records parked at or above `max_retries`.
    pub async fn replay_parked(&self, max_retries: i32) -> OutboxResult<u64> {
        let res = sqlx::query(
            r#"
            UPDATE outbox_events
            SET retry_count = 0,
                last_error = NULL,
                last_attempt_at = NULL
            WHERE published_at IS NULL AND retry_count >= $1
            "#,
        )
        .bind(max_retries)
        .execute(&self.pool)
        .await
        .context("Failed to replay parked events")?;

        Ok(res.rows_affected())
    }

    fn decode(row: &PgRow) -> OutboxResult<OutboxEvent> {
        let destination: String = row.try_get("destination")?;
        Ok(OutboxEvent {
            id: row.try_get("id")?,
            event_id: row.try_get("event_id")?,
            destination: destination
                .parse()
                .map_err(|_| OutboxError::UnknownDestination(destination.clone()))?,
            event_type: row.try_get("event_type")?,
            aggregate_id: row.try_get("aggregate_id")?,
            payload: row.try_get("payload")?,
            metadata: row.try_get("metadata")?,
            created_at: row.try_get("created_at")?,
            published_at: row.try_get("published_at")?,
            retry_count: row.try_get("retry_count")?,
            last_error: row.try_get("last_error")?,
            last_attempt_at: row.try_get("last_attempt_at")?,
        })
    }
}

#[async_trait]
impl OutboxRepository for SqlxOutboxRepository {
    async fn insert(&self, event: &OutboxEvent) -> OutboxResult<()> {
        sqlx::query(
            r#"
            INSERT INTO outbox_events (
                id,
                event_id,
                destination,
                event_type,
                aggregate_id,
                payload,
                metadata,
                created_at,
                published_at,
                retry_count,
                last_error,
                last_attempt_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(event.id)
        .bind(event.event_id)
        .bind(event.destination.as_str())
        .bind(&event.event_type)
        .bind(&event.aggregate_id)
        .bind(&event.payload)
        .bind(&event.metadata)
        .bind(event.created_at)
        .bind(event.published_at)
        .bind(event.retry_count)
        .bind(&event.last_error)
        .bind(event.last_attempt_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert event into outbox")?;

        debug!(
            record_id = %event.id,
            event_id = %event.event_id,
            event_type = %event.event_type,
            destination = %event.destination,
            "Event inserted into outbox"
        );

        Ok(())
    }

    async fn get_unpublished(&self, limit: i32) -> OutboxResult<Vec<OutboxEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT
                id,
                event_id,
                destination,
                event_type,
                aggregate_id,
                payload,
                metadata,
                created_at,
                published_at,
                retry_count,
                last_error,
                last_attempt_at
            FROM outbox_events
            WHERE published_at IS NULL
            ORDER BY retry_count ASC, created_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch unpublished events")?;

        let events = rows
            .iter()
            .map(Self::decode)
            .collect::<OutboxResult<Vec<_>>>()?;

        debug!(count = events.len(), "Fetched unpublished events");

        Ok(events)
    }

    async fn mark_published(&self, id: Uuid) -> OutboxResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE outbox_events
            SET published_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to mark event as published")?;

        if result.rows_affected() == 0 {
            warn!(record_id = %id, "Event not found when marking as published");
            return Err(OutboxError::RecordNotFound(id));
        }

        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> OutboxResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE outbox_events
            SET
                retry_count = retry_count + 1,
                last_error = $2,
                last_attempt_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await
        .context("Failed to mark event as failed")?;

        if result.rows_affected() == 0 {
            warn!(record_id = %id, "Event not found when marking as failed");
            return Err(OutboxError::RecordNotFound(id));
        }

        Ok(())
    }

    async fn pending_stats(&self) -> OutboxResult<(i64, i64)> {
        let rec = sqlx::query(
            r#"
            SELECT
                COUNT(*)::BIGINT AS pending,
                COALESCE(EXTRACT(EPOCH FROM (NOW() - MIN(created_at)))::BIGINT, 0) AS age_seconds
            FROM outbox_events
            WHERE published_at IS NULL
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to compute pending stats")?;

        let pending: i64 = rec.try_get("pending")?;
        let age: i64 = rec.try_get("age_seconds")?;
        Ok((pending, age))
    }
}
