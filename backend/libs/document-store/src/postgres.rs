//! PostgreSQL adapter. All collections share one `documents` table keyed by
//! `(collection, id)` with the body stored as JSONB.

use crate::{Document, DocumentCollection, Filter, StoreError, StoreResult, Versioned};
use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use std::marker::PhantomData;
use tracing::{debug, info};

/// Create the `documents` table and its containment index if missing.
pub async fn ensure_schema(pool: &PgPool) -> StoreResult<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            collection  TEXT        NOT NULL,
            id          TEXT        NOT NULL,
            version     BIGINT      NOT NULL,
            body        JSONB       NOT NULL,
            updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            PRIMARY KEY (collection, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_documents_body
            ON documents USING GIN (body jsonb_path_ops)
        "#,
    )
    .execute(pool)
    .await?;

    info!("Document store schema ready");
    Ok(())
}

/// One collection in the shared `documents` table.
pub struct PgCollection<T: Document> {
    pool: PgPool,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Document> PgCollection<T> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _marker: PhantomData,
        }
    }

    fn decode(row: &sqlx::postgres::PgRow) -> StoreResult<Versioned<T>> {
        let version: i64 = row.try_get("version")?;
        let Json(doc): Json<T> = row.try_get("body")?;
        Ok(Versioned {
            version: version as u64,
            doc,
        })
    }
}

#[async_trait]
impl<T: Document> DocumentCollection<T> for PgCollection<T> {
    async fn get(&self, id: &str) -> StoreResult<Option<Versioned<T>>> {
        let row = sqlx::query(
            r#"
            SELECT version, body FROM documents
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(T::COLLECTION)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::decode).transpose()
    }

    async fn find(&self, filter: &Filter) -> StoreResult<Vec<Versioned<T>>> {
        let rows = sqlx::query(
            r#"
            SELECT version, body FROM documents
            WHERE collection = $1 AND body @> $2
            ORDER BY id
            "#,
        )
        .bind(T::COLLECTION)
        .bind(Json(filter.as_value()))
        .fetch_all(&self.pool)
        .await?;

        debug!(collection = T::COLLECTION, count = rows.len(), "Documents found");
        rows.iter().map(Self::decode).collect()
    }

    async fn insert(&self, doc: T) -> StoreResult<Versioned<T>> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO documents (collection, id, version, body, updated_at)
            VALUES ($1, $2, 1, $3, NOW())
            ON CONFLICT (collection, id) DO NOTHING
            RETURNING version
            "#,
        )
        .bind(T::COLLECTION)
        .bind(doc.id())
        .bind(Json(&doc))
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(_) => Ok(Versioned { version: 1, doc }),
            None => Err(StoreError::AlreadyExists {
                collection: T::COLLECTION,
                id: doc.id().to_string(),
            }),
        }
    }

    async fn replace(&self, doc: T, expected_version: u64) -> StoreResult<Versioned<T>> {
        let updated = sqlx::query(
            r#"
            UPDATE documents
            SET body = $3, version = version + 1, updated_at = NOW()
            WHERE collection = $1 AND id = $2 AND version = $4
            RETURNING version
            "#,
        )
        .bind(T::COLLECTION)
        .bind(doc.id())
        .bind(Json(&doc))
        .bind(expected_version as i64)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = updated {
            let version: i64 = row.try_get("version")?;
            return Ok(Versioned {
                version: version as u64,
                doc,
            });
        }

        // Nothing updated: tell a stale version apart from a missing document.
        let id = doc.id().to_string();
        match self.get(&id).await? {
            Some(_) => Err(StoreError::VersionConflict {
                collection: T::COLLECTION,
                id,
                expected: expected_version,
            }),
            None => Err(StoreError::NotFound {
                collection: T::COLLECTION,
                id,
            }),
        }
    }

    async fn delete(&self, id: &str) -> StoreResult<Option<T>> {
        let row = sqlx::query(
            r#"
            DELETE FROM documents
            WHERE collection = $1 AND id = $2
            RETURNING version, body
            "#,
        )
        .bind(T::COLLECTION)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row
            .as_ref()
            .map(Self::decode)
            .transpose()?
            .map(|stored| stored.doc))
    }

    async fn delete_many(&self, filter: &Filter) -> StoreResult<Vec<T>> {
        let rows = sqlx::query(
            r#"
            DELETE FROM documents
            WHERE collection = $1 AND body @> $2
            RETURNING version, body
            "#,
        )
        .bind(T::COLLECTION)
        .bind(Json(filter.as_value()))
        .fetch_all(&self.pool)
        .await?;

        debug!(collection = T::COLLECTION, count = rows.len(), "Documents deleted");
        rows.iter()
            .map(|row| Self::decode(row).map(|stored| stored.doc))
            .collect()
    }
}
