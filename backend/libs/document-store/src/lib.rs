//! # Document store
//!
//! Collaborator interface for the document database every Inkwell service writes to,
//! plus two adapters:
//!
//! - [`MemoryCollection`]: `DashMap`-backed, used by tests and `STORE_BACKEND=memory`
//! - [`PgCollection`]: PostgreSQL JSONB table shared by all collections
//!
//! Every document carries a `version` that increases by one on each write. Writers use
//! [`DocumentCollection::replace`] with the version they read; a concurrent writer makes
//! the replace fail with [`StoreError::VersionConflict`]. The [`modify`] helper wraps the
//! read-validate-write cycle and re-runs it on conflict, so validation always sees the
//! state it is about to overwrite.
//!
//! ```rust,ignore
//! let updated = document_store::modify(galleries.as_ref(), &user_id, |gallery| {
//!     if size > gallery.free_storage {
//!         return Err(AppError::BadRequest("Insufficient storage space".into()));
//!     }
//!     gallery.free_storage -= size;
//!     Ok(())
//! })
//! .await?;
//! ```

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

mod error;
mod memory;
mod postgres;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryCollection;
pub use postgres::{ensure_schema, PgCollection};

/// Which adapter a service runs on, from `STORE_BACKEND` (`memory` or `postgres`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    Memory,
    #[default]
    Postgres,
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "in-memory" => Ok(StoreBackend::Memory),
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            other => Err(format!("unknown STORE_BACKEND: {}", other)),
        }
    }
}

impl StoreBackend {
    pub fn from_env() -> Result<Self, String> {
        match std::env::var("STORE_BACKEND") {
            Ok(value) => value.parse(),
            Err(_) => Ok(StoreBackend::default()),
        }
    }
}

/// Attempts [`modify`] makes before reporting [`StoreError::ContentionExhausted`].
pub const MAX_MODIFY_ATTEMPTS: u32 = 8;

/// A type that can be stored in a [`DocumentCollection`].
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection name, unique per document type.
    const COLLECTION: &'static str;

    fn id(&self) -> &str;
}

/// A document together with the version it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub version: u64,
    pub doc: T,
}

/// Containment filter over the serialized form of a document.
///
/// Semantics follow PostgreSQL's `@>` operator: an object matches when every field of the
/// filter is contained in the document, and an array field matches when every element of
/// the filter array appears in the document array.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter(Map<String, Value>);

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Field equals value (field name as serialized, i.e. camelCase).
    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.0.insert(field.to_string(), value.into());
        self
    }

    /// Array field contains the value.
    pub fn contains(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.0
            .insert(field.to_string(), Value::Array(vec![value.into()]));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    /// Whether a serialized document satisfies this filter.
    pub fn matches(&self, doc: &Value) -> bool {
        json_contains(doc, &self.as_value())
    }
}

/// `@>`-style containment check on JSON values.
pub fn json_contains(doc: &Value, pattern: &Value) -> bool {
    match (doc, pattern) {
        (Value::Object(doc), Value::Object(pattern)) => pattern.iter().all(|(key, expected)| {
            doc.get(key)
                .map(|actual| json_contains(actual, expected))
                .unwrap_or(false)
        }),
        (Value::Array(doc), Value::Array(pattern)) => pattern
            .iter()
            .all(|expected| doc.iter().any(|actual| json_contains(actual, expected))),
        (actual, expected) => actual == expected,
    }
}

/// Document store collaborator.
///
/// No multi-document transactions: every method touches exactly one document, except
/// [`find`](Self::find) and [`delete_many`](Self::delete_many).
#[async_trait]
pub trait DocumentCollection<T: Document>: Send + Sync {
    async fn get(&self, id: &str) -> StoreResult<Option<Versioned<T>>>;

    /// All documents matching the filter, ordered by id.
    async fn find(&self, filter: &Filter) -> StoreResult<Vec<Versioned<T>>>;

    /// Insert a new document at version 1. Fails with `AlreadyExists` on duplicate id.
    async fn insert(&self, doc: T) -> StoreResult<Versioned<T>>;

    /// Overwrite a document if it is still at `expected_version`.
    async fn replace(&self, doc: T, expected_version: u64) -> StoreResult<Versioned<T>>;

    /// Remove a document, returning it if it existed.
    async fn delete(&self, id: &str) -> StoreResult<Option<T>>;

    /// Remove every matching document, returning what was removed.
    async fn delete_many(&self, filter: &Filter) -> StoreResult<Vec<T>>;

    /// Create-if-absent. Returns `true` when this call created the document.
    async fn insert_if_absent(&self, doc: T) -> StoreResult<bool> {
        match self.insert(doc).await {
            Ok(_) => Ok(true),
            Err(StoreError::AlreadyExists { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn find_one(&self, filter: &Filter) -> StoreResult<Option<Versioned<T>>> {
        Ok(self.find(filter).await?.into_iter().next())
    }
}

/// Atomic read-validate-write of one document.
///
/// Reads the document, applies `f` to a copy and writes it back guarded by the version
/// that was read. On a version conflict the whole cycle runs again against fresh state,
/// so `f` may be called more than once and must not have side effects outside the
/// document. Returns `Ok(None)` if the document does not exist.
pub async fn modify<T, R, E, F>(
    collection: &dyn DocumentCollection<T>,
    id: &str,
    mut f: F,
) -> Result<Option<(Versioned<T>, R)>, E>
where
    T: Document,
    E: From<StoreError>,
    F: FnMut(&mut T) -> Result<R, E>,
{
    for attempt in 1..=MAX_MODIFY_ATTEMPTS {
        let Some(current) = collection.get(id).await? else {
            return Ok(None);
        };

        let mut doc = current.doc;
        let output = f(&mut doc)?;

        match collection.replace(doc, current.version).await {
            Ok(updated) => return Ok(Some((updated, output))),
            Err(StoreError::VersionConflict { .. }) => {
                debug!(
                    collection = T::COLLECTION,
                    id = %id,
                    attempt,
                    "Version conflict, retrying read-modify-write"
                );
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(StoreError::ContentionExhausted {
        collection: T::COLLECTION,
        id: id.to_string(),
        attempts: MAX_MODIFY_ATTEMPTS,
    }
    .into())
}
