//! # Idempotent event consumers
//!
//! Event callbacks are delivered at least once: the outbox retries until the consumer
//! acknowledges, and operators can replay whole time ranges. Consumers that apply deltas
//! (storage used, video counts) must therefore recognise an event they have already
//! applied. [`IdempotencyGuard`] tracks processed event ids per consumer in a
//! [`ProcessedEventStore`].
//!
//! ## Processing model
//!
//! ```text
//! POST /storage/events ──▶ IdempotencyGuard::process_if_new("storage", eventId)
//!                               │ claim "storage:<eventId>"
//!                     claimed ◀─┴─▶ already present → AlreadyProcessed (ack, skip)
//!                        │
//!                  run handler ──▶ Ok  → Success (claim kept)
//!                                  Err → Failed  (claim released, sender retries)
//! ```
//!
//! The key is claimed before the handler runs, so two concurrent deliveries of one event
//! cannot both apply it. A failed handler releases its claim so the retry is processed.
//!
//! ## Usage
//!
//! ```ignore
//! use idempotent_consumer::{IdempotencyGuard, InMemoryProcessedEventStore, ProcessingResult};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let guard = IdempotencyGuard::new(
//!     Arc::new(InMemoryProcessedEventStore::new()),
//!     Duration::from_secs(7 * 86400),
//! );
//!
//! match guard.process_if_new("storage", &event_id, || apply(event)).await? {
//!     ProcessingResult::Success | ProcessingResult::AlreadyProcessed => ack(),
//!     ProcessingResult::Failed(err) => fail(err),
//! }
//! ```

use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

mod error;
mod store;

pub use error::{IdempotencyError, IdempotencyResult};
pub use store::{InMemoryProcessedEventStore, ProcessedEventStore, SqlxProcessedEventStore};

/// Longest key the `processed_events` table accepts.
pub const MAX_KEY_LEN: usize = 255;

/// Result of processing an event with idempotency check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingResult {
    /// Event was processed successfully (first time)
    Success,

    /// Event was already processed before (duplicate)
    AlreadyProcessed,

    /// Event processing failed with error message
    Failed(String),
}

impl ProcessingResult {
    /// Either processed now or earlier.
    pub fn is_ok(&self) -> bool {
        matches!(
            self,
            ProcessingResult::Success | ProcessingResult::AlreadyProcessed
        )
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ProcessingResult::Failed(_))
    }
}

/// Idempotency guard shared by every consumer of a service.
///
/// Cheap to clone; keys are namespaced by consumer so the storage and usage consumers
/// each apply the same event once.
#[derive(Clone)]
pub struct IdempotencyGuard {
    store: Arc<dyn ProcessedEventStore>,
    retention_duration: Duration,
}

impl IdempotencyGuard {
    pub fn new(store: Arc<dyn ProcessedEventStore>, retention_duration: Duration) -> Self {
        Self {
            store,
            retention_duration,
        }
    }

    /// Key stored for `(consumer, event_id)`.
    pub fn key(consumer: &str, event_id: &str) -> String {
        format!("{}:{}", consumer, event_id)
    }

    pub async fn is_processed(&self, consumer: &str, event_id: &str) -> IdempotencyResult<bool> {
        let key = Self::validated_key(consumer, event_id)?;
        let exists = self.store.contains(&key).await?;
        if exists {
            debug!(key = %key, "Event already processed");
        }
        Ok(exists)
    }

    /// Run `f` unless `(consumer, event_id)` was processed before.
    ///
    /// Errors from `f` are reported as [`ProcessingResult::Failed`]; only store failures
    /// surface as `Err`.
    pub async fn process_if_new<F, Fut, E>(
        &self,
        consumer: &str,
        event_id: &str,
        f: F,
    ) -> IdempotencyResult<ProcessingResult>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: std::fmt::Display,
    {
        let key = Self::validated_key(consumer, event_id)?;
        let metadata = serde_json::json!({ "consumer": consumer });

        if !self.store.claim(&key, Some(metadata)).await? {
            debug!(key = %key, "Duplicate event skipped");
            return Ok(ProcessingResult::AlreadyProcessed);
        }

        match f().await {
            Ok(()) => {
                debug!(key = %key, "Event processed");
                Ok(ProcessingResult::Success)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Event processing failed, releasing claim");
                self.store.release(&key).await?;
                Ok(ProcessingResult::Failed(e.to_string()))
            }
        }
    }

    /// Delete keys older than the retention window. Call periodically.
    pub async fn cleanup_old_events(&self) -> IdempotencyResult<u64> {
        let retention = chrono::Duration::from_std(self.retention_duration).map_err(|e| {
            IdempotencyError::InvalidRetention(e.to_string())
        })?;
        let cutoff_time = Utc::now() - retention;

        let deleted_count = self.store.delete_before(cutoff_time).await?;
        if deleted_count > 0 {
            info!(
                deleted_count = deleted_count,
                cutoff_time = %cutoff_time,
                "Cleaned up old processed events"
            );
        }
        Ok(deleted_count)
    }

    /// Spawn a background loop running [`cleanup_old_events`](Self::cleanup_old_events).
    pub fn spawn_cleanup(&self, every: Duration) -> tokio::task::JoinHandle<()> {
        let guard = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                if let Err(e) = guard.cleanup_old_events().await {
                    warn!(error = %e, "Processed events cleanup failed");
                }
            }
        })
    }

    fn validated_key(consumer: &str, event_id: &str) -> IdempotencyResult<String> {
        if event_id.is_empty() {
            return Err(IdempotencyError::EmptyEventId);
        }

        let key = Self::key(consumer, event_id);
        if key.len() > MAX_KEY_LEN {
            return Err(IdempotencyError::KeyTooLong {
                len: key.len(),
                max: MAX_KEY_LEN,
            });
        }

        Ok(key)
    }
}
