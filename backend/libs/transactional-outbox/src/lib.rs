//! # Outbox for quota event callbacks
//!
//! Services never POST events to their siblings inline. The request handler commits its
//! own document, then writes one outbox record per destination through
//! [`EventPropagator`]. A background [`OutboxProcessor`] delivers the records over HTTP
//! and marks them published.
//!
//! Guarantees:
//! - **At-least-once delivery**: a record is retried until a destination acknowledges
//!   it, so consumers must deduplicate by `eventId`
//! - **Failure isolation**: a dead destination never fails the request that produced
//!   the event
//! - **Bounded retries**: failed records back off exponentially (2^n seconds, capped at
//!   five minutes) and are parked after `max_retries`, waiting for `outbox-cli replay`
//!
//! The outbox write follows the document commit rather than sharing its transaction; a
//! crash between the two loses that event.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use quota_events::{Destination, QuotaEvent, UserCreated};
//! use std::sync::Arc;
//! use std::time::Duration;
//! use transactional_outbox::{
//!     DestinationUrls, EventPropagator, HttpOutboxPublisher, OutboxProcessor,
//!     SqlxOutboxRepository,
//! };
//!
//! # async fn run(pool: sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
//! let repository = Arc::new(SqlxOutboxRepository::new(pool));
//! let publisher = Arc::new(HttpOutboxPublisher::new(
//!     DestinationUrls::from_env(),
//!     Duration::from_secs(5),
//! )?);
//!
//! let propagator = EventPropagator::new(repository.clone(), "blog-service");
//! let event = QuotaEvent::from(UserCreated {
//!     user_id: "u1".into(),
//!     username: "ada".into(),
//!     email: "ada@example.com".into(),
//! });
//! propagator.emit(&Destination::ALL, &event).await?;
//!
//! let processor = OutboxProcessor::new(repository, publisher, 100, Duration::from_secs(1), 8);
//! tokio::spawn(async move { processor.start().await });
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quota_events::Destination;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

mod error;
mod http;
mod memory;
pub mod metrics;
mod propagator;
mod repository;

pub use error::{OutboxError, OutboxResult};
pub use http::{DestinationUrls, HttpOutboxPublisher};
pub use memory::InMemoryOutboxRepository;
pub use propagator::EventPropagator;
pub use repository::SqlxOutboxRepository;

/// Ceiling for the delay between delivery attempts of one record.
pub const MAX_BACKOFF_SECS: u64 = 300;

/// One delivery of an event to one destination.
///
/// An event fanned out to three destinations produces three records sharing `event_id`;
/// each is delivered, retried and parked independently.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutboxEvent {
    /// Record id
    pub id: Uuid,

    /// Logical event id sent on the wire as `eventId`
    pub event_id: Uuid,

    pub destination: Destination,

    /// Wire `type`, e.g. "videoAdded"
    pub event_type: String,

    /// User the event is about
    pub aggregate_id: String,

    /// Wire `data`
    pub payload: serde_json::Value,

    /// Optional metadata (emitting service, etc.)
    pub metadata: Option<serde_json::Value>,

    pub created_at: DateTime<Utc>,

    /// None = not yet delivered
    pub published_at: Option<DateTime<Utc>>,

    /// Number of failed delivery attempts
    pub retry_count: i32,

    pub last_error: Option<String>,

    pub last_attempt_at: Option<DateTime<Utc>>,
}

impl OutboxEvent {
    pub fn new(
        event_id: Uuid,
        destination: Destination,
        event_type: impl Into<String>,
        aggregate_id: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_id,
            destination,
            event_type: event_type.into(),
            aggregate_id: aggregate_id.into(),
            payload,
            metadata: None,
            created_at: Utc::now(),
            published_at: None,
            retry_count: 0,
            last_error: None,
            last_attempt_at: None,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Wire envelope for this record.
    pub fn envelope(&self) -> quota_events::EventEnvelope {
        quota_events::EventEnvelope::new(self.event_id, &self.event_type, self.payload.clone())
    }

    /// Whether the backoff since the last failed attempt has elapsed.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_attempt_at {
            None => true,
            Some(at) if self.retry_count <= 0 => at <= now,
            Some(at) => {
                let wait = calculate_backoff(self.retry_count).as_secs() as i64;
                at + chrono::Duration::seconds(wait) <= now
            }
        }
    }
}

/// Storage for outbox records.
#[async_trait]
pub trait OutboxRepository: Send + Sync {
    async fn insert(&self, event: &OutboxEvent) -> OutboxResult<()>;

    /// Undelivered records, fewest failures first, then oldest first.
    async fn get_unpublished(&self, limit: i32) -> OutboxResult<Vec<OutboxEvent>>;

    async fn mark_published(&self, id: Uuid) -> OutboxResult<()>;

    /// Increment `retry_count`, store the error and stamp `last_attempt_at`.
    async fn mark_failed(&self, id: Uuid, error: &str) -> OutboxResult<()>;

    /// Pending count and age in seconds of the oldest pending record (0 when none).
    async fn pending_stats(&self) -> OutboxResult<(i64, i64)>;
}

/// Delivers one record to its destination.
///
/// Implementations must be safe to call again for a record that was already delivered.
#[async_trait]
pub trait OutboxPublisher: Send + Sync {
    async fn publish(&self, event: &OutboxEvent) -> OutboxResult<()>;
}

/// Background delivery loop.
///
/// Each cycle fetches a batch of undelivered records, skips those still backing off or
/// parked past `max_retries`, and publishes the rest.
pub struct OutboxProcessor<R: OutboxRepository + ?Sized, P: OutboxPublisher + ?Sized> {
    repository: Arc<R>,
    publisher: Arc<P>,
    batch_size: i32,
    poll_interval: Duration,
    max_retries: i32,
    metrics: Option<crate::metrics::OutboxMetrics>,
}

impl<R: OutboxRepository + ?Sized, P: OutboxPublisher + ?Sized> OutboxProcessor<R, P> {
    pub fn new(
        repository: Arc<R>,
        publisher: Arc<P>,
        batch_size: i32,
        poll_interval: Duration,
        max_retries: i32,
    ) -> Self {
        Self {
            repository,
            publisher,
            batch_size,
            poll_interval,
            max_retries,
            metrics: None,
        }
    }

    /// Also update Prometheus metrics each polling cycle.
    pub fn with_metrics(mut self, metrics: crate::metrics::OutboxMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Run forever. Spawn this as a background task.
    pub async fn start(&self) -> Result<()> {
        info!(
            batch_size = self.batch_size,
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            max_retries = self.max_retries,
            "Outbox processor starting"
        );

        loop {
            match self.process_batch().await {
                Ok(count) => {
                    if count > 0 {
                        info!(published_count = count, "Delivered events from outbox");
                    } else {
                        debug!("No events to deliver");
                    }
                }
                Err(e) => {
                    error!(error = ?e, "Outbox processor error");
                }
            }

            if let Some(metrics) = &self.metrics {
                if let Ok((pending, age)) = self.repository.pending_stats().await {
                    metrics.pending.set(pending);
                    metrics.oldest_pending_age_seconds.set(age);
                }
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Deliver one batch. Returns the number of records delivered.
    pub async fn process_batch(&self) -> OutboxResult<i32> {
        let events = self.repository.get_unpublished(self.batch_size).await?;
        let now = Utc::now();
        let mut published_count = 0;

        for event in events {
            if event.retry_count >= self.max_retries {
                warn!(
                    record_id = %event.id,
                    event_id = %event.event_id,
                    event_type = %event.event_type,
                    destination = %event.destination,
                    retry_count = event.retry_count,
                    last_error = ?event.last_error,
                    "Event exceeded max retries, parked until replayed"
                );
                continue;
            }

            if !event.is_due(now) {
                debug!(
                    record_id = %event.id,
                    retry_count = event.retry_count,
                    "Record still backing off"
                );
                continue;
            }

            match self.publisher.publish(&event).await {
                Ok(()) => {
                    if let Err(e) = self.repository.mark_published(event.id).await {
                        // Delivered but not marked: the record will be sent again.
                        error!(
                            record_id = %event.id,
                            error = ?e,
                            "Failed to mark event as published"
                        );
                    } else {
                        published_count += 1;
                        if let Some(metrics) = &self.metrics {
                            metrics.published.inc();
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        record_id = %event.id,
                        event_id = %event.event_id,
                        event_type = %event.event_type,
                        destination = %event.destination,
                        retry_count = event.retry_count,
                        consumer_side = e.is_delivery_failure(),
                        error = %e,
                        "Failed to deliver event"
                    );
                    if let Some(metrics) = &self.metrics {
                        metrics.failed.inc();
                    }

                    if let Err(mark_err) =
                        self.repository.mark_failed(event.id, &e.to_string()).await
                    {
                        error!(
                            record_id = %event.id,
                            error = ?mark_err,
                            "Failed to mark event as failed"
                        );
                    }
                }
            }
        }

        Ok(published_count)
    }
}

/// 2^retry_count seconds, capped at [`MAX_BACKOFF_SECS`].
pub fn calculate_backoff(retry_count: i32) -> Duration {
    let exponent = retry_count.clamp(0, 16) as u32;
    Duration::from_secs(2u64.pow(exponent).min(MAX_BACKOFF_SECS))
}
