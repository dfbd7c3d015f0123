//! Gallery Service
//!
//! Per-user video galleries with local storage and bandwidth counters. Uploads are
//! validated against those counters, stored in object storage and announced to the quota
//! trackers through the outbox; the quota service answers with `StorageUpdated` /
//! `UsageUpdated` events on `/videos/events`, which refresh the counters.

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod services;
pub mod storage;

use std::sync::Arc;
use std::time::Duration;

use document_store::DocumentCollection;
use idempotent_consumer::{IdempotencyGuard, ProcessedEventStore};
use transactional_outbox::{EventPropagator, OutboxRepository};

// Public re-exports
pub use config::{Config, QuotaDefaults};
pub use error::{AppError, Result};
pub use models::GalleryAggregate;
pub use services::{GalleryConsumer, GalleryService};

/// How long processed event ids are remembered for duplicate detection.
pub const PROCESSED_EVENT_RETENTION: Duration = Duration::from_secs(7 * 24 * 3600);

/// Wire the gallery service and its event consumer over the given collaborators.
pub fn build_services(
    galleries: Arc<dyn DocumentCollection<GalleryAggregate>>,
    object_storage: Arc<dyn storage::ObjectStorage>,
    outbox: Arc<dyn OutboxRepository>,
    processed_events: Arc<dyn ProcessedEventStore>,
    defaults: QuotaDefaults,
) -> (GalleryService, GalleryConsumer) {
    let propagator = EventPropagator::new(outbox, "gallery-service");
    let gallery = GalleryService::new(galleries, object_storage, propagator, defaults);
    let guard = IdempotencyGuard::new(processed_events, PROCESSED_EVENT_RETENTION);
    let consumer = GalleryConsumer::new(gallery.clone(), guard);
    (gallery, consumer)
}
