//! Quota Service
//!
//! Owns the authoritative per-user quota ledger. The storage and usage-monitoring
//! consumers append gallery facts to it, rebuild their read-models from it and publish
//! `StorageUpdated` / `UsageUpdated` to the counter caches; the query consumer keeps a
//! denormalised per-user view.

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod services;

use std::sync::Arc;
use std::time::Duration;

use document_store::DocumentCollection;
use idempotent_consumer::{IdempotencyGuard, ProcessedEventStore};
use transactional_outbox::{EventPropagator, OutboxRepository};

// Public re-exports
pub use config::{Config, QuotaLimits};
pub use error::{AppError, Result};
pub use models::{EventGalleryStats, QueryAggregate, QuotaLedger, StorageAggregate, UsageAggregate};
pub use services::{EventGalleryService, LedgerService, QueryService, QuotaConsumers};

/// How long processed event ids are remembered for duplicate detection.
pub const PROCESSED_EVENT_RETENTION: Duration = Duration::from_secs(7 * 24 * 3600);

/// Document collections quota-service reads and writes.
#[derive(Clone)]
pub struct QuotaCollections {
    pub ledgers: Arc<dyn DocumentCollection<QuotaLedger>>,
    pub storage: Arc<dyn DocumentCollection<StorageAggregate>>,
    pub usage: Arc<dyn DocumentCollection<UsageAggregate>>,
    pub queries: Arc<dyn DocumentCollection<QueryAggregate>>,
    pub event_galleries: Arc<dyn DocumentCollection<EventGalleryStats>>,
}

/// Services behind the HTTP routes.
#[derive(Clone)]
pub struct QuotaServices {
    pub ledger: LedgerService,
    pub queries: QueryService,
    pub event_galleries: EventGalleryService,
    pub consumers: QuotaConsumers,
}

/// Wire the quota services and their event consumers over the given collaborators.
pub fn build_services(
    collections: QuotaCollections,
    outbox: Arc<dyn OutboxRepository>,
    processed_events: Arc<dyn ProcessedEventStore>,
    limits: QuotaLimits,
) -> QuotaServices {
    let propagator = EventPropagator::new(outbox, "quota-service");
    let ledger = LedgerService::new(
        collections.ledgers,
        collections.storage,
        collections.usage,
        propagator,
        limits,
    );
    let queries = QueryService::new(collections.queries, limits);
    let event_galleries = EventGalleryService::new(collections.event_galleries);
    let guard = IdempotencyGuard::new(processed_events, PROCESSED_EVENT_RETENTION);
    let consumers = QuotaConsumers::new(
        ledger.clone(),
        queries.clone(),
        event_galleries.clone(),
        guard,
    );
    QuotaServices {
        ledger,
        queries,
        event_galleries,
        consumers,
    }
}

impl QuotaServices {
    /// Register every service as app data.
    pub fn app_data(&self, cfg: &mut actix_web::web::ServiceConfig) {
        cfg.app_data(actix_web::web::Data::new(self.ledger.clone()))
            .app_data(actix_web::web::Data::new(self.queries.clone()))
            .app_data(actix_web::web::Data::new(self.event_galleries.clone()))
            .app_data(actix_web::web::Data::new(self.consumers.clone()));
    }
}

impl QuotaCollections {
    /// Every collection held in memory.
    pub fn in_memory() -> Self {
        use document_store::MemoryCollection;
        Self {
            ledgers: Arc::new(MemoryCollection::<QuotaLedger>::new()),
            storage: Arc::new(MemoryCollection::<StorageAggregate>::new()),
            usage: Arc::new(MemoryCollection::<UsageAggregate>::new()),
            queries: Arc::new(MemoryCollection::<QueryAggregate>::new()),
            event_galleries: Arc::new(MemoryCollection::<EventGalleryStats>::new()),
        }
    }

    /// Every collection in the shared PostgreSQL documents table.
    pub fn postgres(pool: sqlx::PgPool) -> Self {
        use document_store::PgCollection;
        Self {
            ledgers: Arc::new(PgCollection::<QuotaLedger>::new(pool.clone())),
            storage: Arc::new(PgCollection::<StorageAggregate>::new(pool.clone())),
            usage: Arc::new(PgCollection::<UsageAggregate>::new(pool.clone())),
            queries: Arc::new(PgCollection::<QueryAggregate>::new(pool.clone())),
            event_galleries: Arc::new(PgCollection::<EventGalleryStats>::new(pool)),
        }
    }
}
