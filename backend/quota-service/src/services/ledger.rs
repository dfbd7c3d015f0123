//! Ledger writes and the storage / usage projections rebuilt from them.

use crate::config::QuotaLimits;
use crate::error::{AppError, Result};
use crate::metrics::record_ledger_append;
use crate::models::{
    EntryKind, Projection, QuotaLedger, StorageAggregate, UsageAggregate, LEDGER_NOT_FOUND_MSG,
    STORAGE_NOT_FOUND_MSG, USAGE_NOT_FOUND_MSG,
};
use document_store::{modify, DocumentCollection, StoreError, MAX_MODIFY_ATTEMPTS};
use quota_events::{Destination, QuotaEvent};
use std::sync::Arc;
use tracing::{debug, info, warn};
use transactional_outbox::EventPropagator;

#[derive(Clone)]
pub struct LedgerService {
    ledgers: Arc<dyn DocumentCollection<QuotaLedger>>,
    storage: Arc<dyn DocumentCollection<StorageAggregate>>,
    usage: Arc<dyn DocumentCollection<UsageAggregate>>,
    propagator: EventPropagator,
    limits: QuotaLimits,
}

impl LedgerService {
    pub fn new(
        ledgers: Arc<dyn DocumentCollection<QuotaLedger>>,
        storage: Arc<dyn DocumentCollection<StorageAggregate>>,
        usage: Arc<dyn DocumentCollection<UsageAggregate>>,
        propagator: EventPropagator,
        limits: QuotaLimits,
    ) -> Self {
        Self {
            ledgers,
            storage,
            usage,
            propagator,
            limits,
        }
    }

    /// Open the user's ledger with the configured limits unless it already exists.
    pub async fn provision(&self, user_id: &str, event_id: Option<&str>) -> Result<QuotaLedger> {
        let ledger = QuotaLedger::provisioned(
            user_id,
            event_id.map(str::to_string),
            self.limits.total_storage,
            self.limits.daily_limit,
        );
        let created = self.ledgers.insert_if_absent(ledger).await?;
        record_ledger_append("provisioned", created);
        if created {
            info!(
                user_id = %user_id,
                total_storage = self.limits.total_storage,
                daily_limit = self.limits.daily_limit,
                "Quota ledger provisioned"
            );
        }
        self.get_ledger(user_id).await
    }

    pub async fn get_ledger(&self, user_id: &str) -> Result<QuotaLedger> {
        self.ledgers
            .get(user_id)
            .await?
            .map(|stored| stored.doc)
            .ok_or_else(|| AppError::NotFound(LEDGER_NOT_FOUND_MSG.to_string()))
    }

    /// Append one fact. A fact already recorded (same event id, or same video) is not
    /// appended again; the returned flag says whether this call added it.
    ///
    /// A video event for a user whose `UserCreated` has not arrived yet provisions the
    /// ledger with default limits first.
    pub async fn record(
        &self,
        user_id: &str,
        event_id: Option<&str>,
        kind: EntryKind,
    ) -> Result<(QuotaLedger, bool)> {
        let label = kind.label();
        let mut outcome = self.append(user_id, event_id, &kind).await?;
        if outcome.is_none() {
            warn!(user_id = %user_id, kind = label, "Ledger missing for video event, provisioning");
            self.provision(user_id, None).await?;
            outcome = self.append(user_id, event_id, &kind).await?;
        }

        let (ledger, appended) =
            outcome.ok_or_else(|| AppError::NotFound(LEDGER_NOT_FOUND_MSG.to_string()))?;
        record_ledger_append(label, appended);
        if appended {
            debug!(user_id = %user_id, kind = label, sequence = ledger.head(), "Ledger entry recorded");
        } else {
            debug!(user_id = %user_id, kind = label, event_id = ?event_id, "Ledger entry already recorded");
        }
        Ok((ledger, appended))
    }

    async fn append(
        &self,
        user_id: &str,
        event_id: Option<&str>,
        kind: &EntryKind,
    ) -> Result<Option<(QuotaLedger, bool)>> {
        let outcome = modify(&*self.ledgers, user_id, |ledger| {
            Ok::<_, AppError>(ledger.append(event_id.map(str::to_string), kind.clone()))
        })
        .await?;
        Ok(outcome.map(|(stored, appended)| (stored.doc, appended)))
    }

    pub async fn get_storage(&self, user_id: &str) -> Result<StorageAggregate> {
        self.storage
            .get(user_id)
            .await?
            .map(|stored| stored.doc)
            .ok_or_else(|| AppError::NotFound(STORAGE_NOT_FOUND_MSG.to_string()))
    }

    pub async fn get_usage(&self, user_id: &str) -> Result<UsageAggregate> {
        self.usage
            .get(user_id)
            .await?
            .map(|stored| stored.doc)
            .ok_or_else(|| AppError::NotFound(USAGE_NOT_FOUND_MSG.to_string()))
    }

    pub async fn rebuild_storage(&self, ledger: &QuotaLedger) -> Result<StorageAggregate> {
        upsert_projection(&*self.storage, StorageAggregate::project(ledger)).await
    }

    pub async fn rebuild_usage(&self, ledger: &QuotaLedger) -> Result<UsageAggregate> {
        upsert_projection(&*self.usage, UsageAggregate::project(ledger)).await
    }

    /// Send the storage counters to every counter cache.
    pub async fn publish_storage(&self, storage: &StorageAggregate) {
        let event = QuotaEvent::StorageUpdated(storage.to_event());
        self.propagator
            .emit_logged(&Destination::counter_caches(), &event)
            .await;
    }

    pub async fn publish_usage(&self, usage: &UsageAggregate) {
        let event = QuotaEvent::UsageUpdated(usage.to_event());
        self.propagator
            .emit_logged(&Destination::counter_caches(), &event)
            .await;
    }

    /// Re-project both read-models from the ledger and republish their counters.
    pub async fn rebuild(&self, user_id: &str) -> Result<(StorageAggregate, UsageAggregate)> {
        let ledger = self.get_ledger(user_id).await?;
        let storage = self.rebuild_storage(&ledger).await?;
        let usage = self.rebuild_usage(&ledger).await?;
        self.publish_storage(&storage).await;
        self.publish_usage(&usage).await;
        info!(
            user_id = %user_id,
            version = ledger.head(),
            free_storage = storage.free_storage,
            free_bandwidth = usage.free_bandwidth(),
            "Quota read-models rebuilt"
        );
        Ok((storage, usage))
    }
}

/// Write a projection unless the stored one was built from a newer ledger head.
/// Returns whatever is stored afterwards.
async fn upsert_projection<P: Projection>(
    collection: &dyn DocumentCollection<P>,
    projected: P,
) -> Result<P> {
    for _ in 0..MAX_MODIFY_ATTEMPTS {
        match collection.get(projected.id()).await? {
            None => match collection.insert(projected.clone()).await {
                Ok(stored) => return Ok(stored.doc),
                Err(StoreError::AlreadyExists { .. }) => continue,
                Err(e) => return Err(e.into()),
            },
            Some(current) if current.doc.version() > projected.version() => {
                debug!(
                    collection = P::COLLECTION,
                    id = projected.id(),
                    stored = current.doc.version(),
                    projected = projected.version(),
                    "Newer projection already stored"
                );
                return Ok(current.doc);
            }
            Some(current) => match collection.replace(projected.clone(), current.version).await {
                Ok(stored) => return Ok(stored.doc),
                Err(e) if e.is_version_conflict() => continue,
                Err(e) => return Err(e.into()),
            },
        }
    }
    Err(StoreError::ContentionExhausted {
        collection: P::COLLECTION,
        id: projected.id().to_string(),
        attempts: MAX_MODIFY_ATTEMPTS,
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use document_store::MemoryCollection;
    use quota_events::{event_types, MIB};
    use transactional_outbox::InMemoryOutboxRepository;

    struct Fixture {
        service: LedgerService,
        storage: Arc<MemoryCollection<StorageAggregate>>,
        outbox: Arc<InMemoryOutboxRepository>,
    }

    fn fixture() -> Fixture {
        let ledgers: Arc<MemoryCollection<QuotaLedger>> = Arc::new(MemoryCollection::new());
        let storage: Arc<MemoryCollection<StorageAggregate>> = Arc::new(MemoryCollection::new());
        let usage: Arc<MemoryCollection<UsageAggregate>> = Arc::new(MemoryCollection::new());
        let outbox = Arc::new(InMemoryOutboxRepository::new());
        let service = LedgerService::new(
            ledgers,
            storage.clone(),
            usage,
            EventPropagator::new(outbox.clone(), "quota-service"),
            QuotaLimits::default(),
        );
        Fixture {
            service,
            storage,
            outbox,
        }
    }

    fn added(video_id: &str, size: u64) -> EntryKind {
        EntryKind::VideoAdded {
            video_id: video_id.to_string(),
            size,
            gallery_event_id: None,
        }
    }

    #[tokio::test]
    async fn test_provision_is_idempotent() {
        let fx = fixture();
        let first = fx.service.provision("user-1", Some("e0")).await.unwrap();
        let second = fx.service.provision("user-1", Some("e0-replay")).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(second.entries.len(), 1);
    }

    #[tokio::test]
    async fn test_record_dedups_by_event_id() {
        let fx = fixture();
        fx.service.provision("user-1", None).await.unwrap();

        let (_, appended) = fx
            .service
            .record("user-1", Some("e1"), added("v1", 10 * MIB))
            .await
            .unwrap();
        assert!(appended);
        let (ledger, appended) = fx
            .service
            .record("user-1", Some("e1"), added("v1", 10 * MIB))
            .await
            .unwrap();
        assert!(!appended);
        assert_eq!(ledger.storage().used, 10 * MIB);
    }

    #[tokio::test]
    async fn test_record_provisions_missing_ledger() {
        let fx = fixture();
        let (ledger, appended) = fx
            .service
            .record("late-user", Some("e1"), added("v1", MIB))
            .await
            .unwrap();
        assert!(appended);
        assert_eq!(ledger.entries.len(), 2);
        assert_eq!(ledger.storage().free, 49 * MIB);
    }

    #[tokio::test]
    async fn test_rebuild_never_moves_projection_backwards() {
        let fx = fixture();
        let old = fx.service.provision("user-1", None).await.unwrap();
        let (new, _) = fx
            .service
            .record("user-1", None, added("v1", MIB))
            .await
            .unwrap();

        fx.service.rebuild_storage(&new).await.unwrap();
        let kept = fx.service.rebuild_storage(&old).await.unwrap();
        assert_eq!(kept.version, 2);
        assert_eq!(kept.used_storage, MIB);
        assert_eq!(fx.storage.len(), 1);
    }

    #[tokio::test]
    async fn test_rebuild_republishes_counters() {
        let fx = fixture();
        fx.service.provision("user-1", None).await.unwrap();
        fx.service
            .record("user-1", Some("e1"), added("v1", 10 * MIB))
            .await
            .unwrap();

        let (storage, usage) = fx.service.rebuild("user-1").await.unwrap();
        assert_eq!(storage.free_storage, 40 * MIB);
        assert_eq!(usage.free_bandwidth(), 90 * MIB);

        let records = fx.outbox.all();
        assert_eq!(records.len(), 4);
        let storage_updates: Vec<_> = records
            .iter()
            .filter(|r| r.event_type == event_types::STORAGE_UPDATED)
            .collect();
        assert_eq!(storage_updates.len(), 2);
        assert_eq!(storage_updates[0].payload["version"], 2);

        let err = fx.service.rebuild("nobody").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
