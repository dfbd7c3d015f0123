//! Consumers behind `/storage/events`, `/usagemonitoring/events` and `/queries/events`.

use crate::error::{AppError, Result};
use crate::models::EntryKind;
use crate::services::{EventGalleryService, LedgerService, QueryService};
use idempotent_consumer::{IdempotencyGuard, ProcessingResult};
use quota_events::{Destination, EventEnvelope, QuotaEvent, VideoAdded, VideoRemoved};
use tracing::{debug, info};

#[derive(Clone)]
pub struct QuotaConsumers {
    ledger: LedgerService,
    queries: QueryService,
    event_galleries: EventGalleryService,
    guard: IdempotencyGuard,
}

impl QuotaConsumers {
    pub fn new(
        ledger: LedgerService,
        queries: QueryService,
        event_galleries: EventGalleryService,
        guard: IdempotencyGuard,
    ) -> Self {
        Self {
            ledger,
            queries,
            event_galleries,
            guard,
        }
    }

    pub fn guard(&self) -> &IdempotencyGuard {
        &self.guard
    }

    /// Handle one delivery to `consumer`. Unknown event types are acknowledged and ignored;
    /// an event id this consumer saw before is acknowledged without being applied again.
    pub async fn handle(&self, consumer: Destination, envelope: &EventEnvelope) -> Result<()> {
        let Some(event) = envelope.parse()? else {
            debug!(consumer = %consumer, event_type = %envelope.event_type, "Ignoring unknown event type");
            return Ok(());
        };

        let Some(event_id) = envelope.event_id.map(|id| id.to_string()) else {
            // No guard without an id; the ledger still records one delivery per content.
            let key = legacy_key(envelope);
            return self.apply(consumer, Some(&key), &event).await;
        };

        let outcome = self
            .guard
            .process_if_new(consumer.as_str(), &event_id, || {
                self.apply(consumer, Some(&event_id), &event)
            })
            .await?;
        match outcome {
            ProcessingResult::Success => Ok(()),
            ProcessingResult::AlreadyProcessed => {
                info!(
                    consumer = %consumer,
                    event_id = %event_id,
                    event_type = %envelope.event_type,
                    "Duplicate delivery acknowledged"
                );
                Ok(())
            }
            ProcessingResult::Failed(msg) => Err(AppError::Internal(msg)),
        }
    }

    async fn apply(
        &self,
        consumer: Destination,
        event_id: Option<&str>,
        event: &QuotaEvent,
    ) -> Result<()> {
        match consumer {
            Destination::Storage => self.apply_storage(event_id, event).await,
            Destination::UsageMonitoring => self.apply_usage(event_id, event).await,
            Destination::Queries => self.apply_queries(event).await,
            Destination::Videos => Err(AppError::Internal(
                "videos events are consumed by gallery-service".to_string(),
            )),
        }
    }

    async fn apply_storage(&self, event_id: Option<&str>, event: &QuotaEvent) -> Result<()> {
        match event {
            QuotaEvent::UserCreated(created) => {
                let ledger = self.ledger.provision(&created.user_id, event_id).await?;
                self.ledger.rebuild_storage(&ledger).await?;
            }
            QuotaEvent::VideoAdded(added) => {
                let (ledger, _) = self
                    .ledger
                    .record(&added.user_id, event_id, added_entry(added))
                    .await?;
                let storage = self.ledger.rebuild_storage(&ledger).await?;
                self.ledger.publish_storage(&storage).await;
                if let Some(gallery_event_id) = &added.gallery_event_id {
                    self.event_galleries.adjust(gallery_event_id, 1).await?;
                }
            }
            QuotaEvent::VideoRemoved(removed) => {
                let (ledger, _) = self
                    .ledger
                    .record(&removed.user_id, event_id, removed_entry(removed))
                    .await?;
                let storage = self.ledger.rebuild_storage(&ledger).await?;
                self.ledger.publish_storage(&storage).await;
                if let Some(gallery_event_id) = &removed.gallery_event_id {
                    self.event_galleries.adjust(gallery_event_id, -1).await?;
                }
            }
            QuotaEvent::StorageUpdated(_) | QuotaEvent::UsageUpdated(_) => {
                debug!(event_type = event.event_type(), "Not handled by the storage consumer");
            }
        }
        Ok(())
    }

    async fn apply_usage(&self, event_id: Option<&str>, event: &QuotaEvent) -> Result<()> {
        let (ledger, _) = match event {
            QuotaEvent::UserCreated(created) => {
                let ledger = self.ledger.provision(&created.user_id, event_id).await?;
                self.ledger.rebuild_usage(&ledger).await?;
                return Ok(());
            }
            QuotaEvent::VideoAdded(added) => {
                self.ledger
                    .record(&added.user_id, event_id, added_entry(added))
                    .await?
            }
            QuotaEvent::VideoRemoved(removed) => {
                self.ledger
                    .record(&removed.user_id, event_id, removed_entry(removed))
                    .await?
            }
            QuotaEvent::StorageUpdated(_) | QuotaEvent::UsageUpdated(_) => {
                debug!(event_type = event.event_type(), "Not handled by the usage consumer");
                return Ok(());
            }
        };
        let usage = self.ledger.rebuild_usage(&ledger).await?;
        self.ledger.publish_usage(&usage).await;
        Ok(())
    }

    async fn apply_queries(&self, event: &QuotaEvent) -> Result<()> {
        match event {
            QuotaEvent::UserCreated(created) => {
                self.queries.create_user(created).await?;
            }
            QuotaEvent::VideoAdded(added) => {
                self.queries.add_video(&added.user_id, &added.video).await?;
            }
            QuotaEvent::VideoRemoved(removed) => {
                self.queries
                    .remove_video(&removed.user_id, &removed.video_id)
                    .await?;
            }
            QuotaEvent::StorageUpdated(update) => {
                self.queries.apply_storage_update(update).await?;
            }
            QuotaEvent::UsageUpdated(update) => {
                self.queries.apply_usage_update(update).await?;
            }
        }
        Ok(())
    }
}

/// Ledger key for an envelope sent without `eventId`, so the storage and usage
/// deliveries of one event land in the ledger once.
fn legacy_key(envelope: &EventEnvelope) -> String {
    format!("legacy:{}:{}", envelope.event_type, envelope.data)
}

fn added_entry(added: &VideoAdded) -> EntryKind {
    EntryKind::VideoAdded {
        video_id: added.video.id.clone(),
        size: added.video.size,
        gallery_event_id: added.gallery_event_id.clone(),
    }
}

fn removed_entry(removed: &VideoRemoved) -> EntryKind {
    EntryKind::VideoRemoved {
        video_id: removed.video_id.clone(),
        size: removed.video_size,
        gallery_event_id: removed.gallery_event_id.clone(),
    }
}
