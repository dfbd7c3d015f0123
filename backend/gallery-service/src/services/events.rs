//! Consumer for events delivered to `/videos/events`.

use crate::error::{AppError, Result};
use crate::services::GalleryService;
use idempotent_consumer::{IdempotencyGuard, ProcessingResult};
use quota_events::{EventEnvelope, QuotaEvent};
use tracing::{debug, info};

/// Name under which this consumer records processed event ids.
pub const CONSUMER: &str = "videos";

#[derive(Clone)]
pub struct GalleryConsumer {
    gallery: GalleryService,
    guard: IdempotencyGuard,
}

impl GalleryConsumer {
    pub fn new(gallery: GalleryService, guard: IdempotencyGuard) -> Self {
        Self { gallery, guard }
    }

    pub fn guard(&self) -> &IdempotencyGuard {
        &self.guard
    }

    /// Handle one delivery. Unknown event types are acknowledged and ignored; an event
    /// id seen before is acknowledged without being applied again.
    pub async fn handle(&self, envelope: &EventEnvelope) -> Result<()> {
        let Some(event) = envelope
            .parse()
            .map_err(|e| AppError::ValidationError(format!("Malformed event data: {}", e)))?
        else {
            debug!(event_type = %envelope.event_type, "Ignoring unknown event type");
            return Ok(());
        };

        let Some(event_id) = envelope.event_id else {
            return self.apply(&event).await;
        };

        let outcome = self
            .guard
            .process_if_new(CONSUMER, &event_id.to_string(), || self.apply(&event))
            .await?;
        match outcome {
            ProcessingResult::Success => Ok(()),
            ProcessingResult::AlreadyProcessed => {
                info!(event_id = %event_id, event_type = %envelope.event_type, "Duplicate delivery acknowledged");
                Ok(())
            }
            ProcessingResult::Failed(msg) => Err(AppError::Internal(msg)),
        }
    }

    async fn apply(&self, event: &QuotaEvent) -> Result<()> {
        match event {
            QuotaEvent::UserCreated(created) => {
                self.gallery.create_gallery(&created.user_id).await?;
            }
            QuotaEvent::StorageUpdated(update) => {
                self.gallery.apply_storage_update(update).await?;
            }
            QuotaEvent::UsageUpdated(update) => {
                self.gallery.apply_usage_update(update).await?;
            }
            QuotaEvent::VideoAdded(_) | QuotaEvent::VideoRemoved(_) => {
                debug!(event_type = event.event_type(), "Not handled by the gallery consumer");
            }
        }
        Ok(())
    }
}
