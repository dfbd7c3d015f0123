//! Inkwell
//!
//! Single-process wiring of the event routes. [`LocalDelivery`] is an outbox publisher
//! that hands each record straight to the consumer behind its destination instead of
//! POSTing it, so gallery-service and quota-service can exchange events in one process
//! (local development, cross-service tests).

use async_trait::async_trait;
use gallery_service::GalleryConsumer;
use quota_events::Destination;
use quota_service::QuotaConsumers;
use tracing::debug;
use transactional_outbox::{OutboxError, OutboxEvent, OutboxPublisher, OutboxResult};

#[derive(Clone)]
pub struct LocalDelivery {
    gallery: GalleryConsumer,
    quota: QuotaConsumers,
}

impl LocalDelivery {
    pub fn new(gallery: GalleryConsumer, quota: QuotaConsumers) -> Self {
        Self { gallery, quota }
    }
}

#[async_trait]
impl OutboxPublisher for LocalDelivery {
    async fn publish(&self, event: &OutboxEvent) -> OutboxResult<()> {
        let envelope = event.envelope();
        debug!(
            event_id = %event.event_id,
            event_type = %event.event_type,
            destination = %event.destination,
            "Delivering event in-process"
        );

        let delivered = match event.destination {
            Destination::Videos => self.gallery.handle(&envelope).await.map_err(|e| e.to_string()),
            consumer => self
                .quota
                .handle(consumer, &envelope)
                .await
                .map_err(|e| e.to_string()),
        };
        delivered.map_err(|e| {
            OutboxError::PublishFailed(format!("{} consumer rejected event: {}", event.destination, e))
        })
    }
}
