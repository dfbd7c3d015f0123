use crate::{OutboxEvent, OutboxRepository, OutboxResult};
use quota_events::{Destination, QuotaEvent};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

/// Fans one event out to several destinations through the outbox.
///
/// All records of one `emit` share a logical event id, so a consumer that receives the
/// same event twice (retry, replay) can recognise it.
#[derive(Clone)]
pub struct EventPropagator {
    repository: Arc<dyn OutboxRepository>,
    source: String,
}

impl EventPropagator {
    pub fn new(repository: Arc<dyn OutboxRepository>, source: impl Into<String>) -> Self {
        Self {
            repository,
            source: source.into(),
        }
    }

    /// Queue `event` for every destination. Returns the logical event id.
    pub async fn emit(&self, destinations: &[Destination], event: &QuotaEvent) -> OutboxResult<Uuid> {
        let event_id = Uuid::new_v4();
        let payload = event.data()?;

        for &destination in destinations {
            let record = OutboxEvent::new(
                event_id,
                destination,
                event.event_type(),
                event.user_id(),
                payload.clone(),
            )
            .with_metadata(json!({ "source": self.source }));
            self.repository.insert(&record).await?;
        }

        debug!(
            event_id = %event_id,
            event_type = event.event_type(),
            user_id = event.user_id(),
            destinations = destinations.len(),
            "Event queued"
        );
        Ok(event_id)
    }

    /// [`emit`](Self::emit), logging instead of returning failures. Event emission
    /// never fails the request that triggered it.
    pub async fn emit_logged(&self, destinations: &[Destination], event: &QuotaEvent) -> Option<Uuid> {
        match self.emit(destinations, event).await {
            Ok(event_id) => Some(event_id),
            Err(e) => {
                error!(
                    event_type = event.event_type(),
                    user_id = event.user_id(),
                    error = %e,
                    "Failed to queue event"
                );
                None
            }
        }
    }
}
