/// Event callback endpoints
use actix_web::{web, HttpResponse};
use quota_events::{Destination, EventEnvelope};
use serde_json::json;
use tracing::error;

use crate::services::QuotaConsumers;

/// POST /storage/events
pub async fn storage_events(
    consumers: web::Data<QuotaConsumers>,
    envelope: web::Json<EventEnvelope>,
) -> HttpResponse {
    receive(&consumers, Destination::Storage, &envelope).await
}

/// POST /usagemonitoring/events
pub async fn usage_events(
    consumers: web::Data<QuotaConsumers>,
    envelope: web::Json<EventEnvelope>,
) -> HttpResponse {
    receive(&consumers, Destination::UsageMonitoring, &envelope).await
}

/// POST /queries/events
pub async fn query_events(
    consumers: web::Data<QuotaConsumers>,
    envelope: web::Json<EventEnvelope>,
) -> HttpResponse {
    receive(&consumers, Destination::Queries, &envelope).await
}

/// Answers with the `{success}` body the outbox expects; a 5xx makes the sender retry.
async fn receive(
    consumers: &QuotaConsumers,
    consumer: Destination,
    envelope: &EventEnvelope,
) -> HttpResponse {
    match consumers.handle(consumer, envelope).await {
        Ok(()) => HttpResponse::Ok().json(json!({ "success": true })),
        Err(e) => {
            error!(
                consumer = %consumer,
                event_type = %envelope.event_type,
                event_id = ?envelope.event_id,
                error = %e,
                "Failed to handle event"
            );
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": e.to_string(),
            }))
        }
    }
}
