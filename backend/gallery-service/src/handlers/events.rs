/// Event callback endpoint
use actix_web::{web, HttpResponse};
use quota_events::EventEnvelope;
use serde_json::json;
use tracing::error;

use crate::services::GalleryConsumer;

/// POST /videos/events
///
/// Always answers with the `{success}` body the outbox expects; a 5xx makes the sender retry.
pub async fn receive_event(
    consumer: web::Data<GalleryConsumer>,
    envelope: web::Json<EventEnvelope>,
) -> HttpResponse {
    match consumer.handle(&envelope).await {
        Ok(()) => HttpResponse::Ok().json(json!({ "success": true })),
        Err(e) => {
            error!(
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
