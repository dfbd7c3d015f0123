/// HTTP handlers for quota-service
pub mod events;
pub mod health;
pub mod reads;

use actix_web::web;

/// Register every quota-service route.
pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health::health))
        .route("/metrics", web::get().to(crate::metrics::serve_metrics))
        .service(
            web::scope("/storage")
                .route("/events", web::post().to(events::storage_events))
                .route("/{user_id}", web::get().to(reads::get_storage)),
        )
        .service(
            web::scope("/usagemonitoring")
                .route("/events", web::post().to(events::usage_events))
                .route("/{user_id}", web::get().to(reads::get_usage)),
        )
        .service(
            web::scope("/queries")
                .route("/events", web::post().to(events::query_events))
                .route("/{user_id}", web::get().to(reads::get_query)),
        )
        .service(
            web::scope("/ledger")
                .route("/{user_id}", web::get().to(reads::get_ledger))
                .route("/{user_id}/rebuild", web::post().to(reads::rebuild)),
        )
        .route(
            "/event-galleries/{event_id}",
            web::get().to(reads::get_event_gallery),
        );
}
