/// HTTP handlers for gallery-service
pub mod events;
pub mod health;
pub mod videos;

use actix_web::web;

/// Register every gallery-service route.
pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health::health))
        .route("/metrics", web::get().to(crate::metrics::serve_metrics))
        .service(
            web::scope("/videos")
                .route("/events", web::post().to(events::receive_event))
                .route("/add/{user_id}", web::post().to(videos::add_video))
                .route("/{user_id}", web::get().to(videos::get_gallery))
                .route("/{user_id}/{video_id}", web::get().to(videos::get_video))
                .route("/{user_id}/{video_id}", web::delete().to(videos::delete_video)),
        );
}
