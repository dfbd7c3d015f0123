/// HTTP handlers for blog-service
pub mod blogs;
pub mod contact;
pub mod health;
pub mod notifications;
pub mod social;
pub mod users;
pub mod ws;

use actix_web::web;

/// Register every blog-service route.
pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health::health))
        .route("/metrics", web::get().to(crate::metrics::serve_metrics))
        .route("/ws/{user_id}", web::get().to(ws::connect))
        .service(
            web::scope("/users")
                .route("", web::post().to(users::create_user))
                .route("/{user_id}", web::get().to(users::get_user))
                .route("/{user_id}", web::patch().to(users::update_user))
                .route("/{user_id}", web::delete().to(users::delete_user))
                .route("/{user_id}/social-media", web::put().to(users::set_social_media))
                .route(
                    "/{user_id}/notifications",
                    web::get().to(notifications::list_notifications),
                )
                .route("/{user_id}/follow/{target_id}", web::post().to(social::follow))
                .route("/{user_id}/follow/{target_id}", web::delete().to(social::unfollow)),
        )
        .service(
            web::scope("/blogs")
                .route("", web::post().to(blogs::create_blog))
                .route("", web::get().to(blogs::list_blogs))
                .route("/{blog_id}", web::get().to(blogs::get_blog))
                .route("/{blog_id}", web::delete().to(blogs::delete_blog))
                .route("/{blog_id}/comments", web::post().to(blogs::add_comment))
                .route("/{blog_id}/like/{user_id}", web::post().to(social::like))
                .route("/{blog_id}/like/{user_id}", web::delete().to(social::unlike))
                .route("/{blog_id}/save/{user_id}", web::post().to(social::save))
                .route("/{blog_id}/save/{user_id}", web::delete().to(social::unsave)),
        )
        .route("/categories", web::post().to(blogs::create_category))
        .route("/categories", web::get().to(blogs::list_categories))
        .route("/comments/{comment_id}", web::delete().to(blogs::delete_comment))
        .route("/comments/{comment_id}/replies", web::post().to(blogs::add_reply))
        .route(
            "/notifications/{notification_id}/read",
            web::post().to(notifications::mark_read),
        )
        .route("/subscriptions", web::post().to(contact::subscribe))
        .route("/contacts", web::post().to(contact::contact));
}
