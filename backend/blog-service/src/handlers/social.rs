/// Social handlers - follow graph, likes and saves
use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::error::Result;
use crate::services::SocialService;

/// POST /users/{user_id}/follow/{target_id}
pub async fn follow(
    social: web::Data<SocialService>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse> {
    let (user_id, target_id) = path.into_inner();
    let follow = social.follow(&user_id, &target_id).await?;
    Ok(HttpResponse::Created().json(json!({
        "message": "User followed",
        "follow": follow,
    })))
}

/// DELETE /users/{user_id}/follow/{target_id}
pub async fn unfollow(
    social: web::Data<SocialService>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse> {
    let (user_id, target_id) = path.into_inner();
    social.unfollow(&user_id, &target_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "User unfollowed" })))
}

/// POST /blogs/{blog_id}/like/{user_id}
pub async fn like(
    social: web::Data<SocialService>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse> {
    let (blog_id, user_id) = path.into_inner();
    let likes = social.like(&blog_id, &user_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Post liked", "likes": likes })))
}

/// DELETE /blogs/{blog_id}/like/{user_id}
pub async fn unlike(
    social: web::Data<SocialService>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse> {
    let (blog_id, user_id) = path.into_inner();
    let likes = social.unlike(&blog_id, &user_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Post unliked", "likes": likes })))
}

/// POST /blogs/{blog_id}/save/{user_id}
pub async fn save(
    social: web::Data<SocialService>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse> {
    let (blog_id, user_id) = path.into_inner();
    let saves = social.save(&blog_id, &user_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Post saved", "saves": saves })))
}

/// DELETE /blogs/{blog_id}/save/{user_id}
pub async fn unsave(
    social: web::Data<SocialService>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse> {
    let (blog_id, user_id) = path.into_inner();
    let saves = social.unsave(&blog_id, &user_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Post unsaved", "saves": saves })))
}
