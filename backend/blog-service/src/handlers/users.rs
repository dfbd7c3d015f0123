/// User handlers - accounts, profiles and social media links
use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::error::Result;
use crate::models::{CreateUserRequest, SocialMediaRequest, UpdateUserRequest};
use crate::saga::SagaReport;
use crate::services::{CascadeService, UserService};

/// POST /users
pub async fn create_user(
    users: web::Data<UserService>,
    body: web::Json<CreateUserRequest>,
) -> Result<HttpResponse> {
    let user = users.create(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(json!({
        "message": "User created",
        "user": user,
    })))
}

/// GET /users/{user_id}
pub async fn get_user(
    users: web::Data<UserService>,
    user_id: web::Path<String>,
) -> Result<HttpResponse> {
    let profile = users.profile(&user_id).await?;
    Ok(HttpResponse::Ok().json(profile))
}

/// PATCH /users/{user_id}
pub async fn update_user(
    users: web::Data<UserService>,
    user_id: web::Path<String>,
    body: web::Json<UpdateUserRequest>,
) -> Result<HttpResponse> {
    let user = users.update(&user_id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "User updated",
        "user": user,
    })))
}

/// DELETE /users/{user_id}
pub async fn delete_user(
    cascade: web::Data<CascadeService>,
    user_id: web::Path<String>,
) -> Result<HttpResponse> {
    let report = cascade.delete_user(&user_id).await?;
    Ok(deleted("User", report))
}

/// PUT /users/{user_id}/social-media
pub async fn set_social_media(
    users: web::Data<UserService>,
    user_id: web::Path<String>,
    body: web::Json<SocialMediaRequest>,
) -> Result<HttpResponse> {
    let links = users.set_social_media(&user_id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Social media links updated",
        "socialMedia": links,
    })))
}

/// Response for a finished cascade; only reached when the saga succeeded or ran best-effort.
pub(crate) fn deleted(what: &str, report: SagaReport) -> HttpResponse {
    let message = if report.succeeded() {
        format!("{} deleted", what)
    } else {
        format!("{} deleted with errors", what)
    };
    HttpResponse::Ok().json(json!({
        "message": message,
        "report": report,
    }))
}
