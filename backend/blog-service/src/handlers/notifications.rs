use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::error::Result;
use crate::services::{NotificationService, UserService};

/// GET /users/{user_id}/notifications
pub async fn list_notifications(
    users: web::Data<UserService>,
    notifications: web::Data<NotificationService>,
    user_id: web::Path<String>,
) -> Result<HttpResponse> {
    users.get(&user_id).await?;
    let list = notifications.list_for(&user_id).await?;
    let unread = list.iter().filter(|n| !n.read).count();
    Ok(HttpResponse::Ok().json(json!({
        "count": list.len(),
        "unread": unread,
        "notifications": list,
    })))
}

/// POST /notifications/{notification_id}/read
pub async fn mark_read(
    notifications: web::Data<NotificationService>,
    notification_id: web::Path<String>,
) -> Result<HttpResponse> {
    let notification = notifications.mark_read(&notification_id).await?;
    Ok(HttpResponse::Ok().json(notification))
}
