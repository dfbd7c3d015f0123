use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::error::Result;
use crate::models::{ContactRequest, SubscribeRequest};
use crate::services::ContactService;

/// POST /subscriptions
pub async fn subscribe(
    contact: web::Data<ContactService>,
    body: web::Json<SubscribeRequest>,
) -> Result<HttpResponse> {
    let (subscription, created) = contact.subscribe(body.into_inner()).await?;
    let response = if created {
        HttpResponse::Created().json(json!({
            "message": "Subscribed",
            "subscription": subscription,
        }))
    } else {
        HttpResponse::Ok().json(json!({
            "message": "Already subscribed",
            "subscription": subscription,
        }))
    };
    Ok(response)
}

/// POST /contacts
pub async fn contact(
    contact: web::Data<ContactService>,
    body: web::Json<ContactRequest>,
) -> Result<HttpResponse> {
    let message = contact.contact(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(json!({
        "message": "Message received",
        "contact": message,
    })))
}
