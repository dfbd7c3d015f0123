/// Read endpoints over the ledger and its read-models
use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::error::Result;
use crate::services::{EventGalleryService, LedgerService, QueryService};

/// GET /storage/{user_id}
pub async fn get_storage(
    ledger: web::Data<LedgerService>,
    user_id: web::Path<String>,
) -> Result<HttpResponse> {
    let storage = ledger.get_storage(&user_id).await?;
    Ok(HttpResponse::Ok().json(storage))
}

/// GET /usagemonitoring/{user_id}
pub async fn get_usage(
    ledger: web::Data<LedgerService>,
    user_id: web::Path<String>,
) -> Result<HttpResponse> {
    let usage = ledger.get_usage(&user_id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "userId": usage.user_id,
        "bandwidthTotalUsage": usage.bandwidth_total_usage,
        "bandwidthDailyUsage": usage.bandwidth_daily_usage,
        "dailyLimit": usage.daily_limit,
        "freeBandwidth": usage.free_bandwidth(),
        "version": usage.version,
        "updatedAt": usage.updated_at,
    })))
}

/// GET /queries/{user_id}
pub async fn get_query(
    queries: web::Data<QueryService>,
    user_id: web::Path<String>,
) -> Result<HttpResponse> {
    let view = queries.get(&user_id).await?;
    Ok(HttpResponse::Ok().json(view))
}

/// GET /ledger/{user_id}
pub async fn get_ledger(
    ledger: web::Data<LedgerService>,
    user_id: web::Path<String>,
) -> Result<HttpResponse> {
    let stored = ledger.get_ledger(&user_id).await?;
    let storage = stored.storage();
    let usage = stored.usage();
    Ok(HttpResponse::Ok().json(json!({
        "userId": stored.user_id,
        "head": stored.head(),
        "entries": stored.entries,
        "storage": { "total": storage.total, "used": storage.used, "free": storage.free },
        "usage": { "total": usage.total, "daily": usage.daily, "limit": usage.limit, "free": usage.free },
    })))
}

/// POST /ledger/{user_id}/rebuild
pub async fn rebuild(
    ledger: web::Data<LedgerService>,
    user_id: web::Path<String>,
) -> Result<HttpResponse> {
    let (storage, usage) = ledger.rebuild(&user_id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Read-models rebuilt",
        "storage": storage,
        "usage": usage,
    })))
}

/// GET /event-galleries/{event_id}
pub async fn get_event_gallery(
    event_galleries: web::Data<EventGalleryService>,
    event_id: web::Path<String>,
) -> Result<HttpResponse> {
    let stats = event_galleries.get(&event_id).await?;
    Ok(HttpResponse::Ok().json(stats))
}
