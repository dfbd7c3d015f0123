use actix_web::{http::header, test, web, App};
use document_store::{DocumentCollection, MemoryCollection};
use gallery_service::storage::InMemoryObjectStorage;
use gallery_service::{build_services, handlers, GalleryAggregate, GalleryConsumer, GalleryService, QuotaDefaults};
use idempotent_consumer::InMemoryProcessedEventStore;
use quota_events::{event_types, MIB};
use serde_json::{json, Value};
use std::sync::Arc;
use transactional_outbox::InMemoryOutboxRepository;

const BOUNDARY: &str = "----inkwell-test-boundary";

struct TestState {
    gallery: GalleryService,
    consumer: GalleryConsumer,
    galleries: Arc<MemoryCollection<GalleryAggregate>>,
    outbox: Arc<InMemoryOutboxRepository>,
}

fn build_state() -> TestState {
    build_state_with(QuotaDefaults::default())
}

fn build_state_with(defaults: QuotaDefaults) -> TestState {
    let galleries: Arc<MemoryCollection<GalleryAggregate>> = Arc::new(MemoryCollection::new());
    let outbox = Arc::new(InMemoryOutboxRepository::new());
    let (gallery, consumer) = build_services(
        galleries.clone(),
        Arc::new(InMemoryObjectStorage::new()),
        outbox.clone(),
        Arc::new(InMemoryProcessedEventStore::new()),
        defaults,
    );
    TestState {
        gallery,
        consumer,
        galleries,
        outbox,
    }
}

/// Parts are `(name, filename, bytes)`.
fn multipart_body(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, filename, bytes) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match filename {
            Some(filename) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                        name, filename
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
            }
            None => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
            }
        }
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn upload_request(user_id: &str, body: Vec<u8>) -> test::TestRequest {
    test::TestRequest::post()
        .uri(&format!("/videos/add/{}", user_id))
        .insert_header((
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        ))
        .set_payload(body)
}

fn user_created(event_id: &str, user_id: &str) -> Value {
    json!({
        "eventId": event_id,
        "type": "UserCreated",
        "data": { "userId": user_id, "username": "ada", "email": "ada@example.com" }
    })
}

macro_rules! app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state.gallery.clone()))
                .app_data(web::Data::new($state.consumer.clone()))
                .configure(handlers::register_routes),
        )
        .await
    };
}

#[actix_web::test]
async fn test_user_created_provisions_gallery_once() {
    let state = build_state();
    let app = app!(state);

    for _ in 0..2 {
        let req = test::TestRequest::post()
            .uri("/videos/events")
            .set_json(user_created("4b6f7c2e-8a4e-4f5e-9a51-1f0c2f1d9a10", "user-1"))
            .to_request();
        let resp: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["success"], true);
    }

    assert_eq!(state.galleries.len(), 1);
    let req = test::TestRequest::get().uri("/videos/user-1").to_request();
    let gallery: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(gallery["freeStorage"], 50 * MIB);
    assert_eq!(gallery["freeBandwidth"], 100 * MIB);
}

#[actix_web::test]
async fn test_unknown_event_type_is_acknowledged() {
    let state = build_state();
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/videos/events")
        .set_json(json!({ "type": "somethingElse", "data": {} }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
}

#[actix_web::test]
async fn test_malformed_event_reports_failure() {
    let state = build_state();
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/videos/events")
        .set_json(json!({ "type": "StorageUpdated", "data": { "userId": 7 } }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 500);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
}

#[actix_web::test]
async fn test_upload_and_delete_over_http() {
    let state = build_state();
    state.gallery.create_gallery("user-1").await.unwrap();
    let app = app!(state);

    let video = vec![0u8; 2048];
    let body = multipart_body(&[
        ("title", None, &b"Launch day"[..]),
        ("video", Some("launch.mov"), video.as_slice()),
    ]);
    let resp = test::call_service(&app, upload_request("user-1", body).to_request()).await;
    assert_eq!(resp.status().as_u16(), 201);

    let created: Value = test::read_body_json(resp).await;
    assert_eq!(created["video"]["title"], "Launch day");
    assert_eq!(created["video"]["size"], 2048);
    assert_eq!(created["gallery"]["freeStorage"], 50 * MIB - 2048);
    assert_eq!(created["gallery"]["freeBandwidth"], 100 * MIB - 2048);
    assert_eq!(state.outbox.all().len(), 3);

    let video_id = created["video"]["id"].as_str().unwrap().to_string();
    let req = test::TestRequest::get()
        .uri(&format!("/videos/user-1/{}", video_id))
        .to_request();
    let fetched: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(fetched["id"], video_id.as_str());

    let req = test::TestRequest::delete()
        .uri(&format!("/videos/user-1/{}", video_id))
        .to_request();
    let deleted: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(deleted["gallery"]["freeStorage"], 50 * MIB);
    assert_eq!(deleted["gallery"]["freeBandwidth"], 100 * MIB - 2048);
    assert_eq!(deleted["gallery"]["videos"].as_array().unwrap().len(), 0);

    let removed = state
        .outbox
        .all()
        .into_iter()
        .filter(|r| r.event_type == event_types::VIDEO_REMOVED)
        .count();
    assert_eq!(removed, 3);
}

#[actix_web::test]
async fn test_upload_without_video_part() {
    let state = build_state();
    state.gallery.create_gallery("user-1").await.unwrap();
    let app = app!(state);

    let body = multipart_body(&[("title", None, &b"Nothing attached"[..])]);
    let resp = test::call_service(&app, upload_request("user-1", body).to_request()).await;
    assert_eq!(resp.status().as_u16(), 400);

    let err: Value = test::read_body_json(resp).await;
    assert_eq!(err["message"], "No video file uploaded");
}

#[actix_web::test]
async fn test_oversized_upload_is_refused_while_streaming() {
    let state = build_state_with(QuotaDefaults {
        free_storage: 1024,
        free_bandwidth: 4096,
    });
    state.gallery.create_gallery("user-1").await.unwrap();
    let app = app!(state);

    let frames = vec![7u8; 2048];
    let body = multipart_body(&[
        ("title", None, &b"Too big"[..]),
        ("video", Some("huge.mp4"), &frames[..]),
    ]);
    let resp = test::call_service(&app, upload_request("user-1", body).to_request()).await;
    assert_eq!(resp.status().as_u16(), 400);

    let err: Value = test::read_body_json(resp).await;
    assert_eq!(err["message"], "Insufficient storage space");
    assert_eq!(err["code"], "INSUFFICIENT_STORAGE");

    let stored = state.galleries.get("user-1").await.unwrap().unwrap().doc;
    assert_eq!(stored.free_storage, 1024);
    assert!(stored.videos.is_empty());
    assert!(state.outbox.all().is_empty());

    // At the limit is still fine.
    let frames = vec![7u8; 1024];
    let body = multipart_body(&[("video", Some("fits.mp4"), &frames[..])]);
    let resp = test::call_service(&app, upload_request("user-1", body).to_request()).await;
    assert_eq!(resp.status().as_u16(), 201);
}

#[actix_web::test]
async fn test_upload_rejects_bad_extension_and_missing_gallery() {
    let state = build_state();
    state.gallery.create_gallery("user-1").await.unwrap();
    let app = app!(state);

    let body = multipart_body(&[("video", Some("slides.pdf"), &b"%PDF"[..])]);
    let resp = test::call_service(&app, upload_request("user-1", body).to_request()).await;
    assert_eq!(resp.status().as_u16(), 400);

    let body = multipart_body(&[("video", Some("clip.mp4"), &b"frames"[..])]);
    let resp = test::call_service(&app, upload_request("ghost", body).to_request()).await;
    assert_eq!(resp.status().as_u16(), 404);
    let err: Value = test::read_body_json(resp).await;
    assert_eq!(err["message"], "Gallery not found");

    assert!(state.outbox.all().is_empty());
}

#[actix_web::test]
async fn test_storage_updated_refreshes_counters() {
    let state = build_state();
    state.gallery.create_gallery("user-1").await.unwrap();
    let app = app!(state);

    let update = |event_id: &str, free: u64, version: u64| {
        json!({
            "eventId": event_id,
            "type": "StorageUpdated",
            "data": {
                "userId": "user-1",
                "totalStorage": 50 * MIB,
                "usedStorage": 50 * MIB - free,
                "freeStorage": free,
                "version": version
            }
        })
    };

    let req = test::TestRequest::post()
        .uri("/videos/events")
        .set_json(update("0d7c5f3c-3c0a-4f7e-8a2e-6a8f2c8f0001", 49 * MIB, 3))
        .to_request();
    assert!(test::call_service(&app, req).await.status().is_success());

    let req = test::TestRequest::post()
        .uri("/videos/events")
        .set_json(update("0d7c5f3c-3c0a-4f7e-8a2e-6a8f2c8f0002", 10 * MIB, 2))
        .to_request();
    assert!(test::call_service(&app, req).await.status().is_success());

    let stored = state.galleries.get("user-1").await.unwrap().unwrap().doc;
    assert_eq!(stored.free_storage, 49 * MIB);
    assert_eq!(stored.storage_version, 3);
}

#[actix_web::test]
async fn test_health_and_metrics() {
    let state = build_state();
    let app = app!(state);

    let req = test::TestRequest::get().uri("/health").to_request();
    let health: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(health["status"], "ok");

    let req = test::TestRequest::get().uri("/metrics").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
}
