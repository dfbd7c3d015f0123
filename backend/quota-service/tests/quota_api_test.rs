use actix_web::{test, App};
use idempotent_consumer::InMemoryProcessedEventStore;
use quota_events::{event_types, MIB};
use quota_service::{build_services, handlers, QuotaCollections, QuotaLimits, QuotaServices};
use serde_json::{json, Value};
use std::sync::Arc;
use transactional_outbox::InMemoryOutboxRepository;

struct TestState {
    services: QuotaServices,
    outbox: Arc<InMemoryOutboxRepository>,
}

fn build_state() -> TestState {
    let outbox = Arc::new(InMemoryOutboxRepository::new());
    let services = build_services(
        QuotaCollections::in_memory(),
        outbox.clone(),
        Arc::new(InMemoryProcessedEventStore::new()),
        QuotaLimits::default(),
    );
    TestState { services, outbox }
}

macro_rules! app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .configure(|cfg| $state.services.app_data(cfg))
                .configure(handlers::register_routes),
        )
        .await
    };
}

fn user_created(event_id: &str) -> Value {
    json!({
        "eventId": event_id,
        "type": "UserCreated",
        "data": { "userId": "user-1", "username": "ada", "email": "ada@example.com" }
    })
}

fn video_added(event_id: &str, video_id: &str, size: u64) -> Value {
    json!({
        "eventId": event_id,
        "type": "videosAdded",
        "data": {
            "userId": "user-1",
            "video": { "id": video_id, "title": "clip", "size": size, "url": "memory://clip" }
        }
    })
}

fn video_removed(event_id: &str, video_id: &str, size: u64) -> Value {
    json!({
        "eventId": event_id,
        "type": "videoRemoved",
        "data": { "userId": "user-1", "videoId": video_id, "videoSize": size }
    })
}

macro_rules! post {
    ($app:expr, $uri:expr, $body:expr $(,)?) => {{
        let req = test::TestRequest::post().uri($uri).set_json($body).to_request();
        test::call_service(&$app, req).await.status().as_u16()
    }};
}

macro_rules! get_json {
    ($app:expr, $uri:expr) => {{
        let req = test::TestRequest::get().uri($uri).to_request();
        let body: Value = test::call_and_read_body_json(&$app, req).await;
        body
    }};
}

const ROUTES: [&str; 3] = ["/storage/events", "/usagemonitoring/events", "/queries/events"];

#[actix_web::test]
async fn test_user_created_provisions_every_read_model_once() {
    let state = build_state();
    let app = app!(state);

    for _ in 0..2 {
        for route in ROUTES {
            assert_eq!(
                post!(app, route, user_created("7f0e8e52-6a5b-4b8e-9d43-0c1e5a7d1001")),
                200
            );
        }
    }

    let storage = get_json!(app, "/storage/user-1");
    assert_eq!(storage["totalStorage"], 50 * MIB);
    assert_eq!(storage["freeStorage"], 50 * MIB);

    let usage = get_json!(app, "/usagemonitoring/user-1");
    assert_eq!(usage["dailyLimit"], 100 * MIB);
    assert_eq!(usage["freeBandwidth"], 100 * MIB);

    let query = get_json!(app, "/queries/user-1");
    assert_eq!(query["username"], "ada");

    let ledger = get_json!(app, "/ledger/user-1");
    assert_eq!(ledger["entries"].as_array().unwrap().len(), 1);
    assert!(state.outbox.all().is_empty());
}

#[actix_web::test]
async fn test_video_added_updates_trackers_and_publishes_counters() {
    let state = build_state();
    let app = app!(state);
    for route in ROUTES {
        post!(app, route, user_created("7f0e8e52-6a5b-4b8e-9d43-0c1e5a7d2001"));
    }

    let event = video_added("7f0e8e52-6a5b-4b8e-9d43-0c1e5a7d2002", "v1", 1000);
    for route in ROUTES {
        assert_eq!(post!(app, route, event.clone()), 200);
    }

    let storage = get_json!(app, "/storage/user-1");
    assert_eq!(storage["usedStorage"], 1000);
    assert_eq!(storage["freeStorage"], 50 * MIB - 1000);
    assert_eq!(storage["version"], 2);

    let usage = get_json!(app, "/usagemonitoring/user-1");
    assert_eq!(usage["bandwidthTotalUsage"], 1000);
    assert_eq!(usage["freeBandwidth"], 100 * MIB - 1000);

    let query = get_json!(app, "/queries/user-1");
    assert_eq!(query["gallery"]["videos"][0]["id"], "v1");

    let records = state.outbox.all();
    let storage_updates: Vec<_> = records
        .iter()
        .filter(|r| r.event_type == event_types::STORAGE_UPDATED)
        .collect();
    let usage_updates = records
        .iter()
        .filter(|r| r.event_type == event_types::USAGE_UPDATED)
        .count();
    assert_eq!(storage_updates.len(), 2);
    assert_eq!(usage_updates, 2);
    assert_eq!(storage_updates[0].payload["freeStorage"], 50 * MIB - 1000);
}

#[actix_web::test]
async fn test_duplicate_delivery_applies_once() {
    let state = build_state();
    let app = app!(state);
    post!(app, "/storage/events", user_created("7f0e8e52-6a5b-4b8e-9d43-0c1e5a7d3001"));

    let event = video_added("7f0e8e52-6a5b-4b8e-9d43-0c1e5a7d3002", "v1", 10 * MIB);
    for _ in 0..3 {
        assert_eq!(post!(app, "/storage/events", event.clone()), 200);
    }

    let storage = get_json!(app, "/storage/user-1");
    assert_eq!(storage["freeStorage"], 40 * MIB);
    let ledger = get_json!(app, "/ledger/user-1");
    assert_eq!(ledger["head"], 2);
}

#[actix_web::test]
async fn test_removal_restores_storage_but_not_bandwidth() {
    let state = build_state();
    let app = app!(state);
    for route in ["/storage/events", "/usagemonitoring/events"] {
        post!(app, route, user_created("7f0e8e52-6a5b-4b8e-9d43-0c1e5a7d4001"));
        post!(
            app,
            route,
            video_added("7f0e8e52-6a5b-4b8e-9d43-0c1e5a7d4002", "v1", 10 * MIB),
        );
        post!(
            app,
            route,
            video_removed("7f0e8e52-6a5b-4b8e-9d43-0c1e5a7d4003", "v1", 10 * MIB),
        );
    }

    let storage = get_json!(app, "/storage/user-1");
    assert_eq!(storage["freeStorage"], 50 * MIB);
    let usage = get_json!(app, "/usagemonitoring/user-1");
    assert_eq!(usage["freeBandwidth"], 90 * MIB);
}

#[actix_web::test]
async fn test_event_gallery_counts_follow_storage_consumer() {
    let state = build_state();
    let app = app!(state);

    let added = json!({
        "eventId": "7f0e8e52-6a5b-4b8e-9d43-0c1e5a7d5001",
        "type": "eventVideoAdded",
        "data": {
            "userId": "user-1",
            "video": { "id": "v1", "title": "clip", "size": 10, "url": "memory://clip" },
            "eventId": "party-1"
        }
    });
    assert_eq!(post!(app, "/storage/events", added.clone()), 200);
    assert_eq!(post!(app, "/storage/events", added), 200);

    let stats = get_json!(app, "/event-galleries/party-1");
    assert_eq!(stats["totalVideos"], 1);

    for id in ["7f0e8e52-6a5b-4b8e-9d43-0c1e5a7d5002", "7f0e8e52-6a5b-4b8e-9d43-0c1e5a7d5003"] {
        let removed = json!({
            "eventId": id,
            "type": "eventVideoRemoved",
            "data": { "userId": "user-1", "videoId": "v1", "videoSize": 10, "eventId": "party-1" }
        });
        assert_eq!(post!(app, "/storage/events", removed), 200);
    }
    let stats = get_json!(app, "/event-galleries/party-1");
    assert_eq!(stats["totalVideos"], 0);
}

#[actix_web::test]
async fn test_query_ignores_stale_storage_update() {
    let state = build_state();
    let app = app!(state);
    post!(app, "/queries/events", user_created("7f0e8e52-6a5b-4b8e-9d43-0c1e5a7d6001"));

    let update = |id: &str, free: u64, version: u64| {
        json!({
            "eventId": id,
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
    post!(app, "/queries/events", update("7f0e8e52-6a5b-4b8e-9d43-0c1e5a7d6002", 40 * MIB, 3));
    post!(app, "/queries/events", update("7f0e8e52-6a5b-4b8e-9d43-0c1e5a7d6003", 50 * MIB, 2));

    let query = get_json!(app, "/queries/user-1");
    assert_eq!(query["storage"]["free"], 40 * MIB);
    assert_eq!(query["storageVersion"], 3);
}

#[actix_web::test]
async fn test_rebuild_republishes_and_reports() {
    let state = build_state();
    let app = app!(state);
    post!(app, "/storage/events", user_created("7f0e8e52-6a5b-4b8e-9d43-0c1e5a7d7001"));
    post!(
        app,
        "/storage/events",
        video_added("7f0e8e52-6a5b-4b8e-9d43-0c1e5a7d7002", "v1", MIB),
    );
    let before = state.outbox.all().len();

    let req = test::TestRequest::post().uri("/ledger/user-1/rebuild").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["storage"]["freeStorage"], 49 * MIB);
    assert_eq!(body["usage"]["bandwidthTotalUsage"], MIB);
    assert_eq!(state.outbox.all().len(), before + 4);

    let req = test::TestRequest::post().uri("/ledger/ghost/rebuild").to_request();
    assert_eq!(test::call_service(&app, req).await.status().as_u16(), 404);
}

#[actix_web::test]
async fn test_unknown_and_malformed_events() {
    let state = build_state();
    let app = app!(state);

    assert_eq!(
        post!(app, "/storage/events", json!({ "type": "somethingElse", "data": {} })),
        200
    );

    let req = test::TestRequest::post()
        .uri("/usagemonitoring/events")
        .set_json(json!({ "type": "videoRemoved", "data": { "userId": "user-1" } }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 500);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);

    let req = test::TestRequest::get().uri("/storage/nobody").to_request();
    assert_eq!(test::call_service(&app, req).await.status().as_u16(), 404);
}

#[actix_web::test]
async fn test_envelope_without_event_id_is_recorded_once_per_delivery_pair() {
    let state = build_state();
    let app = app!(state);
    let legacy = json!({
        "type": "videosAdded",
        "data": { "userId": "user-1", "video": { "size": 1000 } }
    });

    for route in ["/storage/events", "/usagemonitoring/events"] {
        assert_eq!(post!(app, route, legacy.clone()), 200);
    }

    let storage = get_json!(app, "/storage/user-1");
    assert_eq!(storage["usedStorage"], 1000);
    assert_eq!(storage["freeStorage"], 50 * MIB - 1000);
    let usage = get_json!(app, "/usagemonitoring/user-1");
    assert_eq!(usage["bandwidthTotalUsage"], 1000);

    let published: Vec<_> = state
        .outbox
        .all()
        .into_iter()
        .filter(|r| r.event_type == event_types::STORAGE_UPDATED)
        .collect();
    assert_eq!(published.len(), 2);
    assert_eq!(published[0].payload["freeStorage"], 50 * MIB - 1000);
}
