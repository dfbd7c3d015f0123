use actix_web::{test, App};
use async_trait::async_trait;
use blog_service::realtime::RealtimeMessage;
use blog_service::{
    build_services, handlers, models::CreateUserRequest, BlogCollections, BlogServices, Notification, RealtimeTransport, Reply,
    SagaPolicy,
};
use document_store::{DocumentCollection, Filter, MemoryCollection, StoreError, Versioned};
use quota_events::event_types;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use transactional_outbox::InMemoryOutboxRepository;

struct TestState {
    services: BlogServices,
    collections: BlogCollections,
    outbox: Arc<InMemoryOutboxRepository>,
}

fn build_state_with(collections: BlogCollections, policy: SagaPolicy, started: bool) -> TestState {
    let outbox = Arc::new(InMemoryOutboxRepository::new());
    let transport = RealtimeTransport::new();
    if started {
        transport.start();
    }
    let services = build_services(collections.clone(), outbox.clone(), transport, policy);
    TestState {
        services,
        collections,
        outbox,
    }
}

fn build_state() -> TestState {
    build_state_with(BlogCollections::in_memory(), SagaPolicy::AbortAndCompensate, true)
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

/// Sends a request and returns `(status, json body)`; non-JSON bodies read as `Null`.
macro_rules! send {
    ($app:expr, $req:expr) => {{
        let resp = test::call_service(&$app, $req.to_request()).await;
        let status = resp.status().as_u16();
        let bytes = test::read_body(resp).await;
        let body: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }};
}

macro_rules! create_user {
    ($app:expr, $name:expr, $email:expr) => {{
        let (status, body) = send!(
            $app,
            test::TestRequest::post()
                .uri("/users")
                .set_json(json!({ "name": $name, "email": $email }))
        );
        assert_eq!(status, 201, "{}", body);
        body["user"]["id"].as_str().unwrap().to_string()
    }};
}

macro_rules! create_blog {
    ($app:expr, $author:expr, $title:expr) => {{
        let (status, body) = send!(
            $app,
            test::TestRequest::post().uri("/blogs").set_json(json!({
                "authorId": $author,
                "title": $title,
                "content": "Lorem ipsum dolor sit amet."
            }))
        );
        assert_eq!(status, 201, "{}", body);
        body["blog"]["id"].as_str().unwrap().to_string()
    }};
}

macro_rules! add_comment {
    ($app:expr, $blog:expr, $author:expr) => {{
        let (status, body) = send!(
            $app,
            test::TestRequest::post()
                .uri(&format!("/blogs/{}/comments", $blog))
                .set_json(json!({ "authorId": $author, "content": "Nice read" }))
        );
        assert_eq!(status, 201, "{}", body);
        body["comment"]["id"].as_str().unwrap().to_string()
    }};
}

fn drain(rx: &mut mpsc::UnboundedReceiver<RealtimeMessage>) -> Vec<String> {
    let mut events = Vec::new();
    while let Ok(message) = rx.try_recv() {
        if let RealtimeMessage::Event { event, .. } = message {
            events.push(event);
        }
    }
    events
}

#[actix_web::test]
async fn test_create_user_announces_to_every_destination() {
    let state = build_state();
    let app = app!(state);

    let user_id = create_user!(app, "Ada Lovelace", "Ada@Example.com");

    let records = state.outbox.all();
    assert_eq!(records.len(), 4);
    assert!(records.iter().all(|r| r.event_type == event_types::USER_CREATED));
    assert_eq!(records[0].payload["userId"], user_id.as_str());
    assert_eq!(records[0].payload["username"], "ada");

    let (status, profile) = send!(app, test::TestRequest::get().uri(&format!("/users/{}", user_id)));
    assert_eq!(status, 200);
    assert_eq!(profile["email"], "ada@example.com");
    assert_eq!(profile["followers"], 0);

    let (status, body) = send!(
        app,
        test::TestRequest::post()
            .uri("/users")
            .set_json(json!({ "name": "Copy", "email": "ada@example.com" }))
    );
    assert_eq!(status, 400);
    assert_eq!(body["success"], false);
    assert_eq!(state.outbox.all().len(), 4);
}

#[actix_web::test]
async fn test_user_validation_and_lookup_errors() {
    let state = build_state();
    let app = app!(state);

    let (status, body) = send!(
        app,
        test::TestRequest::post()
            .uri("/users")
            .set_json(json!({ "name": "  ", "email": "ada@example.com" }))
    );
    assert_eq!(status, 400);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, body) = send!(app, test::TestRequest::get().uri("/users/ghost"));
    assert_eq!(status, 404);
    assert_eq!(body["code"], "USER_NOT_FOUND");

    let (status, _) = send!(
        app,
        test::TestRequest::patch()
            .uri("/users/ghost")
            .set_json(json!({ "bio": "hello" }))
    );
    assert_eq!(status, 404);
    assert!(state.outbox.all().is_empty());
}

#[actix_web::test]
async fn test_unfollow_after_rename_removes_the_follow_notification() {
    let state = build_state();
    let app = app!(state);
    let ada = create_user!(app, "Ada", "ada@example.com");
    let bob = create_user!(app, "Bob", "bob@example.com");
    let carol = create_user!(app, "Carol", "carol@example.com");

    let (tx, mut rx) = mpsc::unbounded_channel();
    state.services.transport.subscribe(&bob, tx).await;

    let follow = |who: &str| test::TestRequest::post().uri(&format!("/users/{}/follow/{}", who, bob));
    assert_eq!(send!(app, follow(ada.as_str())).0, 201);
    assert_eq!(send!(app, follow(carol.as_str())).0, 201);

    let (status, _) = send!(
        app,
        test::TestRequest::patch()
            .uri(&format!("/users/{}", ada))
            .set_json(json!({ "name": "Countess Ada" }))
    );
    assert_eq!(status, 200);

    let (status, _) = send!(
        app,
        test::TestRequest::delete().uri(&format!("/users/{}/follow/{}", ada, bob))
    );
    assert_eq!(status, 200);

    let (_, body) = send!(
        app,
        test::TestRequest::get().uri(&format!("/users/{}/notifications", bob))
    );
    let remaining = body["notifications"].as_array().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0]["actorId"], carol.as_str());
    assert_eq!(
        drain(&mut rx),
        vec!["notification", "notification", "notificationRemoved"]
    );
}

#[actix_web::test]
async fn test_follow_rules() {
    let state = build_state();
    let app = app!(state);
    let ada = create_user!(app, "Ada", "ada@example.com");
    let bob = create_user!(app, "Bob", "bob@example.com");

    let uri = format!("/users/{}/follow/{}", ada, bob);
    let (status, _) = send!(
        app,
        test::TestRequest::post().uri(&format!("/users/{}/follow/{}", ada, ada))
    );
    assert_eq!(status, 400);

    assert_eq!(send!(app, test::TestRequest::delete().uri(&uri)).0, 400);
    assert_eq!(send!(app, test::TestRequest::post().uri(&uri)).0, 201);
    let (status, body) = send!(app, test::TestRequest::post().uri(&uri));
    assert_eq!(status, 400);
    assert_eq!(body["message"], "You already follow this user");

    let (status, _) = send!(
        app,
        test::TestRequest::post().uri(&format!("/users/{}/follow/ghost", ada))
    );
    assert_eq!(status, 404);

    let (_, profile) = send!(app, test::TestRequest::get().uri(&format!("/users/{}", bob)));
    assert_eq!(profile["followers"], 1);
}

#[actix_web::test]
async fn test_like_and_save_rules() {
    let state = build_state();
    let app = app!(state);
    let ada = create_user!(app, "Ada", "ada@example.com");
    let bob = create_user!(app, "Bob", "bob@example.com");
    let post = create_blog!(app, ada, "Notes on the Analytical Engine");

    let like = format!("/blogs/{}/like/{}", post, bob);
    let (status, body) = send!(
        app,
        test::TestRequest::post().uri(&format!("/blogs/{}/like/{}", post, ada))
    );
    assert_eq!(status, 400);
    assert_eq!(body["message"], "You cannot like your own post");

    let (status, body) = send!(app, test::TestRequest::post().uri(&like));
    assert_eq!(status, 200);
    assert_eq!(body["likes"], 1);
    assert_eq!(send!(app, test::TestRequest::post().uri(&like)).0, 400);

    let save = format!("/blogs/{}/save/{}", post, bob);
    let (status, body) = send!(app, test::TestRequest::post().uri(&save));
    assert_eq!(status, 200);
    assert_eq!(body["saves"], 1);

    let (_, body) = send!(
        app,
        test::TestRequest::get().uri(&format!("/users/{}/notifications", ada))
    );
    assert_eq!(body["count"], 2);

    let (status, body) = send!(app, test::TestRequest::delete().uri(&like));
    assert_eq!(status, 200);
    assert_eq!(body["likes"], 0);
    assert_eq!(send!(app, test::TestRequest::delete().uri(&like)).0, 400);

    let (_, body) = send!(
        app,
        test::TestRequest::get().uri(&format!("/users/{}/notifications", ada))
    );
    assert_eq!(body["count"], 1);
    assert_eq!(body["notifications"][0]["type"], "save");

    let (status, body) = send!(
        app,
        test::TestRequest::post().uri(&format!("/blogs/ghost/like/{}", bob))
    );
    assert_eq!(status, 404);
    assert_eq!(body["code"], "BLOG_NOT_FOUND");
}

#[actix_web::test]
async fn test_social_actions_succeed_while_transport_is_down() {
    let state = build_state_with(
        BlogCollections::in_memory(),
        SagaPolicy::AbortAndCompensate,
        false,
    );
    let app = app!(state);
    let ada = create_user!(app, "Ada", "ada@example.com");
    let bob = create_user!(app, "Bob", "bob@example.com");

    let (status, _) = send!(
        app,
        test::TestRequest::post().uri(&format!("/users/{}/follow/{}", ada, bob))
    );
    assert_eq!(status, 201);
    let (_, body) = send!(
        app,
        test::TestRequest::get().uri(&format!("/users/{}/notifications", bob))
    );
    assert_eq!(body["count"], 1);
    assert_eq!(body["unread"], 1);

    let id = body["notifications"][0]["id"].as_str().unwrap().to_string();
    let (status, body) = send!(
        app,
        test::TestRequest::post().uri(&format!("/notifications/{}/read", id))
    );
    assert_eq!(status, 200);
    assert_eq!(body["read"], true);
}

#[actix_web::test]
async fn test_comment_delete_removes_replies_and_notification() {
    let state = build_state();
    let app = app!(state);
    let ada = create_user!(app, "Ada", "ada@example.com");
    let bob = create_user!(app, "Bob", "bob@example.com");
    let post = create_blog!(app, ada, "On Bernoulli numbers");

    let own = add_comment!(app, post, ada);
    let comment = add_comment!(app, post, bob);
    let (status, _) = send!(
        app,
        test::TestRequest::post()
            .uri(&format!("/comments/{}/replies", comment))
            .set_json(json!({ "authorId": ada, "content": "Thanks!" }))
    );
    assert_eq!(status, 201);

    let (_, body) = send!(
        app,
        test::TestRequest::get().uri(&format!("/users/{}/notifications", ada))
    );
    assert_eq!(body["count"], 1);
    assert_eq!(body["notifications"][0]["commentId"], comment.as_str());

    let (_, detail) = send!(app, test::TestRequest::get().uri(&format!("/blogs/{}", post)));
    assert_eq!(detail["comments"].as_array().unwrap().len(), 2);
    assert_eq!(detail["comments"][1]["replies"][0]["content"], "Thanks!");

    let (status, _) = send!(
        app,
        test::TestRequest::delete().uri(&format!("/comments/{}?userId=ghost", comment))
    );
    assert_eq!(status, 403);

    let (status, body) = send!(
        app,
        test::TestRequest::delete().uri(&format!("/comments/{}?userId={}", comment, bob))
    );
    assert_eq!(status, 200);
    assert_eq!(body["report"]["completed"][0]["affected"], 1);

    let (_, body) = send!(
        app,
        test::TestRequest::get().uri(&format!("/users/{}/notifications", ada))
    );
    assert_eq!(body["count"], 0);
    let (_, detail) = send!(app, test::TestRequest::get().uri(&format!("/blogs/{}", post)));
    assert_eq!(detail["comments"][0]["id"], own.as_str());
    assert_eq!(detail["comments"].as_array().unwrap().len(), 1);
    assert!(state.collections.replies.find(&Filter::new()).await.unwrap().is_empty());

    let (status, body) = send!(app, test::TestRequest::delete().uri("/comments/ghost"));
    assert_eq!(status, 404);
    assert_eq!(body["code"], "COMMENT_NOT_FOUND");
}

#[actix_web::test]
async fn test_user_delete_cascades() {
    let state = build_state();
    let app = app!(state);
    let ada = create_user!(app, "Ada", "ada@example.com");
    let bob = create_user!(app, "Bob", "bob@example.com");
    let ada_post = create_blog!(app, ada, "Sketch of the engine");
    let bob_post = create_blog!(app, bob, "Bob's travel notes");

    add_comment!(app, ada_post, bob);
    add_comment!(app, bob_post, ada);
    send!(app, test::TestRequest::post().uri(&format!("/blogs/{}/like/{}", ada_post, bob)));
    send!(app, test::TestRequest::post().uri(&format!("/blogs/{}/save/{}", bob_post, ada)));
    send!(app, test::TestRequest::post().uri(&format!("/users/{}/follow/{}", bob, ada)));
    send!(
        app,
        test::TestRequest::put()
            .uri(&format!("/users/{}/social-media", ada))
            .set_json(json!({ "github": "ada" }))
    );

    let (status, body) = send!(app, test::TestRequest::delete().uri(&format!("/users/{}", ada)));
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["report"]["failed"].as_array().unwrap().len(), 0);

    assert_eq!(send!(app, test::TestRequest::get().uri(&format!("/users/{}", ada))).0, 404);
    assert_eq!(send!(app, test::TestRequest::get().uri(&format!("/blogs/{}", ada_post))).0, 404);

    let (_, detail) = send!(app, test::TestRequest::get().uri(&format!("/blogs/{}", bob_post)));
    assert_eq!(detail["comments"].as_array().unwrap().len(), 0);
    assert_eq!(detail["saves"], 0);

    let (_, body) = send!(
        app,
        test::TestRequest::get().uri(&format!("/users/{}/notifications", bob))
    );
    assert_eq!(body["count"], 0);
    let (_, profile) = send!(app, test::TestRequest::get().uri(&format!("/users/{}", bob)));
    assert_eq!(profile["following"], 0);
    assert!(state.collections.social_media.get(&ada).await.unwrap().is_none());

    // The address is free again once its owner is gone.
    assert!(state.collections.emails.get("ada@example.com").await.unwrap().is_none());
    create_user!(app, "Ada", "ADA@example.com");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_signups_claim_an_email_once() {
    let state = build_state();

    let attempts: Vec<_> = (0..8)
        .map(|i| {
            let users = state.services.users.clone();
            tokio::spawn(async move {
                users
                    .create(CreateUserRequest {
                        name: format!("Ada {}", i),
                        username: None,
                        email: "ada@example.com".into(),
                        bio: None,
                        avatar: None,
                    })
                    .await
            })
        })
        .collect();

    let mut created = 0;
    for attempt in futures::future::join_all(attempts).await {
        match attempt.unwrap() {
            Ok(_) => created += 1,
            Err(e) => assert_eq!(e.to_string(), "Bad request: Email is already registered"),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(state.collections.users.find(&Filter::new()).await.unwrap().len(), 1);
    let claim = state.collections.emails.get("ada@example.com").await.unwrap().unwrap().doc;
    let user = state.collections.users.get(&claim.user_id).await.unwrap();
    assert!(user.is_some());
}

/// Reply collection whose deletes always fail.
struct BrokenReplies(MemoryCollection<Reply>);

#[async_trait]
impl DocumentCollection<Reply> for BrokenReplies {
    async fn get(&self, id: &str) -> Result<Option<Versioned<Reply>>, StoreError> {
        self.0.get(id).await
    }

    async fn find(&self, filter: &Filter) -> Result<Vec<Versioned<Reply>>, StoreError> {
        self.0.find(filter).await
    }

    async fn insert(&self, doc: Reply) -> Result<Versioned<Reply>, StoreError> {
        self.0.insert(doc).await
    }

    async fn replace(&self, doc: Reply, expected_version: u64) -> Result<Versioned<Reply>, StoreError> {
        self.0.replace(doc, expected_version).await
    }

    async fn delete(&self, _id: &str) -> Result<Option<Reply>, StoreError> {
        Err(StoreError::Database(sqlx::Error::Protocol("connection reset".to_string())))
    }

    async fn delete_many(&self, _filter: &Filter) -> Result<Vec<Reply>, StoreError> {
        Err(StoreError::Database(sqlx::Error::Protocol("connection reset".to_string())))
    }
}

fn broken_collections() -> BlogCollections {
    let mut collections = BlogCollections::in_memory();
    collections.replies = Arc::new(BrokenReplies(MemoryCollection::new()));
    collections
}

#[actix_web::test]
async fn test_failed_cascade_restores_everything() {
    let state = build_state_with(broken_collections(), SagaPolicy::AbortAndCompensate, true);
    let app = app!(state);
    let ada = create_user!(app, "Ada", "ada@example.com");
    let bob = create_user!(app, "Bob", "bob@example.com");
    let post = create_blog!(app, ada, "Sketch of the engine");
    let comment = add_comment!(app, post, bob);
    send!(
        app,
        test::TestRequest::post()
            .uri(&format!("/comments/{}/replies", comment))
            .set_json(json!({ "authorId": ada, "content": "Thanks!" }))
    );

    let (status, body) = send!(app, test::TestRequest::delete().uri(&format!("/blogs/{}", post)));
    assert_eq!(status, 500);
    assert_eq!(body["report"]["failed"][0]["step"], "replies");
    assert_eq!(body["report"]["compensated"], json!(["replies", "comments"]));

    let (status, detail) = send!(app, test::TestRequest::get().uri(&format!("/blogs/{}", post)));
    assert_eq!(status, 200);
    assert_eq!(detail["comments"].as_array().unwrap().len(), 1);
    assert_eq!(detail["comments"][0]["replies"].as_array().unwrap().len(), 1);
    let (_, body) = send!(
        app,
        test::TestRequest::get().uri(&format!("/users/{}/notifications", ada))
    );
    assert_eq!(body["count"], 1);
}

#[actix_web::test]
async fn test_best_effort_cascade_reports_failures() {
    let state = build_state_with(broken_collections(), SagaPolicy::BestEffort, true);
    let app = app!(state);
    let ada = create_user!(app, "Ada", "ada@example.com");
    let bob = create_user!(app, "Bob", "bob@example.com");
    let post = create_blog!(app, ada, "Sketch of the engine");
    let comment = add_comment!(app, post, bob);
    send!(
        app,
        test::TestRequest::post()
            .uri(&format!("/comments/{}/replies", comment))
            .set_json(json!({ "authorId": ada, "content": "Thanks!" }))
    );

    let (status, body) = send!(
        app,
        test::TestRequest::delete().uri(&format!("/blogs/{}?userId={}", post, ada))
    );
    assert_eq!(status, 200);
    assert_eq!(body["message"], "Blog deleted with errors");
    assert_eq!(body["report"]["failed"][0]["step"], "replies");
    assert_eq!(send!(app, test::TestRequest::get().uri(&format!("/blogs/{}", post))).0, 404);
}

/// Notification collection that refuses inserts while `refuse` is set.
#[derive(Default)]
struct RefusingNotifications {
    inner: MemoryCollection<Notification>,
    refuse: AtomicBool,
}

#[async_trait]
impl DocumentCollection<Notification> for RefusingNotifications {
    async fn get(&self, id: &str) -> Result<Option<Versioned<Notification>>, StoreError> {
        self.inner.get(id).await
    }

    async fn find(&self, filter: &Filter) -> Result<Vec<Versioned<Notification>>, StoreError> {
        self.inner.find(filter).await
    }

    async fn insert(&self, doc: Notification) -> Result<Versioned<Notification>, StoreError> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        self.inner.insert(doc).await
    }

    async fn replace(
        &self,
        doc: Notification,
        expected_version: u64,
    ) -> Result<Versioned<Notification>, StoreError> {
        self.inner.replace(doc, expected_version).await
    }

    async fn delete(&self, id: &str) -> Result<Option<Notification>, StoreError> {
        self.inner.delete(id).await
    }

    async fn delete_many(&self, filter: &Filter) -> Result<Vec<Notification>, StoreError> {
        self.inner.delete_many(filter).await
    }
}

#[actix_web::test]
async fn test_failed_notification_leaves_no_orphan_relation() {
    let notifications = Arc::new(RefusingNotifications::default());
    let mut collections = BlogCollections::in_memory();
    collections.notifications = notifications.clone();
    let state = build_state_with(collections, SagaPolicy::AbortAndCompensate, true);
    let app = app!(state);
    let ada = create_user!(app, "Ada", "ada@example.com");
    let bob = create_user!(app, "Bob", "bob@example.com");
    let post = create_blog!(app, ada, "Sketch of the engine");

    notifications.refuse.store(true, Ordering::SeqCst);
    let follow = format!("/users/{}/follow/{}", bob, ada);
    let like = format!("/blogs/{}/like/{}", post, bob);
    assert_eq!(send!(app, test::TestRequest::post().uri(&follow)).0, 500);
    assert_eq!(send!(app, test::TestRequest::post().uri(&like)).0, 500);
    assert!(state.collections.follows.find(&Filter::new()).await.unwrap().is_empty());
    assert!(state.collections.likes.find(&Filter::new()).await.unwrap().is_empty());

    // Retrying once the store recovers is not mistaken for a duplicate.
    notifications.refuse.store(false, Ordering::SeqCst);
    assert_eq!(send!(app, test::TestRequest::post().uri(&follow)).0, 201);
    let (status, body) = send!(app, test::TestRequest::post().uri(&like));
    assert_eq!(status, 200);
    assert_eq!(body["likes"], 1);
    let (_, body) = send!(
        app,
        test::TestRequest::get().uri(&format!("/users/{}/notifications", ada))
    );
    assert_eq!(body["count"], 2);
}

#[actix_web::test]
async fn test_blog_delete_requires_author() {
    let state = build_state();
    let app = app!(state);
    let ada = create_user!(app, "Ada", "ada@example.com");
    let bob = create_user!(app, "Bob", "bob@example.com");
    let post = create_blog!(app, ada, "Sketch of the engine");

    let (status, body) = send!(
        app,
        test::TestRequest::delete().uri(&format!("/blogs/{}?userId={}", post, bob))
    );
    assert_eq!(status, 403);
    assert_eq!(body["code"], "FORBIDDEN");
    assert_eq!(send!(app, test::TestRequest::get().uri(&format!("/blogs/{}", post))).0, 200);
}

#[actix_web::test]
async fn test_categories_and_filtered_listing() {
    let state = build_state();
    let app = app!(state);
    let ada = create_user!(app, "Ada", "ada@example.com");

    let (status, category) = send!(
        app,
        test::TestRequest::post()
            .uri("/categories")
            .set_json(json!({ "name": "Computing History" }))
    );
    assert_eq!(status, 201);
    assert_eq!(category["id"], "computing-history");
    let (status, _) = send!(
        app,
        test::TestRequest::post()
            .uri("/categories")
            .set_json(json!({ "name": "computing history" }))
    );
    assert_eq!(status, 400);

    let (status, _) = send!(
        app,
        test::TestRequest::post().uri("/blogs").set_json(json!({
            "authorId": ada,
            "title": "The first program",
            "content": "Note G.",
            "categoryId": "computing-history"
        }))
    );
    assert_eq!(status, 201);
    create_blog!(app, ada, "Uncategorised");

    let (_, body) = send!(app, test::TestRequest::get().uri("/blogs?category=computing-history"));
    assert_eq!(body["count"], 1);
    assert_eq!(body["blogs"][0]["title"], "The first program");
    let (_, body) = send!(app, test::TestRequest::get().uri("/blogs"));
    assert_eq!(body["count"], 2);
    assert_eq!(send!(app, test::TestRequest::get().uri("/blogs?category=nope")).0, 404);

    let (_, categories) = send!(app, test::TestRequest::get().uri("/categories"));
    assert_eq!(categories.as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn test_subscriptions_and_contacts() {
    let state = build_state();
    let app = app!(state);

    let subscribe = || {
        test::TestRequest::post()
            .uri("/subscriptions")
            .set_json(json!({ "email": "Reader@Example.com" }))
    };
    assert_eq!(send!(app, subscribe()).0, 201);
    let (status, body) = send!(app, subscribe());
    assert_eq!(status, 200);
    assert_eq!(body["message"], "Already subscribed");

    let (status, _) = send!(
        app,
        test::TestRequest::post().uri("/contacts").set_json(json!({
            "name": "Reader",
            "email": "reader@example.com",
            "message": "Loved the engine post."
        }))
    );
    assert_eq!(status, 201);
    let (status, _) = send!(
        app,
        test::TestRequest::post().uri("/contacts").set_json(json!({
            "name": "Reader",
            "email": "not-an-email",
            "message": "Hi"
        }))
    );
    assert_eq!(status, 400);
}
