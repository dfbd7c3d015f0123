//! Blog Service
//!
//! The social side of Inkwell: accounts, posts, categories, comments and replies, the
//! follow graph, likes and saves. Social actions raise notifications that are pushed over
//! WebSockets; user, post and comment deletes cascade through a compensating saga. New
//! accounts are announced to the quota services with `UserCreated`.

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod realtime;
pub mod saga;
pub mod services;

use std::sync::Arc;

use document_store::DocumentCollection;
use transactional_outbox::{EventPropagator, OutboxRepository};

// Public re-exports
pub use config::Config;
pub use error::{AppError, Result};
pub use models::{
    Blog, Category, Comment, Contact, EmailClaim, Follow, Like, Notification, Reply, Save,
    SocialMedia, Subscription, User,
};
pub use realtime::{RealtimeTransport, TransportError};
pub use saga::{SagaPolicy, SagaReport};
pub use services::{
    BlogService, CascadeService, ContactService, NotificationService, SocialService, UserService,
};

/// Document collections blog-service reads and writes.
#[derive(Clone)]
pub struct BlogCollections {
    pub users: Arc<dyn DocumentCollection<User>>,
    pub emails: Arc<dyn DocumentCollection<EmailClaim>>,
    pub social_media: Arc<dyn DocumentCollection<SocialMedia>>,
    pub categories: Arc<dyn DocumentCollection<Category>>,
    pub blogs: Arc<dyn DocumentCollection<Blog>>,
    pub comments: Arc<dyn DocumentCollection<Comment>>,
    pub replies: Arc<dyn DocumentCollection<Reply>>,
    pub follows: Arc<dyn DocumentCollection<Follow>>,
    pub likes: Arc<dyn DocumentCollection<Like>>,
    pub saves: Arc<dyn DocumentCollection<Save>>,
    pub notifications: Arc<dyn DocumentCollection<Notification>>,
    pub subscriptions: Arc<dyn DocumentCollection<Subscription>>,
    pub contacts: Arc<dyn DocumentCollection<Contact>>,
}

/// Services behind the HTTP routes.
#[derive(Clone)]
pub struct BlogServices {
    pub users: UserService,
    pub blogs: BlogService,
    pub social: SocialService,
    pub notifications: NotificationService,
    pub cascade: CascadeService,
    pub contact: ContactService,
    pub transport: RealtimeTransport,
}

/// Wire the blog services over the given collaborators. The transport is shared, so the
/// caller decides when it starts.
pub fn build_services(
    collections: BlogCollections,
    outbox: Arc<dyn OutboxRepository>,
    transport: RealtimeTransport,
    cascade_policy: SagaPolicy,
) -> BlogServices {
    let propagator = EventPropagator::new(outbox, "blog-service");
    let notifications =
        NotificationService::new(collections.notifications.clone(), transport.clone());
    BlogServices {
        users: UserService::new(collections.clone(), propagator),
        blogs: BlogService::new(collections.clone(), notifications.clone()),
        social: SocialService::new(collections.clone(), notifications.clone()),
        cascade: CascadeService::new(collections.clone(), notifications.clone(), cascade_policy),
        contact: ContactService::new(collections),
        notifications,
        transport,
    }
}

impl BlogServices {
    /// Register every service as app data.
    pub fn app_data(&self, cfg: &mut actix_web::web::ServiceConfig) {
        cfg.app_data(actix_web::web::Data::new(self.users.clone()))
            .app_data(actix_web::web::Data::new(self.blogs.clone()))
            .app_data(actix_web::web::Data::new(self.social.clone()))
            .app_data(actix_web::web::Data::new(self.notifications.clone()))
            .app_data(actix_web::web::Data::new(self.cascade.clone()))
            .app_data(actix_web::web::Data::new(self.contact.clone()))
            .app_data(actix_web::web::Data::new(self.transport.clone()));
    }
}

impl BlogCollections {
    /// Every collection held in memory.
    pub fn in_memory() -> Self {
        use document_store::MemoryCollection;
        Self {
            users: Arc::new(MemoryCollection::<User>::new()),
            emails: Arc::new(MemoryCollection::<EmailClaim>::new()),
            social_media: Arc::new(MemoryCollection::<SocialMedia>::new()),
            categories: Arc::new(MemoryCollection::<Category>::new()),
            blogs: Arc::new(MemoryCollection::<Blog>::new()),
            comments: Arc::new(MemoryCollection::<Comment>::new()),
            replies: Arc::new(MemoryCollection::<Reply>::new()),
            follows: Arc::new(MemoryCollection::<Follow>::new()),
            likes: Arc::new(MemoryCollection::<Like>::new()),
            saves: Arc::new(MemoryCollection::<Save>::new()),
            notifications: Arc::new(MemoryCollection::<Notification>::new()),
            subscriptions: Arc::new(MemoryCollection::<Subscription>::new()),
            contacts: Arc::new(MemoryCollection::<Contact>::new()),
        }
    }

    /// Every collection in the shared PostgreSQL documents table.
    pub fn postgres(pool: sqlx::PgPool) -> Self {
        use document_store::PgCollection;
        Self {
            users: Arc::new(PgCollection::<User>::new(pool.clone())),
            emails: Arc::new(PgCollection::<EmailClaim>::new(pool.clone())),
            social_media: Arc::new(PgCollection::<SocialMedia>::new(pool.clone())),
            categories: Arc::new(PgCollection::<Category>::new(pool.clone())),
            blogs: Arc::new(PgCollection::<Blog>::new(pool.clone())),
            comments: Arc::new(PgCollection::<Comment>::new(pool.clone())),
            replies: Arc::new(PgCollection::<Reply>::new(pool.clone())),
            follows: Arc::new(PgCollection::<Follow>::new(pool.clone())),
            likes: Arc::new(PgCollection::<Like>::new(pool.clone())),
            saves: Arc::new(PgCollection::<Save>::new(pool.clone())),
            notifications: Arc::new(PgCollection::<Notification>::new(pool.clone())),
            subscriptions: Arc::new(PgCollection::<Subscription>::new(pool.clone())),
            contacts: Arc::new(PgCollection::<Contact>::new(pool)),
        }
    }
}
