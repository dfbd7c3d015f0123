/// Business logic for blog-service
pub mod blogs;
pub mod cascade;
pub mod contact;
pub mod notifications;
pub mod social;
pub mod users;

pub use blogs::BlogService;
pub use cascade::CascadeService;
pub use contact::ContactService;
pub use notifications::{NotificationService, NotificationTarget};
pub use social::SocialService;
pub use users::UserService;
