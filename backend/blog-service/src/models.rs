//! Blog domain documents and request/response DTOs.
//!
//! Relations (follow, like, save) are documents whose id is derived from the pair they
//! connect, so creating one twice hits `AlreadyExists` instead of producing a duplicate.

use chrono::{DateTime, Utc};
use document_store::Document;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! document {
    ($ty:ty, $collection:literal) => {
        impl Document for $ty {
            const COLLECTION: &'static str = $collection;

            fn id(&self) -> &str {
                &self.id
            }
        }
    };
}

// ============================================================================
// ACCOUNTS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

document!(User, "users");

/// Links shown on a profile. Keyed by the owning user id.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SocialMedia {
    pub id: String,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub twitter: Option<String>,
    #[serde(default)]
    pub facebook: Option<String>,
    #[serde(default)]
    pub instagram: Option<String>,
    #[serde(default)]
    pub linkedin: Option<String>,
    #[serde(default)]
    pub github: Option<String>,
}

document!(SocialMedia, "social_media");

// ============================================================================
// CONTENT
// ============================================================================

/// Keyed by the slug of its name, which makes names unique.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

document!(Category, "categories");

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Blog {
    pub id: String,
    pub author_id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

document!(Blog, "blogs");

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub blog_id: String,
    pub author_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

document!(Comment, "comments");

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub id: String,
    pub comment_id: String,
    pub blog_id: String,
    pub author_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

document!(Reply, "replies");

// ============================================================================
// RELATIONS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Follow {
    pub id: String,
    pub follower_id: String,
    pub followee_id: String,
    pub created_at: DateTime<Utc>,
}

document!(Follow, "follows");

impl Follow {
    pub fn key(follower_id: &str, followee_id: &str) -> String {
        format!("{}:{}", follower_id, followee_id)
    }

    pub fn new(follower_id: &str, followee_id: &str) -> Self {
        Self {
            id: Self::key(follower_id, followee_id),
            follower_id: follower_id.to_string(),
            followee_id: followee_id.to_string(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Like {
    pub id: String,
    pub user_id: String,
    pub blog_id: String,
    pub created_at: DateTime<Utc>,
}

document!(Like, "likes");

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Save {
    pub id: String,
    pub user_id: String,
    pub blog_id: String,
    pub created_at: DateTime<Utc>,
}

document!(Save, "saves");

/// A user-to-blog relation stored under `"{userId}:{blogId}"`.
pub trait BlogRelation: Document {
    fn new(user_id: &str, blog_id: &str) -> Self;

    fn key(user_id: &str, blog_id: &str) -> String {
        format!("{}:{}", user_id, blog_id)
    }
}

impl BlogRelation for Like {
    fn new(user_id: &str, blog_id: &str) -> Self {
        Self {
            id: Self::key(user_id, blog_id),
            user_id: user_id.to_string(),
            blog_id: blog_id.to_string(),
            created_at: Utc::now(),
        }
    }
}

impl BlogRelation for Save {
    fn new(user_id: &str, blog_id: &str) -> Self {
        Self {
            id: Self::key(user_id, blog_id),
            user_id: user_id.to_string(),
            blog_id: blog_id.to_string(),
            created_at: Utc::now(),
        }
    }
}

// ============================================================================
// NOTIFICATIONS
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Like,
    Follow,
    Save,
    Comment,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Like => "like",
            NotificationKind::Follow => "follow",
            NotificationKind::Save => "save",
            NotificationKind::Comment => "comment",
        }
    }
}

/// `"{kind}:{actorId}:{targetId}"`. The target is the blog for likes and saves, the
/// followed user for follows and the comment for comments.
pub fn correlation_key(kind: NotificationKind, actor_id: &str, target_id: &str) -> String {
    format!("{}:{}:{}", kind.as_str(), actor_id, target_id)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub recipient_id: String,
    pub actor_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    #[serde(default)]
    pub blog_id: Option<String>,
    #[serde(default)]
    pub comment_id: Option<String>,
    pub message: String,
    pub correlation_key: String,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

document!(Notification, "notifications");

// ============================================================================
// MAILING
// ============================================================================

/// Ownership of an address, keyed by the lower-cased email. Inserting it is what makes
/// an email unique across accounts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmailClaim {
    pub id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

document!(EmailClaim, "emails");

/// Newsletter subscription keyed by the lower-cased address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

document!(Subscription, "subscriptions");

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub subject: Option<String>,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

document!(Contact, "contacts");

// ============================================================================
// REQUESTS
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub name: String,
    #[serde(default)]
    pub username: Option<String>,
    pub email: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialMediaRequest {
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub twitter: Option<String>,
    #[serde(default)]
    pub facebook: Option<String>,
    #[serde(default)]
    pub instagram: Option<String>,
    #[serde(default)]
    pub linkedin: Option<String>,
    #[serde(default)]
    pub github: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBlogRequest {
    pub author_id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategoryRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    pub author_id: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub subject: Option<String>,
    pub message: String,
}

// ============================================================================
// RESPONSES
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: User,
    pub social_media: Option<SocialMedia>,
    pub followers: usize,
    pub following: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentThread {
    #[serde(flatten)]
    pub comment: Comment,
    pub replies: Vec<Reply>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogDetail {
    #[serde(flatten)]
    pub blog: Blog,
    pub likes: usize,
    pub saves: usize,
    pub comments: Vec<CommentThread>,
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Lower-case, dash-separated form of a category name.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Minimal shape check; address verification is not done here.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.trim().split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_ids_are_deterministic() {
        assert_eq!(Follow::new("a", "b").id, "a:b");
        assert_eq!(<Like as BlogRelation>::new("u", "p").id, "u:p");
        assert_eq!(correlation_key(NotificationKind::Follow, "a", "b"), "follow:a:b");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("  Rust & Systems "), "rust-systems");
        assert_eq!(slugify("Travel"), "travel");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_email_shape() {
        assert!(is_valid_email("ada@example.com"));
        assert!(!is_valid_email("ada@example"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("ada.example.com"));
    }

    #[test]
    fn test_notification_serializes_kind_as_type() {
        let notification = Notification {
            id: "n1".into(),
            recipient_id: "b".into(),
            actor_id: "a".into(),
            kind: NotificationKind::Follow,
            blog_id: None,
            comment_id: None,
            message: "Ada started following you".into(),
            correlation_key: correlation_key(NotificationKind::Follow, "a", "b"),
            read: false,
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&notification).unwrap();
        assert_eq!(value["type"], "follow");
        assert_eq!(value["correlationKey"], "follow:a:b");
    }
}
