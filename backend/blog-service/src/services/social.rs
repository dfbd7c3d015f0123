//! Follow graph, likes and saves, each paired with a notification.

use crate::error::{AppError, Result};
use crate::models::{Blog, BlogRelation, Follow, Like, NotificationKind, Save, User};
use crate::services::notifications::{NotificationService, NotificationTarget};
use crate::BlogCollections;
use document_store::{Document, DocumentCollection, Filter, StoreError};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct SocialService {
    collections: BlogCollections,
    notifications: NotificationService,
}

impl SocialService {
    pub fn new(collections: BlogCollections, notifications: NotificationService) -> Self {
        Self {
            collections,
            notifications,
        }
    }

    pub async fn follow(&self, follower_id: &str, followee_id: &str) -> Result<Follow> {
        if follower_id == followee_id {
            return Err(AppError::BadRequest("You cannot follow yourself".to_string()));
        }
        let follower = self.user(follower_id).await?;
        self.user(followee_id).await?;

        let follow = match self.collections.follows.insert(Follow::new(follower_id, followee_id)).await {
            Ok(stored) => stored.doc,
            Err(StoreError::AlreadyExists { .. }) => {
                return Err(AppError::BadRequest("You already follow this user".to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        info!(follower_id = %follower_id, followee_id = %followee_id, "Follow created");

        let notified = self
            .notifications
            .notify(
                NotificationKind::Follow,
                followee_id,
                follower_id,
                followee_id,
                NotificationTarget::default(),
                format!("{} started following you", follower.name),
            )
            .await;
        if let Err(e) = notified {
            undo(self.collections.follows.as_ref(), &follow.id).await;
            return Err(e);
        }
        Ok(follow)
    }

    pub async fn unfollow(&self, follower_id: &str, followee_id: &str) -> Result<()> {
        if follower_id == followee_id {
            return Err(AppError::BadRequest("You cannot unfollow yourself".to_string()));
        }
        self.user(follower_id).await?;
        self.user(followee_id).await?;

        let removed = self
            .collections
            .follows
            .delete(&Follow::key(follower_id, followee_id))
            .await?;
        if removed.is_none() {
            return Err(AppError::BadRequest("You do not follow this user".to_string()));
        }
        info!(follower_id = %follower_id, followee_id = %followee_id, "Follow removed");

        self.notifications
            .retract(NotificationKind::Follow, follower_id, followee_id)
            .await?;
        Ok(())
    }

    /// Like a post. Returns the post's like count afterwards.
    pub async fn like(&self, blog_id: &str, user_id: &str) -> Result<usize> {
        self.relate(
            self.collections.likes.clone(),
            NotificationKind::Like,
            blog_id,
            user_id,
        )
        .await
    }

    pub async fn unlike(&self, blog_id: &str, user_id: &str) -> Result<usize> {
        self.unrelate(
            self.collections.likes.clone(),
            NotificationKind::Like,
            blog_id,
            user_id,
        )
        .await
    }

    /// Bookmark a post. Returns the post's save count afterwards.
    pub async fn save(&self, blog_id: &str, user_id: &str) -> Result<usize> {
        self.relate(
            self.collections.saves.clone(),
            NotificationKind::Save,
            blog_id,
            user_id,
        )
        .await
    }

    pub async fn unsave(&self, blog_id: &str, user_id: &str) -> Result<usize> {
        self.unrelate(
            self.collections.saves.clone(),
            NotificationKind::Save,
            blog_id,
            user_id,
        )
        .await
    }

    async fn relate<R: BlogRelation>(
        &self,
        relations: Arc<dyn DocumentCollection<R>>,
        kind: NotificationKind,
        blog_id: &str,
        user_id: &str,
    ) -> Result<usize> {
        let (blog, user) = self.blog_and_user(blog_id, user_id).await?;
        if blog.author_id == user.id {
            return Err(AppError::BadRequest(format!(
                "You cannot {} your own post",
                kind.as_str()
            )));
        }

        let relation_id = match relations.insert(R::new(user_id, blog_id)).await {
            Ok(stored) => stored.doc.id().to_string(),
            Err(StoreError::AlreadyExists { .. }) => {
                return Err(AppError::BadRequest(format!(
                    "You already {}d this post",
                    kind.as_str()
                )))
            }
            Err(e) => return Err(e.into()),
        };
        info!(blog_id = %blog_id, user_id = %user_id, kind = kind.as_str(), "Relation created");

        let notified = self
            .notifications
            .notify(
                kind,
                &blog.author_id,
                user_id,
                blog_id,
                NotificationTarget {
                    blog_id: Some(blog.id.clone()),
                    comment_id: None,
                },
                format!("{} {}d your post {}", user.name, kind.as_str(), blog.title),
            )
            .await;
        if let Err(e) = notified {
            undo(relations.as_ref(), &relation_id).await;
            return Err(e);
        }
        count(relations.as_ref(), blog_id).await
    }

    async fn unrelate<R: BlogRelation>(
        &self,
        relations: Arc<dyn DocumentCollection<R>>,
        kind: NotificationKind,
        blog_id: &str,
        user_id: &str,
    ) -> Result<usize> {
        self.blog_and_user(blog_id, user_id).await?;

        if relations.delete(&R::key(user_id, blog_id)).await?.is_none() {
            return Err(AppError::BadRequest(format!(
                "You have not {}d this post",
                kind.as_str()
            )));
        }
        info!(blog_id = %blog_id, user_id = %user_id, kind = kind.as_str(), "Relation removed");

        self.notifications.retract(kind, user_id, blog_id).await?;
        count(relations.as_ref(), blog_id).await
    }

    async fn blog_and_user(&self, blog_id: &str, user_id: &str) -> Result<(Blog, User)> {
        let blog = self
            .collections
            .blogs
            .get(blog_id)
            .await?
            .map(|v| v.doc)
            .ok_or_else(AppError::blog_not_found)?;
        let user = self.user(user_id).await?;
        Ok((blog, user))
    }

    async fn user(&self, user_id: &str) -> Result<User> {
        self.collections
            .users
            .get(user_id)
            .await?
            .map(|v| v.doc)
            .ok_or_else(AppError::user_not_found)
    }
}

/// Remove a relation whose notification could not be stored, so a retry starts clean.
async fn undo<T: Document>(relations: &dyn DocumentCollection<T>, id: &str) {
    if let Err(e) = relations.delete(id).await {
        warn!(id = %id, collection = T::COLLECTION, error = %e, "Failed to undo relation");
    }
}

async fn count<R: BlogRelation>(relations: &dyn DocumentCollection<R>, blog_id: &str) -> Result<usize> {
    Ok(relations
        .find(&Filter::new().eq("blogId", blog_id))
        .await?
        .len())
}
