//! Cascading deletes for users, posts and comments.
//!
//! Each delete first reads everything it will remove, then hands the id lists to a
//! [`Saga`] so a failure part-way through can be rolled back under
//! [`SagaPolicy::AbortAndCompensate`].

use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::{Blog, Comment, Notification, Reply};
use crate::saga::{DeleteDocuments, Saga, SagaPolicy, SagaReport};
use crate::services::notifications::NotificationService;
use crate::BlogCollections;
use document_store::{Document, DocumentCollection, Filter};
use std::collections::BTreeMap;
use tracing::{info, warn};

#[derive(Clone)]
pub struct CascadeService {
    collections: BlogCollections,
    notifications: NotificationService,
    policy: SagaPolicy,
}

impl CascadeService {
    pub fn new(
        collections: BlogCollections,
        notifications: NotificationService,
        policy: SagaPolicy,
    ) -> Self {
        Self {
            collections,
            notifications,
            policy,
        }
    }

    pub fn policy(&self) -> SagaPolicy {
        self.policy
    }

    /// Delete a user with their posts, comments, replies, notifications, relations and
    /// social media links.
    pub async fn delete_user(&self, user_id: &str) -> Result<SagaReport> {
        let user = self
            .collections
            .users
            .get(user_id)
            .await?
            .map(|v| v.doc)
            .ok_or_else(AppError::user_not_found)?;
        let c = &self.collections;

        let blogs = collect(c.blogs.as_ref(), &[Filter::new().eq("authorId", user_id)]).await?;
        let blog_filters = by_each("blogId", blogs.keys());

        let mut comment_filters = blog_filters.clone();
        comment_filters.push(Filter::new().eq("authorId", user_id));
        let comments = collect(c.comments.as_ref(), &comment_filters).await?;

        let mut reply_filters = by_each("commentId", comments.keys());
        reply_filters.extend(blog_filters.iter().cloned());
        reply_filters.push(Filter::new().eq("authorId", user_id));
        let replies = collect(c.replies.as_ref(), &reply_filters).await?;

        let mut notification_filters = vec![
            Filter::new().eq("recipientId", user_id),
            Filter::new().eq("actorId", user_id),
        ];
        notification_filters.extend(blog_filters.iter().cloned());
        notification_filters.extend(by_each("commentId", comments.keys()));
        let notifications = collect(c.notifications.as_ref(), &notification_filters).await?;

        let follows = collect(
            c.follows.as_ref(),
            &[
                Filter::new().eq("followerId", user_id),
                Filter::new().eq("followeeId", user_id),
            ],
        )
        .await?;
        let mut relation_filters = blog_filters.clone();
        relation_filters.push(Filter::new().eq("userId", user_id));
        let likes = collect(c.likes.as_ref(), &relation_filters).await?;
        let saves = collect(c.saves.as_ref(), &relation_filters).await?;

        let saga = Saga::new("delete-user", self.policy)
            .step(DeleteDocuments::new("blogs", c.blogs.clone(), ids(&blogs)))
            .step(DeleteDocuments::new("comments", c.comments.clone(), ids(&comments)))
            .step(DeleteDocuments::new("replies", c.replies.clone(), ids(&replies)))
            .step(DeleteDocuments::new(
                "notifications",
                c.notifications.clone(),
                ids(&notifications),
            ))
            .step(DeleteDocuments::new("follows", c.follows.clone(), ids(&follows)))
            .step(DeleteDocuments::new("likes", c.likes.clone(), ids(&likes)))
            .step(DeleteDocuments::new("saves", c.saves.clone(), ids(&saves)))
            .step(DeleteDocuments::new(
                "social-media",
                c.social_media.clone(),
                vec![user_id.to_string()],
            ))
            .step(DeleteDocuments::new("email", c.emails.clone(), vec![user.email.clone()]))
            .step(DeleteDocuments::new(
                "user",
                c.users.clone(),
                vec![user_id.to_string()],
            ));

        let report = self.finish(saga, user_id).await?;
        let others: Vec<Notification> = notifications
            .into_values()
            .filter(|n| n.recipient_id != user_id)
            .collect();
        self.notifications.announce_removed(&others).await;
        Ok(report)
    }

    /// Delete a post with its comments, replies, notifications, likes and saves.
    /// `requester`, when given, must be the author.
    pub async fn delete_blog(&self, blog_id: &str, requester: Option<&str>) -> Result<SagaReport> {
        let blog: Blog = self
            .collections
            .blogs
            .get(blog_id)
            .await?
            .map(|v| v.doc)
            .ok_or_else(AppError::blog_not_found)?;
        if let Some(requester) = requester {
            if requester != blog.author_id {
                return Err(AppError::Forbidden(
                    "Only the author can delete this post".to_string(),
                ));
            }
        }
        let c = &self.collections;
        let by_blog = [Filter::new().eq("blogId", blog_id)];

        let comments = collect(c.comments.as_ref(), &by_blog).await?;
        let replies = collect(c.replies.as_ref(), &by_blog).await?;
        let notifications = collect(c.notifications.as_ref(), &by_blog).await?;
        let likes = collect(c.likes.as_ref(), &by_blog).await?;
        let saves = collect(c.saves.as_ref(), &by_blog).await?;

        let saga = Saga::new("delete-blog", self.policy)
            .step(DeleteDocuments::new("comments", c.comments.clone(), ids(&comments)))
            .step(DeleteDocuments::new("replies", c.replies.clone(), ids(&replies)))
            .step(DeleteDocuments::new(
                "notifications",
                c.notifications.clone(),
                ids(&notifications),
            ))
            .step(DeleteDocuments::new("likes", c.likes.clone(), ids(&likes)))
            .step(DeleteDocuments::new("saves", c.saves.clone(), ids(&saves)))
            .step(DeleteDocuments::new(
                "blog",
                c.blogs.clone(),
                vec![blog_id.to_string()],
            ));

        let report = self.finish(saga, blog_id).await?;
        let removed: Vec<Notification> = notifications.into_values().collect();
        self.notifications.announce_removed(&removed).await;
        Ok(report)
    }

    /// Delete a comment with its replies and the notification it raised. `requester`,
    /// when given, must be the comment's author or the post's author.
    pub async fn delete_comment(
        &self,
        comment_id: &str,
        requester: Option<&str>,
    ) -> Result<SagaReport> {
        let comment: Comment = self
            .collections
            .comments
            .get(comment_id)
            .await?
            .map(|v| v.doc)
            .ok_or_else(AppError::comment_not_found)?;
        if let Some(requester) = requester {
            let blog_author = self
                .collections
                .blogs
                .get(&comment.blog_id)
                .await?
                .map(|v| v.doc.author_id);
            if requester != comment.author_id && blog_author.as_deref() != Some(requester) {
                return Err(AppError::Forbidden(
                    "Only the comment or post author can delete this comment".to_string(),
                ));
            }
        }
        let c = &self.collections;

        let replies: BTreeMap<String, Reply> =
            collect(c.replies.as_ref(), &[Filter::new().eq("commentId", comment_id)]).await?;
        let notifications = collect(
            c.notifications.as_ref(),
            &[Filter::new().eq("commentId", comment_id)],
        )
        .await?;

        let saga = Saga::new("delete-comment", self.policy)
            .step(DeleteDocuments::new("replies", c.replies.clone(), ids(&replies)))
            .step(DeleteDocuments::new(
                "notifications",
                c.notifications.clone(),
                ids(&notifications),
            ))
            .step(DeleteDocuments::new(
                "comment",
                c.comments.clone(),
                vec![comment_id.to_string()],
            ));

        let report = self.finish(saga, comment_id).await?;
        let removed: Vec<Notification> = notifications.into_values().collect();
        self.notifications.announce_removed(&removed).await;
        Ok(report)
    }

    async fn finish(&self, saga: Saga, root_id: &str) -> Result<SagaReport> {
        let report = saga.run().await;
        metrics::record_cascade(&report.saga, report.succeeded());

        if report.succeeded() {
            info!(saga = %report.saga, id = %root_id, "Cascade delete completed");
            return Ok(report);
        }
        match self.policy {
            SagaPolicy::AbortAndCompensate => Err(AppError::CascadeFailed(Box::new(report))),
            SagaPolicy::BestEffort => {
                warn!(
                    saga = %report.saga,
                    id = %root_id,
                    failed = report.failed.len(),
                    "Cascade delete finished with failures"
                );
                Ok(report)
            }
        }
    }
}

/// Union of the documents matching any filter, keyed by id.
async fn collect<T: Document>(
    collection: &dyn DocumentCollection<T>,
    filters: &[Filter],
) -> Result<BTreeMap<String, T>> {
    let mut found = BTreeMap::new();
    for filter in filters {
        for versioned in collection.find(filter).await? {
            found.insert(versioned.doc.id().to_string(), versioned.doc);
        }
    }
    Ok(found)
}

fn by_each<'a>(field: &str, ids: impl Iterator<Item = &'a String>) -> Vec<Filter> {
    ids.map(|id| Filter::new().eq(field, id.as_str())).collect()
}

fn ids<T>(documents: &BTreeMap<String, T>) -> Vec<String> {
    documents.keys().cloned().collect()
}
