//! Posts, categories, comments and replies.

use crate::error::{AppError, Result};
use crate::models::{
    new_id, slugify, Blog, BlogDetail, Category, Comment, CommentThread, CreateBlogRequest,
    CreateCategoryRequest, CreateCommentRequest, NotificationKind, Reply,
};
use crate::services::notifications::{NotificationService, NotificationTarget};
use crate::BlogCollections;
use chrono::Utc;
use document_store::{Filter, StoreError};
use tracing::info;

const MAX_TITLE_CHARS: usize = 200;

#[derive(Clone)]
pub struct BlogService {
    collections: BlogCollections,
    notifications: NotificationService,
}

impl BlogService {
    pub fn new(collections: BlogCollections, notifications: NotificationService) -> Self {
        Self {
            collections,
            notifications,
        }
    }

    pub async fn create_blog(&self, request: CreateBlogRequest) -> Result<Blog> {
        let title = request.title.trim();
        if title.is_empty() {
            return Err(AppError::ValidationError("Title is required".to_string()));
        }
        if title.chars().count() > MAX_TITLE_CHARS {
            return Err(AppError::ValidationError(format!(
                "Title must be at most {} characters",
                MAX_TITLE_CHARS
            )));
        }
        if request.content.trim().is_empty() {
            return Err(AppError::ValidationError("Content is required".to_string()));
        }
        self.require_user(&request.author_id).await?;
        if let Some(category_id) = &request.category_id {
            self.get_category(category_id).await?;
        }

        let now = Utc::now();
        let blog = Blog {
            id: new_id(),
            author_id: request.author_id,
            title: title.to_string(),
            content: request.content,
            category_id: request.category_id,
            tags: request
                .tags
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            image: request.image,
            created_at: now,
            updated_at: now,
        };
        let blog = self.collections.blogs.insert(blog).await?.doc;
        info!(blog_id = %blog.id, author_id = %blog.author_id, "Blog created");
        Ok(blog)
    }

    pub async fn get_blog(&self, blog_id: &str) -> Result<Blog> {
        self.collections
            .blogs
            .get(blog_id)
            .await?
            .map(|v| v.doc)
            .ok_or_else(AppError::blog_not_found)
    }

    /// The post with relation counts and its comment threads, oldest comment first.
    pub async fn blog_detail(&self, blog_id: &str) -> Result<BlogDetail> {
        let blog = self.get_blog(blog_id).await?;
        let by_blog = Filter::new().eq("blogId", blog_id);

        let likes = self.collections.likes.find(&by_blog).await?.len();
        let saves = self.collections.saves.find(&by_blog).await?.len();
        let mut comments: Vec<Comment> = self
            .collections
            .comments
            .find(&by_blog)
            .await?
            .into_iter()
            .map(|v| v.doc)
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        let mut replies: Vec<Reply> = self
            .collections
            .replies
            .find(&by_blog)
            .await?
            .into_iter()
            .map(|v| v.doc)
            .collect();
        replies.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        let comments = comments
            .into_iter()
            .map(|comment| CommentThread {
                replies: replies
                    .iter()
                    .filter(|r| r.comment_id == comment.id)
                    .cloned()
                    .collect(),
                comment,
            })
            .collect();

        Ok(BlogDetail {
            blog,
            likes,
            saves,
            comments,
        })
    }

    /// Newest first, optionally restricted to one category.
    pub async fn list_blogs(&self, category_id: Option<&str>) -> Result<Vec<Blog>> {
        let filter = match category_id {
            Some(category_id) => {
                self.get_category(category_id).await?;
                Filter::new().eq("categoryId", category_id)
            }
            None => Filter::new(),
        };
        let mut blogs: Vec<Blog> = self
            .collections
            .blogs
            .find(&filter)
            .await?
            .into_iter()
            .map(|v| v.doc)
            .collect();
        blogs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(blogs)
    }

    pub async fn create_category(&self, request: CreateCategoryRequest) -> Result<Category> {
        let name = request.name.trim();
        let id = slugify(name);
        if id.is_empty() {
            return Err(AppError::ValidationError("Category name is required".to_string()));
        }
        let category = Category {
            id,
            name: name.to_string(),
            description: request.description,
            created_at: Utc::now(),
        };
        match self.collections.categories.insert(category).await {
            Ok(stored) => Ok(stored.doc),
            Err(StoreError::AlreadyExists { .. }) => {
                Err(AppError::BadRequest("Category already exists".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        let mut categories: Vec<Category> = self
            .collections
            .categories
            .find(&Filter::new())
            .await?
            .into_iter()
            .map(|v| v.doc)
            .collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    /// Comment on a post and notify its author, unless the author is commenting.
    pub async fn add_comment(&self, blog_id: &str, request: CreateCommentRequest) -> Result<Comment> {
        let content = request.content.trim();
        if content.is_empty() {
            return Err(AppError::ValidationError("Comment cannot be empty".to_string()));
        }
        let blog = self.get_blog(blog_id).await?;
        let author = self.require_user(&request.author_id).await?;

        let comment = Comment {
            id: new_id(),
            blog_id: blog.id.clone(),
            author_id: author.id.clone(),
            content: content.to_string(),
            created_at: Utc::now(),
        };
        let comment = self.collections.comments.insert(comment).await?.doc;
        info!(comment_id = %comment.id, blog_id = %blog.id, "Comment added");

        if blog.author_id != author.id {
            self.notifications
                .notify(
                    NotificationKind::Comment,
                    &blog.author_id,
                    &author.id,
                    &comment.id,
                    NotificationTarget {
                        blog_id: Some(blog.id.clone()),
                        comment_id: Some(comment.id.clone()),
                    },
                    format!("{} commented on {}", author.name, blog.title),
                )
                .await?;
        }
        Ok(comment)
    }

    pub async fn get_comment(&self, comment_id: &str) -> Result<Comment> {
        self.collections
            .comments
            .get(comment_id)
            .await?
            .map(|v| v.doc)
            .ok_or_else(AppError::comment_not_found)
    }

    pub async fn add_reply(&self, comment_id: &str, request: CreateCommentRequest) -> Result<Reply> {
        let content = request.content.trim();
        if content.is_empty() {
            return Err(AppError::ValidationError("Reply cannot be empty".to_string()));
        }
        let comment = self.get_comment(comment_id).await?;
        self.require_user(&request.author_id).await?;

        let reply = Reply {
            id: new_id(),
            comment_id: comment.id,
            blog_id: comment.blog_id,
            author_id: request.author_id,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        Ok(self.collections.replies.insert(reply).await?.doc)
    }

    async fn get_category(&self, category_id: &str) -> Result<Category> {
        self.collections
            .categories
            .get(category_id)
            .await?
            .map(|v| v.doc)
            .ok_or_else(|| AppError::not_found("Category not found"))
    }

    async fn require_user(&self, user_id: &str) -> Result<crate::models::User> {
        self.collections
            .users
            .get(user_id)
            .await?
            .map(|v| v.doc)
            .ok_or_else(AppError::user_not_found)
    }
}
