/// Blog handlers - posts, categories, comments and replies
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::error::Result;
use crate::handlers::users::deleted;
use crate::models::{CreateBlogRequest, CreateCategoryRequest, CreateCommentRequest};
use crate::services::{BlogService, CascadeService};

#[derive(Debug, Deserialize)]
pub struct BlogQuery {
    pub category: Option<String>,
}

/// Who is asking for a delete. Without it the delete is not ownership-checked.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequesterQuery {
    pub user_id: Option<String>,
}

/// POST /blogs
pub async fn create_blog(
    blogs: web::Data<BlogService>,
    body: web::Json<CreateBlogRequest>,
) -> Result<HttpResponse> {
    let blog = blogs.create_blog(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(json!({
        "message": "Blog created",
        "blog": blog,
    })))
}

/// GET /blogs?category=
pub async fn list_blogs(
    blogs: web::Data<BlogService>,
    query: web::Query<BlogQuery>,
) -> Result<HttpResponse> {
    let list = blogs.list_blogs(query.category.as_deref()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "count": list.len(),
        "blogs": list,
    })))
}

/// GET /blogs/{blog_id}
pub async fn get_blog(
    blogs: web::Data<BlogService>,
    blog_id: web::Path<String>,
) -> Result<HttpResponse> {
    let detail = blogs.blog_detail(&blog_id).await?;
    Ok(HttpResponse::Ok().json(detail))
}

/// DELETE /blogs/{blog_id}
pub async fn delete_blog(
    cascade: web::Data<CascadeService>,
    blog_id: web::Path<String>,
    query: web::Query<RequesterQuery>,
) -> Result<HttpResponse> {
    let report = cascade
        .delete_blog(&blog_id, query.user_id.as_deref())
        .await?;
    Ok(deleted("Blog", report))
}

/// POST /categories
pub async fn create_category(
    blogs: web::Data<BlogService>,
    body: web::Json<CreateCategoryRequest>,
) -> Result<HttpResponse> {
    let category = blogs.create_category(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(category))
}

/// GET /categories
pub async fn list_categories(blogs: web::Data<BlogService>) -> Result<HttpResponse> {
    let categories = blogs.list_categories().await?;
    Ok(HttpResponse::Ok().json(categories))
}

/// POST /blogs/{blog_id}/comments
pub async fn add_comment(
    blogs: web::Data<BlogService>,
    blog_id: web::Path<String>,
    body: web::Json<CreateCommentRequest>,
) -> Result<HttpResponse> {
    let comment = blogs.add_comment(&blog_id, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(json!({
        "message": "Comment added",
        "comment": comment,
    })))
}

/// DELETE /comments/{comment_id}
pub async fn delete_comment(
    cascade: web::Data<CascadeService>,
    comment_id: web::Path<String>,
    query: web::Query<RequesterQuery>,
) -> Result<HttpResponse> {
    let report = cascade
        .delete_comment(&comment_id, query.user_id.as_deref())
        .await?;
    Ok(deleted("Comment", report))
}

/// POST /comments/{comment_id}/replies
pub async fn add_reply(
    blogs: web::Data<BlogService>,
    comment_id: web::Path<String>,
    body: web::Json<CreateCommentRequest>,
) -> Result<HttpResponse> {
    let reply = blogs.add_reply(&comment_id, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(json!({
        "message": "Reply added",
        "reply": reply,
    })))
}
