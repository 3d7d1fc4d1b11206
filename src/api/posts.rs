use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::Value;

use crate::api::extract::{ApiJson, ApiPath, CurrentUser};
use crate::api::state::AppState;
use crate::api::{done, with_data};
use crate::db::{Post, PostRepository};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub is_anonymous: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
}

/// Load a post and make sure the caller owns it.
async fn owned_post(state: &AppState, post_id: i64, user_id: i64, action: &str) -> Result<Post, AppError> {
    let post = PostRepository::get_by_id(&state.db, post_id)
        .await?
        .ok_or_else(|| AppError::not_found("Post"))?;

    if post.owner_id != user_id {
        return Err(AppError::Forbidden(format!("Not authorized to {} this post", action)));
    }

    Ok(post)
}

/// POST /posts
pub async fn create_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(req): ApiJson<CreatePostRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    if req.title.trim().is_empty() {
        return Err(AppError::Validation("Title must not be empty".to_string()));
    }

    let post = PostRepository::create(
        &state.db,
        user.id,
        &user.username,
        &req.title,
        &req.content,
        req.is_anonymous,
    )
    .await?;
    tracing::debug!(post_id = post.id, user_id = user.id, "Post created");

    Ok((StatusCode::CREATED, with_data("Successfully created post", post)))
}

/// GET /posts
pub async fn list_posts(State(state): State<AppState>) -> Result<Json<Vec<Post>>, AppError> {
    Ok(Json(PostRepository::list(&state.db).await?))
}

/// GET /posts/me
pub async fn my_posts(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Post>>, AppError> {
    Ok(Json(PostRepository::list_by_owner(&state.db, user.id).await?))
}

/// GET /posts/user/{author_id}
pub async fn posts_by_author(
    State(state): State<AppState>,
    ApiPath(author_id): ApiPath<i64>,
) -> Result<Json<Vec<Post>>, AppError> {
    let posts = PostRepository::list_by_owner(&state.db, author_id).await?;

    if posts.is_empty() {
        return Err(AppError::NotFound("No posts found for this author".to_string()));
    }

    Ok(Json(posts))
}

/// GET /posts/{post_id}
pub async fn get_post(
    State(state): State<AppState>,
    ApiPath(post_id): ApiPath<i64>,
) -> Result<Json<Post>, AppError> {
    let post = PostRepository::get_by_id(&state.db, post_id)
        .await?
        .ok_or_else(|| AppError::not_found("Post"))?;

    Ok(Json(post))
}

/// PUT /posts/{post_id}
pub async fn update_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(post_id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdatePostRequest>,
) -> Result<Json<Value>, AppError> {
    owned_post(&state, post_id, user.id, "update").await?;

    let post = PostRepository::update(
        &state.db,
        post_id,
        req.title.as_deref(),
        req.content.as_deref(),
    )
    .await?;

    Ok(with_data("Successfully updated post", post))
}

/// DELETE /posts/{post_id}
pub async fn delete_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(post_id): ApiPath<i64>,
) -> Result<Json<Value>, AppError> {
    owned_post(&state, post_id, user.id, "delete").await?;
    PostRepository::delete(&state.db, post_id).await?;

    Ok(done("Successfully deleted post"))
}
