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
use crate::db::{Comment, CommentRepository, PostRepository};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    #[serde(default)]
    pub content: Option<String>,
}

async fn ensure_post(state: &AppState, post_id: i64) -> Result<(), AppError> {
    PostRepository::get_by_id(&state.db, post_id)
        .await?
        .ok_or_else(|| AppError::not_found("Post"))?;
    Ok(())
}

async fn owned_comment(
    state: &AppState,
    comment_id: i64,
    user_id: i64,
    action: &str,
) -> Result<Comment, AppError> {
    let comment = CommentRepository::get_by_id(&state.db, comment_id)
        .await?
        .ok_or_else(|| AppError::not_found("Comment"))?;

    if comment.owner_id != user_id {
        return Err(AppError::Forbidden(format!("Not authorized to {} this comment", action)));
    }

    Ok(comment)
}

/// POST /comments/{post_id}
///
/// Shares its path with the comment-id routes below; here the segment names
/// the post being commented on.
pub async fn create_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(post_id): ApiPath<i64>,
    ApiJson(req): ApiJson<CommentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let content = req.content.unwrap_or_default();
    if content.trim().is_empty() {
        return Err(AppError::Validation("Comment content must not be empty".to_string()));
    }

    ensure_post(&state, post_id).await?;

    let comment = CommentRepository::create(&state.db, post_id, user.id, &content).await?;

    Ok((StatusCode::CREATED, with_data("Successfully created comment", comment)))
}

/// GET /comments/post/{post_id}
pub async fn comments_for_post(
    State(state): State<AppState>,
    ApiPath(post_id): ApiPath<i64>,
) -> Result<Json<Vec<Comment>>, AppError> {
    ensure_post(&state, post_id).await?;

    Ok(Json(CommentRepository::list_for_post(&state.db, post_id).await?))
}

/// GET /comments/{comment_id}
pub async fn get_comment(
    State(state): State<AppState>,
    ApiPath(comment_id): ApiPath<i64>,
) -> Result<Json<Comment>, AppError> {
    let comment = CommentRepository::get_by_id(&state.db, comment_id)
        .await?
        .ok_or_else(|| AppError::not_found("Comment"))?;

    Ok(Json(comment))
}

/// PUT /comments/{comment_id}
pub async fn update_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(comment_id): ApiPath<i64>,
    ApiJson(req): ApiJson<CommentRequest>,
) -> Result<Json<Value>, AppError> {
    let comment = owned_comment(&state, comment_id, user.id, "update").await?;

    // Blank content keeps the existing text.
    let comment = match req.content.as_deref().filter(|c| !c.trim().is_empty()) {
        Some(content) => CommentRepository::update_content(&state.db, comment_id, content).await?,
        None => comment,
    };

    Ok(with_data("Successfully updated comment", comment))
}

/// DELETE /comments/{comment_id}
pub async fn delete_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(comment_id): ApiPath<i64>,
) -> Result<Json<Value>, AppError> {
    owned_comment(&state, comment_id, user.id, "delete").await?;
    CommentRepository::delete(&state.db, comment_id).await?;

    Ok(done("Successfully deleted comment"))
}
