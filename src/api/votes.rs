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
use crate::db::{
    CastVote, CommentRepository, PostRepository, VoteRepository, VoteScore, VoteTarget, VoteType,
};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub vote_type: VoteType,
}

async fn ensure_target(state: &AppState, target: VoteTarget) -> Result<(), AppError> {
    let found = match target {
        VoteTarget::Post(id) => PostRepository::get_by_id(&state.db, id).await?.is_some(),
        VoteTarget::Comment(id) => CommentRepository::get_by_id(&state.db, id).await?.is_some(),
    };

    if !found {
        let what = match target {
            VoteTarget::Post(_) => "Post",
            VoteTarget::Comment(_) => "Comment",
        };
        return Err(AppError::not_found(what));
    }

    Ok(())
}

async fn cast(
    state: &AppState,
    user_id: i64,
    target: VoteTarget,
    vote_type: VoteType,
) -> Result<(StatusCode, Json<Value>), AppError> {
    ensure_target(state, target).await?;

    let body = match VoteRepository::cast(&state.db, user_id, target, vote_type).await? {
        CastVote::Created(vote) => with_data("Successfully voted", vote),
        CastVote::Updated(vote) => with_data("Successfully updated vote", vote),
    };

    Ok((StatusCode::CREATED, body))
}

async fn remove(state: &AppState, user_id: i64, target: VoteTarget) -> Result<Json<Value>, AppError> {
    if !VoteRepository::remove(&state.db, user_id, target).await? {
        return Err(AppError::not_found("Vote"));
    }

    Ok(done("Successfully removed vote"))
}

async fn score(state: &AppState, target: VoteTarget) -> Result<Json<VoteScore>, AppError> {
    ensure_target(state, target).await?;
    Ok(Json(VoteRepository::score(&state.db, target).await?))
}

/// POST /votes/post/{post_id}
pub async fn vote_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(post_id): ApiPath<i64>,
    ApiJson(req): ApiJson<VoteRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    cast(&state, user.id, VoteTarget::Post(post_id), req.vote_type).await
}

/// DELETE /votes/post/{post_id}
pub async fn unvote_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(post_id): ApiPath<i64>,
) -> Result<Json<Value>, AppError> {
    remove(&state, user.id, VoteTarget::Post(post_id)).await
}

/// GET /votes/post/{post_id}/score
pub async fn post_score(
    State(state): State<AppState>,
    ApiPath(post_id): ApiPath<i64>,
) -> Result<Json<VoteScore>, AppError> {
    score(&state, VoteTarget::Post(post_id)).await
}

/// POST /votes/comment/{comment_id}
pub async fn vote_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(comment_id): ApiPath<i64>,
    ApiJson(req): ApiJson<VoteRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    cast(&state, user.id, VoteTarget::Comment(comment_id), req.vote_type).await
}

/// DELETE /votes/comment/{comment_id}
pub async fn unvote_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(comment_id): ApiPath<i64>,
) -> Result<Json<Value>, AppError> {
    remove(&state, user.id, VoteTarget::Comment(comment_id)).await
}

/// GET /votes/comment/{comment_id}/score
pub async fn comment_score(
    State(state): State<AppState>,
    ApiPath(comment_id): ApiPath<i64>,
) -> Result<Json<VoteScore>, AppError> {
    score(&state, VoteTarget::Comment(comment_id)).await
}
