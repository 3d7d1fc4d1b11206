use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::Value;

use crate::api::extract::{ApiJson, ApiPath, ApiQuery, CurrentUser};
use crate::api::state::AppState;
use crate::api::{done, with_data};
use crate::db::{Community, CommunityPost, CommunityRepository, Member, MemberRole};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct CreateCommunityRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCommunityPostRequest {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct TransferQuery {
    pub new_captain_user_id: i64,
}

async fn load_community(state: &AppState, community_id: i64) -> Result<Community, AppError> {
    CommunityRepository::get_by_id(&state.db, community_id)
        .await?
        .ok_or_else(|| AppError::not_found("Community"))
}

/// The caller's role, or 403 when they are not a member.
async fn require_member(state: &AppState, community_id: i64, user_id: i64) -> Result<MemberRole, AppError> {
    CommunityRepository::membership(&state.db, community_id, user_id)
        .await?
        .ok_or_else(|| {
            AppError::Forbidden(
                "You must be a member of this community to perform this action".to_string(),
            )
        })
}

async fn require_captain(state: &AppState, community_id: i64, user_id: i64) -> Result<(), AppError> {
    match CommunityRepository::membership(&state.db, community_id, user_id).await? {
        Some(MemberRole::Captain) => Ok(()),
        _ => Err(AppError::Forbidden(
            "Only the community captain can perform this action".to_string(),
        )),
    }
}

/// POST /communities
pub async fn create_community(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(req): ApiJson<CreateCommunityRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Community name must not be empty".to_string()));
    }

    if CommunityRepository::get_by_name(&state.db, name).await?.is_some() {
        return Err(AppError::BadRequest(
            "A community with this name already exists".to_string(),
        ));
    }

    let community =
        CommunityRepository::create(&state.db, name, req.description.as_deref(), user.id).await?;
    tracing::info!(community_id = community.id, captain_id = user.id, "Community created");

    Ok((StatusCode::CREATED, with_data("Community created", community)))
}

/// GET /communities
pub async fn list_communities(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
) -> Result<Json<Vec<Community>>, AppError> {
    Ok(Json(CommunityRepository::list(&state.db).await?))
}

/// GET /communities/{community_id}
pub async fn get_community(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    ApiPath(community_id): ApiPath<i64>,
) -> Result<Json<Community>, AppError> {
    Ok(Json(load_community(&state, community_id).await?))
}

/// POST /communities/{community_id}/join
pub async fn join_community(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(community_id): ApiPath<i64>,
) -> Result<Json<Value>, AppError> {
    let community = load_community(&state, community_id).await?;

    if CommunityRepository::membership(&state.db, community_id, user.id).await?.is_some() {
        return Err(AppError::BadRequest("You are already a member".to_string()));
    }

    // A concurrent join can slip past the check above; the unique index decides.
    if !CommunityRepository::add_member(&state.db, community_id, user.id).await? {
        return Err(AppError::BadRequest("You are already a member".to_string()));
    }

    Ok(done(&format!("Joined community '{}'", community.name)))
}

/// POST /communities/{community_id}/leave
pub async fn leave_community(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(community_id): ApiPath<i64>,
) -> Result<Json<Value>, AppError> {
    load_community(&state, community_id).await?;

    match CommunityRepository::membership(&state.db, community_id, user.id).await? {
        None => {
            return Err(AppError::BadRequest(
                "You are not a member of this community".to_string(),
            ))
        }
        Some(MemberRole::Captain) => {
            return Err(AppError::BadRequest(
                "Captain cannot leave the community. Transfer captaincy or delete the community first"
                    .to_string(),
            ))
        }
        Some(MemberRole::Member) => {}
    }

    CommunityRepository::remove_member(&state.db, community_id, user.id).await?;

    Ok(done("Left community"))
}

/// GET /communities/{community_id}/members
pub async fn list_members(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(community_id): ApiPath<i64>,
) -> Result<Json<Vec<Member>>, AppError> {
    load_community(&state, community_id).await?;
    require_member(&state, community_id, user.id).await?;

    Ok(Json(CommunityRepository::members(&state.db, community_id).await?))
}

/// POST /communities/{community_id}/transfer-captaincy?new_captain_user_id=
pub async fn transfer_captaincy(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(community_id): ApiPath<i64>,
    ApiQuery(query): ApiQuery<TransferQuery>,
) -> Result<Json<Value>, AppError> {
    load_community(&state, community_id).await?;
    require_captain(&state, community_id, user.id).await?;

    if query.new_captain_user_id == user.id {
        return Err(AppError::BadRequest("You are already the captain".to_string()));
    }

    CommunityRepository::membership(&state.db, community_id, query.new_captain_user_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound("The specified user is not a member of this community".to_string())
        })?;

    CommunityRepository::transfer_captaincy(
        &state.db,
        community_id,
        user.id,
        query.new_captain_user_id,
    )
    .await?;
    tracing::info!(
        community_id,
        from = user.id,
        to = query.new_captain_user_id,
        "Captaincy transferred"
    );

    Ok(done("Captaincy transferred"))
}

/// DELETE /communities/{community_id}
pub async fn delete_community(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(community_id): ApiPath<i64>,
) -> Result<Json<Value>, AppError> {
    load_community(&state, community_id).await?;
    require_captain(&state, community_id, user.id).await?;

    CommunityRepository::delete(&state.db, community_id).await?;

    Ok(done("Community deleted"))
}

/// POST /communities/{community_id}/posts
pub async fn create_community_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(community_id): ApiPath<i64>,
    ApiJson(req): ApiJson<CreateCommunityPostRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    load_community(&state, community_id).await?;
    require_member(&state, community_id, user.id).await?;

    let post =
        CommunityRepository::create_post(&state.db, community_id, user.id, &req.title, &req.content)
            .await?;

    Ok((StatusCode::CREATED, with_data("Post created", post)))
}

/// GET /communities/{community_id}/posts
pub async fn list_community_posts(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(community_id): ApiPath<i64>,
) -> Result<Json<Vec<CommunityPost>>, AppError> {
    load_community(&state, community_id).await?;
    require_member(&state, community_id, user.id).await?;

    Ok(Json(CommunityRepository::list_posts(&state.db, community_id).await?))
}

/// GET /communities/{community_id}/posts/{post_id}
pub async fn get_community_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath((community_id, post_id)): ApiPath<(i64, i64)>,
) -> Result<Json<CommunityPost>, AppError> {
    load_community(&state, community_id).await?;
    require_member(&state, community_id, user.id).await?;

    let post = CommunityRepository::get_post(&state.db, community_id, post_id)
        .await?
        .ok_or_else(|| AppError::not_found("Post"))?;

    Ok(Json(post))
}

/// DELETE /communities/{community_id}/posts/{post_id}
pub async fn delete_community_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath((community_id, post_id)): ApiPath<(i64, i64)>,
) -> Result<Json<Value>, AppError> {
    load_community(&state, community_id).await?;
    let role = require_member(&state, community_id, user.id).await?;

    let post = CommunityRepository::get_post(&state.db, community_id, post_id)
        .await?
        .ok_or_else(|| AppError::not_found("Post"))?;

    if post.owner_id != user.id && role != MemberRole::Captain {
        return Err(AppError::Forbidden(
            "Only the post author or the captain can delete this post".to_string(),
        ));
    }

    CommunityRepository::delete_post(&state.db, post_id).await?;

    Ok(done("Post deleted"))
}
