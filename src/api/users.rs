use axum::{
    extract::State,
    Json,
};
use serde::Deserialize;
use serde_json::Value;

use crate::api::auth::{validate_email, validate_username, UserOut};
use crate::api::extract::{ApiJson, ApiPath, CurrentUser};
use crate::api::state::AppState;
use crate::api::{done, with_data};
use crate::db::UserRepository;
use crate::error::AppError;
use crate::relay::CloseReason;

#[derive(Debug, Deserialize)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub is_active: Option<bool>,
}

/// GET /users/me
pub async fn me(CurrentUser(user): CurrentUser) -> Json<UserOut> {
    Json(user.into())
}

/// GET /users/{user_id}
pub async fn get_user(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<i64>,
) -> Result<Json<UserOut>, AppError> {
    let user = UserRepository::get_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    Ok(Json(user.into()))
}

/// GET /users/by-username/{username}
pub async fn get_by_username(
    State(state): State<AppState>,
    ApiPath(username): ApiPath<String>,
) -> Result<Json<UserOut>, AppError> {
    let user = UserRepository::get_by_username(&state.db, &username)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    Ok(Json(user.into()))
}

/// PUT /users/{user_id}
pub async fn update_user(
    State(state): State<AppState>,
    CurrentUser(current): CurrentUser,
    ApiPath(user_id): ApiPath<i64>,
    ApiJson(req): ApiJson<UserUpdate>,
) -> Result<Json<Value>, AppError> {
    if user_id != current.id {
        return Err(AppError::Forbidden(
            "Not authorized to update another user's account".to_string(),
        ));
    }

    let username = req.username.as_deref().map(validate_username).transpose()?;
    let email = req.email.as_deref().map(validate_email).transpose()?;

    if let Some(username) = &username {
        if UserRepository::username_taken(&state.db, username, user_id).await? {
            return Err(AppError::BadRequest("Username already taken".to_string()));
        }
    }

    if let Some(email) = &email {
        if UserRepository::email_taken(&state.db, email, user_id).await? {
            return Err(AppError::BadRequest("Email already registered".to_string()));
        }
    }

    let user = UserRepository::update(
        &state.db,
        user_id,
        username.as_deref(),
        email.as_deref(),
        req.is_active,
    )
    .await?;

    Ok(with_data("Successfully updated user", UserOut::from(user)))
}

/// DELETE /users/{user_id}
pub async fn delete_user(
    State(state): State<AppState>,
    CurrentUser(current): CurrentUser,
    ApiPath(user_id): ApiPath<i64>,
) -> Result<Json<Value>, AppError> {
    if user_id != current.id {
        return Err(AppError::Forbidden(
            "Not authorized to delete another user's account".to_string(),
        ));
    }

    UserRepository::delete(&state.db, user_id).await?;
    // A live chat socket would otherwise keep writing as a user that no
    // longer exists.
    state
        .registry
        .disconnect(user_id, CloseReason::PolicyViolation.frame("Account deleted"));
    tracing::info!(user_id, "User deleted");

    Ok(done("Successfully deleted user account"))
}
