use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::api::extract::ApiJson;
use crate::api::state::AppState;
use crate::crypto::{generate_salt, hash_password, issue_access_token, verify_password};
use crate::db::{User, UserRepository};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
}

/// Public view of an account.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserOut {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub is_active: bool,
}

impl From<User> for UserOut {
    fn from(user: User) -> Self {
        UserOut {
            id: user.id,
            username: user.username,
            email: user.email,
            is_active: user.is_active,
        }
    }
}

/// Validate and normalise a username
pub(crate) fn validate_username(username: &str) -> Result<String, AppError> {
    let trimmed = username.trim();

    if trimmed.is_empty() || trimmed.chars().count() > 255 {
        return Err(AppError::BadRequest("Username must be 1-255 characters".to_string()));
    }

    Ok(trimmed.to_string())
}

/// Loose shape check: one `@`, something before it, a dotted domain after it.
pub(crate) fn validate_email(email: &str) -> Result<String, AppError> {
    let email = email.trim();
    let invalid = || AppError::BadRequest("Invalid email".to_string());

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    let domain_ok = domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains('@');

    if local.is_empty() || !domain_ok || email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }

    Ok(email.to_lowercase())
}

/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<UserOut>), AppError> {
    let email = validate_email(&req.email)?;
    let username = validate_username(&req.username)?;

    if req.password.is_empty() {
        return Err(AppError::BadRequest("Password must not be empty".to_string()));
    }

    if UserRepository::get_by_email(&state.db, &email).await?.is_some() {
        return Err(AppError::BadRequest("Email already registered".to_string()));
    }

    if UserRepository::get_by_username(&state.db, &username).await?.is_some() {
        return Err(AppError::BadRequest("Username already taken".to_string()));
    }

    let salt = generate_salt();
    let password_hash = hash_password(&req.password, &salt)?;

    let user = UserRepository::create(&state.db, &username, &email, &password_hash, &salt).await?;
    tracing::info!(user_id = user.id, "User registered");

    Ok((StatusCode::CREATED, Json(user.into())))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let invalid = || AppError::Auth("Invalid credentials".to_string());

    let email = validate_email(&req.email).map_err(|_| invalid())?;
    let user = UserRepository::get_by_email(&state.db, &email)
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(&req.password, &user.password_hash, &user.password_salt)? {
        return Err(invalid());
    }

    let access_token = issue_access_token(
        &state.config.jwt_secret,
        user.id,
        state.config.jwt_expire_minutes,
    )?;

    Ok(Json(LoginResponse {
        access_token,
        token_type: "bearer".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        assert_eq!(validate_email(" Alice@Example.com ").unwrap(), "alice@example.com");
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("a@nodot").is_err());
        assert!(validate_email("a b@example.com").is_err());
    }

    #[test]
    fn username_is_trimmed() {
        assert_eq!(validate_username("  bob ").unwrap(), "bob");
        assert!(validate_username("   ").is_err());
    }
}
