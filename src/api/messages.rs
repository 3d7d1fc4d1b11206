use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::extract::{ApiJson, ApiPath, CurrentUser};
use crate::api::state::AppState;
use crate::api::{done, with_data};
use crate::db::{Message, MessageRepository, UserRepository};
use crate::error::AppError;
use crate::relay::OutboundMessage;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub recipient_id: i64,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OnlineStatus {
    pub user_id: i64,
    pub online: bool,
}

async fn load_message(state: &AppState, message_id: i64) -> Result<Message, AppError> {
    MessageRepository::get_by_id(&state.db, message_id)
        .await?
        .ok_or_else(|| AppError::not_found("Message"))
}

/// POST /messages
///
/// Stored like a socket message and pushed to whichever participants hold a
/// live connection.
pub async fn send_message(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(req): ApiJson<SendMessageRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let content = req.content.trim();
    if content.is_empty() {
        return Err(AppError::Validation("Message content must not be empty".to_string()));
    }

    if !UserRepository::exists(&state.db, req.recipient_id).await? {
        return Err(AppError::not_found("Recipient"));
    }

    let message = MessageRepository::create(&state.db, user.id, req.recipient_id, content).await?;
    state
        .registry
        .relay_pair(user.id, req.recipient_id, &OutboundMessage::Message(message.clone()));

    tracing::debug!(
        message_id = message.id,
        sender_id = user.id,
        recipient_id = req.recipient_id,
        "Message sent over REST"
    );

    Ok((StatusCode::CREATED, with_data("Successfully sent message", message)))
}

/// GET /messages/conversation/{user_id}
pub async fn conversation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(other_id): ApiPath<i64>,
) -> Result<Json<Vec<Message>>, AppError> {
    if !UserRepository::exists(&state.db, other_id).await? {
        return Err(AppError::not_found("User"));
    }

    Ok(Json(MessageRepository::conversation(&state.db, user.id, other_id).await?))
}

/// GET /messages/inbox
pub async fn inbox(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Message>>, AppError> {
    Ok(Json(MessageRepository::inbox(&state.db, user.id).await?))
}

/// GET /messages/sent
pub async fn sent(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Message>>, AppError> {
    Ok(Json(MessageRepository::sent(&state.db, user.id).await?))
}

/// PUT /messages/{message_id}/mark-read
pub async fn mark_read(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(message_id): ApiPath<i64>,
) -> Result<Json<Value>, AppError> {
    let message = load_message(&state, message_id).await?;

    if message.recipient_id != user.id {
        return Err(AppError::Forbidden(
            "Only the recipient can mark a message as read".to_string(),
        ));
    }

    let message = MessageRepository::mark_read(&state.db, message_id).await?;

    Ok(with_data("Message marked as read", message))
}

/// DELETE /messages/{message_id}
pub async fn delete_message(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(message_id): ApiPath<i64>,
) -> Result<Json<Value>, AppError> {
    let message = load_message(&state, message_id).await?;

    if message.sender_id != user.id && message.recipient_id != user.id {
        return Err(AppError::Forbidden("Not authorized to delete this message".to_string()));
    }

    MessageRepository::delete(&state.db, message_id).await?;

    Ok(done("Successfully deleted message"))
}

/// GET /messages/online/{user_id}
pub async fn online_status(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    ApiPath(user_id): ApiPath<i64>,
) -> Json<OnlineStatus> {
    Json(OnlineStatus {
        user_id,
        online: state.registry.is_online(user_id),
    })
}
