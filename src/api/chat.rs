use axum::{
    extract::{ws::WebSocketUpgrade, State},
    response::Response,
};
use serde::Deserialize;

use crate::api::extract::{ApiPath, ApiQuery};
use crate::api::state::AppState;
use crate::relay;

#[derive(Debug, Deserialize)]
pub struct ChatQuery {
    pub token: Option<String>,
}

/// GET /ws/chat/{other_user_id}?token=<jwt>
///
/// The upgrade always succeeds; a bad token or unknown peer is reported with a
/// close frame so browser clients can read the code.
pub async fn chat_socket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    ApiPath(other_user_id): ApiPath<i64>,
    ApiQuery(query): ApiQuery<ChatQuery>,
) -> Response {
    ws.on_upgrade(move |socket| async move {
        relay::run(
            socket,
            &state,
            &state.registry,
            query.token.as_deref(),
            other_user_id,
        )
        .await;
    })
}
