pub mod auth;
pub mod chat;
pub mod comments;
pub mod communities;
pub mod extract;
pub mod files;
pub mod messages;
pub mod middleware;
pub mod posts;
pub mod reports;
pub mod state;
pub mod users;
pub mod votes;

pub use middleware::RateLimiter;
pub use state::AppState;

use axum::{
    extract::{DefaultBodyLimit, State},
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::CorsLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer,
};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub online_users: usize,
}

/// `{"message": ..., "data": ...}` body used by mutating endpoints.
pub(crate) fn with_data<T: Serialize>(message: &str, data: T) -> Json<Value> {
    Json(json!({ "message": message, "data": data }))
}

/// `{"message": ...}` body for endpoints with nothing to return.
pub(crate) fn done(message: &str) -> Json<Value> {
    Json(json!({ "message": message }))
}

pub fn create_router(state: AppState, rate_limiter: Arc<RateLimiter>) -> Router {
    let timeout = Duration::from_secs(state.config.request_timeout_secs);
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        // Health check
        .route("/health", get(health))
        // Authentication
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        // Users
        .route("/users/me", get(users::me))
        .route("/users/by-username/{username}", get(users::get_by_username))
        .route(
            "/users/{user_id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        // Posts
        .route("/posts", get(posts::list_posts).post(posts::create_post))
        .route("/posts/me", get(posts::my_posts))
        .route("/posts/user/{author_id}", get(posts::posts_by_author))
        .route(
            "/posts/{post_id}",
            get(posts::get_post)
                .put(posts::update_post)
                .delete(posts::delete_post),
        )
        // Comments. POST takes a post id, the other methods a comment id.
        .route("/comments/post/{post_id}", get(comments::comments_for_post))
        .route(
            "/comments/{id}",
            post(comments::create_comment)
                .get(comments::get_comment)
                .put(comments::update_comment)
                .delete(comments::delete_comment),
        )
        // Votes
        .route(
            "/votes/post/{post_id}",
            post(votes::vote_post).delete(votes::unvote_post),
        )
        .route("/votes/post/{post_id}/score", get(votes::post_score))
        .route(
            "/votes/comment/{comment_id}",
            post(votes::vote_comment).delete(votes::unvote_comment),
        )
        .route("/votes/comment/{comment_id}/score", get(votes::comment_score))
        // Private messages
        .route("/messages", post(messages::send_message))
        .route("/messages/inbox", get(messages::inbox))
        .route("/messages/sent", get(messages::sent))
        .route("/messages/conversation/{user_id}", get(messages::conversation))
        .route("/messages/online/{user_id}", get(messages::online_status))
        .route("/messages/{message_id}", delete(messages::delete_message))
        .route("/messages/{message_id}/mark-read", put(messages::mark_read))
        // Files
        .route("/files/upload", post(files::upload_file))
        .route("/files/user/{user_id}", get(files::files_by_user))
        .route(
            "/files/{file_id}",
            get(files::get_file).delete(files::delete_file),
        )
        // Reports
        .route(
            "/reports",
            get(reports::list_reports).post(reports::create_report),
        )
        .route(
            "/reports/{report_id}",
            get(reports::get_report).delete(reports::delete_report),
        )
        .route("/reports/{report_id}/review", put(reports::review_report))
        // Communities
        .route(
            "/communities",
            get(communities::list_communities).post(communities::create_community),
        )
        .route(
            "/communities/{community_id}",
            get(communities::get_community).delete(communities::delete_community),
        )
        .route("/communities/{community_id}/join", post(communities::join_community))
        .route("/communities/{community_id}/leave", post(communities::leave_community))
        .route("/communities/{community_id}/members", get(communities::list_members))
        .route(
            "/communities/{community_id}/transfer-captaincy",
            post(communities::transfer_captaincy),
        )
        .route(
            "/communities/{community_id}/posts",
            get(communities::list_community_posts).post(communities::create_community_post),
        )
        .route(
            "/communities/{community_id}/posts/{post_id}",
            get(communities::get_community_post).delete(communities::delete_community_post),
        )
        // Real-time chat
        .route("/ws/chat/{other_user_id}", get(chat::chat_socket))
        // Add rate limiting middleware
        .layer(axum_middleware::from_fn(move |req, next| {
            let limiter = rate_limiter.clone();
            middleware::rate_limit_middleware(limiter, req, next)
        }))
        // Uploads are the largest bodies we accept
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TimeoutLayer::new(timeout))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        online_users: state.registry.online_count(),
    })
}
