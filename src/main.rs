use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use social_api::{
    api::{create_router, AppState, RateLimiter},
    config::Config,
    db,
    error::AppError,
};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,social_api=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("🚀 Starting social API server v{}...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("✅ Configuration loaded");

    // Pool + migrations
    let pool = db::connect(&config).await?;
    tracing::info!("✅ Database ready: {}", config.database_url);

    tokio::fs::create_dir_all(&config.upload_dir).await?;
    tracing::info!("✅ Upload directory: {}", config.upload_dir);

    let rate_limiter = Arc::new(RateLimiter::new(
        config.rate_limit_max_requests,
        config.rate_limit_window_secs,
    ));
    tracing::info!(
        "✅ Rate limiter configured ({} req / {}s per IP)",
        config.rate_limit_max_requests,
        config.rate_limit_window_secs
    );

    // Spawn background task for rate limiter cleanup
    {
        let limiter = rate_limiter.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(300)); // Every 5 minutes
            loop {
                interval.tick().await;
                limiter.cleanup().await;
                tracing::debug!("🧹 Rate limiter cache cleaned up");
            }
        });
        tracing::info!("✅ Rate limiter cleanup task started");
    }

    let addr = config.server_address();
    let state = AppState::new(pool, config);

    // Build router
    let app = create_router(state, rate_limiter);

    tracing::info!("🌐 Server listening on http://{}", addr);
    tracing::info!("🏥 Health check: http://{}/health", addr);
    tracing::info!("");
    tracing::info!("📚 API Endpoints:");
    tracing::info!("  POST /auth/register, /auth/login");
    tracing::info!("  /users, /posts, /comments, /votes - social graph (bearer auth)");
    tracing::info!("  /messages - private messages (bearer auth)");
    tracing::info!("  /files - media uploads (bearer auth)");
    tracing::info!("  /reports, /communities");
    tracing::info!("  GET  /ws/chat/{{other_user_id}}?token=<jwt> - live chat");
    tracing::info!("");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|e| AppError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}
