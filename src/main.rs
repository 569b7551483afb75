use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chat_server::{
    api::{create_router, AppState, RateLimiter},
    config::Config,
    db::{self, SessionRepository},
    error::AppError,
    hub::Hub,
    storage::LocalObjectStore,
};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,chat_server=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("🚀 Starting chat server v{}...", env!("CARGO_PKG_VERSION"));

    let config = Arc::new(Config::from_env()?);
    tracing::info!("✅ Configuration loaded");

    let db = db::connect(&config).await?;
    tracing::info!("✅ Database connected and migrated: {}", config.database_url);

    let store = Arc::new(LocalObjectStore::new(&config.storage_dir, &config.public_url).await?);
    let files_dir = store.root().to_path_buf();
    tracing::info!("✅ Object store at {}", files_dir.display());

    let hub = Hub::new();
    tracing::info!("✅ Event hub ready");

    let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit_per_minute, 60));
    tracing::info!(
        "✅ Rate limiter configured ({} req/min per IP)",
        config.rate_limit_per_minute
    );

    let state = AppState::new(db.clone(), config.clone(), store, hub.clone());

    // Spawn background task for session cleanup
    {
        let db_clone = db.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(3600)); // Every hour
            loop {
                interval.tick().await;
                match SessionRepository::purge_expired(&db_clone).await {
                    Ok(n) => tracing::debug!("🧹 {} expired sessions cleaned up", n),
                    Err(e) => tracing::error!("❌ Session cleanup failed: {}", e),
                }
            }
        });
        tracing::info!("✅ Session cleanup task started (runs hourly)");
    }

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
    }

    let app = create_router(state, rate_limiter, Some(&files_dir));

    let addr = config.server_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    tracing::info!("🌐 Server listening on http://{}", addr);
    tracing::info!("🏥 Health check: http://{}/api/health", addr);
    tracing::info!("🔌 Socket: ws://{}/api/socket?token=<session>", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(hub))
    .await
    .map_err(|e| AppError::Internal(format!("Server error: {}", e)))?;

    db.close().await;
    tracing::info!("👋 Server stopped");
    Ok(())
}

/// Resolves on Ctrl-C after closing every live socket.
async fn shutdown_signal(hub: Hub) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("❌ Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("🛑 Shutdown requested");
    hub.shutdown().await;
}
