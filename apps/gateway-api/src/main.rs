//! # Gateway API Server
//!
//! ## Startup
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  tracing ─► GatewayConfig::load ─► Database (migrations)               │
//! │       ─► cache (Redis, or in-process when absent/unreachable)          │
//! │       ─► GatewayContext::bootstrap (every cell registered)             │
//! │       ─► axum::serve until Ctrl+C / SIGTERM                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cell_db::Database;
use cell_gateway::{CacheStore, GatewayContext, MemoryCache, RedisCache};
use gateway_api::{build_router, AppState, GatewayConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,cell_gateway=debug")),
        )
        .with_target(true)
        .init();

    info!("Starting Cell Gateway API server...");

    // Load configuration
    let config = GatewayConfig::load().context("loading configuration")?;
    info!(
        port = config.http_port,
        database = %config.database_path,
        redis = config.redis_url.is_some(),
        "Configuration loaded"
    );

    // Open database (migrations run on connect)
    let db = Database::new(config.db_config())
        .await
        .context("opening database")?;
    info!("Database ready");

    let cache = connect_cache(config.redis_url.as_deref()).await;

    let ctx = GatewayContext::bootstrap(db.clone(), cache, config.to_settings())
        .context("registering cells")?;
    let app = build_router(AppState::new(ctx));

    let addr = config.socket_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "Starting HTTP server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Redis when configured and reachable, the in-process cache otherwise.
async fn connect_cache(redis_url: Option<&str>) -> Arc<dyn CacheStore> {
    let Some(url) = redis_url else {
        info!("No Redis configured, using in-process cache");
        return Arc::new(MemoryCache::new());
    };

    match RedisCache::connect(url).await {
        Ok(cache) => Arc::new(cache),
        Err(e) => {
            warn!(error = %e, "Failed to connect to Redis, continuing with in-process cache");
            Arc::new(MemoryCache::new())
        }
    }
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
