//! Image Cache Server
//!
//! Caches remote poster and backdrop images, either on local disk or in a
//! Telegram bot chat, and exposes stats, invalidation and refresh routes.

use image_cache_server::{start_server, AppState, Result, ServerConfig};
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env()
        .add_directive("image_cache_server=info".parse()?)
        .add_directive("image_relay_cache=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting image cache server...");

    let config = ServerConfig::from_env()?;
    info!("Port: {}", config.port);
    info!("Cache backend: {:?}", config.cache_backend);
    info!("Cache dir: {:?}", config.cache_dir);
    match config.cache_ttl {
        Some(ttl) => info!("Cache TTL: {} seconds", ttl.as_secs()),
        None => info!("Cache TTL: never expire"),
    }
    info!("Telegram relay configured: {}", config.bot_configured());

    let state = AppState::from_config(&config).await?;

    start_server(state, &config).await?;

    Ok(())
}
