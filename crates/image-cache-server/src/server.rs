//! Router assembly and HTTP listener

use crate::config::ServerConfig;
use crate::routes;
use crate::state::AppState;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Create the HTTP router
pub fn create_router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(routes::health::health))
        .route(
            "/api/cache-stats",
            get(routes::cache_stats::get_stats).delete(routes::cache_stats::clear),
        )
        .route(
            "/api/telegram-cache-stats",
            get(routes::telegram_cache_stats::get_stats)
                .delete(routes::telegram_cache_stats::clear),
        )
        .route("/api/refresh-cache", post(routes::refresh_cache::refresh))
        .route("/api/proxy-image", get(routes::proxy_image::proxy))
        .route("/api/cache-image", get(routes::cache_image::inline_image))
        .route(
            "/api/telegram-cache-image",
            get(routes::cache_image::telegram_image),
        )
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
}

/// Bind and serve until Ctrl-C
pub async fn start_server(state: AppState, config: &ServerConfig) -> std::io::Result<()> {
    let router = create_router(state, &config.cors_origins);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
