use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use image_relay_cache::{CacheCoordinator, CacheError};
use serde::Deserialize;
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CacheImageParams {
    pub id: Option<String>,
    pub url: Option<String>,
    /// Cache-busting token from `/api/refresh-cache`; it only makes the URL
    /// unique to browsers and CDNs, the cache ignores its value
    pub bust: Option<String>,
}

/// GET /api/cache-image?id=...&url=...
pub async fn inline_image(
    State(state): State<AppState>,
    Query(params): Query<CacheImageParams>,
) -> Result<Response, ApiError> {
    serve_cached(&state.inline, params).await
}

/// GET /api/telegram-cache-image?id=...&url=...
pub async fn telegram_image(
    State(state): State<AppState>,
    Query(params): Query<CacheImageParams>,
) -> Result<Response, ApiError> {
    serve_cached(&state.relay, params).await
}

async fn serve_cached(
    cache: &CacheCoordinator,
    params: CacheImageParams,
) -> Result<Response, ApiError> {
    let id = params.id.as_deref().map(str::trim).unwrap_or_default();
    let url = params.url.as_deref().map(str::trim).unwrap_or_default();
    if id.is_empty() || url.is_empty() {
        return Err(ApiError::invalid_input("Missing id or url parameter"));
    }

    if let Some(bust) = params.bust.as_deref() {
        debug!(id, bust, "Cache-busted image request");
    }

    let image = cache.get_image(id, url).await?;
    let cache_header = if image.hit { "HIT" } else { "MISS" };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, image.entry.content_type)
        .header(header::CACHE_CONTROL, "public, max-age=86400")
        .header("X-Cache", cache_header)
        .body(Body::from(image.data))
        .map_err(|e| ApiError(CacheError::Internal(e.to_string())))
}
