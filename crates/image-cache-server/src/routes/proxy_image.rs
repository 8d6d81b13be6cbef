use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use serde::Deserialize;
use tracing::warn;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ProxyParams {
    pub url: Option<String>,
}

/// GET /api/proxy-image?url=...
///
/// Fetches the image from its origin without caching and relays it with its
/// original content type.
pub async fn proxy(
    State(state): State<AppState>,
    Query(params): Query<ProxyParams>,
) -> Result<Response, ApiError> {
    let url = params.url.as_deref().map(str::trim).unwrap_or_default();
    if url.is_empty() {
        return Err(ApiError::invalid_input("Missing url parameter"));
    }

    let image = state.origin.fetch(url).await.map_err(|e| {
        warn!(url, error = %e, "Failed to proxy image");
        ApiError(e)
    })?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, image.content_type)
        .header(header::CACHE_CONTROL, "public, max-age=86400")
        .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")
        .body(Body::from(image.data))
        .map_err(|e| ApiError(image_relay_cache::CacheError::Internal(e.to_string())))
}
