use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub id: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub success: bool,
    pub message: String,
    pub refresh_url: String,
    pub timestamp: DateTime<Utc>,
}

/// POST /api/refresh-cache
///
/// Drops the image from both caches and returns a cache-busted URL the
/// client can request to repopulate it. Both deletes always run; if either
/// fails the request fails, and retrying it is safe.
pub async fn refresh(
    State(state): State<AppState>,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let Ok(Json(request)) = body else {
        return Err(ApiError::invalid_input("Missing id or url"));
    };

    let id = request.id.as_deref().map(str::trim).unwrap_or_default();
    let url = request.url.as_deref().map(str::trim).unwrap_or_default();
    if id.is_empty() || url.is_empty() {
        return Err(ApiError::invalid_input("Missing id or url"));
    }

    let (inline, relay) = tokio::join!(
        state.inline.delete(id, url),
        state.relay.delete(id, url)
    );
    let inline_existed = inline?;
    let relay_existed = relay?;
    info!(id, url, inline_existed, relay_existed, "Refreshed cached image");

    let now = Utc::now();
    Ok(Json(RefreshResponse {
        success: true,
        message: format!("Cache refreshed for image {}", id),
        refresh_url: refresh_url(id, url, now),
        timestamp: now,
    }))
}

/// Cache-busted path to the inline cache route
pub fn refresh_url(id: &str, url: &str, now: DateTime<Utc>) -> String {
    format!(
        "/api/cache-image?id={}&url={}&bust={}",
        urlencoding::encode(id),
        urlencoding::encode(url),
        now.timestamp_millis()
    )
}
