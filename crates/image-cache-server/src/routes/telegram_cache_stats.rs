use axum::extract::State;
use axum::Json;
use image_relay_cache::CacheStats;
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelegramStatsResponse {
    #[serde(flatten)]
    pub stats: CacheStats,
    /// Informational only; populates fail without credentials but nothing else does
    pub bot_configured: bool,
}

/// GET /api/telegram-cache-stats
pub async fn get_stats(
    State(state): State<AppState>,
) -> Result<Json<TelegramStatsResponse>, ApiError> {
    let stats = state.relay.stats().await?;
    Ok(Json(TelegramStatsResponse {
        stats,
        bot_configured: state.relay.relay_configured(),
    }))
}

/// DELETE /api/telegram-cache-stats
pub async fn clear(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state.relay.clear().await?;
    Ok(Json(json!({ "message": "Telegram image cache cleared successfully" })))
}

#[cfg(test)]
mod tests {
    use crate::server::create_router;
    use crate::test_support::{body_json, test_state};
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use tower::ServiceExt;

    fn get_request() -> Request<Body> {
        Request::builder()
            .uri("/api/telegram-cache-stats")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_stats_reports_bot_configured() {
        let (state, _origin) = test_state(true);
        state.relay.get("7", "https://x/poster.jpg").await.unwrap();

        let response = create_router(state, &["*".to_string()])
            .oneshot(get_request())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["size"], 1);
        assert_eq!(json["keys"].as_array().unwrap().len(), 1);
        assert_eq!(json["botConfigured"], true);
        assert!(json["timestamp"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_stats_without_credentials_still_succeeds() {
        let (state, _origin) = test_state(false);

        let response = create_router(state, &["*".to_string()])
            .oneshot(get_request())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["size"], 0);
        assert_eq!(json["botConfigured"], false);
    }

    #[tokio::test]
    async fn test_delete_clears_relay_cache() {
        let (state, _origin) = test_state(true);
        state.relay.get("7", "https://x/poster.jpg").await.unwrap();

        let response = create_router(state.clone(), &["*".to_string()])
            .oneshot(
                Request::builder()
                    .method(Method::DELETE)
                    .uri("/api/telegram-cache-stats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.relay.stats().await.unwrap().size, 0);
    }
}
