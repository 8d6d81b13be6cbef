use axum::extract::State;
use axum::Json;
use image_relay_cache::CacheStats;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::AppState;

/// GET /api/cache-stats
pub async fn get_stats(State(state): State<AppState>) -> Result<Json<CacheStats>, ApiError> {
    Ok(Json(state.inline.stats().await?))
}

/// DELETE /api/cache-stats
pub async fn clear(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state.inline.clear().await?;
    Ok(Json(json!({ "message": "Image cache cleared successfully" })))
}

#[cfg(test)]
mod tests {
    use crate::server::create_router;
    use crate::test_support::{body_json, test_state};
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use image_relay_cache::CacheKey;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_stats_lists_cached_keys() {
        let (state, _origin) = test_state(false);
        let mut expected = Vec::new();
        for id in ["1", "2", "3"] {
            let url = format!("https://image.tmdb.org/t/p/w500/{id}.jpg");
            state.inline.get(id, &url).await.unwrap();
            expected.push(CacheKey::derive(id, &url).unwrap().to_string());
        }
        expected.sort();

        let router = create_router(state, &["*".to_string()]);
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/api/cache-stats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["size"], 3);
        let keys: Vec<String> = serde_json::from_value(json["keys"].clone()).unwrap();
        assert_eq!(keys, expected);
        assert!(json["timestamp"].as_str().is_some());
        assert!(json.get("botConfigured").is_none());
    }

    #[tokio::test]
    async fn test_delete_clears_inline_cache_only() {
        let (state, _origin) = test_state(true);
        state.inline.get("1", "https://x/a.jpg").await.unwrap();
        state.relay.get("1", "https://x/a.jpg").await.unwrap();

        let router = create_router(state.clone(), &["*".to_string()]);
        let response = router
            .oneshot(
                Request::builder()
                    .method(Method::DELETE)
                    .uri("/api/cache-stats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert!(json["message"].as_str().unwrap().contains("cleared"));
        assert_eq!(state.inline.stats().await.unwrap().size, 0);
        assert_eq!(state.relay.stats().await.unwrap().size, 1);
    }
}
