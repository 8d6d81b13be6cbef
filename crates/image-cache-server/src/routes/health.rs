use axum::extract::State;
use axum::Json;
use chrono::Utc;
use image_relay_cache::CacheCoordinator;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CacheHealth {
    pub entries: Option<usize>,
    pub hits: u64,
    pub misses: u64,
    pub in_flight: usize,
}

#[derive(Debug, Serialize)]
pub struct CachesHealth {
    pub inline: CacheHealth,
    pub telegram: CacheHealth,
    pub bot_configured: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub caches: CachesHealth,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime_secs = (Utc::now() - state.started_at).num_seconds().max(0) as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs,
        caches: CachesHealth {
            inline: cache_health(&state.inline).await,
            telegram: cache_health(&state.relay).await,
            bot_configured: state.relay.relay_configured(),
        },
    })
}

async fn cache_health(cache: &CacheCoordinator) -> CacheHealth {
    let (hits, misses) = cache.counters();
    CacheHealth {
        // A failing store should not fail the health check itself
        entries: cache.stats().await.ok().map(|s| s.size),
        hits,
        misses,
        in_flight: cache.in_flight(),
    }
}
