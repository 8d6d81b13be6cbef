//! Process-wide state shared by every route handler

use crate::config::{CacheBackend, ServerConfig};
use crate::error::Result;
use chrono::{DateTime, Utc};
use image_relay_cache::{
    CacheCoordinator, CoordinatorOptions, FileStore, HttpOriginFetcher, MemoryStore,
    OriginFetcher, PersistenceStore, RelayUploader, TelegramRelay, TelegramRelayConfig,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Built once at startup and cloned into each request
#[derive(Clone)]
pub struct AppState {
    /// Cache that keeps image bytes in its own store
    pub inline: CacheCoordinator,
    /// Cache that keeps image bytes in the Telegram relay
    pub relay: CacheCoordinator,
    /// Uncached fetches for `/api/proxy-image`
    pub origin: Arc<dyn OriginFetcher>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        inline: CacheCoordinator,
        relay: CacheCoordinator,
        origin: Arc<dyn OriginFetcher>,
    ) -> Self {
        Self {
            inline,
            relay,
            origin,
            started_at: Utc::now(),
        }
    }

    /// Wire up stores, origin fetcher and relay from configuration
    pub async fn from_config(config: &ServerConfig) -> Result<Self> {
        let origin: Arc<dyn OriginFetcher> = Arc::new(HttpOriginFetcher::with_options(
            config.origin_timeout,
            config.max_image_bytes,
        )?);

        if config.cache_backend == CacheBackend::Memory {
            warn!("Using in-memory cache stores; entries will not survive a restart");
        }
        let inline_store = open_store(config, "inline").await?;
        let relay_store = open_store(config, "telegram").await?;

        let relay: Arc<dyn RelayUploader> = Arc::new(TelegramRelay::new(TelegramRelayConfig {
            bot_token: config.telegram_bot_token.clone(),
            chat_id: config.telegram_chat_id.clone(),
            api_url: config.telegram_api_url.clone(),
            max_file_bytes: config.max_image_bytes,
            ..Default::default()
        })?);
        if !relay.is_configured() {
            warn!("TELEGRAM_BOT_TOKEN or TELEGRAM_CHAT_ID missing; relay cache populates will fail");
        }

        let options = CoordinatorOptions {
            ttl: config.cache_ttl,
        };

        let inline = CacheCoordinator::new(inline_store, origin.clone(), options.clone());
        let relay = CacheCoordinator::with_relay(relay_store, origin.clone(), relay, options);

        info!(
            backend = ?config.cache_backend,
            bot_configured = relay.relay_configured(),
            "Caches initialized"
        );

        Ok(Self::new(inline, relay, origin))
    }
}

async fn open_store(config: &ServerConfig, name: &str) -> Result<Arc<dyn PersistenceStore>> {
    let store: Arc<dyn PersistenceStore> = match config.cache_backend {
        CacheBackend::File => Arc::new(FileStore::open(config.cache_dir.join(name)).await?),
        CacheBackend::Memory => Arc::new(MemoryStore::new()),
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_from_config_file_backend() {
        let dir = tempdir().unwrap();
        let config = ServerConfig {
            cache_dir: dir.path().to_path_buf(),
            ..Default::default()
        };

        let state = AppState::from_config(&config).await.unwrap();
        assert!(dir.path().join("inline").is_dir());
        assert!(dir.path().join("telegram").is_dir());
        assert!(!state.relay.relay_configured());
        assert!(!state.inline.relay_configured());
    }

    #[tokio::test]
    async fn test_from_config_with_credentials() {
        let config = ServerConfig {
            cache_backend: CacheBackend::Memory,
            telegram_bot_token: Some("123:abc".to_string()),
            telegram_chat_id: Some("-100500".to_string()),
            ..Default::default()
        };

        let state = AppState::from_config(&config).await.unwrap();
        assert!(state.relay.relay_configured());
        assert_eq!(state.relay.stats().await.unwrap().size, 0);
    }
}
