//! Configuration parsed from environment variables

use crate::error::{Result, ServerError};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Where cache entries are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    /// One directory per cache under `cache_dir`
    File,
    /// Process memory; everything is lost on restart
    Memory,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub cache_backend: CacheBackend,
    pub cache_dir: PathBuf,
    /// `None` keeps entries until they are deleted or cleared
    pub cache_ttl: Option<Duration>,
    pub origin_timeout: Duration,
    pub max_image_bytes: u64,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub telegram_api_url: String,
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3001,
            cache_backend: CacheBackend::File,
            cache_dir: PathBuf::from("./cache/images"),
            cache_ttl: None,
            origin_timeout: Duration::from_secs(30),
            max_image_bytes: 20 * 1024 * 1024, // 20MB
            telegram_bot_token: None,
            telegram_chat_id: None,
            telegram_api_url: DEFAULT_TELEGRAM_API_URL.to_string(),
            cors_origins: vec!["*".to_string()],
        }
    }
}

impl ServerConfig {
    /// Parse configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Parse configuration from any variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = var("PORT")
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(defaults.port);

        let cache_backend = match var("CACHE_BACKEND").as_deref() {
            None | Some("file") => CacheBackend::File,
            Some("memory") => CacheBackend::Memory,
            Some(other) => {
                return Err(ServerError::Config(format!(
                    "CACHE_BACKEND must be 'file' or 'memory', got '{}'",
                    other
                )))
            }
        };

        let cache_dir = var("CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.cache_dir);

        // 0 means never expire
        let cache_ttl = var("CACHE_TTL_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        let origin_timeout = var("ORIGIN_TIMEOUT_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.origin_timeout);

        let max_image_bytes = var("MAX_IMAGE_BYTES")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(defaults.max_image_bytes);

        let telegram_api_url = var("TELEGRAM_API_URL").unwrap_or(defaults.telegram_api_url);

        let cors_origins = var("CORS_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.cors_origins);

        Ok(Self {
            port,
            cache_backend,
            cache_dir,
            cache_ttl,
            origin_timeout,
            max_image_bytes,
            telegram_bot_token: var("TELEGRAM_BOT_TOKEN"),
            telegram_chat_id: var("TELEGRAM_CHAT_ID"),
            telegram_api_url,
            cors_origins,
        })
    }

    /// Both relay credentials are present
    pub fn bot_configured(&self) -> bool {
        self.telegram_bot_token.is_some() && self.telegram_chat_id.is_some()
    }
}
