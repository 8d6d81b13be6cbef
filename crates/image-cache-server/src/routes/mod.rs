pub mod cache_image;
pub mod cache_stats;
pub mod health;
pub mod proxy_image;
pub mod refresh_cache;
pub mod telegram_cache_stats;
