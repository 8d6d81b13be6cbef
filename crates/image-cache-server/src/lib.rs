//! Image cache server
//!
//! Serves the JSON and image routes in front of two image caches: an inline
//! cache that stores image bytes locally, and a relay cache that stores them
//! in a Telegram bot chat.

pub mod config;
pub mod error;
pub mod routes;
pub mod server;
pub mod state;

#[cfg(test)]
mod test_support;

pub use config::{CacheBackend, ServerConfig};
pub use error::{ApiError, Result, ServerError};
pub use server::{create_router, start_server};
pub use state::AppState;
