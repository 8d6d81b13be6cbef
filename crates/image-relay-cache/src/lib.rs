//! Image relay cache
//!
//! A small content-addressed cache for remote images. Each entry is addressed
//! by a [`CacheKey`] derived from a logical id and the image's origin URL and
//! stores either the image bytes inline or a reference to a copy held by an
//! external relay (a Telegram bot chat).
//!
//! [`CacheCoordinator`] is the only writer. It coalesces concurrent misses so
//! that each key is fetched from its origin, and uploaded to the relay, at
//! most once at a time.

pub mod coordinator;
pub mod error;
pub mod key;
pub mod origin;
pub mod relay;
pub mod store;
pub mod types;

pub use coordinator::{CacheCoordinator, CoordinatorOptions};
pub use error::{CacheError, Result};
pub use key::CacheKey;
pub use origin::{HttpOriginFetcher, OriginFetcher};
pub use relay::{RelayUploader, TelegramRelay, TelegramRelayConfig};
pub use store::{FileStore, MemoryStore, PersistenceStore};
pub use types::{CacheEntry, CacheStats, CachedImage, OriginImage, RelayReference, StorageRef};
