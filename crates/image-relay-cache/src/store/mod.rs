//! Persistence layer for cache entries
//!
//! The coordinator is the only writer. Implementations must tolerate
//! concurrent callers: writes to different keys never interfere, and a
//! concurrent put/delete on one key resolves last-writer-wins without a
//! reader ever seeing half an entry.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::Result;
use crate::key::CacheKey;
use crate::types::CacheEntry;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait PersistenceStore: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>>;

    /// Insert or replace the entry stored under `entry.key`
    async fn put(&self, entry: CacheEntry) -> Result<()>;

    /// Returns whether an entry existed
    async fn delete(&self, key: &CacheKey) -> Result<bool>;

    /// Remove every entry; returns once the removal is durable
    async fn clear(&self) -> Result<()>;

    async fn size(&self) -> Result<usize>;

    /// All keys, sorted ascending
    async fn keys(&self) -> Result<Vec<CacheKey>>;

    /// Record an access; returns whether the entry existed
    async fn touch(&self, key: &CacheKey, at: DateTime<Utc>) -> Result<bool>;
}
