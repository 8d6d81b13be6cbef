//! Cache types

use crate::key::CacheKey;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a relay copy of an image lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayReference {
    pub file_id: String,
    pub file_unique_id: String,
    pub message_id: i64,
    pub chat_id: i64,
}

/// Where the bytes of a cached image live
#[derive(Debug, Clone, PartialEq)]
pub enum StorageRef {
    Inline(Bytes),
    Relay(RelayReference),
}

/// A cached image, one per [`CacheKey`]
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub origin_url: String,
    pub storage: StorageRef,
    pub content_type: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_relay(&self) -> bool {
        matches!(self.storage, StorageRef::Relay(_))
    }
}

/// Image bytes as served by an origin
#[derive(Debug, Clone)]
pub struct OriginImage {
    pub data: Bytes,
    pub content_type: String,
}

/// An entry together with its bytes, as handed to HTTP handlers
#[derive(Debug, Clone)]
pub struct CachedImage {
    pub entry: CacheEntry,
    pub data: Bytes,
    /// False when this call (or one it joined) populated the entry
    pub hit: bool,
}

/// Snapshot of the cache contents, recomputed on every request
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub keys: Vec<CacheKey>,
    pub timestamp: DateTime<Utc>,
}
