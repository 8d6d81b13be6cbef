//! In-process store, lost on restart

use super::PersistenceStore;
use crate::error::Result;
use crate::key::CacheKey;
use crate::types::CacheEntry;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersistenceStore for MemoryStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, entry: CacheEntry) -> Result<()> {
        self.entries.write().await.insert(entry.key.clone(), entry);
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.write().await.clear();
        Ok(())
    }

    async fn size(&self) -> Result<usize> {
        Ok(self.entries.read().await.len())
    }

    async fn keys(&self) -> Result<Vec<CacheKey>> {
        let mut keys: Vec<CacheKey> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    async fn touch(&self, key: &CacheKey, at: DateTime<Utc>) -> Result<bool> {
        match self.entries.write().await.get_mut(key) {
            Some(entry) => {
                entry.last_accessed = at;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StorageRef;
    use bytes::Bytes;

    fn entry(id: &str) -> CacheEntry {
        let now = Utc::now();
        CacheEntry {
            key: CacheKey::derive(id, "https://x/img.jpg").unwrap(),
            origin_url: "https://x/img.jpg".to_string(),
            storage: StorageRef::Inline(Bytes::from_static(b"jpeg")),
            content_type: "image/jpeg".to_string(),
            size: 4,
            created_at: now,
            last_accessed: now,
        }
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = MemoryStore::new();
        let e = entry("1");

        store.put(e.clone()).await.unwrap();
        assert_eq!(store.get(&e.key).await.unwrap(), Some(e.clone()));
        assert_eq!(store.size().await.unwrap(), 1);

        assert!(store.delete(&e.key).await.unwrap());
        assert!(!store.delete(&e.key).await.unwrap());
        assert!(store.get(&e.key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_keys_sorted_and_clear() {
        let store = MemoryStore::new();
        for id in ["1", "2", "3", "4"] {
            store.put(entry(id)).await.unwrap();
        }

        let keys = store.keys().await.unwrap();
        assert_eq!(keys.len(), 4);
        assert!(keys.windows(2).all(|w| w[0] < w[1]));

        store.clear().await.unwrap();
        assert_eq!(store.size().await.unwrap(), 0);
        assert!(store.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_touch() {
        let store = MemoryStore::new();
        let e = entry("1");
        store.put(e.clone()).await.unwrap();

        let later = e.last_accessed + chrono::Duration::seconds(30);
        assert!(store.touch(&e.key, later).await.unwrap());
        assert_eq!(
            store.get(&e.key).await.unwrap().unwrap().last_accessed,
            later
        );

        let missing = CacheKey::derive("missing", "https://x/img.jpg").unwrap();
        assert!(!store.touch(&missing, later).await.unwrap());
    }
}
