//! Fakes for router tests

use crate::state::AppState;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use image_relay_cache::{
    CacheCoordinator, CacheEntry, CacheError, CacheKey, CoordinatorOptions, MemoryStore,
    OriginFetcher, OriginImage, PersistenceStore, RelayReference, RelayUploader, Result,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Serves `image:<url>` as PNG for every URL except those containing "broken"
#[derive(Default)]
pub struct FakeOrigin {
    pub fetches: AtomicUsize,
}

impl FakeOrigin {
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OriginFetcher for FakeOrigin {
    async fn fetch(&self, url: &str) -> Result<OriginImage> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if url.contains("broken") {
            return Err(CacheError::OriginUnavailable(
                "origin returned status 502 Bad Gateway".to_string(),
            ));
        }
        Ok(OriginImage {
            data: Bytes::from(format!("image:{url}")),
            content_type: "image/png".to_string(),
        })
    }
}

#[derive(Default)]
pub struct FakeRelay {
    pub configured: bool,
    files: Mutex<HashMap<String, Bytes>>,
}

#[async_trait]
impl RelayUploader for FakeRelay {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn upload(
        &self,
        data: Bytes,
        _content_type: &str,
        file_name: &str,
    ) -> Result<RelayReference> {
        if !self.configured {
            return Err(CacheError::RelayUpload(
                "Telegram bot token or chat id not configured".to_string(),
            ));
        }
        let mut files = self
            .files
            .lock()
            .map_err(|_| CacheError::Internal("poisoned".to_string()))?;
        let file_id = format!("file-{}", file_name);
        files.insert(file_id.clone(), data);
        Ok(RelayReference {
            file_id,
            file_unique_id: format!("uniq-{}", files.len()),
            message_id: files.len() as i64,
            chat_id: -100,
        })
    }

    async fn download(&self, reference: &RelayReference) -> Result<Bytes> {
        self.files
            .lock()
            .map_err(|_| CacheError::Internal("poisoned".to_string()))?
            .get(&reference.file_id)
            .cloned()
            .ok_or_else(|| CacheError::RelayDownload("file not found".to_string()))
    }
}

/// Memory store whose deletes always fail
pub struct FailingDeleteStore {
    inner: MemoryStore,
}

impl FailingDeleteStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
        }
    }
}

#[async_trait]
impl PersistenceStore for FailingDeleteStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        self.inner.get(key).await
    }

    async fn put(&self, entry: CacheEntry) -> Result<()> {
        self.inner.put(entry).await
    }

    async fn delete(&self, _key: &CacheKey) -> Result<bool> {
        Err(CacheError::Persistence("disk is read-only".to_string()))
    }

    async fn clear(&self) -> Result<()> {
        self.inner.clear().await
    }

    async fn size(&self) -> Result<usize> {
        self.inner.size().await
    }

    async fn keys(&self) -> Result<Vec<CacheKey>> {
        self.inner.keys().await
    }

    async fn touch(&self, key: &CacheKey, at: DateTime<Utc>) -> Result<bool> {
        self.inner.touch(key, at).await
    }
}

/// State backed by memory stores and the fakes above
pub fn test_state(bot_configured: bool) -> (AppState, Arc<FakeOrigin>) {
    test_state_with_stores(
        bot_configured,
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryStore::new()),
    )
}

pub fn test_state_with_stores(
    bot_configured: bool,
    inline_store: Arc<dyn PersistenceStore>,
    relay_store: Arc<dyn PersistenceStore>,
) -> (AppState, Arc<FakeOrigin>) {
    let origin = Arc::new(FakeOrigin::default());
    let relay = Arc::new(FakeRelay {
        configured: bot_configured,
        ..Default::default()
    });

    let inline = CacheCoordinator::new(
        inline_store,
        origin.clone(),
        CoordinatorOptions::default(),
    );
    let relay = CacheCoordinator::with_relay(
        relay_store,
        origin.clone(),
        relay,
        CoordinatorOptions::default(),
    );

    (AppState::new(inline, relay, origin.clone()), origin)
}

pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
