//! Directory-backed store with an in-memory index
//!
//! Layout: `<dir>/<key>.json` holds the entry metadata and, for inline
//! entries, `<dir>/<key>.bin` holds the bytes. Files are staged under a
//! unique `.tmp` name without holding any lock; the index write lock is only
//! taken to rename staged files into place and swap the index entry, so
//! reading or writing one key never waits on file I/O for another.
//!
//! `last_accessed` is tracked in the index and reaches disk the next time
//! the entry is written.

use super::PersistenceStore;
use crate::error::Result;
use crate::key::CacheKey;
use crate::types::{CacheEntry, RelayReference, StorageRef};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const META_EXT: &str = "json";
const BLOB_EXT: &str = "bin";
const TMP_EXT: &str = "tmp";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StoredRef {
    Inline,
    Relay(RelayReference),
}

/// On-disk form of a [`CacheEntry`], minus inline bytes
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntryMetadata {
    key: CacheKey,
    origin_url: String,
    storage: StoredRef,
    content_type: String,
    size: u64,
    created_at: DateTime<Utc>,
    last_accessed: DateTime<Utc>,
}

impl EntryMetadata {
    fn from_entry(entry: &CacheEntry) -> Self {
        let storage = match &entry.storage {
            StorageRef::Inline(_) => StoredRef::Inline,
            StorageRef::Relay(reference) => StoredRef::Relay(reference.clone()),
        };
        Self {
            key: entry.key.clone(),
            origin_url: entry.origin_url.clone(),
            storage,
            content_type: entry.content_type.clone(),
            size: entry.size,
            created_at: entry.created_at,
            last_accessed: entry.last_accessed,
        }
    }

    fn into_entry(self, storage: StorageRef) -> CacheEntry {
        CacheEntry {
            key: self.key,
            origin_url: self.origin_url,
            storage,
            content_type: self.content_type,
            size: self.size,
            created_at: self.created_at,
            last_accessed: self.last_accessed,
        }
    }
}

pub struct FileStore {
    dir: PathBuf,
    index: RwLock<HashMap<CacheKey, EntryMetadata>>,
    next_tmp: AtomicU64,
}

/// Files written for one `put`, waiting to be renamed into place
struct Staged {
    blob: Option<PathBuf>,
    meta: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `dir` and load its index
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;

        let mut index = HashMap::new();
        let mut read_dir = fs::read_dir(&dir).await?;
        while let Some(dirent) = read_dir.next_entry().await? {
            let path = dirent.path();
            match path.extension().and_then(|e| e.to_str()) {
                Some(META_EXT) => {}
                Some(TMP_EXT) => {
                    // Left behind by a write interrupted before its rename
                    remove_if_exists(&path).await?;
                    continue;
                }
                _ => continue,
            }
            match load_metadata(&dir, &path).await {
                Ok(Some(meta)) => {
                    index.insert(meta.key.clone(), meta);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(path = ?path, error = %e, "Skipping unreadable cache metadata");
                }
            }
        }

        info!(dir = ?dir, entries = index.len(), "File store opened");
        Ok(Self {
            dir,
            index: RwLock::new(index),
            next_tmp: AtomicU64::new(0),
        })
    }

    fn meta_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.{}", key, META_EXT))
    }

    fn blob_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.{}", key, BLOB_EXT))
    }

    /// Unique sibling of `path` for concurrent writers of the same key
    fn tmp_path(&self, path: &Path) -> PathBuf {
        let n = self.next_tmp.fetch_add(1, Ordering::Relaxed);
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        path.with_file_name(format!("{}.{}.{}", name, n, TMP_EXT))
    }

    async fn stage(&self, entry: &CacheEntry, meta: &EntryMetadata) -> Result<Staged> {
        let blob = match &entry.storage {
            StorageRef::Inline(data) => {
                let tmp = self.tmp_path(&self.blob_path(&entry.key));
                fs::write(&tmp, data).await?;
                Some(tmp)
            }
            StorageRef::Relay(_) => None,
        };

        let tmp = self.tmp_path(&self.meta_path(&entry.key));
        let written: Result<()> = match serde_json::to_vec_pretty(meta) {
            Ok(json) => fs::write(&tmp, json).await.map_err(Into::into),
            Err(e) => Err(e.into()),
        };
        if let Err(e) = written {
            discard(blob.as_deref()).await;
            discard(Some(&tmp)).await;
            return Err(e);
        }

        Ok(Staged { blob, meta: tmp })
    }

    /// Rename staged files over the live ones; caller holds the write lock
    async fn commit(&self, key: &CacheKey, staged: &Staged) -> Result<()> {
        match &staged.blob {
            Some(tmp) => fs::rename(tmp, self.blob_path(key)).await?,
            None => remove_if_exists(&self.blob_path(key)).await?,
        }
        fs::rename(&staged.meta, self.meta_path(key)).await?;
        Ok(())
    }
}

#[async_trait]
impl PersistenceStore for FileStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let Some(meta) = self.index.read().await.get(key).cloned() else {
            return Ok(None);
        };

        let storage = match &meta.storage {
            StoredRef::Relay(reference) => StorageRef::Relay(reference.clone()),
            StoredRef::Inline => match fs::read(self.blob_path(key)).await {
                // A concurrent put may have swapped the blob since we cloned the metadata
                Ok(data) if data.len() as u64 == meta.size => {
                    StorageRef::Inline(Bytes::from(data))
                }
                Ok(data) => {
                    debug!(
                        key = %key,
                        read = data.len(),
                        expected = meta.size,
                        "Cached blob changed under read"
                    );
                    return Ok(None);
                }
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
                Err(e) => {
                    // Treated as a miss; the repopulating put overwrites both files
                    warn!(key = %key, error = %e, "Failed to read cached blob");
                    return Ok(None);
                }
            },
        };

        Ok(Some(meta.into_entry(storage)))
    }

    async fn put(&self, entry: CacheEntry) -> Result<()> {
        let meta = EntryMetadata::from_entry(&entry);
        let staged = self.stage(&entry, &meta).await?;

        let mut index = self.index.write().await;
        if let Err(e) = self.commit(&entry.key, &staged).await {
            drop(index);
            discard(staged.blob.as_deref()).await;
            discard(Some(&staged.meta)).await;
            return Err(e);
        }
        index.insert(entry.key.clone(), meta);
        drop(index);

        debug!(key = %entry.key, size = entry.size, "Stored cache entry");
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool> {
        let mut index = self.index.write().await;
        let existed = index.remove(key).is_some();

        remove_if_exists(&self.meta_path(key)).await?;
        remove_if_exists(&self.blob_path(key)).await?;

        Ok(existed)
    }

    async fn clear(&self) -> Result<()> {
        let mut index = self.index.write().await;

        let mut read_dir = fs::read_dir(&self.dir).await?;
        while let Some(dirent) = read_dir.next_entry().await? {
            let path = dirent.path();
            // Staged `.tmp` files belong to puts still in progress
            let owned = matches!(
                path.extension().and_then(|e| e.to_str()),
                Some(META_EXT) | Some(BLOB_EXT)
            );
            if owned {
                remove_if_exists(&path).await?;
            }
        }

        let removed = index.len();
        index.clear();
        info!(dir = ?self.dir, removed, "File store cleared");
        Ok(())
    }

    async fn size(&self) -> Result<usize> {
        Ok(self.index.read().await.len())
    }

    async fn keys(&self) -> Result<Vec<CacheKey>> {
        let mut keys: Vec<CacheKey> = self.index.read().await.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    async fn touch(&self, key: &CacheKey, at: DateTime<Utc>) -> Result<bool> {
        let mut index = self.index.write().await;
        let Some(meta) = index.get_mut(key) else {
            return Ok(false);
        };
        meta.last_accessed = at;
        Ok(true)
    }
}

/// Read one metadata file; `None` when it belongs to nobody we can serve
async fn load_metadata(dir: &Path, path: &Path) -> Result<Option<EntryMetadata>> {
    let raw = fs::read(path).await?;
    let meta: EntryMetadata = serde_json::from_slice(&raw)?;

    let file_stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
    if CacheKey::parse(file_stem).as_ref() != Some(&meta.key) {
        warn!(path = ?path, "Cache metadata key does not match file name");
        return Ok(None);
    }

    if matches!(meta.storage, StoredRef::Inline) {
        let blob = dir.join(format!("{}.{}", meta.key, BLOB_EXT));
        if fs::metadata(&blob).await.is_err() {
            warn!(key = %meta.key, "Inline cache entry has no blob, dropping");
            remove_if_exists(path).await?;
            return Ok(None);
        }
    }

    Ok(Some(meta))
}

/// Best-effort removal of a staged file that will never be committed
async fn discard(path: Option<&Path>) {
    if let Some(path) = path {
        if let Err(e) = remove_if_exists(path).await {
            warn!(path = ?path, error = %e, "Failed to remove staged cache file");
        }
    }
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
