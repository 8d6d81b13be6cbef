//! Get-or-populate orchestration with per-key request coalescing
//!
//! A key moves `ABSENT -> POPULATING -> PRESENT`, or back to `ABSENT` when
//! population fails. While a key is populating, the in-flight registry maps
//! it to a shared handle on the running population; every caller that misses
//! on that key awaits the same handle instead of starting its own fetch.
//! The registry lock is only held to look up, insert or remove a handle,
//! never across I/O, so unrelated keys never wait on each other.

use crate::error::{CacheError, Result};
use crate::key::CacheKey;
use crate::origin::OriginFetcher;
use crate::relay::{relay_file_name, RelayUploader};
use crate::store::PersistenceStore;
use crate::types::{CacheEntry, CacheStats, CachedImage, StorageRef};
use bytes::Bytes;
use chrono::Utc;
use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome of a population plus the bytes behind it
#[derive(Debug, Clone)]
struct Populated {
    entry: CacheEntry,
    data: Bytes,
    /// Found already stored by an earlier population rather than fetched
    reused: bool,
}

type Population = Shared<BoxFuture<'static, Result<Populated>>>;

struct InFlight {
    id: u64,
    population: Population,
}

#[derive(Debug, Clone, Default)]
pub struct CoordinatorOptions {
    /// Entries older than this are repopulated; `None` keeps them until
    /// explicitly deleted or cleared
    pub ttl: Option<Duration>,
}

enum Lookup {
    Hit(CacheEntry),
    Populated(Populated),
}

/// What the store holds for a key, judged against the TTL
enum Stored {
    Fresh(CacheEntry),
    Expired,
    Absent,
}

/// The only writer of a cache's [`PersistenceStore`]. Cheap to clone.
#[derive(Clone)]
pub struct CacheCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn PersistenceStore>,
    origin: Arc<dyn OriginFetcher>,
    relay: Option<Arc<dyn RelayUploader>>,
    options: CoordinatorOptions,
    in_flight: Mutex<HashMap<CacheKey, InFlight>>,
    next_population: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheCoordinator {
    /// Coordinator for a cache that keeps image bytes in its own store
    pub fn new(
        store: Arc<dyn PersistenceStore>,
        origin: Arc<dyn OriginFetcher>,
        options: CoordinatorOptions,
    ) -> Self {
        Self::build(store, origin, None, options)
    }

    /// Coordinator for a cache whose store only records where the relay
    /// keeps each image
    pub fn with_relay(
        store: Arc<dyn PersistenceStore>,
        origin: Arc<dyn OriginFetcher>,
        relay: Arc<dyn RelayUploader>,
        options: CoordinatorOptions,
    ) -> Self {
        Self::build(store, origin, Some(relay), options)
    }

    fn build(
        store: Arc<dyn PersistenceStore>,
        origin: Arc<dyn OriginFetcher>,
        relay: Option<Arc<dyn RelayUploader>>,
        options: CoordinatorOptions,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                origin,
                relay,
                options,
                in_flight: Mutex::new(HashMap::new()),
                next_population: AtomicU64::new(0),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
            }),
        }
    }

    /// Return the entry for `(id, url)`, populating it on a miss
    pub async fn get(&self, id: &str, url: &str) -> Result<CacheEntry> {
        match self.resolve(id, url).await? {
            Lookup::Hit(entry) => Ok(entry),
            Lookup::Populated(populated) => Ok(populated.entry),
        }
    }

    /// Like [`get`](Self::get), but also return the image bytes
    pub async fn get_image(&self, id: &str, url: &str) -> Result<CachedImage> {
        match self.resolve(id, url).await? {
            Lookup::Hit(entry) => {
                let data = self.load(&entry).await?;
                Ok(CachedImage {
                    entry,
                    data,
                    hit: true,
                })
            }
            Lookup::Populated(Populated {
                entry,
                data,
                reused,
            }) => Ok(CachedImage {
                entry,
                data,
                hit: reused,
            }),
        }
    }

    /// Read an entry's bytes, from the relay if that is where they live
    pub async fn load(&self, entry: &CacheEntry) -> Result<Bytes> {
        self.inner.load(entry).await
    }

    /// Remove the entry for `(id, url)`.
    ///
    /// A population already running for the key is allowed to finish first,
    /// so once this returns the next `get` is guaranteed to repopulate.
    pub async fn delete(&self, id: &str, url: &str) -> Result<bool> {
        let key = CacheKey::derive(id, url)?;

        let pending = self
            .inner
            .in_flight
            .lock()
            .get(&key)
            .map(|f| f.population.clone());
        if let Some(population) = pending {
            debug!(key = %key, "Waiting for in-flight population before delete");
            let _ = population.await;
        }

        let existed = self.inner.store.delete(&key).await?;
        info!(key = %key, existed, "Deleted cache entry");
        Ok(existed)
    }

    /// Remove every entry, after letting running populations finish
    pub async fn clear(&self) -> Result<()> {
        let pending: Vec<Population> = self
            .inner
            .in_flight
            .lock()
            .values()
            .map(|f| f.population.clone())
            .collect();
        if !pending.is_empty() {
            debug!(count = pending.len(), "Waiting for in-flight populations before clear");
            join_all(pending).await;
        }

        self.inner.store.clear().await?;
        info!("Cleared cache");
        Ok(())
    }

    pub async fn stats(&self) -> Result<CacheStats> {
        let keys = self.inner.store.keys().await?;
        Ok(CacheStats {
            size: keys.len(),
            keys,
            timestamp: Utc::now(),
        })
    }

    /// `(hits, misses)` since startup
    pub fn counters(&self) -> (u64, u64) {
        (
            self.inner.hits.load(Ordering::Relaxed),
            self.inner.misses.load(Ordering::Relaxed),
        )
    }

    /// Whether this cache has a relay with its credentials present
    pub fn relay_configured(&self) -> bool {
        self.inner
            .relay
            .as_ref()
            .map(|relay| relay.is_configured())
            .unwrap_or(false)
    }

    /// Number of keys currently populating
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.lock().len()
    }

    async fn resolve(&self, id: &str, url: &str) -> Result<Lookup> {
        let key = CacheKey::derive(id, url)?;

        if let Stored::Fresh(entry) = self.inner.lookup(&key).await? {
            self.inner.hits.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, "Cache hit");
            return Ok(Lookup::Hit(entry));
        }

        let result = Inner::join_population(&self.inner, key, url.trim().to_string()).await;
        let counter = match &result {
            Ok(populated) if populated.reused => &self.inner.hits,
            _ => &self.inner.misses,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        Ok(Lookup::Populated(result?))
    }
}

impl Inner {
    /// Store lookup that honours the TTL and records the access.
    ///
    /// Expired entries are left in place; only the key's population may
    /// remove them, so a stale read never deletes a fresh entry.
    async fn lookup(&self, key: &CacheKey) -> Result<Stored> {
        let Some(mut entry) = self.store.get(key).await? else {
            return Ok(Stored::Absent);
        };

        let now = Utc::now();
        if let Some(ttl) = self.options.ttl {
            let age = (now - entry.created_at).to_std().unwrap_or_default();
            if age > ttl {
                debug!(key = %key, age_secs = age.as_secs(), "Cache entry expired");
                return Ok(Stored::Expired);
            }
        }

        match self.store.touch(key, now).await {
            Ok(_) => entry.last_accessed = now,
            Err(e) => warn!(key = %key, error = %e, "Failed to record cache access"),
        }
        Ok(Stored::Fresh(entry))
    }

    async fn load(&self, entry: &CacheEntry) -> Result<Bytes> {
        match &entry.storage {
            StorageRef::Inline(data) => Ok(data.clone()),
            StorageRef::Relay(reference) => match &self.relay {
                Some(relay) => relay.download(reference).await,
                None => Err(CacheError::RelayDownload(
                    "entry is held by a relay but none is configured".to_string(),
                )),
            },
        }
    }

    /// Await the key's running population, starting one if there is none
    async fn join_population(this: &Arc<Self>, key: CacheKey, url: String) -> Result<Populated> {
        let population = {
            let mut in_flight = this.in_flight.lock();
            match in_flight.get(&key) {
                Some(existing) => {
                    debug!(key = %key, "Joining in-flight population");
                    existing.population.clone()
                }
                None => {
                    let id = this.next_population.fetch_add(1, Ordering::Relaxed);
                    let population = Self::spawn_population(this.clone(), key.clone(), url, id);
                    in_flight.insert(
                        key,
                        InFlight {
                            id,
                            population: population.clone(),
                        },
                    );
                    population
                }
            }
        };

        population.await
    }

    /// Run the population on its own task so it completes even when every
    /// caller waiting on it goes away
    fn spawn_population(this: Arc<Self>, key: CacheKey, url: String, id: u64) -> Population {
        let handle = tokio::spawn(async move {
            let _registration = Registration {
                inner: this.clone(),
                key: key.clone(),
                id,
            };
            this.populate(&key, &url).await
        });

        async move {
            handle.await.unwrap_or_else(|e| {
                Err(CacheError::Internal(format!("population task failed: {e}")))
            })
        }
        .boxed()
        .shared()
    }

    async fn populate(&self, key: &CacheKey, url: &str) -> Result<Populated> {
        // An earlier population may have finished between our miss and registering
        match self.lookup(key).await? {
            Stored::Fresh(entry) => {
                let data = self.load(&entry).await?;
                return Ok(Populated {
                    entry,
                    data,
                    reused: true,
                });
            }
            Stored::Expired => {
                self.store.delete(key).await?;
            }
            Stored::Absent => {}
        }

        let image = self.origin.fetch(url).await.map_err(|e| {
            warn!(key = %key, url, error = %e, "Populate failed at origin");
            e
        })?;

        let storage = match &self.relay {
            Some(relay) => {
                let file_name = relay_file_name(key, &image.content_type);
                let reference = relay
                    .upload(image.data.clone(), &image.content_type, &file_name)
                    .await
                    .map_err(|e| {
                        warn!(key = %key, url, error = %e, "Populate failed at relay upload");
                        e
                    })?;
                StorageRef::Relay(reference)
            }
            None => StorageRef::Inline(image.data.clone()),
        };

        let now = Utc::now();
        let entry = CacheEntry {
            key: key.clone(),
            origin_url: url.to_string(),
            storage,
            content_type: image.content_type,
            size: image.data.len() as u64,
            created_at: now,
            last_accessed: now,
        };

        self.store.put(entry.clone()).await?;
        info!(
            key = %key,
            size = entry.size,
            relay = entry.is_relay(),
            "Cached image"
        );

        Ok(Populated {
            entry,
            data: image.data,
            reused: false,
        })
    }
}

/// Removes a population from the in-flight registry when its task ends,
/// including by panic
struct Registration {
    inner: Arc<Inner>,
    key: CacheKey,
    id: u64,
}

impl Drop for Registration {
    fn drop(&mut self) {
        let mut in_flight = self.inner.in_flight.lock();
        if in_flight.get(&self.key).map(|f| f.id) == Some(self.id) {
            in_flight.remove(&self.key);
        }
    }
}
