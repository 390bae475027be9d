//! Keyed artifact cache
//!
//! Every key owns one slot in a sharded map. A slot is either `Ready` with
//! the loaded handle, or `Loading` with the receiving end of a watch channel
//! on which the single loader for that key publishes its outcome. Shard
//! locks cover only the presence check and slot transitions; the load itself
//! runs on the blocking pool, so unrelated keys load in parallel.
//!
//! Failures are broadcast to everyone waiting on the key and then the slot
//! is dropped, so the next request tries again.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::watch;

use crate::config::SommelierConfig;
use crate::error::{Error, Result};
use crate::loader::{
    ArtifactHandle, ArtifactKey, ArtifactKind, ArtifactLoader, Booster, FsLoader, LabelEncoder,
    Locator, Scaler,
};

/// Called with each entry removed by capacity eviction
pub type EvictionListener = Arc<dyn Fn(&CacheEntry) + Send + Sync>;

type LoadOutcome = Option<Result<ArtifactHandle>>;

/// A successfully loaded artifact. Never mutated after insertion apart from
/// its access bookkeeping.
#[derive(Debug)]
pub struct CacheEntry {
    key: ArtifactKey,
    handle: ArtifactHandle,
    path: PathBuf,
    loaded_at: DateTime<Utc>,
    last_access: AtomicU64,
    hits: AtomicU64,
}

impl CacheEntry {
    pub fn key(&self) -> &ArtifactKey {
        &self.key
    }

    pub fn handle(&self) -> &ArtifactHandle {
        &self.handle
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    fn touch(&self, tick: u64) {
        self.last_access.store(tick, Ordering::Relaxed);
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn last_access(&self) -> u64 {
        self.last_access.load(Ordering::Relaxed)
    }
}

enum Slot {
    Ready(Arc<CacheEntry>),
    Loading(watch::Receiver<LoadOutcome>),
}

/// Counter snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Requests served from a ready entry
    pub hits: u64,
    /// Requests that started a load
    pub misses: u64,
    /// Successful loads
    pub loads: u64,
    /// Failed or timed-out loads
    pub failures: u64,
    /// Entries removed to respect the capacity
    pub evictions: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    loads: AtomicU64,
    failures: AtomicU64,
    evictions: AtomicU64,
}

/// Information about a loaded artifact
#[derive(Debug, Clone)]
pub struct LoadedArtifactInfo {
    pub key: ArtifactKey,
    pub path: PathBuf,
    pub loaded_at: DateTime<Utc>,
    /// Logical access tick; higher means more recently used
    pub last_access: u64,
    pub hits: u64,
}

struct Inner {
    slots: DashMap<ArtifactKey, Slot>,
    locator: Locator,
    loader: Arc<dyn ArtifactLoader>,
    capacity: Option<usize>,
    load_timeout: Option<Duration>,
    on_evict: Option<EvictionListener>,
    /// Serializes eviction passes so concurrent installs cannot evict each other
    evicting: Mutex<()>,
    clock: AtomicU64,
    counters: Counters,
}

/// Builder for [`ArtifactCache`]
pub struct CacheBuilder {
    locator: Locator,
    loader: Arc<dyn ArtifactLoader>,
    capacity: Option<usize>,
    load_timeout: Option<Duration>,
    on_evict: Option<EvictionListener>,
}

impl CacheBuilder {
    /// Load through a custom loader instead of the filesystem
    pub fn loader(mut self, loader: Arc<dyn ArtifactLoader>) -> Self {
        self.loader = loader;
        self
    }

    /// Keep at most `capacity` ready entries (least recently used go first).
    /// A capacity below one behaves as one.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Fail waiters with `Error::Timeout` when a load takes longer than this
    pub fn load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = Some(timeout);
        self
    }

    pub fn on_evict<F>(mut self, listener: F) -> Self
    where
        F: Fn(&CacheEntry) + Send + Sync + 'static,
    {
        self.on_evict = Some(Arc::new(listener));
        self
    }

    pub fn build(self) -> ArtifactCache {
        ArtifactCache {
            inner: Arc::new(Inner {
                slots: DashMap::new(),
                locator: self.locator,
                loader: self.loader,
                capacity: self.capacity,
                load_timeout: self.load_timeout,
                on_evict: self.on_evict,
                evicting: Mutex::new(()),
                clock: AtomicU64::new(0),
                counters: Counters::default(),
            }),
        }
    }
}

/// In-memory artifact cache with lazy, exactly-once-per-key loading
///
/// Cloning is cheap and clones share the same entries.
#[derive(Clone)]
pub struct ArtifactCache {
    inner: Arc<Inner>,
}

impl ArtifactCache {
    /// Filesystem-backed cache with no capacity limit or timeout
    pub fn new(locator: Locator) -> Self {
        Self::builder(locator).build()
    }

    pub fn builder(locator: Locator) -> CacheBuilder {
        CacheBuilder {
            locator,
            loader: Arc::new(FsLoader),
            capacity: None,
            load_timeout: None,
            on_evict: None,
        }
    }

    /// Filesystem-backed cache configured from `config.artifacts` and `config.cache`
    pub fn from_config(config: &SommelierConfig) -> Self {
        let mut builder = Self::builder(Locator::new(config.artifacts.clone()));
        if let Some(capacity) = config.cache.capacity {
            builder = builder.capacity(capacity);
        }
        if let Some(timeout) = config.cache.load_timeout() {
            builder = builder.load_timeout(timeout);
        }
        builder.build()
    }

    pub fn locator(&self) -> &Locator {
        &self.inner.locator
    }

    /// Return the handle for `key`, loading it on first use
    ///
    /// Concurrent callers for the same uncached key share one load and all
    /// observe its result. Failures are not cached.
    pub async fn get_or_load(&self, key: &ArtifactKey) -> Result<ArtifactHandle> {
        key.validate()?;
        loop {
            if let Some(handle) = self.peek(key) {
                return Ok(handle);
            }

            let mut rx = match self.inner.slots.entry(key.clone()) {
                Entry::Occupied(occupied) => match occupied.get() {
                    Slot::Ready(entry) => {
                        let handle = entry.handle.clone();
                        self.inner.record_hit(entry);
                        return Ok(handle);
                    }
                    Slot::Loading(rx) => {
                        tracing::debug!(%key, "Joining in-flight load");
                        rx.clone()
                    }
                },
                Entry::Vacant(vacant) => {
                    let (tx, rx) = watch::channel(None);
                    vacant.insert(Slot::Loading(rx.clone()));
                    self.inner.counters.misses.fetch_add(1, Ordering::Relaxed);
                    self.spawn_load(key.clone(), tx);
                    rx
                }
            };

            let published = match rx.wait_for(Option::is_some).await {
                Ok(outcome) => (*outcome).clone(),
                Err(_) => None,
            };
            if let Some(result) = published {
                return result;
            }

            // Loader vanished without publishing (runtime shutting down).
            // Drop its slot so the retry can take over.
            self.inner.slots.remove_if(key, |_, slot| {
                matches!(slot, Slot::Loading(r) if r.same_channel(&rx))
            });
        }
    }

    /// Load the model for a type/version
    pub async fn get_model(&self, model_type: &str, model_version: &str) -> Result<Arc<Booster>> {
        let key = ArtifactKey::model(model_type, model_version);
        let handle = self.get_or_load(&key).await?;
        let kind = handle.kind();
        handle.into_model().ok_or_else(|| mismatch(&key, kind))
    }

    /// Load the scaler for a type/version
    pub async fn get_scaler(&self, model_type: &str, model_version: &str) -> Result<Arc<Scaler>> {
        let key = ArtifactKey::scaler(model_type, model_version);
        let handle = self.get_or_load(&key).await?;
        let kind = handle.kind();
        handle.into_scaler().ok_or_else(|| mismatch(&key, kind))
    }

    /// Load the label encoder for a type/version
    pub async fn get_encoder(
        &self,
        model_type: &str,
        model_version: &str,
    ) -> Result<Arc<LabelEncoder>> {
        let key = ArtifactKey::encoder(model_type, model_version);
        let handle = self.get_or_load(&key).await?;
        let kind = handle.kind();
        handle.into_encoder().ok_or_else(|| mismatch(&key, kind))
    }

    /// Cached handle for `key`, without loading
    pub fn peek(&self, key: &ArtifactKey) -> Option<ArtifactHandle> {
        let slot = self.inner.slots.get(key)?;
        match slot.value() {
            Slot::Ready(entry) => {
                self.inner.record_hit(entry);
                Some(entry.handle.clone())
            }
            Slot::Loading(_) => None,
        }
    }

    /// Load several keys concurrently, reporting each outcome in input order
    pub async fn preload<I>(&self, keys: I) -> Vec<(ArtifactKey, Result<()>)>
    where
        I: IntoIterator<Item = ArtifactKey>,
    {
        let tasks: Vec<_> = keys
            .into_iter()
            .map(|key| {
                let cache = self.clone();
                let task_key = key.clone();
                let task =
                    tokio::spawn(async move { cache.get_or_load(&task_key).await.map(|_| ()) });
                (key, task)
            })
            .collect();

        let mut outcomes = Vec::with_capacity(tasks.len());
        for (key, task) in tasks {
            let outcome = task
                .await
                .unwrap_or_else(|e| Err(Error::internal(format!("preload of {key} failed: {e}"))));
            outcomes.push((key, outcome));
        }
        outcomes
    }

    /// Drop a ready entry. In-flight loads are left alone.
    pub fn invalidate(&self, key: &ArtifactKey) -> bool {
        self.inner
            .slots
            .remove_if(key, |_, slot| matches!(slot, Slot::Ready(_)))
            .is_some()
    }

    /// Drop every ready entry
    pub fn clear(&self) {
        self.inner
            .slots
            .retain(|_, slot| matches!(slot, Slot::Loading(_)));
    }

    /// Number of ready entries
    pub fn len(&self) -> usize {
        self.inner.ready_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> Option<usize> {
        self.inner.capacity
    }

    /// List loaded artifacts
    pub fn list_loaded(&self) -> Vec<LoadedArtifactInfo> {
        let mut loaded: Vec<_> = self
            .inner
            .slots
            .iter()
            .filter_map(|slot| match slot.value() {
                Slot::Ready(entry) => Some(LoadedArtifactInfo {
                    key: entry.key.clone(),
                    path: entry.path.clone(),
                    loaded_at: entry.loaded_at,
                    last_access: entry.last_access(),
                    hits: entry.hits(),
                }),
                Slot::Loading(_) => None,
            })
            .collect();
        loaded.sort_by(|a, b| a.loaded_at.cmp(&b.loaded_at));
        loaded
    }

    pub fn stats(&self) -> CacheStats {
        let c = &self.inner.counters;
        CacheStats {
            hits: c.hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            loads: c.loads.load(Ordering::Relaxed),
            failures: c.failures.load(Ordering::Relaxed),
            evictions: c.evictions.load(Ordering::Relaxed),
        }
    }

    /// Run the load for `key` on its own task so it completes (and publishes)
    /// even if the requester that started it is dropped.
    fn spawn_load(&self, key: ArtifactKey, tx: watch::Sender<LoadOutcome>) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let published = match inner.load(&key).await {
                Ok(entry) => {
                    let handle = entry.handle.clone();
                    inner.install(key, entry);
                    Ok(handle)
                }
                Err(e) => {
                    inner
                        .slots
                        .remove_if(&key, |_, slot| matches!(slot, Slot::Loading(_)));
                    Err(e)
                }
            };
            tx.send_replace(Some(published));
        });
    }
}

impl Inner {
    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    fn record_hit(&self, entry: &CacheEntry) {
        entry.touch(self.tick());
        self.counters.hits.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(key = %entry.key, "Artifact cache hit");
    }

    fn ready_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot.value(), Slot::Ready(_)))
            .count()
    }

    async fn load(&self, key: &ArtifactKey) -> Result<Arc<CacheEntry>> {
        let path = self.locator.path_for(key);
        let kind = key.kind;
        let start = Instant::now();
        tracing::info!(%key, path = %path.display(), "Loading artifact");

        let task = tokio::task::spawn_blocking({
            let loader = Arc::clone(&self.loader);
            let path = path.clone();
            move || loader.load(&path, kind)
        });

        let joined = match self.load_timeout {
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    self.counters.failures.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(%key, path = %path.display(), ?limit, "Artifact load timed out");
                    return Err(Error::Timeout {
                        key: key.clone(),
                        after: limit,
                    });
                }
            },
            None => task.await,
        };

        let result = joined
            .map_err(|e| Error::load(kind, &path, format!("loader task failed: {e}")))
            .and_then(|loaded| loaded)
            .and_then(|handle| {
                if handle.kind() == kind {
                    Ok(handle)
                } else {
                    Err(Error::load(
                        kind,
                        &path,
                        format!("loader returned a {} artifact", handle.kind()),
                    ))
                }
            });

        match result {
            Ok(handle) => {
                self.counters.loads.fetch_add(1, Ordering::Relaxed);
                tracing::info!(%key, elapsed = ?start.elapsed(), "Artifact loaded");
                Ok(Arc::new(CacheEntry {
                    key: key.clone(),
                    handle,
                    path,
                    loaded_at: Utc::now(),
                    last_access: AtomicU64::new(self.tick()),
                    hits: AtomicU64::new(0),
                }))
            }
            Err(e) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                if e.is_not_found() {
                    tracing::debug!(%key, path = %path.display(), "Artifact not found");
                } else {
                    tracing::warn!(%key, %kind, path = %path.display(), error = %e, "Artifact load failed");
                }
                Err(e)
            }
        }
    }

    fn install(&self, key: ArtifactKey, entry: Arc<CacheEntry>) {
        self.slots.insert(key.clone(), Slot::Ready(entry));
        self.ensure_capacity(&key);
    }

    /// Evict least-recently-used ready entries until within capacity.
    /// Loading slots are never candidates, and neither is the entry that was
    /// just installed.
    fn ensure_capacity(&self, keep: &ArtifactKey) {
        let Some(capacity) = self.capacity else {
            return;
        };

        let mut evicted = Vec::new();
        let guard = self.evicting.lock().unwrap_or_else(PoisonError::into_inner);
        while self.ready_count() > capacity {
            let victim = self
                .slots
                .iter()
                .filter_map(|slot| match slot.value() {
                    Slot::Ready(entry) if slot.key() != keep => {
                        Some((slot.key().clone(), entry.last_access()))
                    }
                    _ => None,
                })
                .min_by_key(|(_, last_access)| *last_access)
                .map(|(key, _)| key);

            let Some(victim) = victim else {
                break;
            };

            if let Some((_, Slot::Ready(entry))) = self
                .slots
                .remove_if(&victim, |_, slot| matches!(slot, Slot::Ready(_)))
            {
                self.counters.evictions.fetch_add(1, Ordering::Relaxed);
                tracing::info!(key = %victim, "Evicting artifact");
                evicted.push(entry);
            }
        }
        drop(guard);

        if let Some(listener) = &self.on_evict {
            for entry in &evicted {
                listener(entry);
            }
        }
    }
}

fn mismatch(key: &ArtifactKey, got: ArtifactKind) -> Error {
    Error::internal(format!("{key} resolved to a {got} artifact"))
}
