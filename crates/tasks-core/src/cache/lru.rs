//! LRU cache with TTL, backed by moka

use super::MissHandler;
use crate::error::Result;
use async_trait::async_trait;
use moka::policy::EvictionPolicy;
use std::collections::hash_map::RandomState;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

/// How often pending evictions and expirations are applied in the background
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(1);

/// Keys are spread over this many write-generation counters
const WRITE_STRIPES: usize = 64;

/// Write generations per key stripe.
///
/// Every put or remove bumps its stripe's generation while holding the stripe lock.
/// A load remembers the generation before asking the miss handler and only stores
/// the loaded value if no write hit the stripe in the meantime, so a slow load can
/// never replace a newer write. `remove_all` bumps the shared epoch instead.
struct WriteGenerations {
    hasher: RandomState,
    stripes: Box<[Mutex<u64>]>,
    epoch: AtomicU64,
}

impl WriteGenerations {
    fn new() -> Self {
        Self {
            hasher: RandomState::new(),
            stripes: (0..WRITE_STRIPES).map(|_| Mutex::new(0)).collect(),
            epoch: AtomicU64::new(0),
        }
    }

    fn stripe<K: Hash>(&self, key: &K) -> &Mutex<u64> {
        let slot = self.hasher.hash_one(key) as usize % self.stripes.len();
        &self.stripes[slot]
    }

    async fn snapshot<K: Hash>(&self, key: &K) -> (u64, u64) {
        let generation = *self.stripe(key).lock().await;
        (generation, self.epoch.load(Ordering::SeqCst))
    }
}

/// Named cache evicting least-recently-used entries beyond `max_size` and entries
/// older than `expire_after` since their last write.
///
/// Eviction is deferred: moka queues it and applies it on later operations or in
/// the maintenance task, so the cache may briefly hold more than `max_size` entries.
/// Expired entries are never returned, though.
pub struct Cache<K, V> {
    name: String,
    inner: moka::future::Cache<K, V>,
    miss_handler: Option<Arc<dyn MissHandler<K, V>>>,
    writes: WriteGenerations,
    maintenance: Option<JoinHandle<()>>,
}

impl<K, V> Cache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(
        name: &str,
        miss_handler: Option<Arc<dyn MissHandler<K, V>>>,
        max_size: u64,
        expire_after: Duration,
    ) -> Self {
        let inner = moka::future::Cache::builder()
            .name(name)
            .max_capacity(max_size)
            .time_to_live(expire_after)
            .eviction_policy(EvictionPolicy::lru())
            .build();

        let maintenance = Self::start_maintenance_task(name, inner.clone());

        Self {
            name: name.to_string(),
            inner,
            miss_handler,
            writes: WriteGenerations::new(),
            maintenance,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cached value for `key`, loading it through the miss handler when absent.
    ///
    /// A loaded value is cached only if no `put`/`remove` touched the key while it
    /// was loading; otherwise the newer cached entry wins.
    pub async fn get(&self, key: &K) -> Result<Option<V>> {
        if let Some(value) = self.inner.get(key).await {
            return Ok(Some(value));
        }

        let Some(handler) = &self.miss_handler else {
            return Ok(None);
        };

        debug!("Cache miss in {}", self.name);
        let before = self.writes.snapshot(key).await;
        let Some(loaded) = handler.fetch(key).await? else {
            return Ok(None);
        };

        let stripe = self.writes.stripe(key).lock().await;
        if (*stripe, self.writes.epoch.load(Ordering::SeqCst)) == before {
            self.inner.insert(key.clone(), loaded.clone()).await;
            return Ok(Some(loaded));
        }
        drop(stripe);

        debug!("Discarding load in {} superseded by a write", self.name);
        Ok(self.inner.get(key).await.or(Some(loaded)))
    }

    /// Resolve every key as [`Cache::get`] would; keys with no value are left out
    pub async fn get_all(&self, keys: impl IntoIterator<Item = K>) -> Result<HashMap<K, V>> {
        let mut found = HashMap::new();
        for key in keys {
            if let Some(value) = self.get(&key).await? {
                found.insert(key, value);
            }
        }
        Ok(found)
    }

    pub async fn put(&self, key: K, value: V) {
        let mut generation = self.writes.stripe(&key).lock().await;
        *generation += 1;
        self.inner.insert(key, value).await;
    }

    pub async fn put_all(&self, entries: impl IntoIterator<Item = (K, V)>) {
        for (key, value) in entries {
            self.put(key, value).await;
        }
    }

    pub async fn remove(&self, key: &K) {
        let mut generation = self.writes.stripe(key).lock().await;
        *generation += 1;
        self.inner.invalidate(key).await;
    }

    pub fn remove_all(&self) {
        self.writes.epoch.fetch_add(1, Ordering::SeqCst);
        self.inner.invalidate_all();
    }

    /// Approximate number of entries, pending evictions included
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }

    /// Apply queued evictions and expirations now
    pub async fn run_pending_tasks(&self) {
        self.inner.run_pending_tasks().await;
    }

    fn start_maintenance_task(name: &str, inner: moka::future::Cache<K, V>) -> Option<JoinHandle<()>> {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("No runtime for cache {}, maintenance runs on access only", name);
            return None;
        };

        Some(runtime.spawn(async move {
            let mut interval = tokio::time::interval(MAINTENANCE_INTERVAL);
            loop {
                interval.tick().await;
                inner.run_pending_tasks().await;
            }
        }))
    }
}

impl<K, V> Drop for Cache<K, V> {
    fn drop(&mut self) {
        if let Some(task) = self.maintenance.take() {
            task.abort();
        }
    }
}

/// Adapts a plain function into a [`MissHandler`]
pub struct FnMissHandler<F>(pub F);

#[async_trait]
impl<K, V, F> MissHandler<K, V> for FnMissHandler<F>
where
    K: Sync + 'static,
    V: Send + 'static,
    F: Fn(&K) -> Result<Option<V>> + Send + Sync,
{
    async fn fetch(&self, key: &K) -> Result<Option<V>> {
        (self.0)(key)
    }
}
