//! One cache per name

use super::{Cache, MissHandler};
use crate::error::{Error, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Type-erased view of a registered cache
trait Invalidate: Send + Sync {
    fn invalidate_all(&self);
}

impl<K, V> Invalidate for Cache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn invalidate_all(&self) {
        self.remove_all();
    }
}

/// Creates caches and rejects a second cache under an existing name
#[derive(Default)]
pub struct CacheRegistry {
    caches: DashMap<String, Arc<dyn Invalidate>>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plain cache: lookups of missing keys return nothing
    pub fn create<K, V>(&self, name: &str, max_size: u64, expire_after: Duration) -> Result<Arc<Cache<K, V>>>
    where
        K: Hash + Eq + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        self.register(name, None, max_size, expire_after)
    }

    /// Read-through cache: lookups of missing keys go to `miss_handler`
    pub fn create_read_through<K, V>(
        &self,
        name: &str,
        miss_handler: Arc<dyn MissHandler<K, V>>,
        max_size: u64,
        expire_after: Duration,
    ) -> Result<Arc<Cache<K, V>>>
    where
        K: Hash + Eq + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        self.register(name, Some(miss_handler), max_size, expire_after)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.caches.contains_key(name)
    }

    /// Empty every registered cache
    pub fn invalidate_all(&self) {
        for cache in self.caches.iter() {
            cache.value().invalidate_all();
        }
    }

    /// Forget every registration
    pub fn clear(&self) {
        self.caches.clear();
    }

    fn register<K, V>(
        &self,
        name: &str,
        miss_handler: Option<Arc<dyn MissHandler<K, V>>>,
        max_size: u64,
        expire_after: Duration,
    ) -> Result<Arc<Cache<K, V>>>
    where
        K: Hash + Eq + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        match self.caches.entry(name.to_string()) {
            Entry::Occupied(_) => Err(Error::CacheAlreadyExists(name.to_string())),
            Entry::Vacant(slot) => {
                let cache = Arc::new(Cache::new(name, miss_handler, max_size, expire_after));
                slot.insert(cache.clone());
                info!(
                    "Registered cache {} (max_size={}, expire_after={:?})",
                    name, max_size, expire_after
                );
                Ok(cache)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FnMissHandler;

    #[tokio::test]
    async fn test_duplicate_cache_name_is_rejected() -> Result<()> {
        let registry = CacheRegistry::new();

        let _cache: Arc<Cache<String, i64>> = registry.create("test-cache", 10, Duration::from_secs(60))?;
        let handler: Arc<dyn MissHandler<String, i64>> = Arc::new(FnMissHandler(|_: &String| Ok(Some(1))));
        let second = registry.create_read_through("test-cache", handler, 10, Duration::from_secs(60));

        assert!(matches!(second, Err(Error::CacheAlreadyExists(name)) if name == "test-cache"));
        Ok(())
    }

    #[tokio::test]
    async fn test_invalidate_all_and_clear() -> Result<()> {
        let registry = CacheRegistry::new();
        let numbers: Arc<Cache<i64, i64>> = registry.create("numbers", 10, Duration::from_secs(60))?;
        let words: Arc<Cache<String, String>> = registry.create("words", 10, Duration::from_secs(60))?;

        numbers.put(1, 1).await;
        words.put("a".to_string(), "b".to_string()).await;
        registry.invalidate_all();

        assert_eq!(numbers.get(&1).await?, None);
        assert_eq!(words.get(&"a".to_string()).await?, None);

        registry.clear();
        assert!(!registry.contains("numbers"));
        let _again: Arc<Cache<i64, i64>> = registry.create("numbers", 10, Duration::from_secs(60))?;
        Ok(())
    }
}
