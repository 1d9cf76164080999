//! In-memory caches
//!
//! Named, size- and TTL-bounded caches built on `moka`, optionally read-through
//! via a [`MissHandler`].

mod lru;
pub mod registry;

pub use lru::{Cache, FnMissHandler};
pub use registry::CacheRegistry;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Loads a value for a key that is not cached.
///
/// Returning `Ok(None)` means "nothing there"; absence is never cached, so the
/// next lookup for that key asks the handler again.
#[async_trait]
pub trait MissHandler<K, V>: Send + Sync {
    async fn fetch(&self, key: &K) -> Result<Option<V>>;
}

/// Size and age bounds of one cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSettings {
    pub max_size: u64,
    /// Entries expire this long after their last write
    pub expire_after_ms: u64,
}

impl CacheSettings {
    pub fn new(max_size: u64, expire_after: Duration) -> Self {
        Self {
            max_size,
            expire_after_ms: u64::try_from(expire_after.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn expire_after(&self) -> Duration {
        Duration::from_millis(self.expire_after_ms)
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self::new(1000, Duration::from_secs(5 * 60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_saturates_instead_of_wrapping() {
        let settings = CacheSettings::new(10, Duration::MAX);
        assert_eq!(settings.expire_after_ms, u64::MAX);

        let settings = CacheSettings::new(10, Duration::from_millis(1500));
        assert_eq!(settings.expire_after(), Duration::from_millis(1500));
    }
}
