use crate::cache::CacheSettings;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables of the task manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskManagerConfig {
    /// Read-through cache of single tasks
    pub entity_cache: CacheSettings,
    /// Cache of full listing pages
    pub page_cache: CacheSettings,
    /// Ids reserved per round trip to the sequence store
    pub id_range_size: i64,
    /// Largest `limit` accepted by a listing
    pub max_page_size: i64,
}

impl Default for TaskManagerConfig {
    fn default() -> Self {
        Self {
            entity_cache: CacheSettings::new(1000, Duration::from_secs(5 * 60)),
            page_cache: CacheSettings::new(100, Duration::from_secs(5 * 60)),
            id_range_size: 10,
            max_page_size: 10_000,
        }
    }
}
