use super::{IdRange, SequenceAllocator};
use crate::error::{Error, Result};
use crate::storage::{Store, StoreRegistry};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::info;

/// Store holding the last reserved range of every sequence
pub const SEQUENCE_STORE: &str = "id_generator";

/// One allocator per sequence name, all sharing the `id_generator` store
pub struct SequenceRegistry {
    store: Arc<Store<String, IdRange>>,
    allocators: DashMap<String, Arc<SequenceAllocator>>,
}

impl SequenceRegistry {
    pub fn new(stores: &StoreRegistry) -> Result<Self> {
        Ok(Self {
            store: stores.create_store(SEQUENCE_STORE, None)?,
            allocators: DashMap::new(),
        })
    }

    /// Allocator for `name`, created on first use.
    ///
    /// Once created, an allocator keeps the range size it was created with.
    pub fn get_or_create(&self, name: &str, range_size: i64) -> Result<Arc<SequenceAllocator>> {
        if range_size <= 0 {
            return Err(Error::InvalidRangeSize(range_size));
        }

        match self.allocators.entry(name.to_string()) {
            Entry::Occupied(existing) => Ok(existing.get().clone()),
            Entry::Vacant(slot) => {
                let allocator = Arc::new(SequenceAllocator::new(name, range_size, self.store.clone())?);
                slot.insert(allocator.clone());
                info!("Created sequence {} (range_size={})", name, range_size);
                Ok(allocator)
            }
        }
    }

    /// Drop the held block of every allocator
    pub async fn reset_all(&self) {
        let allocators: Vec<_> = self.allocators.iter().map(|a| a.value().clone()).collect();
        for allocator in allocators {
            allocator.reset().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::temp_database;

    #[tokio::test]
    async fn test_separate_names_have_separate_counters() -> Result<()> {
        let (_dir, db) = temp_database().await;
        let sequences = SequenceRegistry::new(&StoreRegistry::new(&db))?;
        let jobs = sequences.get_or_create("job_ids", 10)?;
        let actions = sequences.get_or_create("actions_ids", 10)?;

        for expected in 1..=20 {
            assert_eq!(jobs.new_id().await?, expected);
            assert_eq!(actions.new_id().await?, expected);
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_get_or_create_is_memoized() -> Result<()> {
        let (_dir, db) = temp_database().await;
        let sequences = SequenceRegistry::new(&StoreRegistry::new(&db))?;

        let first = sequences.get_or_create("job_ids", 10)?;
        let second = sequences.get_or_create("job_ids", 5)?;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.range_size(), 10);

        assert_eq!(first.new_id().await?, 1);
        assert_eq!(second.new_id().await?, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_range_size_is_rejected() -> Result<()> {
        let (_dir, db) = temp_database().await;
        let sequences = SequenceRegistry::new(&StoreRegistry::new(&db))?;

        assert!(matches!(sequences.get_or_create("job_ids", 0), Err(Error::InvalidRangeSize(0))));
        Ok(())
    }

    #[tokio::test]
    async fn test_reset_all() -> Result<()> {
        let (_dir, db) = temp_database().await;
        let sequences = SequenceRegistry::new(&StoreRegistry::new(&db))?;
        let jobs = sequences.get_or_create("job_ids", 10)?;
        let actions = sequences.get_or_create("actions_ids", 4)?;

        assert_eq!(jobs.new_id().await?, 1);
        assert_eq!(actions.new_id().await?, 1);
        sequences.reset_all().await;

        assert_eq!(jobs.new_id().await?, 11);
        assert_eq!(actions.new_id().await?, 5);
        Ok(())
    }

    #[tokio::test]
    async fn test_sequence_store_is_registered() -> Result<()> {
        let (_dir, db) = temp_database().await;
        let stores = StoreRegistry::new(&db);
        let _sequences = SequenceRegistry::new(&stores)?;

        assert!(stores.contains(SEQUENCE_STORE));
        assert!(matches!(
            SequenceRegistry::new(&stores),
            Err(Error::StoreAlreadyExists(_))
        ));
        Ok(())
    }
}
