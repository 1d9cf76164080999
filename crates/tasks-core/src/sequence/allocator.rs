use super::IdRange;
use crate::error::{Error, Result};
use crate::storage::Store;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Ids of the block currently held by an allocator
struct Block {
    next: AtomicI64,
    end: i64,
}

impl Block {
    fn take(&self) -> Option<i64> {
        let id = self.next.fetch_add(1, Ordering::SeqCst);
        (id <= self.end).then_some(id)
    }
}

/// Hands out strictly increasing ids for one named sequence.
///
/// Ids are reserved from the backing store in blocks of `range_size` and then
/// served from memory. Several allocators (in one process or many) may share a
/// store: each block is claimed inside a locked store update, so no two allocators
/// ever receive overlapping blocks. Ids left in a block when the process stops are
/// never reused.
pub struct SequenceAllocator {
    name: String,
    range_size: i64,
    store: Arc<Store<String, IdRange>>,
    block: RwLock<Option<Arc<Block>>>,
    refill: Mutex<()>,
}

impl SequenceAllocator {
    pub fn new(name: impl Into<String>, range_size: i64, store: Arc<Store<String, IdRange>>) -> Result<Self> {
        if range_size <= 0 {
            return Err(Error::InvalidRangeSize(range_size));
        }
        Ok(Self {
            name: name.into(),
            range_size,
            store,
            block: RwLock::new(None),
            refill: Mutex::new(()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn range_size(&self) -> i64 {
        self.range_size
    }

    pub async fn new_id(&self) -> Result<i64> {
        if let Some(id) = self.take_from_block().await {
            return Ok(id);
        }

        let _refill = self.refill.lock().await;
        // Someone else may have refilled while we waited
        if let Some(id) = self.take_from_block().await {
            return Ok(id);
        }

        let range = self.reserve_range().await?;
        let block = Block {
            next: AtomicI64::new(range.from + 1),
            end: range.to,
        };
        *self.block.write().await = Some(Arc::new(block));
        Ok(range.from)
    }

    /// Drop the held block. The next id comes from a freshly reserved block.
    pub async fn reset(&self) {
        let _refill = self.refill.lock().await;
        *self.block.write().await = None;
    }

    async fn take_from_block(&self) -> Option<i64> {
        let block = self.block.read().await.clone()?;
        block.take()
    }

    async fn reserve_range(&self) -> Result<IdRange> {
        let size = self.range_size;
        let reserved = self
            .store
            .update(&self.name, |current| {
                Ok(Some(match current {
                    Some(range) => range.next(size),
                    None => IdRange::first(size),
                }))
            })
            .await?;

        let range = reserved.ok_or_else(|| {
            Error::InvalidParameter(format!("No range reserved for sequence {}", self.name))
        })?;
        debug!("Sequence {} reserved ids {}..={}", self.name, range.from, range.to);
        Ok(range)
    }
}
