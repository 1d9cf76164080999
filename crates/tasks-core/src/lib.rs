//! Tasks Core Library
//!
//! Persistence, caching and id allocation for the tasks service, and the task
//! manager composing them.

pub use tasks_types::*;

pub mod cache;
pub mod error;
pub mod sequence;
pub mod storage;
pub mod tasks;

pub use cache::{Cache, CacheRegistry, CacheSettings, MissHandler};
pub use error::{Error, Result};
pub use sequence::{IdRange, SequenceAllocator, SequenceRegistry};
pub use storage::{Database, Store, StoreRegistry, UniqueIndex};
pub use tasks::{Clock, SystemClock, TaskManager, TaskManagerConfig};
