use super::validation;
use super::{Clock, TaskManagerConfig};
use crate::cache::{Cache, CacheRegistry, MissHandler};
use crate::error::{Error, Result};
use crate::sequence::{SequenceAllocator, SequenceRegistry};
use crate::storage::{Store, StoreRegistry, UniqueIndex};
use std::sync::Arc;
use tasks_types::{NewTaskRequest, Task};
use tracing::{debug, info};

pub const TASK_STORE: &str = "tasks";
pub const TASK_CACHE: &str = "task-cache";
pub const TASK_PAGE_CACHE: &str = "task-page-cache";
pub const TASK_SEQUENCE: &str = "taskId";

/// Cache key of one listing page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PageKey {
    offset: i64,
    limit: i64,
}

/// Task CRUD on top of the store, caches and id sequence.
///
/// Single-task reads go through a read-through cache that every write refreshes,
/// so they always see the latest local write. Listings are cached per
/// `(offset, limit)` and only when the page came back full; a cached page is never
/// invalidated by writes and may show deleted or outdated tasks until it expires.
pub struct TaskManager {
    store: Arc<Store<i64, Task>>,
    tasks: Arc<Cache<i64, Task>>,
    pages: Arc<Cache<PageKey, Vec<Task>>>,
    ids: Arc<SequenceAllocator>,
    clock: Arc<dyn Clock>,
    max_page_size: i64,
}

impl TaskManager {
    pub fn new(
        stores: &StoreRegistry,
        caches: &CacheRegistry,
        sequences: &SequenceRegistry,
        clock: Arc<dyn Clock>,
        config: TaskManagerConfig,
    ) -> Result<Self> {
        let store: Arc<Store<i64, Task>> = stores.create_store(
            TASK_STORE,
            Some(UniqueIndex::new("description", |task: &Task| task.description.clone())),
        )?;

        let loader: Arc<dyn MissHandler<i64, Task>> = store.clone();
        let tasks = caches.create_read_through(
            TASK_CACHE,
            loader,
            config.entity_cache.max_size,
            config.entity_cache.expire_after(),
        )?;
        let pages = caches.create(
            TASK_PAGE_CACHE,
            config.page_cache.max_size,
            config.page_cache.expire_after(),
        )?;
        let ids = sequences.get_or_create(TASK_SEQUENCE, config.id_range_size)?;

        info!("Task manager ready");
        Ok(Self {
            store,
            tasks,
            pages,
            ids,
            clock,
            max_page_size: config.max_page_size,
        })
    }

    pub async fn get(&self, id: i64) -> Result<Option<Task>> {
        validation::task_id(id)?;

        self.tasks.get(&id).await
    }

    /// Tasks ordered by id. May be stale for up to the page cache expiry.
    pub async fn list(&self, offset: i64, limit: i64) -> Result<Vec<Task>> {
        validation::page(offset, limit, self.max_page_size)?;

        let key = PageKey { offset, limit };
        if let Some(page) = self.pages.get(&key).await? {
            debug!("Page cache hit for offset={} limit={}", offset, limit);
            return Ok(page);
        }

        debug!("Page cache miss for offset={} limit={}", offset, limit);
        let page = self.store.get_all(offset, limit).await?;
        // A short page may still grow, only full ones are cached
        if page.len() as i64 == limit {
            self.pages.put(key, page.clone()).await;
        }
        Ok(page)
    }

    pub async fn create(&self, request: NewTaskRequest) -> Result<Task> {
        validation::new_task(&request)?;

        let id = self.ids.new_id().await?;
        let task = Task::new(id, request.description, self.clock.now_ms(), request.ends_at_ms);

        let created = self
            .store
            .update_with_index(&id, Some(&task.description), |existing| match existing {
                Some(_) => Err(Error::EntityAlreadyExists("Task".to_string())),
                None => Ok(Some(task.clone())),
            })
            .await?
            .ok_or_else(|| Error::EntityNotFound(format!("Task with id={} was not stored", id)))?;

        self.tasks.put(created.id, created.clone()).await;
        info!("Created task {}", created.id);
        Ok(created)
    }

    /// Replace description, deadline and completion of a task, keeping its creation time
    pub async fn update(&self, id: i64, request: NewTaskRequest) -> Result<Task> {
        validation::task_id(id)?;
        validation::new_task(&request)?;

        let updated = self
            .store
            .update(&id, |existing| match existing {
                None => Err(Error::EntityNotFound(format!("Task with id={} does not exist!", id))),
                Some(existing) => Ok(Some(Task {
                    id: existing.id,
                    description: request.description.clone(),
                    created_at_ms: existing.created_at_ms,
                    ends_at_ms: request.ends_at_ms,
                    completed: request.completed,
                })),
            })
            .await?
            .ok_or_else(|| Error::EntityNotFound(format!("Task with id={} does not exist!", id)))?;

        self.tasks.put(updated.id, updated.clone()).await;
        debug!("Updated task {}", updated.id);
        Ok(updated)
    }

    /// Delete a task. Deleting a missing task is not an error.
    pub async fn delete(&self, id: i64) -> Result<()> {
        validation::task_id(id)?;

        self.store.update(&id, |_| Ok(None)).await?;
        self.tasks.remove(&id).await;
        debug!("Deleted task {}", id);
        Ok(())
    }
}
