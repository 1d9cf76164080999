use std::sync::Arc;
use tasks_core::{
    CacheRegistry, Database, SequenceRegistry, StoreRegistry, SystemClock, TaskManager, TaskManagerConfig,
};
use tempfile::TempDir;

/// A task manager over its own throwaway database
pub struct TestApp {
    pub manager: Arc<TaskManager>,
    pub caches: CacheRegistry,
    pub sequences: SequenceRegistry,
    _dir: TempDir,
}

pub async fn spawn_app(config: TaskManagerConfig) -> TestApp {
    let dir = tempfile::tempdir().expect("temp dir");
    let db = Database::new(dir.path().join("tasks.db")).await.expect("open database");

    let stores = StoreRegistry::new(&db);
    let caches = CacheRegistry::new();
    let sequences = SequenceRegistry::new(&stores).expect("sequence registry");
    let manager = TaskManager::new(&stores, &caches, &sequences, Arc::new(SystemClock), config)
        .expect("task manager");

    TestApp {
        manager: Arc::new(manager),
        caches,
        sequences,
        _dir: dir,
    }
}
