mod common;

use common::spawn_app;
use std::collections::HashSet;
use std::time::Duration;
use tasks_core::{CacheSettings, Error, NewTaskRequest, Result, TaskManagerConfig};

#[tokio::test]
async fn test_task_lifecycle() -> Result<()> {
    let app = spawn_app(TaskManagerConfig::default()).await;
    let before = chrono::Utc::now().timestamp_millis();

    let created = app.manager.create(NewTaskRequest::new("Write report", 1_000)).await?;
    assert_eq!(created.id, 1);
    assert!(created.created_at_ms >= before);
    assert!(!created.completed);
    assert_eq!(app.manager.get(created.id).await?, Some(created.clone()));

    let updated = app
        .manager
        .update(created.id, NewTaskRequest::new("Write final report", 2_000).completed(true))
        .await?;
    assert_eq!(updated.created_at_ms, created.created_at_ms);
    assert_eq!(app.manager.get(created.id).await?, Some(updated.clone()));
    assert_eq!(app.manager.list(0, 10).await?, vec![updated]);

    app.manager.delete(created.id).await?;
    assert_eq!(app.manager.get(created.id).await?, None);
    assert!(app.manager.list(0, 10).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_duplicate_description_is_rejected() -> Result<()> {
    let app = spawn_app(TaskManagerConfig::default()).await;

    app.manager.create(NewTaskRequest::new("Buy milk", 1)).await?;
    let err = app
        .manager
        .create(NewTaskRequest::new("Buy milk", 2))
        .await
        .expect_err("duplicate description");
    assert!(matches!(err, Error::EntityAlreadyExists(_)));
    assert!(err.is_client_error());
    assert_eq!(app.manager.list(0, 10).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_missing_task() -> Result<()> {
    let app = spawn_app(TaskManagerConfig::default()).await;

    assert_eq!(app.manager.get(404).await?, None);
    let err = app
        .manager
        .update(404, NewTaskRequest::new("Ghost", 1))
        .await
        .expect_err("update of missing task");
    assert!(err.is_not_found());
    app.manager.delete(404).await?;
    Ok(())
}

#[tokio::test]
async fn test_list_pages_in_id_order() -> Result<()> {
    let app = spawn_app(TaskManagerConfig::default()).await;
    for i in 1..=5 {
        app.manager.create(NewTaskRequest::new(format!("Task {}", i), i)).await?;
    }

    let ids = |tasks: Vec<tasks_core::Task>| tasks.into_iter().map(|t| t.id).collect::<Vec<_>>();
    assert_eq!(ids(app.manager.list(0, 3).await?), vec![1, 2, 3]);
    assert_eq!(ids(app.manager.list(3, 3).await?), vec![4, 5]);
    assert!(app.manager.list(5, 3).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_page_cache_serves_stale_pages_until_expiry() -> Result<()> {
    let config = TaskManagerConfig {
        page_cache: CacheSettings::new(100, Duration::from_millis(300)),
        ..TaskManagerConfig::default()
    };
    let app = spawn_app(config).await;

    let mut created = Vec::new();
    for name in ["one", "two", "three"] {
        created.push(app.manager.create(NewTaskRequest::new(name, 1)).await?);
    }
    assert_eq!(app.manager.list(0, 3).await?, created);

    app.manager.delete(created[1].id).await?;
    // The full page is still cached
    assert_eq!(app.manager.list(0, 3).await?, created);
    // Point reads are never stale
    assert_eq!(app.manager.get(created[1].id).await?, None);

    tokio::time::sleep(Duration::from_millis(400)).await;

    let fresh = app.manager.list(0, 3).await?;
    assert_eq!(fresh, vec![created[0].clone(), created[2].clone()]);
    Ok(())
}

#[tokio::test]
async fn test_ids_keep_growing_after_reset() -> Result<()> {
    let app = spawn_app(TaskManagerConfig::default()).await;

    let first = app.manager.create(NewTaskRequest::new("first", 1)).await?;
    app.sequences.reset_all().await;
    app.caches.invalidate_all();
    let second = app.manager.create(NewTaskRequest::new("second", 1)).await?;

    assert_eq!(first.id, 1);
    assert_eq!(second.id, 11);
    assert_eq!(app.manager.get(first.id).await?, Some(first));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_clients_create_unique_readable_tasks() -> Result<()> {
    const CLIENTS: usize = 32;
    const TASKS_PER_CLIENT: usize = 10;

    let app = spawn_app(TaskManagerConfig::default()).await;

    let clients: Vec<_> = (0..CLIENTS)
        .map(|client| {
            let manager = app.manager.clone();
            tokio::spawn(async move {
                let mut created = Vec::with_capacity(TASKS_PER_CLIENT);
                for n in 0..TASKS_PER_CLIENT {
                    let request = NewTaskRequest::new(format!("client {} task {}", client, n), 1);
                    created.push(manager.create(request).await?);
                }
                Ok::<_, Error>(created)
            })
        })
        .collect();

    let mut created = Vec::new();
    for client in clients {
        created.extend(client.await.expect("client task panicked")?);
    }

    let ids: HashSet<i64> = created.iter().map(|t| t.id).collect();
    assert_eq!(ids.len(), CLIENTS * TASKS_PER_CLIENT);
    for task in &created {
        assert_eq!(app.manager.get(task.id).await?.as_ref(), Some(task));
    }
    assert_eq!(
        app.manager.list(0, 10_000).await?.len(),
        CLIENTS * TASKS_PER_CLIENT
    );
    Ok(())
}
