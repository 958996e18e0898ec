use anyhow::Result;
use chrono::{Duration, Utc};
use watchtower_core::{DatabaseConfig, WatchtowerError};
use watchtower_domain::{WorkerRecord, WorkerRegistry, WorkerStatus};
use watchtower_infrastructure::{DatabaseManager, SqliteWorkerRegistry};

async fn setup() -> Result<(DatabaseManager, SqliteWorkerRegistry)> {
    let config = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        connection_timeout_seconds: 5,
    };
    let manager = DatabaseManager::new(&config).await?;
    manager.migrate().await?;
    let registry = SqliteWorkerRegistry::new(manager.pool().clone());
    Ok((manager, registry))
}

#[tokio::test]
async fn test_migrate_is_idempotent() -> Result<()> {
    let (manager, _) = setup().await?;
    manager.migrate().await?;
    manager.health_check().await?;
    Ok(())
}

#[tokio::test]
async fn test_upsert_and_find() -> Result<()> {
    let (_manager, registry) = setup().await?;
    let record = WorkerRecord::new("w-1", "default", "emails").with_pid(Some(1234));
    registry.upsert(&record).await?;

    let found = registry.find_by_id("w-1").await?.expect("record exists");
    assert_eq!(found.supervisor, "default");
    assert_eq!(found.queue, "emails");
    assert_eq!(found.pid, Some(1234));
    assert_eq!(found.status, WorkerStatus::Running);
    assert_eq!(
        found.started_at.timestamp_millis(),
        record.started_at.timestamp_millis()
    );

    assert!(registry.find_by_id("missing").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_upsert_without_pid_keeps_existing_pid() -> Result<()> {
    let (_manager, registry) = setup().await?;
    registry
        .upsert(&WorkerRecord::new("w-1", "default", "emails").with_pid(Some(99)))
        .await?;
    registry
        .upsert(&WorkerRecord::new("w-1", "default", "emails"))
        .await?;

    let found = registry.find_by_id("w-1").await?.expect("record exists");
    assert_eq!(found.pid, Some(99));
    Ok(())
}

#[tokio::test]
async fn test_status_filters() -> Result<()> {
    let (_manager, registry) = setup().await?;
    registry.upsert(&WorkerRecord::new("a", "default", "q")).await?;
    registry.upsert(&WorkerRecord::new("b", "default", "q")).await?;
    registry.upsert(&WorkerRecord::new("c", "emails", "q")).await?;
    registry.update_status("b", WorkerStatus::Paused).await?;
    registry.update_status("c", WorkerStatus::Stopped).await?;

    let running = registry.list_by_status(&[WorkerStatus::Running]).await?;
    assert_eq!(running.len(), 1);
    assert_eq!(running[0].worker_id, "a");

    let active = registry
        .list_for_supervisor("default", &WorkerStatus::ACTIVE)
        .await?;
    assert_eq!(active.len(), 2);

    let none = registry.list_for_supervisor("emails", &WorkerStatus::ACTIVE).await?;
    assert!(none.is_empty());

    assert_eq!(registry.list().await?.len(), 3);
    assert!(registry.list_by_status(&[]).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_update_status_missing_worker() -> Result<()> {
    let (_manager, registry) = setup().await?;
    let err = registry
        .update_status("ghost", WorkerStatus::Stopped)
        .await
        .unwrap_err();
    assert!(matches!(err, WatchtowerError::WorkerNotFound { .. }));
    Ok(())
}

#[tokio::test]
async fn test_list_stale() -> Result<()> {
    let (_manager, registry) = setup().await?;

    let mut silent = WorkerRecord::new("silent", "default", "q");
    silent.last_heartbeat = None;
    let mut old = WorkerRecord::new("old", "default", "q");
    old.last_heartbeat = Some(Utc::now() - Duration::seconds(300));
    let fresh = WorkerRecord::new("fresh", "default", "q");
    let mut stopped = WorkerRecord::new("stopped", "default", "q");
    stopped.status = WorkerStatus::Stopped;
    stopped.last_heartbeat = None;

    for record in [&silent, &old, &fresh, &stopped] {
        registry.upsert(record).await?;
    }

    let stale = registry.list_stale(60, &WorkerStatus::ACTIVE).await?;
    let mut ids: Vec<_> = stale.into_iter().map(|r| r.worker_id).collect();
    ids.sort();
    assert_eq!(ids, vec!["old".to_string(), "silent".to_string()]);

    registry.update_heartbeat("old", Utc::now()).await?;
    let stale = registry.list_stale(60, &WorkerStatus::ACTIVE).await?;
    assert_eq!(stale.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_prune_stopped() -> Result<()> {
    let (_manager, registry) = setup().await?;
    let mut old_stopped = WorkerRecord::new("old-stopped", "default", "q");
    old_stopped.status = WorkerStatus::Stopped;
    old_stopped.last_heartbeat = Some(Utc::now() - Duration::hours(72));
    let mut recent_stopped = WorkerRecord::new("recent-stopped", "default", "q");
    recent_stopped.status = WorkerStatus::Stopped;
    let mut old_running = WorkerRecord::new("old-running", "default", "q");
    old_running.last_heartbeat = Some(Utc::now() - Duration::hours(72));

    for record in [&old_stopped, &recent_stopped, &old_running] {
        registry.upsert(record).await?;
    }

    let removed = registry.prune_stopped(Utc::now() - Duration::hours(24)).await?;
    assert_eq!(removed, 1);
    assert!(registry.find_by_id("old-stopped").await?.is_none());
    assert!(registry.find_by_id("recent-stopped").await?.is_some());
    assert!(registry.find_by_id("old-running").await?.is_some());
    Ok(())
}
