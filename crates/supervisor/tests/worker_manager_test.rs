use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use watchtower_core::WatchtowerError;
use watchtower_domain::{
    CommandMailbox, ControlChannel, ControlCommand, ControlKeys, WorkerOptions, WorkerRegistry,
    WorkerStatus,
};
use watchtower_infrastructure::{InMemoryControlChannel, InMemoryWorkerRegistry};
use watchtower_supervisor::WorkerManager;
use watchtower_testing_utils::{FakeProcessLauncher, WorkerRecordBuilder};

struct Fixture {
    registry: Arc<InMemoryWorkerRegistry>,
    launcher: FakeProcessLauncher,
    mailbox: CommandMailbox,
    manager: WorkerManager,
}

fn fixture() -> Fixture {
    let registry = Arc::new(InMemoryWorkerRegistry::new());
    let launcher = FakeProcessLauncher::new();
    let channel: Arc<dyn ControlChannel> = Arc::new(InMemoryControlChannel::new());
    let mailbox = CommandMailbox::new(channel, ControlKeys::default(), Duration::from_secs(300));
    let manager = WorkerManager::new(
        registry.clone(),
        Arc::new(launcher.clone()),
        mailbox.clone(),
    );
    Fixture {
        registry,
        launcher,
        mailbox,
        manager,
    }
}

#[tokio::test]
async fn test_start_worker_registers_running_record() {
    let f = fixture();
    let options = WorkerOptions {
        supervisor: "emails".to_string(),
        ..WorkerOptions::default()
    };

    let worker_id = f.manager.start_worker("emails", &options).await.unwrap();

    let record = f.registry.find_by_id(&worker_id).await.unwrap().unwrap();
    assert_eq!(record.status, WorkerStatus::Running);
    assert_eq!(record.queue, "emails");
    assert_eq!(record.supervisor, "emails");
    assert!(record.pid.is_some());
    assert!(record.last_heartbeat.is_some());

    let spawned = f.launcher.spawned();
    assert_eq!(spawned.len(), 1);
    assert_eq!(spawned[0].worker_id, worker_id);
    assert_eq!(spawned[0].options, options);
}

#[tokio::test]
async fn test_start_worker_survives_spawn_failure() {
    let f = fixture();
    f.launcher.fail_next_spawns(1);

    let worker_id = f
        .manager
        .start_worker("default", &WorkerOptions::default())
        .await
        .unwrap();

    let record = f.registry.find_by_id(&worker_id).await.unwrap().unwrap();
    assert_eq!(record.pid, None);
    assert_eq!(record.status, WorkerStatus::Running);
    assert!(!f.manager.is_worker_running(&worker_id).await.unwrap());
}

#[tokio::test]
async fn test_commands_update_status_optimistically() {
    let f = fixture();
    let id = f
        .manager
        .start_worker("default", &WorkerOptions::default())
        .await
        .unwrap();

    f.manager.pause_worker(&id).await.unwrap();
    assert_eq!(f.mailbox.peek(&id).await.unwrap(), Some(ControlCommand::Pause));
    assert_eq!(
        f.registry.find_by_id(&id).await.unwrap().unwrap().status,
        WorkerStatus::Paused
    );

    f.manager.resume_worker(&id).await.unwrap();
    assert_eq!(f.mailbox.peek(&id).await.unwrap(), Some(ControlCommand::Resume));
    assert_eq!(
        f.registry.find_by_id(&id).await.unwrap().unwrap().status,
        WorkerStatus::Running
    );

    f.manager.stop_worker(&id).await.unwrap();
    assert_eq!(f.mailbox.peek(&id).await.unwrap(), Some(ControlCommand::Stop));
    assert_eq!(
        f.registry.find_by_id(&id).await.unwrap().unwrap().status,
        WorkerStatus::Stopped
    );
}

#[tokio::test]
async fn test_stop_twice_is_idempotent() {
    let f = fixture();
    let id = f
        .manager
        .start_worker("default", &WorkerOptions::default())
        .await
        .unwrap();

    f.manager.stop_worker(&id).await.unwrap();
    let after_once = f.registry.find_by_id(&id).await.unwrap().unwrap();
    f.manager.stop_worker(&id).await.unwrap();
    let after_twice = f.registry.find_by_id(&id).await.unwrap().unwrap();

    assert_eq!(after_once.status, after_twice.status);
    assert_eq!(f.mailbox.peek(&id).await.unwrap(), Some(ControlCommand::Stop));
}

#[tokio::test]
async fn test_stopped_worker_cannot_be_resumed_or_paused() {
    let f = fixture();
    let id = f
        .manager
        .start_worker("default", &WorkerOptions::default())
        .await
        .unwrap();
    f.manager.stop_worker(&id).await.unwrap();

    let err = f.manager.resume_worker(&id).await.unwrap_err();
    assert!(matches!(err, WatchtowerError::InvalidWorkerState { .. }));
    let err = f.manager.pause_worker(&id).await.unwrap_err();
    assert!(matches!(err, WatchtowerError::InvalidWorkerState { .. }));

    assert_eq!(
        f.registry.find_by_id(&id).await.unwrap().unwrap().status,
        WorkerStatus::Stopped
    );
    assert_eq!(f.mailbox.peek(&id).await.unwrap(), Some(ControlCommand::Stop));
    assert!(f.manager.active_workers("default").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_restarting_worker_keeps_its_status() {
    let f = fixture();
    let record = WorkerRecordBuilder::new("w-restarting")
        .with_status(WorkerStatus::Restarting)
        .build();
    f.registry.upsert(&record).await.unwrap();

    assert!(f.manager.resume_worker("w-restarting").await.is_err());
    f.manager.stop_worker("w-restarting").await.unwrap();

    assert_eq!(
        f.registry.find_by_id("w-restarting").await.unwrap().unwrap().status,
        WorkerStatus::Restarting
    );
    assert!(f.mailbox.peek("w-restarting").await.unwrap().is_none());
}

#[tokio::test]
async fn test_command_for_unknown_worker() {
    let f = fixture();
    let err = f.manager.stop_worker("ghost").await.unwrap_err();
    assert!(matches!(err, WatchtowerError::WorkerNotFound { .. }));
    assert!(f.mailbox.peek("ghost").await.unwrap().is_none());
}

#[tokio::test]
async fn test_cleanup_only_touches_dead_stale_workers() {
    let f = fixture();
    f.launcher.set_alive(501);

    let records = [
        // stale heartbeat but the process is alive
        WorkerRecordBuilder::new("alive-stale")
            .with_pid(501)
            .heartbeat_seconds_ago(600)
            .build(),
        WorkerRecordBuilder::new("dead-stale")
            .with_pid(502)
            .heartbeat_seconds_ago(600)
            .build(),
        WorkerRecordBuilder::new("no-pid")
            .without_pid()
            .without_heartbeat()
            .build(),
        WorkerRecordBuilder::new("dead-fresh").with_pid(503).build(),
        WorkerRecordBuilder::new("dead-paused")
            .with_pid(504)
            .paused()
            .heartbeat_seconds_ago(600)
            .build(),
        WorkerRecordBuilder::new("already-stopped")
            .with_pid(505)
            .stopped()
            .heartbeat_seconds_ago(600)
            .build(),
    ];
    for record in &records {
        f.registry.upsert(record).await.unwrap();
    }

    let repaired = f.manager.cleanup_stale_workers(60).await.unwrap();
    assert_eq!(repaired, 3);

    let status = |id: &'static str| {
        let registry = f.registry.clone();
        async move { registry.find_by_id(id).await.unwrap().unwrap().status }
    };
    assert_eq!(status("alive-stale").await, WorkerStatus::Running);
    assert_eq!(status("dead-stale").await, WorkerStatus::Stopped);
    assert_eq!(status("no-pid").await, WorkerStatus::Stopped);
    assert_eq!(status("dead-fresh").await, WorkerStatus::Running);
    assert_eq!(status("dead-paused").await, WorkerStatus::Stopped);
    assert_eq!(status("already-stopped").await, WorkerStatus::Stopped);
}

#[tokio::test]
async fn test_restart_workers_targets_running_only() {
    let f = fixture();
    for record in [
        WorkerRecordBuilder::new("r-emails").with_queue("emails").build(),
        WorkerRecordBuilder::new("r-default").with_queue("default").build(),
        WorkerRecordBuilder::new("p-emails").with_queue("emails").paused().build(),
    ] {
        f.registry.upsert(&record).await.unwrap();
    }

    let count = f.manager.restart_workers(Some("emails"), false).await.unwrap();
    assert_eq!(count, 1);
    assert_eq!(
        f.mailbox.peek("r-emails").await.unwrap(),
        Some(ControlCommand::Restart)
    );
    assert!(f.mailbox.peek("r-default").await.unwrap().is_none());
    assert!(f.mailbox.peek("p-emails").await.unwrap().is_none());

    let restart_at = f.mailbox.restart_at().await.unwrap().unwrap();
    assert!((Utc::now() - restart_at).num_seconds() < 5);
}

#[tokio::test]
async fn test_forced_restart_sends_terminate_to_all_running() {
    let f = fixture();
    for record in [
        WorkerRecordBuilder::new("a").build(),
        WorkerRecordBuilder::new("b").with_queue("emails").build(),
    ] {
        f.registry.upsert(&record).await.unwrap();
    }

    assert_eq!(f.manager.restart_workers(None, true).await.unwrap(), 2);
    assert_eq!(f.mailbox.peek("a").await.unwrap(), Some(ControlCommand::Terminate));
    assert_eq!(f.mailbox.peek("b").await.unwrap(), Some(ControlCommand::Terminate));
}

#[tokio::test]
async fn test_restart_without_matches_writes_nothing() {
    let f = fixture();
    f.registry
        .upsert(&WorkerRecordBuilder::new("a").with_queue("default").build())
        .await
        .unwrap();

    assert_eq!(f.manager.restart_workers(Some("emails"), false).await.unwrap(), 0);
    assert!(f.mailbox.restart_at().await.unwrap().is_none());
    assert!(f.mailbox.peek("a").await.unwrap().is_none());
}

#[tokio::test]
async fn test_terminate_all_stops_running_and_paused() {
    let f = fixture();
    for record in [
        WorkerRecordBuilder::new("running").build(),
        WorkerRecordBuilder::new("paused").paused().build(),
        WorkerRecordBuilder::new("stopped").stopped().build(),
    ] {
        f.registry.upsert(&record).await.unwrap();
    }

    assert_eq!(f.manager.terminate_all_workers().await.unwrap(), 2);
    assert_eq!(f.mailbox.peek("running").await.unwrap(), Some(ControlCommand::Stop));
    assert_eq!(f.mailbox.peek("paused").await.unwrap(), Some(ControlCommand::Stop));
    assert!(f.mailbox.peek("stopped").await.unwrap().is_none());
    assert!(f
        .manager
        .list_workers()
        .await
        .unwrap()
        .iter()
        .all(|w| w.status == WorkerStatus::Stopped));
}

#[tokio::test]
async fn test_listing_helpers() {
    let f = fixture();
    let now = Utc::now();
    for record in [
        WorkerRecordBuilder::new("old")
            .started_at(now - chrono::Duration::minutes(10))
            .build(),
        WorkerRecordBuilder::new("new").started_at(now).build(),
        WorkerRecordBuilder::new("paused").paused().build(),
    ] {
        f.registry.upsert(&record).await.unwrap();
    }

    let all = f.manager.list_workers().await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all.last().unwrap().worker_id, "old");

    let running = f.manager.running_workers().await.unwrap();
    assert_eq!(running.len(), 2);
    assert!(running.iter().all(|w| w.status == WorkerStatus::Running));
}

#[tokio::test]
async fn test_terminate_request_is_consumed_once() {
    let f = fixture();
    f.manager.request_terminate().await.unwrap();
    assert!(f.manager.take_terminate_request().await.unwrap());
    assert!(!f.manager.take_terminate_request().await.unwrap());
}
