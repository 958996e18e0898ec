use std::sync::Arc;
use std::time::Duration;

use watchtower_core::{BalanceMode, QueueSelector, SupervisorConfig, WatchtowerError};
use watchtower_domain::{
    CommandMailbox, ControlChannel, ControlCommand, ControlKeys, WorkerRegistry, WorkerStatus,
};
use watchtower_infrastructure::{InMemoryControlChannel, InMemoryWorkerRegistry};
use watchtower_supervisor::{Supervisor, SupervisorSettings, WorkerManager};
use watchtower_testing_utils::{
    FailingControlChannel, FailingWorkerRegistry, FakeProcessLauncher, MockQueueInspector,
    WorkerRecordBuilder,
};

struct Fixture {
    registry: Arc<InMemoryWorkerRegistry>,
    launcher: FakeProcessLauncher,
    mailbox: CommandMailbox,
    manager: Arc<WorkerManager>,
}

fn fixture() -> Fixture {
    let registry = Arc::new(InMemoryWorkerRegistry::new());
    let launcher = FakeProcessLauncher::new();
    let channel: Arc<dyn ControlChannel> = Arc::new(InMemoryControlChannel::new());
    let mailbox = CommandMailbox::new(channel, ControlKeys::default(), Duration::from_secs(300));
    let manager = Arc::new(WorkerManager::new(
        registry.clone(),
        Arc::new(launcher.clone()),
        mailbox.clone(),
    ));
    Fixture {
        registry,
        launcher,
        mailbox,
        manager,
    }
}

fn config(queues: &[&str], balance: BalanceMode, min: usize, max: usize) -> SupervisorConfig {
    SupervisorConfig {
        queue: QueueSelector::List(queues.iter().map(|q| q.to_string()).collect()),
        balance,
        min_processes: min,
        max_processes: max,
        ..SupervisorConfig::default()
    }
}

fn supervisor(f: &Fixture, config: SupervisorConfig) -> Supervisor {
    Supervisor::new("default", config, f.manager.clone(), SupervisorSettings::default())
}

async fn running_count(f: &Fixture) -> usize {
    f.registry
        .list_by_status(&[WorkerStatus::Running])
        .await
        .unwrap()
        .len()
}

#[tokio::test]
async fn test_scales_up_to_minimum() {
    let f = fixture();
    let sup = supervisor(&f, config(&["default"], BalanceMode::Simple, 3, 10));

    let report = sup.supervise().await.unwrap();

    assert_eq!(report.started.len(), 3);
    assert_eq!(f.launcher.spawn_count(), 3);
    assert_eq!(running_count(&f).await, 3);
    assert_eq!(report.active_after(), 3);

    // a second pass with every worker alive changes nothing
    let report = sup.supervise().await.unwrap();
    assert!(report.started.is_empty());
    assert!(report.dead.is_empty());
    assert_eq!(f.launcher.spawn_count(), 3);
}

#[tokio::test]
async fn test_simple_mode_gives_every_worker_all_queues() {
    let f = fixture();
    let sup = supervisor(&f, config(&["high", "default"], BalanceMode::Simple, 2, 10));
    sup.supervise().await.unwrap();
    assert_eq!(f.launcher.spawned_queues(), vec!["high,default", "high,default"]);
}

#[tokio::test]
async fn test_auto_mode_round_robins_queues() {
    let f = fixture();
    let sup = supervisor(&f, config(&["a", "b", "c"], BalanceMode::Auto, 4, 10));
    sup.supervise().await.unwrap();
    assert_eq!(f.launcher.spawned_queues(), vec!["a", "b", "c", "a"]);
}

#[tokio::test]
async fn test_dead_worker_replaced_on_same_queue_auto_mode() {
    let f = fixture();
    let sup = supervisor(&f, config(&["a", "b", "c"], BalanceMode::Auto, 3, 10));
    sup.supervise().await.unwrap();

    let victim = f
        .registry
        .list()
        .await
        .unwrap()
        .into_iter()
        .find(|w| w.queue == "b")
        .unwrap();
    f.launcher.kill(victim.pid.unwrap());

    let report = sup.supervise().await.unwrap();

    assert_eq!(report.dead, vec![victim.worker_id.clone()]);
    assert_eq!(report.replaced.len(), 1);
    assert_eq!(f.launcher.spawn_count(), 4);
    assert_eq!(f.launcher.spawned_queues().last().unwrap(), "b");
    assert_eq!(
        f.registry
            .find_by_id(&victim.worker_id)
            .await
            .unwrap()
            .unwrap()
            .status,
        WorkerStatus::Stopped
    );
    assert_eq!(running_count(&f).await, 3);
}

#[tokio::test]
async fn test_dead_worker_replaced_on_same_queue_simple_mode() {
    let f = fixture();
    // assigned before the config changed to a composite set
    f.launcher.set_alive(700);
    f.launcher.set_alive(701);
    for record in [
        WorkerRecordBuilder::new("legacy").with_queue("legacy").with_pid(700).build(),
        WorkerRecordBuilder::new("other").with_queue("high,default").with_pid(701).build(),
    ] {
        f.registry.upsert(&record).await.unwrap();
    }
    let sup = supervisor(&f, config(&["high", "default"], BalanceMode::Simple, 2, 10));

    f.launcher.kill(700);
    let report = sup.supervise().await.unwrap();

    assert!(report.started.is_empty());
    assert_eq!(report.replaced.len(), 1);
    assert_eq!(f.launcher.spawned_queues(), vec!["legacy"]);
}

#[tokio::test]
async fn test_no_replacement_above_minimum() {
    let f = fixture();
    for pid in 800..805 {
        f.launcher.set_alive(pid);
        f.registry
            .upsert(&WorkerRecordBuilder::new(&format!("w-{pid}")).with_pid(pid).build())
            .await
            .unwrap();
    }
    let sup = supervisor(&f, config(&["default"], BalanceMode::Simple, 2, 10));

    f.launcher.kill(800);
    let report = sup.supervise().await.unwrap();

    assert_eq!(report.dead.len(), 1);
    assert!(report.replaced.is_empty());
    assert_eq!(f.launcher.spawn_count(), 0);
}

#[tokio::test]
async fn test_replaces_until_back_at_minimum() {
    let f = fixture();
    for pid in 700..704 {
        f.launcher.set_alive(pid);
        f.registry
            .upsert(&WorkerRecordBuilder::new(&format!("w-{pid}")).with_pid(pid).build())
            .await
            .unwrap();
    }
    let sup = supervisor(&f, config(&["default"], BalanceMode::Simple, 2, 10));

    for pid in 700..703 {
        f.launcher.kill(pid);
    }
    let report = sup.supervise().await.unwrap();

    // 第一个死亡后仍剩3个，无需替补；之后每次降到2都补回3
    assert_eq!(report.dead.len(), 3);
    assert_eq!(report.replaced.len(), 2);
    assert_eq!(report.active_after(), 3);
    assert_eq!(running_count(&f).await, 3);
}

#[tokio::test]
async fn test_max_processes_not_enforced() {
    let f = fixture();
    for pid in 900..905 {
        f.launcher.set_alive(pid);
        f.registry
            .upsert(&WorkerRecordBuilder::new(&format!("w-{pid}")).with_pid(pid).build())
            .await
            .unwrap();
    }
    let sup = supervisor(&f, config(&["default"], BalanceMode::Simple, 1, 2));

    let report = sup.supervise().await.unwrap();

    assert_eq!(report.active_after(), 5);
    assert!(report.dead.is_empty());
    assert_eq!(running_count(&f).await, 5);
}

#[tokio::test]
async fn test_only_counts_own_supervisor() {
    let f = fixture();
    f.launcher.set_alive(950);
    f.registry
        .upsert(
            &WorkerRecordBuilder::new("foreign")
                .with_supervisor("emails")
                .with_pid(950)
                .build(),
        )
        .await
        .unwrap();

    let sup = supervisor(&f, config(&["default"], BalanceMode::Simple, 1, 10));
    let report = sup.supervise().await.unwrap();
    assert_eq!(report.started.len(), 1);
}

#[tokio::test]
async fn test_spawn_failure_repaired_next_pass() {
    let f = fixture();
    f.launcher.fail_next_spawns(1);
    let sup = supervisor(&f, config(&["default"], BalanceMode::Simple, 1, 10));

    let first = sup.supervise().await.unwrap();
    assert_eq!(first.started.len(), 1);
    assert_eq!(f.launcher.spawn_count(), 0);

    let second = sup.supervise().await.unwrap();
    assert_eq!(second.dead, first.started);
    assert_eq!(second.replaced.len(), 1);
    assert_eq!(f.launcher.spawn_count(), 1);
}

#[tokio::test]
async fn test_wildcard_uses_discovered_queues() {
    let f = fixture();
    let mut inspector = MockQueueInspector::new();
    inspector
        .expect_pending_queues()
        .returning(|| Ok(vec!["emails".to_string(), "reports".to_string()]));

    let mut cfg = config(&[], BalanceMode::Auto, 2, 10);
    cfg.queue = QueueSelector::Wildcard;
    let sup = supervisor(&f, cfg).with_inspector(Arc::new(inspector));

    let report = sup.supervise().await.unwrap();
    assert_eq!(report.queues, vec!["emails", "reports"]);
    assert_eq!(f.launcher.spawned_queues(), vec!["emails", "reports"]);
}

#[tokio::test]
async fn test_wildcard_falls_back_to_default_queue() {
    let f = fixture();
    let mut inspector = MockQueueInspector::new();
    inspector
        .expect_pending_queues()
        .times(1)
        .returning(|| Err(WatchtowerError::control_channel("redis down")));

    let mut cfg = config(&[], BalanceMode::Simple, 1, 10);
    cfg.queue = QueueSelector::Wildcard;
    let sup = supervisor(&f, cfg).with_inspector(Arc::new(inspector));

    let report = sup.supervise().await.unwrap();
    assert_eq!(report.queues, vec!["default"]);
    assert_eq!(f.launcher.spawned_queues(), vec!["default"]);
}

#[tokio::test(start_paused = true)]
async fn test_terminate_flag_stops_loop_and_workers() {
    let f = fixture();
    let mut sup = supervisor(&f, config(&["default"], BalanceMode::Simple, 2, 10));
    let (_tx, rx) = tokio::sync::broadcast::channel(1);

    let manager = f.manager.clone();
    let handle = tokio::spawn(async move {
        let stopped = sup.run(rx).await.unwrap();
        (stopped, sup)
    });

    while f.launcher.spawn_count() < 2 {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    manager.request_terminate().await.unwrap();

    let (stopped, sup) = handle.await.unwrap();
    assert_eq!(stopped, 2);
    assert!(sup.state().passes >= 1);
    assert!(sup.state().last_status_at.is_some());
    assert_eq!(running_count(&f).await, 0);
    for worker in f.registry.list().await.unwrap() {
        assert_eq!(worker.status, WorkerStatus::Stopped);
        assert_eq!(
            f.mailbox.peek(&worker.worker_id).await.unwrap(),
            Some(ControlCommand::Stop)
        );
    }
    // the flag is consumed by the loop
    assert!(!f.manager.take_terminate_request().await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_signal_stops_loop() {
    let f = fixture();
    let mut sup = supervisor(&f, config(&["default"], BalanceMode::Simple, 1, 10));
    let (tx, rx) = tokio::sync::broadcast::channel(1);

    let handle = tokio::spawn(async move { sup.run(rx).await.unwrap() });

    while f.launcher.spawn_count() < 1 {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    tx.send(()).unwrap();

    assert_eq!(handle.await.unwrap(), 1);
    assert_eq!(running_count(&f).await, 0);
}

#[tokio::test]
async fn test_failed_pass_is_retried_next_time() {
    let f = fixture();
    let registry = FailingWorkerRegistry::new(f.registry.clone());
    let manager = Arc::new(WorkerManager::new(
        Arc::new(registry.clone()),
        Arc::new(f.launcher.clone()),
        f.mailbox.clone(),
    ));
    let sup = Supervisor::new(
        "default",
        config(&["default"], BalanceMode::Simple, 1, 10),
        manager,
        SupervisorSettings::default(),
    );

    registry.fail_next_reads(1);
    let err = sup.supervise().await.unwrap_err();
    assert!(err.is_transient());
    assert_eq!(f.launcher.spawn_count(), 0);

    let report = sup.supervise().await.unwrap();
    assert_eq!(report.started.len(), 1);
    assert_eq!(running_count(&f).await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_run_survives_registry_and_channel_outage() {
    let f = fixture();
    let registry = FailingWorkerRegistry::new(f.registry.clone());
    let channel = FailingControlChannel::new(Arc::new(InMemoryControlChannel::new()));
    let mailbox = CommandMailbox::new(
        Arc::new(channel.clone()),
        ControlKeys::default(),
        Duration::from_secs(300),
    );
    let manager = Arc::new(WorkerManager::new(
        Arc::new(registry.clone()),
        Arc::new(f.launcher.clone()),
        mailbox,
    ));
    let mut sup = Supervisor::new(
        "default",
        config(&["default"], BalanceMode::Simple, 2, 10),
        manager,
        SupervisorSettings::default(),
    );

    registry.fail_next_reads(2);
    channel.fail_next_reads(2);
    let (tx, rx) = tokio::sync::broadcast::channel(1);
    let handle = tokio::spawn(async move { sup.run(rx).await.unwrap() });

    while f.launcher.spawn_count() < 2 {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(registry.remaining_failures(), 0);
    assert_eq!(channel.remaining_failures(), 0);

    tx.send(()).unwrap();
    assert_eq!(handle.await.unwrap(), 2);
    assert_eq!(running_count(&f).await, 0);
}
