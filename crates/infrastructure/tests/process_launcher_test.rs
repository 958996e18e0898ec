use std::sync::Arc;
use std::time::Duration;

use mockall::predicate::eq;
use watchtower_core::WatchtowerError;
use watchtower_domain::{ProcessLauncher, WorkerLaunchSpec, WorkerOptions};
use watchtower_infrastructure::CommandProcessLauncher;
use watchtower_testing_utils::MockProcessProbe;

fn spec() -> WorkerLaunchSpec {
    WorkerLaunchSpec {
        worker_id: "w-probe".to_string(),
        queue: "emails".to_string(),
        options: WorkerOptions::default(),
    }
}

#[tokio::test]
async fn test_unknown_pid_falls_back_to_probe() {
    let mut probe = MockProcessProbe::new();
    probe
        .expect_is_alive()
        .with(eq(Some(4242)))
        .times(1)
        .returning(|_| true);

    let launcher = CommandProcessLauncher::new("true", Vec::new(), Arc::new(probe), Duration::ZERO);
    assert!(launcher.is_running(Some(4242)).await);
}

#[tokio::test]
async fn test_missing_pid_is_never_running() {
    let mut probe = MockProcessProbe::new();
    probe.expect_is_alive().times(0);

    let launcher = CommandProcessLauncher::new("true", Vec::new(), Arc::new(probe), Duration::ZERO);
    assert!(!launcher.is_running(None).await);
}

#[tokio::test]
async fn test_spawn_failure_is_reported() {
    let mut probe = MockProcessProbe::new();
    probe.expect_is_alive().times(0);

    let launcher = CommandProcessLauncher::new(
        "/nonexistent/watchtower-binary",
        Vec::new(),
        Arc::new(probe),
        Duration::ZERO,
    );
    let result = launcher.spawn(&spec()).await;
    assert!(matches!(result, Err(WatchtowerError::ProcessSpawn(_))));
}

#[cfg(unix)]
#[tokio::test]
async fn test_own_children_do_not_consult_probe() {
    let mut probe = MockProcessProbe::new();
    probe.expect_is_alive().times(0);

    let launcher = CommandProcessLauncher::new(
        "sh",
        vec!["-c".to_string(), "exec sleep 5".to_string(), "sh".to_string()],
        Arc::new(probe),
        Duration::from_millis(50),
    );

    let pid = launcher.spawn(&spec()).await.unwrap();
    assert!(pid.is_some());
    assert!(launcher.is_running(pid).await);
}
