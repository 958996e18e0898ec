use std::io::Write;

use tempfile::NamedTempFile;
use watchtower::app::Application;
use watchtower_core::{AppConfig, BalanceMode, QueueSelector};

const CONFIG: &str = r#"
[redis]
host = "127.0.0.1"
port = 6379
database = 0
key_prefix = "wt-test"

[supervisors.mailers]
queue = "emails,notifications"
balance = "auto"
min_processes = 2
max_processes = 4
tries = 5
timeout = 120
memory = 256
sleep = 1
"#;

#[test]
fn test_application_uses_supervisor_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(CONFIG.as_bytes()).unwrap();
    let path = file.path().to_str().unwrap().to_string();

    let config = AppConfig::load(Some(&path)).unwrap();
    assert_eq!(config.redis.key_prefix, "wt-test");

    let mailers = config.supervisor("mailers").unwrap();
    assert_eq!(mailers.balance, BalanceMode::Auto);
    assert_eq!(
        mailers.queue,
        QueueSelector::List(vec!["emails".to_string(), "notifications".to_string()])
    );

    let app = Application::new(config, Some(path));
    let options = app.worker_options("mailers");
    assert_eq!(options.supervisor, "mailers");
    assert_eq!(options.tries, 5);
    assert_eq!(options.timeout, 120);
    assert_eq!(options.memory, 256);
    assert_eq!(options.connection, "redis");
}

#[test]
fn test_missing_config_file_is_an_error() {
    assert!(AppConfig::load(Some("/nonexistent/watchtower.toml")).is_err());
}

#[test]
fn test_example_config_is_valid() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/watchtower.example.toml");
    let config = AppConfig::load(Some(path)).unwrap();

    assert_eq!(config.supervisor("default").unwrap().queue, QueueSelector::Wildcard);
    assert_eq!(config.supervisor("mailers").unwrap().min_processes, 2);
    assert_eq!(config.worker.job_command[0], "php");
}
