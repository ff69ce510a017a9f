//! Integration tests for the configuration system

use reactive_actions::config::{ConfigLoader, StoreBackend};
use reactive_actions::ActionExecutor;
use std::sync::Mutex;
use tempfile::TempDir;

/// Serializes tests that read or write `REACTIVE_ACTIONS__*` variables
static ENV_MUTEX: Mutex<()> = Mutex::new(());

#[test]
fn test_config_file_in_directory_is_picked_up() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(
        temp_dir.path().join("reactive-actions.toml"),
        r#"
[store]
backend = "redis"

[store.redis]
prefix = "from-file"

[executor]
verify_tracked_results = false
"#,
    )
    .unwrap();

    let config = ConfigLoader::load(temp_dir.path()).unwrap();
    assert_eq!(config.store.backend, StoreBackend::Redis);
    assert_eq!(config.store.redis.prefix, "from-file");
    assert_eq!(config.store.redis.url, "redis://127.0.0.1:6379");
    assert!(!config.executor.verify_tracked_results);
    assert!(config.validate().is_ok());

    let mut builder = ActionExecutor::builder();
    builder.apply_config(&config.executor);
    assert!(!builder.build().verifies_tracked_results());
}

#[test]
fn test_environment_overrides_file() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(
        temp_dir.path().join("reactive-actions.toml"),
        r#"
[store.redis]
command_timeout_ms = 500
"#,
    )
    .unwrap();

    std::env::set_var("REACTIVE_ACTIONS__STORE__REDIS__COMMAND_TIMEOUT_MS", "750");
    std::env::set_var("REACTIVE_ACTIONS__STORE__BACKEND", "redis");
    let config = ConfigLoader::load(temp_dir.path());
    std::env::remove_var("REACTIVE_ACTIONS__STORE__REDIS__COMMAND_TIMEOUT_MS");
    std::env::remove_var("REACTIVE_ACTIONS__STORE__BACKEND");

    let config = config.unwrap();
    assert_eq!(config.store.redis.command_timeout_ms, 750);
    assert_eq!(config.store.backend, StoreBackend::Redis);
}

#[test]
fn test_invalid_values_are_reported() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("bad.toml");
    std::fs::write(
        &path,
        r#"
[store]
backend = "redis"

[store.redis]
url = "http://not-redis"
command_timeout_ms = 0

[logging]
level = "loud"
"#,
    )
    .unwrap();

    let errors = ConfigLoader::load_from_file(&path)
        .unwrap()
        .validate()
        .unwrap_err();
    assert_eq!(errors.len(), 2);

    std::fs::write(&path, "[store]\nbackend = \"sqlite\"\n").unwrap();
    assert!(ConfigLoader::load_from_file(&path).is_err());
}

#[tokio::test]
async fn test_memory_backend_opens() {
    let config = ConfigLoader::defaults();
    let store = config.store.open().await.unwrap();
    store.unregister_session("S1").await.unwrap();
}
