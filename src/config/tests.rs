use std::env;
use std::fs;
use std::time::Duration;

use serial_test::serial;
use tempfile::TempDir;

use super::{ENV_SELECTOR, Settings, load_config_from, load_env_file};
use crate::upstream::RetryPolicy;

const UNSET: [(&str, Option<&str>); 4] = [
    ("WSRELAY__SERVER__PORT", None),
    ("WSRELAY__UPSTREAM__DEFAULT_TOPIC", None),
    ("REDIS_HOST", None),
    ("REDIS_PORT", None),
];

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.server.host, "127.0.0.1");
    assert_eq!(settings.server.port, 8080);
    assert_eq!(settings.broker.max_connections, 1000);
    assert_eq!(settings.upstream.backend, "redis");
    assert_eq!(settings.upstream.default_topic, "test-channel");
    assert_eq!(settings.upstream.redis_url(), "redis://localhost:6379/");
    assert_eq!(settings.log.level, "info");
    assert_eq!(settings.upstream.call_timeout(), Duration::from_secs(5));
    assert_eq!(settings.upstream.reconnect_backoff(), Duration::from_millis(500));
}

#[test]
fn test_default_retry_policy_is_single_attempt() {
    let policy = Settings::default().upstream.retry_policy();
    assert_eq!(policy.next_delay(1), None);
}

#[test]
#[serial]
fn test_missing_file_yields_defaults() {
    temp_env::with_vars(UNSET, || {
        let tmp = TempDir::new().expect("create tempdir");
        let path = tmp.path().join("absent");
        let cfg = load_config_from(path.to_str().unwrap()).expect("load_config failed");
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.upstream.host, "localhost");
    });
}

#[test]
#[serial]
fn test_file_overrides_defaults() {
    temp_env::with_vars(UNSET, || {
        let tmp = TempDir::new().expect("create tempdir");
        let path = tmp.path().join("relay.toml");
        let toml = r#"
            [server]
            host = "0.0.0.0"
            port = 9000

            [upstream]
            backend = "memory"
            default_topic = ""
            retry_attempts = 3
            retry_backoff_ms = 50
            call_timeout_ms = 250
        "#;
        fs::write(&path, toml).expect("write config file");

        let cfg = load_config_from(path.to_str().unwrap()).expect("load_config failed");
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.broker.max_connections, 1000);
        assert_eq!(cfg.upstream.backend, "memory");
        assert_eq!(cfg.upstream.default_topic, "");
        assert_eq!(
            cfg.upstream.retry_policy().next_delay(1),
            Some(Duration::from_millis(50))
        );
        assert_eq!(cfg.upstream.call_timeout(), Duration::from_millis(250));
        assert_eq!(cfg.upstream.reconnect_backoff(), Duration::from_millis(500));
    });
}

#[test]
#[serial]
fn test_environment_overrides_defaults() {
    temp_env::with_vars(
        [
            ("WSRELAY__SERVER__PORT", Some("9100")),
            ("WSRELAY__UPSTREAM__DEFAULT_TOPIC", Some("broadcast")),
            ("REDIS_HOST", Some("redis.internal")),
            ("REDIS_PORT", Some("6380")),
        ],
        || {
            let cfg = load_config_from("does/not/exist").expect("load_config failed");
            assert_eq!(cfg.server.port, 9100);
            assert_eq!(cfg.upstream.default_topic, "broadcast");
            assert_eq!(cfg.upstream.redis_url(), "redis://redis.internal:6380/");
        },
    );
}

#[test]
#[serial]
fn test_env_file_is_selected_and_reported() {
    let tmp = TempDir::new().expect("create tempdir");
    fs::write(tmp.path().join(".env.staging"), "WSRELAY_TEST_MARKER=from-staging\n")
        .expect("write env file");
    let cwd = env::current_dir().expect("current dir");

    temp_env::with_vars(
        [(ENV_SELECTOR, Some("staging")), ("WSRELAY_TEST_MARKER", None)],
        || {
            env::set_current_dir(tmp.path()).expect("enter tempdir");
            let loaded = load_env_file();
            let marker = env::var("WSRELAY_TEST_MARKER");
            env::set_current_dir(&cwd).expect("restore cwd");

            let loaded = loaded.expect("env file should be loaded");
            assert!(loaded.ends_with(".env.staging"));
            assert_eq!(marker.as_deref(), Ok("from-staging"));
        },
    );
}

#[test]
#[serial]
fn test_missing_env_file_is_not_an_error() {
    let tmp = TempDir::new().expect("create tempdir");
    let cwd = env::current_dir().expect("current dir");

    temp_env::with_vars([(ENV_SELECTOR, Some("nowhere"))], || {
        env::set_current_dir(tmp.path()).expect("enter tempdir");
        let loaded = load_env_file();
        env::set_current_dir(&cwd).expect("restore cwd");

        assert!(loaded.is_none());
    });
}
