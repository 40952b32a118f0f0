//! Configuration loading from files and the environment

use std::io::Write;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use serial_test::serial;

use inventory_sync::{ConfigError, ReconnectPolicy, SyncConfig};

const ENV_KEYS: [&str; 4] = [
    "INVENTORY_STORE_URL",
    "INVENTORY_AUTH_TOKEN",
    "INVENTORY_NOTIFICATION_WINDOW",
    "INVENTORY_LOW_STOCK_THRESHOLD",
];

fn clear_env() {
    for key in ENV_KEYS {
        std::env::remove_var(key);
    }
}

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
#[serial]
fn test_load_file_with_reconnect_policy() {
    clear_env();
    let file = write_config(
        r#"
store_url = "https://inventory.example.com"
notification_window = 20

[reconnect]
mode = "backoff"
initial_delay_ms = 500
max_delay_ms = 30000
max_attempts = 8
"#,
    );

    let config = SyncConfig::load(file.path()).unwrap();
    assert_eq!(config.store_url.as_deref(), Some("https://inventory.example.com"));
    assert_eq!(config.notification_window, 20);
    assert_eq!(config.low_stock_threshold, 10);
    assert_eq!(
        config.reconnect,
        ReconnectPolicy::Backoff {
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
            max_attempts: 8,
        }
    );
}

#[test]
#[serial]
fn test_environment_overrides_file() {
    clear_env();
    let file = write_config("low_stock_threshold = 5\n");
    std::env::set_var("INVENTORY_LOW_STOCK_THRESHOLD", "3");
    std::env::set_var("INVENTORY_AUTH_TOKEN", "token-123");

    let config = SyncConfig::load(file.path());
    clear_env();

    let config = config.unwrap();
    assert_eq!(config.low_stock_threshold, 3);
    assert_eq!(config.auth_token.as_deref(), Some("token-123"));
}

#[test]
#[serial]
fn test_invalid_environment_value() {
    clear_env();
    let file = write_config("");
    std::env::set_var("INVENTORY_NOTIFICATION_WINDOW", "lots");

    let result = SyncConfig::load(file.path());
    clear_env();

    assert_matches!(
        result,
        Err(ConfigError::OutOfRange { field: "notification_window", .. })
    );
}

#[test]
#[serial]
fn test_missing_file_and_bad_values() {
    clear_env();
    assert_matches!(
        SyncConfig::load("/definitely/not/here/config.toml"),
        Err(ConfigError::Io(_))
    );

    let file = write_config("store_url = \"ftp://inventory\"\n");
    assert_matches!(SyncConfig::load(file.path()), Err(ConfigError::InvalidUrl(_)));

    let file = write_config("notification_window = [1, 2]\n");
    assert_matches!(SyncConfig::load(file.path()), Err(ConfigError::Parse(_)));
}
