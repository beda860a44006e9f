use std::env;
use std::fs;
use std::sync::{Mutex, OnceLock};

use expensey_cli::commands::{config, links, migrate};
use expensey_core::config::LoadOptions;
use serde_json::Value;

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("EXPENSEY_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_for_invalid_links() {
    with_env(
        &[("EXPENSEY_DATABASE_URL", "sqlite::memory:"), ("EXPENSEY_LINKS_SCHEME", "ftp")],
        || {
            let result = migrate::run();
            assert_eq!(result.exit_code, 2, "expected config validation failure code");

            let payload = parse_payload(&result.output);
            assert_eq!(payload["status"], "error");
            assert_eq!(payload["error_class"], "config_validation");
        },
    );
}

#[test]
fn migrate_reports_unreachable_database() {
    let dir = tempfile::TempDir::new().expect("tempdir");
    let url = format!("sqlite://{}/missing/expensey.db", dir.path().display());

    with_env(&[("EXPENSEY_DATABASE_URL", &url)], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 4, "expected database connectivity failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "db_connectivity");
    });
}

#[test]
fn config_attributes_sources_and_redacts_webhook_token() {
    with_env(
        &[
            ("EXPENSEY_DATABASE_URL", "sqlite::memory:"),
            ("EXPENSEY_NOTIFICATION_WEBHOOK_URL", "https://relay.example.org/send"),
            ("EXPENSEY_NOTIFICATION_WEBHOOK_TOKEN", "relay-secret-value"),
            ("EXPENSEY_LOG_LEVEL", "debug"),
        ],
        || {
            let result = config::run();
            assert_eq!(result.exit_code, 0);
            assert!(!result.output.contains("relay-secret-value"));

            let payload = parse_payload(&result.output);
            let token = entry(&payload, "notification.webhook_token");
            assert_eq!(token["value"], "<redacted>");
            assert_eq!(token["source"], "env (EXPENSEY_NOTIFICATION_WEBHOOK_TOKEN)");

            let level = entry(&payload, "logging.level");
            assert_eq!(level["value"], "debug");
            assert_eq!(level["source"], "env (EXPENSEY_LOG_LEVEL)");

            assert_eq!(entry(&payload, "links.host")["source"], "default");
        },
    );
}

#[test]
fn config_attributes_values_read_from_an_explicit_file() {
    let dir = tempfile::TempDir::new().expect("tempdir");
    let path = dir.path().join("expensey.toml");
    fs::write(&path, "[links]\nscheme = \"https\"\nhost = \"expenses.example.org\"\nport = 443\n")
        .expect("write config");

    with_env(&[("EXPENSEY_DATABASE_URL", "sqlite::memory:")], || {
        let result = config::run_with(LoadOptions {
            config_path: Some(path.clone()),
            require_file: true,
            ..LoadOptions::default()
        });
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        let host = entry(&payload, "links.host");
        assert_eq!(host["value"], "expenses.example.org");
        assert_eq!(host["source"], format!("file ({})", path.display()));
        assert_eq!(entry(&payload, "links.port")["value"], "443");
    });
}

#[test]
fn links_uses_the_configured_external_address() {
    with_env(
        &[
            ("EXPENSEY_DATABASE_URL", "sqlite::memory:"),
            ("EXPENSEY_LINKS_SCHEME", "https"),
            ("EXPENSEY_LINKS_HOST", "expenses.example.org"),
            ("EXPENSEY_LINKS_PORT", "8443"),
        ],
        || {
            let result = links::run(42);
            assert_eq!(result.exit_code, 0);

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "links");
            assert_eq!(
                payload["details"]["approve"],
                "https://expenses.example.org:8443/expensemanagement/approveOrRejectExpense/42/approved"
            );
            assert_eq!(
                payload["details"]["reject"],
                "https://expenses.example.org:8443/expensemanagement/approveOrRejectExpense/42/rejected"
            );
        },
    );
}

#[test]
fn links_reports_missing_config_file() {
    with_env(&[], || {
        let result = links::run_with(
            LoadOptions {
                config_path: Some("does-not-exist/expensey.toml".into()),
                require_file: true,
                ..LoadOptions::default()
            },
            1,
        );
        assert_eq!(result.exit_code, 2);
        assert_eq!(parse_payload(&result.output)["error_class"], "config_validation");
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn entry<'a>(payload: &'a Value, key: &str) -> &'a Value {
    payload["details"]
        .as_array()
        .and_then(|entries| entries.iter().find(|entry| entry["key"] == key))
        .unwrap_or_else(|| panic!("config entry `{key}` should be reported"))
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "EXPENSEY_DATABASE_URL",
        "EXPENSEY_DATABASE_MAX_CONNECTIONS",
        "EXPENSEY_DATABASE_TIMEOUT_SECS",
        "EXPENSEY_SERVER_BIND_ADDRESS",
        "EXPENSEY_SERVER_PORT",
        "EXPENSEY_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "EXPENSEY_SERVER_TEMPLATES_DIR",
        "EXPENSEY_LINKS_SCHEME",
        "EXPENSEY_LINKS_HOST",
        "EXPENSEY_LINKS_PORT",
        "EXPENSEY_LINKS_BASE_PATH",
        "EXPENSEY_NOTIFICATION_APPROVER_EMAIL",
        "EXPENSEY_NOTIFICATION_APPROVER_NAME",
        "EXPENSEY_NOTIFICATION_SENDER",
        "EXPENSEY_NOTIFICATION_QUEUE_CAPACITY",
        "EXPENSEY_NOTIFICATION_WEBHOOK_URL",
        "EXPENSEY_NOTIFICATION_WEBHOOK_TOKEN",
        "EXPENSEY_ACCESS_DENIED_OPERATIONS",
        "EXPENSEY_LOGGING_LEVEL",
        "EXPENSEY_LOGGING_FORMAT",
        "EXPENSEY_LOG_LEVEL",
        "EXPENSEY_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
