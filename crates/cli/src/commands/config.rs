use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use expensey_core::config::{AppConfig, LoadOptions};
use serde::Serialize;
use toml::Value;

use crate::commands::CommandResult;

#[derive(Debug, Serialize)]
struct ConfigEntry {
    key: &'static str,
    value: String,
    source: String,
}

pub fn run() -> CommandResult {
    run_with(LoadOptions::default())
}

pub fn run_with(options: LoadOptions) -> CommandResult {
    let config_file_path = options.config_path.clone().or_else(detect_config_path);
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                2,
            );
        }
    };

    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let entry = |key: &'static str, value: String, env_keys: &[&str]| ConfigEntry {
        key,
        value,
        source: field_source(key, env_keys, config_file_doc.as_ref(), config_file_path.as_deref()),
    };

    let webhook_token =
        if config.notification.webhook_token.is_some() { "<redacted>" } else { "<unset>" };
    let denied = if config.access.denied_operations.is_empty() {
        "<none>".to_string()
    } else {
        config.access.denied_operations.join(",")
    };

    let entries = vec![
        entry("database.url", config.database.url.clone(), &["EXPENSEY_DATABASE_URL"]),
        entry(
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["EXPENSEY_DATABASE_MAX_CONNECTIONS"],
        ),
        entry(
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["EXPENSEY_DATABASE_TIMEOUT_SECS"],
        ),
        entry(
            "server.bind_address",
            config.server.bind_address.clone(),
            &["EXPENSEY_SERVER_BIND_ADDRESS"],
        ),
        entry("server.port", config.server.port.to_string(), &["EXPENSEY_SERVER_PORT"]),
        entry(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["EXPENSEY_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        entry(
            "server.templates_dir",
            unset_or(config.server.templates_dir.as_deref()),
            &["EXPENSEY_SERVER_TEMPLATES_DIR"],
        ),
        entry("links.scheme", config.links.scheme.clone(), &["EXPENSEY_LINKS_SCHEME"]),
        entry("links.host", config.links.host.clone(), &["EXPENSEY_LINKS_HOST"]),
        entry("links.port", config.links.port.clone(), &["EXPENSEY_LINKS_PORT"]),
        entry("links.base_path", config.links.base_path.clone(), &["EXPENSEY_LINKS_BASE_PATH"]),
        entry(
            "notification.approver_email",
            config.notification.approver_email.clone(),
            &["EXPENSEY_NOTIFICATION_APPROVER_EMAIL"],
        ),
        entry(
            "notification.approver_name",
            unset_or(config.notification.approver_name.as_deref()),
            &["EXPENSEY_NOTIFICATION_APPROVER_NAME"],
        ),
        entry(
            "notification.sender",
            config.notification.sender.clone(),
            &["EXPENSEY_NOTIFICATION_SENDER"],
        ),
        entry(
            "notification.queue_capacity",
            config.notification.queue_capacity.to_string(),
            &["EXPENSEY_NOTIFICATION_QUEUE_CAPACITY"],
        ),
        entry(
            "notification.webhook_url",
            unset_or(config.notification.webhook_url.as_deref()),
            &["EXPENSEY_NOTIFICATION_WEBHOOK_URL"],
        ),
        entry(
            "notification.webhook_token",
            webhook_token.to_string(),
            &["EXPENSEY_NOTIFICATION_WEBHOOK_TOKEN"],
        ),
        entry("access.denied_operations", denied, &["EXPENSEY_ACCESS_DENIED_OPERATIONS"]),
        entry(
            "logging.level",
            config.logging.level.clone(),
            &["EXPENSEY_LOGGING_LEVEL", "EXPENSEY_LOG_LEVEL"],
        ),
        entry(
            "logging.format",
            format!("{:?}", config.logging.format).to_ascii_lowercase(),
            &["EXPENSEY_LOGGING_FORMAT", "EXPENSEY_LOG_FORMAT"],
        ),
    ];

    CommandResult::success_with_details(
        "config",
        "effective config (source precedence: env > file > default)",
        serde_json::to_value(entries).ok(),
    )
}

fn unset_or(value: Option<&str>) -> String {
    value.unwrap_or("<unset>").to_string()
}

fn detect_config_path() -> Option<PathBuf> {
    ["expensey.toml", "config/expensey.toml"]
        .into_iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}
