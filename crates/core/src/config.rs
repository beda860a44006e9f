use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::policy::Operation;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub links: LinksConfig,
    pub notification: NotificationConfig,
    pub access: AccessConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
    pub templates_dir: Option<String>,
}

/// External address approvers use to reach the action links. It is usually
/// a proxy or load balancer in front of `server`, so it is configured apart.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinksConfig {
    pub scheme: String,
    pub host: String,
    pub port: String,
    pub base_path: String,
}

#[derive(Clone, Debug)]
pub struct NotificationConfig {
    pub approver_email: String,
    pub approver_name: Option<String>,
    pub sender: String,
    pub queue_capacity: usize,
    pub webhook_url: Option<String>,
    pub webhook_token: Option<SecretString>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccessConfig {
    pub denied_operations: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub server_port: Option<u16>,
    pub links_host: Option<String>,
    pub links_port: Option<String>,
    pub approver_email: Option<String>,
    pub notification_webhook_url: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://expensey.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
                templates_dir: None,
            },
            links: LinksConfig {
                scheme: "http".to_string(),
                host: "localhost".to_string(),
                port: "8080".to_string(),
                base_path: "/expensemanagement".to_string(),
            },
            notification: NotificationConfig {
                approver_email: "approver@localhost".to_string(),
                approver_name: None,
                sender: "expensey@localhost".to_string(),
                queue_capacity: 256,
                webhook_url: None,
                webhook_token: None,
            },
            access: AccessConfig::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("expensey.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
            if let Some(templates_dir) = server.templates_dir {
                self.server.templates_dir = Some(templates_dir);
            }
        }

        if let Some(links) = patch.links {
            if let Some(scheme) = links.scheme {
                self.links.scheme = scheme;
            }
            if let Some(host) = links.host {
                self.links.host = host;
            }
            if let Some(port) = links.port {
                self.links.port = port.into_string();
            }
            if let Some(base_path) = links.base_path {
                self.links.base_path = base_path;
            }
        }

        if let Some(notification) = patch.notification {
            if let Some(approver_email) = notification.approver_email {
                self.notification.approver_email = approver_email;
            }
            if let Some(approver_name) = notification.approver_name {
                self.notification.approver_name = Some(approver_name);
            }
            if let Some(sender) = notification.sender {
                self.notification.sender = sender;
            }
            if let Some(queue_capacity) = notification.queue_capacity {
                self.notification.queue_capacity = queue_capacity;
            }
            if let Some(webhook_url) = notification.webhook_url {
                self.notification.webhook_url = Some(webhook_url);
            }
            if let Some(webhook_token_value) = notification.webhook_token {
                self.notification.webhook_token = Some(secret_value(webhook_token_value));
            }
        }

        if let Some(access) = patch.access {
            if let Some(denied_operations) = access.denied_operations {
                self.access.denied_operations = denied_operations;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("EXPENSEY_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("EXPENSEY_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("EXPENSEY_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("EXPENSEY_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("EXPENSEY_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("EXPENSEY_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("EXPENSEY_SERVER_PORT") {
            self.server.port = parse_u16("EXPENSEY_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("EXPENSEY_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("EXPENSEY_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }
        if let Some(value) = read_env("EXPENSEY_SERVER_TEMPLATES_DIR") {
            self.server.templates_dir = Some(value);
        }

        if let Some(value) = read_env("EXPENSEY_LINKS_SCHEME") {
            self.links.scheme = value;
        }
        if let Some(value) = read_env("EXPENSEY_LINKS_HOST") {
            self.links.host = value;
        }
        if let Some(value) = read_env("EXPENSEY_LINKS_PORT") {
            self.links.port = value;
        }
        if let Some(value) = read_env("EXPENSEY_LINKS_BASE_PATH") {
            self.links.base_path = value;
        }

        if let Some(value) = read_env("EXPENSEY_NOTIFICATION_APPROVER_EMAIL") {
            self.notification.approver_email = value;
        }
        if let Some(value) = read_env("EXPENSEY_NOTIFICATION_APPROVER_NAME") {
            self.notification.approver_name = Some(value);
        }
        if let Some(value) = read_env("EXPENSEY_NOTIFICATION_SENDER") {
            self.notification.sender = value;
        }
        if let Some(value) = read_env("EXPENSEY_NOTIFICATION_QUEUE_CAPACITY") {
            self.notification.queue_capacity =
                parse_usize("EXPENSEY_NOTIFICATION_QUEUE_CAPACITY", &value)?;
        }
        if let Some(value) = read_env("EXPENSEY_NOTIFICATION_WEBHOOK_URL") {
            self.notification.webhook_url = Some(value);
        }
        if let Some(value) = read_env("EXPENSEY_NOTIFICATION_WEBHOOK_TOKEN") {
            self.notification.webhook_token = Some(secret_value(value));
        }

        if let Some(value) = read_env("EXPENSEY_ACCESS_DENIED_OPERATIONS") {
            self.access.denied_operations = value
                .split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(str::to_string)
                .collect();
        }

        let log_level =
            read_env("EXPENSEY_LOGGING_LEVEL").or_else(|| read_env("EXPENSEY_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("EXPENSEY_LOGGING_FORMAT").or_else(|| read_env("EXPENSEY_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(server_port) = overrides.server_port {
            self.server.port = server_port;
        }
        if let Some(links_host) = overrides.links_host {
            self.links.host = links_host;
        }
        if let Some(links_port) = overrides.links_port {
            self.links.port = links_port;
        }
        if let Some(approver_email) = overrides.approver_email {
            self.notification.approver_email = approver_email;
        }
        if let Some(webhook_url) = overrides.notification_webhook_url {
            self.notification.webhook_url = Some(webhook_url);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_links(&self.links)?;
        validate_notification(&self.notification)?;
        validate_access(&self.access)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("expensey.toml"), PathBuf::from("config/expensey.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_links(links: &LinksConfig) -> Result<(), ConfigError> {
    if !matches!(links.scheme.as_str(), "http" | "https") {
        return Err(ConfigError::Validation(format!(
            "links.scheme must be http or https, got `{}`",
            links.scheme
        )));
    }

    let host = links.host.trim();
    if host.is_empty() || host.contains('/') || host.contains(' ') {
        return Err(ConfigError::Validation(
            "links.host must be a bare host name or IP address".to_string(),
        ));
    }

    if links.port.parse::<u16>().map(|port| port == 0).unwrap_or(true) {
        return Err(ConfigError::Validation(format!(
            "links.port must be a port number in range 1..=65535, got `{}`",
            links.port
        )));
    }

    let base_path = links.base_path.as_str();
    if !base_path.is_empty() && (!base_path.starts_with('/') || base_path.ends_with('/')) {
        return Err(ConfigError::Validation(
            "links.base_path must be empty or start with `/` and have no trailing `/`".to_string(),
        ));
    }

    Ok(())
}

fn validate_notification(notification: &NotificationConfig) -> Result<(), ConfigError> {
    let approver = notification.approver_email.trim();
    if approver.is_empty() || !approver.contains('@') {
        return Err(ConfigError::Validation(
            "notification.approver_email must be an email address".to_string(),
        ));
    }

    if notification.sender.trim().is_empty() {
        return Err(ConfigError::Validation("notification.sender is required".to_string()));
    }

    if notification.queue_capacity == 0 || notification.queue_capacity > 65_536 {
        return Err(ConfigError::Validation(
            "notification.queue_capacity must be in range 1..=65536".to_string(),
        ));
    }

    if let Some(url) = &notification.webhook_url {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "notification.webhook_url must start with http:// or https://".to_string(),
            ));
        }
    }

    let blank_token =
        notification.webhook_token.as_ref().map(|token| token.expose_secret().trim().is_empty());
    if blank_token == Some(true) {
        return Err(ConfigError::Validation(
            "notification.webhook_token must not be blank when set".to_string(),
        ));
    }

    Ok(())
}

fn validate_access(access: &AccessConfig) -> Result<(), ConfigError> {
    for entry in &access.denied_operations {
        entry.parse::<Operation>().map_err(|error| {
            ConfigError::Validation(format!("access.denied_operations: {error}"))
        })?;
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    links: Option<LinksPatch>,
    notification: Option<NotificationPatch>,
    access: Option<AccessPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
    templates_dir: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LinksPatch {
    scheme: Option<String>,
    host: Option<String>,
    port: Option<PortValue>,
    base_path: Option<String>,
}

/// `links.port` may be written as `8443` or `"8443"`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PortValue {
    Number(u16),
    Text(String),
}

impl PortValue {
    fn into_string(self) -> String {
        match self {
            Self::Number(port) => port.to_string(),
            Self::Text(port) => port,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct NotificationPatch {
    approver_email: Option<String>,
    approver_name: Option<String>,
    sender: Option<String>,
    queue_capacity: Option<usize>,
    webhook_url: Option<String>,
    webhook_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AccessPatch {
    denied_operations: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
