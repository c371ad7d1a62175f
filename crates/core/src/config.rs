use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use chrono::Duration;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::approvals::{ApprovalThresholds, Capability, CapabilityTable, PermissionGate};
use crate::domain::request::{Priority, RequestType};
use crate::sla::{default_window_hours, SlaPolicy};
use crate::workflow::machine::RequestMachine;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub approval: ApprovalConfig,
    pub sla: SlaConfig,
    pub roles: RolesConfig,
    pub notifications: NotificationsConfig,
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
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Debug)]
pub struct ApprovalConfig {
    pub low_threshold: Decimal,
    pub high_threshold: Decimal,
}

#[derive(Clone, Debug)]
pub struct SlaConfig {
    pub warning_fraction: f64,
    /// Window length in hours per request type and priority.
    pub window_hours: BTreeMap<(RequestType, Priority), u32>,
}

#[derive(Clone, Debug)]
pub struct RolesConfig {
    pub capabilities: BTreeMap<String, Vec<Capability>>,
}

#[derive(Clone, Debug)]
pub struct NotificationsConfig {
    pub webhook_url: Option<String>,
    pub webhook_token: Option<SecretString>,
    pub timeout_secs: u64,
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
    pub webhook_url: Option<String>,
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
        let thresholds = ApprovalThresholds::default();
        let window_hours = RequestType::ALL
            .into_iter()
            .flat_map(|request_type| {
                [Priority::Normal, Priority::Urgent].into_iter().map(move |priority| {
                    let hours = default_window_hours(request_type, priority) as u32;
                    ((request_type, priority), hours)
                })
            })
            .collect();
        let capabilities = CapabilityTable::default()
            .roles()
            .map(|(role, held)| (role.to_string(), held.iter().copied().collect()))
            .collect();

        Self {
            database: DatabaseConfig {
                url: "sqlite://opsdesk.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
            approval: ApprovalConfig {
                low_threshold: thresholds.low(),
                high_threshold: thresholds.high(),
            },
            sla: SlaConfig { warning_fraction: 0.2, window_hours },
            roles: RolesConfig { capabilities },
            notifications: NotificationsConfig {
                webhook_url: None,
                webhook_token: None,
                timeout_secs: 5,
            },
        }
    }
}

impl FromStr for LogFormat {
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
            config.apply_patch(patch)?;
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("opsdesk.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) -> Result<(), ConfigError> {
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
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        if let Some(approval) = patch.approval {
            if let Some(low_threshold) = approval.low_threshold {
                self.approval.low_threshold = low_threshold;
            }
            if let Some(high_threshold) = approval.high_threshold {
                self.approval.high_threshold = high_threshold;
            }
        }

        if let Some(sla) = patch.sla {
            if let Some(warning_fraction) = sla.warning_fraction {
                self.sla.warning_fraction = warning_fraction;
            }
            for (type_name, window) in sla.windows.unwrap_or_default() {
                let request_type = RequestType::parse(&type_name).ok_or_else(|| {
                    ConfigError::Validation(format!(
                        "sla.windows.{type_name} is not a request type \
                         (expected reconciliation|payment|confirmation)"
                    ))
                })?;
                if let Some(hours) = window.normal {
                    self.sla.window_hours.insert((request_type, Priority::Normal), hours);
                }
                if let Some(hours) = window.urgent {
                    self.sla.window_hours.insert((request_type, Priority::Urgent), hours);
                }
            }
        }

        if let Some(roles) = patch.roles {
            for (role, names) in roles {
                let capabilities = names
                    .iter()
                    .map(|name| {
                        Capability::parse(name).ok_or_else(|| {
                            ConfigError::Validation(format!(
                                "roles.{role} lists unknown capability `{name}` \
                                 (expected process_requests|approve_standard|approve_high_value)"
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                self.roles.capabilities.insert(role.trim().to_ascii_lowercase(), capabilities);
            }
        }

        if let Some(notifications) = patch.notifications {
            if let Some(webhook_url) = notifications.webhook_url {
                self.notifications.webhook_url = Some(webhook_url);
            }
            if let Some(webhook_token_value) = notifications.webhook_token {
                self.notifications.webhook_token = Some(SecretString::from(webhook_token_value));
            }
            if let Some(timeout_secs) = notifications.timeout_secs {
                self.notifications.timeout_secs = timeout_secs;
            }
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("OPSDESK_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("OPSDESK_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("OPSDESK_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("OPSDESK_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("OPSDESK_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("OPSDESK_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("OPSDESK_SERVER_PORT") {
            self.server.port = parse_u16("OPSDESK_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("OPSDESK_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("OPSDESK_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("OPSDESK_LOGGING_LEVEL").or_else(|| read_env("OPSDESK_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("OPSDESK_LOGGING_FORMAT").or_else(|| read_env("OPSDESK_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        if let Some(value) = read_env("OPSDESK_APPROVAL_LOW_THRESHOLD") {
            self.approval.low_threshold = parse_decimal("OPSDESK_APPROVAL_LOW_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("OPSDESK_APPROVAL_HIGH_THRESHOLD") {
            self.approval.high_threshold =
                parse_decimal("OPSDESK_APPROVAL_HIGH_THRESHOLD", &value)?;
        }

        if let Some(value) = read_env("OPSDESK_SLA_WARNING_FRACTION") {
            self.sla.warning_fraction = parse_f64("OPSDESK_SLA_WARNING_FRACTION", &value)?;
        }

        if let Some(value) = read_env("OPSDESK_NOTIFICATIONS_WEBHOOK_URL") {
            self.notifications.webhook_url = Some(value);
        }
        if let Some(value) = read_env("OPSDESK_NOTIFICATIONS_WEBHOOK_TOKEN") {
            self.notifications.webhook_token = Some(SecretString::from(value));
        }
        if let Some(value) = read_env("OPSDESK_NOTIFICATIONS_TIMEOUT_SECS") {
            self.notifications.timeout_secs =
                parse_u64("OPSDESK_NOTIFICATIONS_TIMEOUT_SECS", &value)?;
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
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(webhook_url) = overrides.webhook_url {
            self.notifications.webhook_url = Some(webhook_url);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        self.approval_thresholds()?;
        self.sla_policy()?;
        validate_notifications(&self.notifications)?;
        Ok(())
    }

    pub fn approval_thresholds(&self) -> Result<ApprovalThresholds, ConfigError> {
        ApprovalThresholds::new(self.approval.low_threshold, self.approval.high_threshold)
            .map_err(|error| ConfigError::Validation(format!("approval: {error}")))
    }

    pub fn sla_policy(&self) -> Result<SlaPolicy, ConfigError> {
        let windows = self
            .sla
            .window_hours
            .iter()
            .map(|(key, hours)| (*key, Duration::hours(i64::from(*hours))))
            .collect();
        SlaPolicy::new(windows, self.sla.warning_fraction)
            .map_err(|error| ConfigError::Validation(format!("sla: {error}")))
    }

    pub fn capability_table(&self) -> CapabilityTable {
        CapabilityTable::new(
            self.roles
                .capabilities
                .iter()
                .map(|(role, capabilities)| (role.clone(), capabilities.clone())),
        )
    }

    /// Request machine wired from the approval, sla and roles sections.
    pub fn request_machine(&self) -> Result<RequestMachine, ConfigError> {
        Ok(RequestMachine::new(
            self.approval_thresholds()?,
            PermissionGate::new(Arc::new(self.capability_table())),
            self.sla_policy()?,
        ))
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("opsdesk.toml"), PathBuf::from("config/opsdesk.toml")]
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
        if ch != '$' || !matches!(chars.peek(), Some('{')) {
            output.push(ch);
            continue;
        }

        chars.next();
        let mut key = String::new();
        loop {
            match chars.next() {
                Some('}') => break,
                Some(next) => key.push(next),
                None => return Err(ConfigError::UnterminatedInterpolation),
            }
        }

        let value =
            env::var(&key).map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
        output.push_str(&value);
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
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

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

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_notifications(notifications: &NotificationsConfig) -> Result<(), ConfigError> {
    if let Some(url) = &notifications.webhook_url {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "notifications.webhook_url must start with http:// or https://".to_string(),
            ));
        }
    }

    let blank_token = notifications
        .webhook_token
        .as_ref()
        .is_some_and(|token| token.expose_secret().trim().is_empty());
    if blank_token {
        return Err(ConfigError::Validation(
            "notifications.webhook_token must not be blank when set".to_string(),
        ));
    }

    if notifications.timeout_secs == 0 || notifications.timeout_secs > 60 {
        return Err(ConfigError::Validation(
            "notifications.timeout_secs must be in range 1..=60".to_string(),
        ));
    }

    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| invalid_override(key, value))
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| invalid_override(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| invalid_override(key, value))
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.trim().parse::<f64>().map_err(|_| invalid_override(key, value))
}

fn parse_decimal(key: &str, value: &str) -> Result<Decimal, ConfigError> {
    Decimal::from_str(value.trim()).map_err(|_| invalid_override(key, value))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
    approval: Option<ApprovalPatch>,
    sla: Option<SlaPatch>,
    roles: Option<BTreeMap<String, Vec<String>>>,
    notifications: Option<NotificationsPatch>,
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
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct ApprovalPatch {
    low_threshold: Option<Decimal>,
    high_threshold: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
struct SlaPatch {
    warning_fraction: Option<f64>,
    windows: Option<BTreeMap<String, SlaWindowPatch>>,
}

#[derive(Debug, Default, Deserialize)]
struct SlaWindowPatch {
    normal: Option<u32>,
    urgent: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct NotificationsPatch {
    webhook_url: Option<String>,
    webhook_token: Option<String>,
    timeout_secs: Option<u64>,
}
