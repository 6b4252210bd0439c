//! Configuration module for twinbridge.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, saving, validation, defaults, and a builder pattern for
//! programmatic use.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::domain::{DeviceConnectionString, DomainError, Email};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for twinbridge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub devices: DevicesConfig,
    pub polling: PollingConfig,
    pub alerts: AlertsConfig,
    pub logging: LoggingConfig,
}

/// Node-protocol server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Endpoint URL, e.g. `opc.tcp://localhost:4840/`.
    pub endpoint: String,
    /// Prefix of every device node address, e.g. `ns=2;s`.
    pub namespace_prefix: String,
    /// Node whose children are the discoverable devices.
    pub browse_root: String,
}

/// Device twin bindings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevicesConfig {
    /// One connection string per device, assigned in discovery order.
    pub connection_strings: Vec<String>,
}

/// Intervals of the three polling cycles, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub telemetry_interval_ms: u64,
    pub error_interval_ms: u64,
    pub rate_interval_ms: u64,
}

/// E-mail alert settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertsConfig {
    /// `endpoint=https://...;accesskey=...`. `None` disables delivery.
    pub connection_string: Option<String>,
    /// Sender address.
    pub sender: Option<String>,
    /// Recipient addresses.
    pub recipients: Vec<String>,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Write the configuration to `path` as YAML.
    ///
    /// The file is written to a temporary sibling first and then renamed over
    /// the target, so readers never observe a partially written file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create config directory {}", dir.display()))?;

        let yaml = serde_yaml::to_string(self).context("Failed to serialize config")?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
        tmp.write_all(yaml.as_bytes())?;
        tmp.flush()?;
        tmp.persist(path)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/twinbridge/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("twinbridge")
            .join("config.yaml")
    }

    /// Parses every configured device connection string, in order.
    ///
    /// # Errors
    /// Returns the first parse failure
    pub fn device_connections(&self) -> Result<Vec<DeviceConnectionString>, DomainError> {
        self.devices
            .connection_strings
            .iter()
            .map(|raw| DeviceConnectionString::new(raw.as_str()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Default interval of every polling cycle.
pub const DEFAULT_INTERVAL_MS: u64 = 3000;

/// Shortest accepted polling interval.
pub const MIN_INTERVAL_MS: u64 = 1000;

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            endpoint: "opc.tcp://localhost:4840/".to_string(),
            namespace_prefix: "ns=2;s".to_string(),
            browse_root: "i=85".to_string(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            telemetry_interval_ms: DEFAULT_INTERVAL_MS,
            error_interval_ms: DEFAULT_INTERVAL_MS,
            rate_interval_ms: DEFAULT_INTERVAL_MS,
        }
    }
}

impl PollingConfig {
    pub fn telemetry_interval(&self) -> Duration {
        Duration::from_millis(self.telemetry_interval_ms)
    }

    pub fn error_interval(&self) -> Duration {
        Duration::from_millis(self.error_interval_ms)
    }

    pub fn rate_interval(&self) -> Duration {
        Duration::from_millis(self.rate_interval_ms)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"polling.rate_interval_ms"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
pub const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Required scheme of `server.endpoint`.
const ENDPOINT_SCHEME: &str = "opc.tcp://";

/// Required prefix of `alerts.connection_string`.
const ALERTS_ENDPOINT_PREFIX: &str = "endpoint=https://";

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- server ---
        if !self.server.endpoint.starts_with(ENDPOINT_SCHEME)
            || self.server.endpoint.len() == ENDPOINT_SCHEME.len()
        {
            errors.push(ValidationError {
                field: "server.endpoint".into(),
                message: format!(
                    "must be an {ENDPOINT_SCHEME} URL, got '{}'",
                    self.server.endpoint
                ),
            });
        }
        if self.server.endpoint.chars().any(char::is_whitespace) {
            errors.push(ValidationError {
                field: "server.endpoint".into(),
                message: "must not contain whitespace".into(),
            });
        }
        if self.server.namespace_prefix.trim().is_empty() {
            errors.push(ValidationError {
                field: "server.namespace_prefix".into(),
                message: "must not be empty".into(),
            });
        }
        if self.server.browse_root.trim().is_empty() {
            errors.push(ValidationError {
                field: "server.browse_root".into(),
                message: "must not be empty".into(),
            });
        }

        // --- devices ---
        let mut seen = HashSet::new();
        for (i, raw) in self.devices.connection_strings.iter().enumerate() {
            let field = format!("devices.connection_strings[{i}]");
            if let Err(e) = DeviceConnectionString::new(raw.as_str()) {
                errors.push(ValidationError {
                    field,
                    message: e.to_string(),
                });
            } else if !seen.insert(raw.trim()) {
                errors.push(ValidationError {
                    field,
                    message: "duplicate connection string".into(),
                });
            }
        }

        // --- polling ---
        for (name, value) in [
            ("telemetry_interval_ms", self.polling.telemetry_interval_ms),
            ("error_interval_ms", self.polling.error_interval_ms),
            ("rate_interval_ms", self.polling.rate_interval_ms),
        ] {
            if value < MIN_INTERVAL_MS {
                errors.push(ValidationError {
                    field: format!("polling.{name}"),
                    message: format!("must be at least {MIN_INTERVAL_MS} ms, got {value}"),
                });
            }
        }

        // --- alerts ---
        if let Some(conn) = &self.alerts.connection_string {
            if !conn.starts_with(ALERTS_ENDPOINT_PREFIX) {
                errors.push(ValidationError {
                    field: "alerts.connection_string".into(),
                    message: format!("must start with '{ALERTS_ENDPOINT_PREFIX}'"),
                });
            }
        }
        if let Some(sender) = &self.alerts.sender {
            if let Err(e) = Email::new(sender.as_str()) {
                errors.push(ValidationError {
                    field: "alerts.sender".into(),
                    message: e.to_string(),
                });
            }
        }
        for (i, recipient) in self.alerts.recipients.iter().enumerate() {
            if let Err(e) = Email::new(recipient.as_str()) {
                errors.push(ValidationError {
                    field: format!("alerts.recipients[{i}]"),
                    message: e.to_string(),
                });
            }
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use twinbridge_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .server_endpoint("opc.tcp://plc.local:4840/")
///     .polling_rate_interval_ms(5000)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- server ---

    pub fn server_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.server.endpoint = endpoint.into();
        self
    }

    pub fn server_namespace_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.server.namespace_prefix = prefix.into();
        self
    }

    pub fn server_browse_root(mut self, root: impl Into<String>) -> Self {
        self.config.server.browse_root = root.into();
        self
    }

    // --- devices ---

    pub fn device_connection_string(mut self, conn: impl Into<String>) -> Self {
        self.config.devices.connection_strings.push(conn.into());
        self
    }

    // --- polling ---

    pub fn polling_telemetry_interval_ms(mut self, ms: u64) -> Self {
        self.config.polling.telemetry_interval_ms = ms;
        self
    }

    pub fn polling_error_interval_ms(mut self, ms: u64) -> Self {
        self.config.polling.error_interval_ms = ms;
        self
    }

    pub fn polling_rate_interval_ms(mut self, ms: u64) -> Self {
        self.config.polling.rate_interval_ms = ms;
        self
    }

    // --- alerts ---

    pub fn alerts_connection_string(mut self, conn: impl Into<String>) -> Self {
        self.config.alerts.connection_string = Some(conn.into());
        self
    }

    pub fn alerts_sender(mut self, sender: impl Into<String>) -> Self {
        self.config.alerts.sender = Some(sender.into());
        self
    }

    pub fn alerts_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.config.alerts.recipients.push(recipient.into());
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
