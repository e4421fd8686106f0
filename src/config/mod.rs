//! Strategy configuration
//!
//! [`StrategyConfig`] is the typed form of the options a hosting runtime
//! passes when it starts membership reconciliation. It can be built in code,
//! loaded from a TOML file, or read from `ROSTER_*` environment variables.
//!
//! ```toml
//! service_name = "ledger"
//! service_port = 4369
//! root = "http://consul.internal:8500"
//! polling_interval = 5000
//! local_address = "10.0.3.17"
//!
//! [check]
//! ttl_secs = 15
//!
//! [logging]
//! level = "debug"
//! format = "json"
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::membership::NodeId;

pub const DEFAULT_ROOT: &str = "http://localhost:8500";
pub const DEFAULT_POLLING_INTERVAL_MS: u64 = 5000;
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 5000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_CHECK_TTL_SECS: u64 = 10;
pub const DEFAULT_CHECK_NAME: &str = "Erlang Node Status";
pub const DEFAULT_CHECK_ID_SUFFIX: &str = "erlang-node";

// ============================================================================
// Strategy Configuration
// ============================================================================

/// Configuration for registry-driven membership reconciliation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Service name registered for this node and queried for peers
    pub service_name: String,

    /// Port advertised in the service registration
    #[serde(default)]
    pub service_port: u16,

    /// Registry base URL
    #[serde(default = "default_root")]
    pub root: String,

    /// Delay between reconciliation cycles, in milliseconds
    #[serde(rename = "polling_interval", default = "default_polling_interval")]
    pub polling_interval_ms: u64,

    /// Delay between heartbeats, in milliseconds
    #[serde(rename = "heartbeat_interval", default = "default_heartbeat_interval")]
    pub heartbeat_interval_ms: u64,

    /// Per-call registry timeout, in milliseconds
    #[serde(rename = "request_timeout", default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Name part of discovered node identifiers; defaults to `service_name`
    #[serde(default)]
    pub node_basename: Option<String>,

    /// This node's own registry address, excluded from discovery results
    #[serde(default)]
    pub local_address: Option<String>,

    /// Liveness check customization
    #[serde(default)]
    pub check: CheckConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// TTL check registered alongside the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    /// Time the registry waits for a heartbeat before marking the check critical
    pub ttl_secs: u64,

    /// Human-readable check name
    pub name: String,

    /// Suffix of the check id, which is `<service_name>:<id_suffix>`
    pub id_suffix: String,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_CHECK_TTL_SECS,
            name: DEFAULT_CHECK_NAME.to_string(),
            id_suffix: DEFAULT_CHECK_ID_SUFFIX.to_string(),
        }
    }
}

impl CheckConfig {
    /// TTL in the registry's duration syntax
    pub fn ttl(&self) -> String {
        format!("{}s", self.ttl_secs)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

fn default_root() -> String {
    DEFAULT_ROOT.to_string()
}

fn default_polling_interval() -> u64 {
    DEFAULT_POLLING_INTERVAL_MS
}

fn default_heartbeat_interval() -> u64 {
    DEFAULT_HEARTBEAT_INTERVAL_MS
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

impl StrategyConfig {
    /// Configuration with defaults for everything but the service name
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            service_port: 0,
            root: default_root(),
            polling_interval_ms: DEFAULT_POLLING_INTERVAL_MS,
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            node_basename: None,
            local_address: None,
            check: CheckConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Create configuration with builder pattern
    pub fn builder() -> StrategyConfigBuilder {
        StrategyConfigBuilder::default()
    }

    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `ROSTER_SERVICE_NAME`: Service name [required]
    /// - `ROSTER_SERVICE_PORT`: Advertised port [default: 0]
    /// - `ROSTER_REGISTRY_ROOT`: Registry base URL [default: http://localhost:8500]
    /// - `ROSTER_POLLING_INTERVAL`: Reconciliation interval in ms [default: 5000]
    /// - `ROSTER_HEARTBEAT_INTERVAL`: Heartbeat interval in ms [default: 5000]
    /// - `ROSTER_REQUEST_TIMEOUT`: Registry call timeout in ms [default: 5000]
    /// - `ROSTER_NODE_BASENAME`: Node name prefix [default: service name]
    /// - `ROSTER_LOCAL_ADDRESS`: This node's registry address [optional]
    /// - `ROSTER_CHECK_TTL`: Check TTL in seconds [default: 10]
    /// - `ROSTER_LOG_LEVEL`: Log level [default: info]
    /// - `ROSTER_LOG_FORMAT`: Log format [default: text]
    pub fn from_env() -> Result<Self, ConfigError> {
        let service_name = env::var("ROSTER_SERVICE_NAME")
            .map_err(|_| ConfigError::MissingEnvVar("ROSTER_SERVICE_NAME".to_string()))?;

        let config = Self {
            service_name,
            service_port: env_parse("ROSTER_SERVICE_PORT", 0)?,
            root: env::var("ROSTER_REGISTRY_ROOT").unwrap_or_else(|_| default_root()),
            polling_interval_ms: env_parse("ROSTER_POLLING_INTERVAL", DEFAULT_POLLING_INTERVAL_MS)?,
            heartbeat_interval_ms: env_parse(
                "ROSTER_HEARTBEAT_INTERVAL",
                DEFAULT_HEARTBEAT_INTERVAL_MS,
            )?,
            request_timeout_ms: env_parse("ROSTER_REQUEST_TIMEOUT", DEFAULT_REQUEST_TIMEOUT_MS)?,
            node_basename: env::var("ROSTER_NODE_BASENAME").ok(),
            local_address: env::var("ROSTER_LOCAL_ADDRESS").ok(),
            check: CheckConfig {
                ttl_secs: env_parse("ROSTER_CHECK_TTL", DEFAULT_CHECK_TTL_SECS)?,
                ..CheckConfig::default()
            },
            logging: LoggingConfig {
                level: env::var("ROSTER_LOG_LEVEL").unwrap_or_else(|_| String::from("info")),
                format: env::var("ROSTER_LOG_FORMAT").unwrap_or_else(|_| String::from("text")),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "service_name".to_string(),
                reason: "Cannot be empty".to_string(),
            });
        }

        let root = Url::parse(&self.root).map_err(|e| ConfigError::InvalidValue {
            field: "root".to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(root.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidValue {
                field: "root".to_string(),
                reason: format!("Unsupported scheme '{}'", root.scheme()),
            });
        }

        for (field, value) in [
            ("polling_interval", self.polling_interval_ms),
            ("heartbeat_interval", self.heartbeat_interval_ms),
            ("request_timeout", self.request_timeout_ms),
            ("check.ttl_secs", self.check.ttl_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    reason: "Must be greater than 0".to_string(),
                });
            }
        }

        let ttl_ms = self.check.ttl_secs.saturating_mul(1000);
        if self.heartbeat_interval_ms >= ttl_ms {
            return Err(ConfigError::InvalidValue {
                field: "heartbeat_interval".to_string(),
                reason: format!(
                    "{}ms must be shorter than the {} check TTL",
                    self.heartbeat_interval_ms,
                    self.check.ttl()
                ),
            });
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            return Err(ConfigError::InvalidValue {
                field: "logging.format".to_string(),
                reason: format!("Expected 'text' or 'json', got '{}'", self.logging.format),
            });
        }

        Ok(())
    }

    /// Get polling interval as Duration
    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms)
    }

    /// Get heartbeat interval as Duration
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Get registry call timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn node_basename(&self) -> &str {
        self.node_basename.as_deref().unwrap_or(&self.service_name)
    }

    /// Id of the TTL check that heartbeats update
    pub fn check_id(&self) -> String {
        format!("{}:{}", self.service_name, self.check.id_suffix)
    }

    /// This node's own identifier, when its address is known
    pub fn local_node(&self) -> Option<NodeId> {
        self.local_address
            .as_deref()
            .map(|addr| NodeId::from_parts(self.node_basename(), addr))
    }
}

fn env_parse<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            field: name.to_string(),
            reason: format!("Cannot parse '{raw}'"),
        }),
        Err(_) => Ok(default),
    }
}

// ============================================================================
// Strategy Config Builder
// ============================================================================

/// Builder for StrategyConfig
#[derive(Debug, Default)]
pub struct StrategyConfigBuilder {
    service_name: Option<String>,
    service_port: Option<u16>,
    root: Option<String>,
    polling_interval_ms: Option<u64>,
    heartbeat_interval_ms: Option<u64>,
    request_timeout_ms: Option<u64>,
    node_basename: Option<String>,
    local_address: Option<String>,
    check: Option<CheckConfig>,
    logging: Option<LoggingConfig>,
}

impl StrategyConfigBuilder {
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    pub fn service_port(mut self, port: u16) -> Self {
        self.service_port = Some(port);
        self
    }

    pub fn root(mut self, url: impl Into<String>) -> Self {
        self.root = Some(url.into());
        self
    }

    pub fn polling_interval_ms(mut self, ms: u64) -> Self {
        self.polling_interval_ms = Some(ms);
        self
    }

    pub fn heartbeat_interval_ms(mut self, ms: u64) -> Self {
        self.heartbeat_interval_ms = Some(ms);
        self
    }

    pub fn request_timeout_ms(mut self, ms: u64) -> Self {
        self.request_timeout_ms = Some(ms);
        self
    }

    pub fn node_basename(mut self, basename: impl Into<String>) -> Self {
        self.node_basename = Some(basename.into());
        self
    }

    pub fn local_address(mut self, addr: impl Into<String>) -> Self {
        self.local_address = Some(addr.into());
        self
    }

    pub fn check(mut self, check: CheckConfig) -> Self {
        self.check = Some(check);
        self
    }

    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = Some(logging);
        self
    }

    pub fn build(self) -> Result<StrategyConfig, ConfigError> {
        let config = StrategyConfig {
            service_name: self
                .service_name
                .ok_or_else(|| ConfigError::MissingField("service_name".to_string()))?,
            service_port: self.service_port.unwrap_or(0),
            root: self.root.unwrap_or_else(default_root),
            polling_interval_ms: self
                .polling_interval_ms
                .unwrap_or(DEFAULT_POLLING_INTERVAL_MS),
            heartbeat_interval_ms: self
                .heartbeat_interval_ms
                .unwrap_or(DEFAULT_HEARTBEAT_INTERVAL_MS),
            request_timeout_ms: self.request_timeout_ms.unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS),
            node_basename: self.node_basename,
            local_address: self.local_address,
            check: self.check.unwrap_or_default(),
            logging: self.logging.unwrap_or_default(),
        };

        config.validate()?;
        Ok(config)
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Missing environment variable
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// Invalid value
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    /// Config file could not be read
    #[error("Failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("Failed to parse TOML config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
