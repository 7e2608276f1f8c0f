use crate::sender::retry::RetryPolicy;
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("File error: {0}")]
    FileError(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Which half of the pipeline this process runs. A node is exactly one of
/// the two; mixed configurations are rejected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Accepts telemetry, persists it, ships the backlog to the peer.
    Collector,
    /// Receives compressed backlogs and fans records out to the destination.
    Relay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

#[derive(Parser, Debug, Clone, Serialize, Deserialize)]
#[command(author, version, about, long_about = None)]
#[serde(default)]
pub struct Config {
    /// Node role: collector (master) or relay (slave)
    #[arg(long, env = "CARGOLINK_ROLE", value_enum)]
    pub role: Option<Role>,

    /// Name this node reports as the source of bulk payloads
    #[arg(long, env = "CARGOLINK_NODE_NAME", default_value = "cargolink")]
    pub node_name: String,

    /// SQLite database path (collector only)
    #[arg(long, env = "CARGOLINK_DB_PATH", default_value = "cargolink.db")]
    pub db_path: PathBuf,

    /// Maximum records held in the ingestion queue before rejecting
    #[arg(long, env = "CARGOLINK_QUEUE_MAX_SIZE", default_value = "10000")]
    pub queue_max_size: usize,

    /// Queue drain interval in milliseconds
    #[arg(long, env = "CARGOLINK_DRAIN_INTERVAL_MS", default_value = "5000")]
    pub drain_interval_ms: u64,

    /// Maximum rows per insert transaction
    #[arg(long, env = "CARGOLINK_BATCH_MAX_SIZE", default_value = "1000")]
    pub batch_max_size: usize,

    /// Hours between replication cycles
    #[arg(long, env = "CARGOLINK_REPLICATION_INTERVAL_HOURS", default_value = "12")]
    pub replication_interval_hours: u64,

    /// Peer (relay) base URL the collector ships bulk payloads to
    #[arg(long, env = "CARGOLINK_PEER_URL")]
    pub peer_url: Option<String>,

    /// Destination base URL the relay forwards individual records to
    #[arg(long, env = "CARGOLINK_DESTINATION_URL")]
    pub destination_url: Option<String>,

    /// Originator identity sent with each forwarded record
    #[arg(long, env = "CARGOLINK_FORWARD_ORIGIN", default_value = "CAdmin")]
    pub forward_origin: String,

    /// Attempts per forwarded record, first try included
    #[arg(long, env = "CARGOLINK_FORWARD_MAX_RETRIES", default_value = "3")]
    pub forward_max_retries: u32,

    /// Base backoff delay between forward retries in milliseconds
    #[arg(long, env = "CARGOLINK_RETRY_BASE_DELAY_MS", default_value = "1000")]
    pub retry_base_delay_ms: u64,

    /// Concurrent in-flight forwards during fan-out
    #[arg(long, env = "CARGOLINK_FORWARD_CONCURRENCY", default_value = "16")]
    pub forward_concurrency: usize,

    /// HTTP request timeout in seconds
    #[arg(long, env = "CARGOLINK_REQUEST_TIMEOUT_SECS", default_value = "30")]
    pub request_timeout_secs: u64,

    /// Log level
    #[arg(long, env = "CARGOLINK_LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Emit logs as JSON lines instead of human-readable text
    #[arg(long, env = "CARGOLINK_LOG_JSON")]
    pub log_json: bool,

    /// Configuration file path; when given, the file is the whole
    /// configuration and other flags are ignored
    #[arg(long, env = "CARGOLINK_CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    /// Derived fields (not CLI arguments)
    #[serde(skip)]
    #[arg(skip)]
    pub drain_interval: Duration,

    #[serde(skip)]
    #[arg(skip)]
    pub replication_interval: Duration,

    #[serde(skip)]
    #[arg(skip)]
    pub request_timeout: Duration,

    #[serde(skip)]
    #[arg(skip)]
    pub retry: RetryPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            role: None,
            node_name: "cargolink".to_string(),
            db_path: PathBuf::from("cargolink.db"),
            queue_max_size: 10_000,
            drain_interval_ms: 5000,
            batch_max_size: 1000,
            replication_interval_hours: 12,
            peer_url: None,
            destination_url: None,
            forward_origin: "CAdmin".to_string(),
            forward_max_retries: 3,
            retry_base_delay_ms: 1000,
            forward_concurrency: 16,
            request_timeout_secs: 30,
            log_level: LogLevel::Info,
            log_json: false,
            config_file: None,
            drain_interval: Duration::from_millis(5000),
            replication_interval: Duration::from_secs(12 * 3600),
            request_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

impl Config {
    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let parsed = Config::parse_from(args);
        let mut config = match &parsed.config_file {
            Some(path) => {
                let content = std::fs::read_to_string(path)?;
                toml::from_str(&content)?
            }
            None => parsed,
        };
        config.post_process();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.post_process();
        config.validate()?;
        Ok(config)
    }

    fn post_process(&mut self) {
        self.drain_interval = Duration::from_millis(self.drain_interval_ms);
        self.replication_interval = Duration::from_secs(self.replication_interval_hours * 3600);
        self.request_timeout = Duration::from_secs(self.request_timeout_secs);
        self.retry = RetryPolicy {
            max_attempts: self.forward_max_retries,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            ..RetryPolicy::default()
        };
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let role = self.role.ok_or_else(|| {
            ConfigError::InvalidConfig(
                "Node role must be configured (collector or relay)".to_string(),
            )
        })?;

        match role {
            Role::Collector => {
                let peer = self.peer_url.as_deref().ok_or_else(|| {
                    ConfigError::InvalidConfig(
                        "Collector nodes require --peer-url".to_string(),
                    )
                })?;
                Url::parse(peer).map_err(|e| {
                    ConfigError::InvalidUrl(format!("Invalid peer URL '{peer}': {e}"))
                })?;
                if self.destination_url.is_some() {
                    return Err(ConfigError::InvalidConfig(
                        "--destination-url is a relay option and is not valid for a collector node"
                            .to_string(),
                    ));
                }
            }
            Role::Relay => {
                let destination = self.destination_url.as_deref().ok_or_else(|| {
                    ConfigError::InvalidConfig(
                        "Relay nodes require --destination-url".to_string(),
                    )
                })?;
                Url::parse(destination).map_err(|e| {
                    ConfigError::InvalidUrl(format!("Invalid destination URL '{destination}': {e}"))
                })?;
                if self.peer_url.is_some() {
                    return Err(ConfigError::InvalidConfig(
                        "--peer-url is a collector option and is not valid for a relay node"
                            .to_string(),
                    ));
                }
            }
        }

        if self.queue_max_size == 0 {
            return Err(ConfigError::InvalidConfig(
                "Queue max size must be greater than 0".to_string(),
            ));
        }
        if self.batch_max_size == 0 {
            return Err(ConfigError::InvalidConfig(
                "Batch max size must be greater than 0".to_string(),
            ));
        }
        if self.drain_interval_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "Drain interval must be greater than 0".to_string(),
            ));
        }
        if self.replication_interval_hours == 0 {
            return Err(ConfigError::InvalidConfig(
                "Replication interval must be greater than 0".to_string(),
            ));
        }
        if self.forward_max_retries == 0 {
            return Err(ConfigError::InvalidConfig(
                "Forward max retries must be greater than 0".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "Request timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn node_role(&self) -> Result<Role, ConfigError> {
        self.role.ok_or_else(|| {
            ConfigError::InvalidConfig("Node role is not configured".to_string())
        })
    }

    /// Parsed peer URL; only meaningful on a validated collector config.
    pub fn peer_url(&self) -> Result<Url, ConfigError> {
        let raw = self.peer_url.as_deref().ok_or_else(|| {
            ConfigError::InvalidConfig("Peer URL is not configured".to_string())
        })?;
        Url::parse(raw).map_err(|e| ConfigError::InvalidUrl(format!("Invalid peer URL '{raw}': {e}")))
    }

    /// Parsed destination URL; only meaningful on a validated relay config.
    pub fn destination_url(&self) -> Result<Url, ConfigError> {
        let raw = self.destination_url.as_deref().ok_or_else(|| {
            ConfigError::InvalidConfig("Destination URL is not configured".to_string())
        })?;
        Url::parse(raw)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid destination URL '{raw}': {e}")))
    }
}
