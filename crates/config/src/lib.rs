//! Siphon Configuration
//!
//! TOML-based configuration loading with sensible defaults, resolved once at
//! startup and immutable for the process lifetime. The only required value
//! is the target stream name.
//!
//! # Example Minimal Config
//!
//! ```toml
//! [stream]
//! name = "syslog-events"
//! ```
//!
//! # Environment Overrides
//!
//! Deployment-critical keys can be overridden from the environment:
//! `SIPHON_STREAM_NAME`, `SIPHON_STREAM_KIND`, `SIPHON_PORT`,
//! `SIPHON_LOG_LEVEL`, `SIPHON_PROFILE`.

mod error;
mod logging;

use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

pub use error::{ConfigError, Result};
pub use logging::{LogConfig, LogFormat, LogLevel};

/// Main configuration structure
///
/// All sections are optional with sensible defaults except `stream.name`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Target stream and sink selection
    pub stream: StreamConfig,

    /// Listener settings
    pub server: ServerConfig,

    /// Batching and delivery settings
    pub publish: PublishConfig,

    /// Logging settings
    pub log: LogConfig,
}

/// Which sink implementation to bind at startup
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    /// Write records to stdout (default; development)
    #[default]
    Stdout,
    /// Discard records (benchmarking)
    Null,
}

/// Target stream configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Name of the stream/delivery target to publish to (required)
    pub name: String,

    /// Sink implementation to bind
    /// Default: stdout
    pub kind: StreamKind,

    /// Optional credentials profile, exported to the environment for the
    /// sink client to pick up
    pub profile: Option<String>,
}

/// Listener configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    /// Default: "0.0.0.0"
    pub address: String,

    /// Listen port for both TCP and UDP
    /// Default: 514 (privileged - may need root)
    pub port: u16,

    /// Idle timeout for TCP connections, seconds (0 = no timeout)
    /// Default: 900 (15 minutes)
    pub connection_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".into(),
            port: 514,
            connection_timeout_secs: 900,
        }
    }
}

impl ServerConfig {
    /// Get the socket address to bind to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    /// Idle timeout as a Duration, `None` when disabled
    pub fn connection_timeout(&self) -> Option<Duration> {
        (self.connection_timeout_secs > 0)
            .then(|| Duration::from_secs(self.connection_timeout_secs))
    }
}

/// Batching and delivery configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Queue length that triggers a flush
    /// Default: 100
    pub size_trigger: usize,

    /// Timer flush interval, milliseconds
    /// Default: 5000
    pub interval_ms: u64,

    /// Additional delivery attempts after the first
    /// Default: 4
    pub retry_attempts: u32,

    /// Base backoff unit, milliseconds (attempt n waits 2^n * base + jitter)
    /// Default: 150
    pub backoff_base_ms: u64,

    /// Maximum records per sink request
    /// Default: 500
    pub max_chunk_records: usize,

    /// Maximum cumulative serialized bytes per sink request
    /// Default: 4 MiB
    pub max_chunk_bytes: usize,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            size_trigger: 100,
            interval_ms: 5000,
            retry_attempts: 4,
            backoff_base_ms: 150,
            max_chunk_records: 500,
            max_chunk_bytes: 4 * 1024 * 1024,
        }
    }
}

impl PublishConfig {
    /// Timer flush interval as a Duration
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::IoError {
            path: path.display().to_string(),
            source,
        })?;
        contents.parse()
    }

    /// Apply environment-variable overrides for deployment-critical keys
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(name) = std::env::var("SIPHON_STREAM_NAME") {
            self.stream.name = name;
        }

        if let Ok(kind) = std::env::var("SIPHON_STREAM_KIND") {
            self.stream.kind = match kind.to_ascii_lowercase().as_str() {
                "stdout" => StreamKind::Stdout,
                "null" => StreamKind::Null,
                other => {
                    return Err(ConfigError::invalid_value(
                        "stream.kind",
                        format!("'{}' is not one of: stdout, null", other),
                    ));
                }
            };
        }

        if let Ok(port) = std::env::var("SIPHON_PORT") {
            self.server.port = port.parse().map_err(|_| {
                ConfigError::invalid_value("server.port", format!("'{}' is not a port", port))
            })?;
        }

        if let Ok(level) = std::env::var("SIPHON_LOG_LEVEL") {
            self.log.level = LogLevel::parse(&level).ok_or_else(|| {
                ConfigError::invalid_value("log.level", format!("unknown level '{}'", level))
            })?;
        }

        if let Ok(profile) = std::env::var("SIPHON_PROFILE") {
            self.stream.profile = Some(profile);
        }

        Ok(())
    }

    /// Validate the resolved configuration
    pub fn validate(&self) -> Result<()> {
        if self.stream.name.trim().is_empty() {
            return Err(ConfigError::missing_field(
                "stream.name",
                "set it in the config file or the SIPHON_STREAM_NAME environment variable",
            ));
        }

        if self.publish.size_trigger == 0 {
            return Err(ConfigError::invalid_value(
                "publish.size_trigger",
                "must be at least 1",
            ));
        }

        if self.publish.max_chunk_records == 0 || self.publish.max_chunk_bytes == 0 {
            return Err(ConfigError::invalid_value(
                "publish.max_chunk_records",
                "chunk limits must be at least 1",
            ));
        }

        Ok(())
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }
}
