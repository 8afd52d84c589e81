//! Server configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::trends::{MetricThresholds, TrendConfig};

/// Server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP listener settings.
    pub server: ServerConfig,
    /// Database settings.
    pub storage: StorageConfig,
    /// Ingestion buffer settings.
    pub buffer: BufferConfig,
    /// Trend computation settings.
    pub trends: TrendConfig,
}

impl Config {
    /// Load configuration from the default path, falling back to defaults
    /// when no file exists there.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save configuration to a file, creating parent directories.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Validate the configuration, collecting every problem found.
    ///
    /// This checks:
    /// - Server bind address is `host:port` with a non-zero port
    /// - Storage path is not empty
    /// - Flush interval is between 1 second and 1 hour
    /// - Trend look-back is longer than its search window, which is non-zero
    /// - Trend thresholds are positive, with slight below significant
    ///
    /// # Example
    ///
    /// ```
    /// use ruuvi_service::Config;
    ///
    /// let config = Config::default();
    /// config.validate().expect("Default config should be valid");
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = self.server.validate();
        errors.extend(self.storage.validate());
        errors.extend(self.buffer.validate());
        errors.extend(validate_trends(&self.trends));

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1:3001").
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3001".to_string(),
        }
    }
}

impl ServerConfig {
    /// Validate server configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        const FIELD: &str = "server.bind";

        if self.bind.is_empty() {
            return vec![ValidationError::new(FIELD, "bind address cannot be empty")];
        }

        let Some((_, port)) = self.bind.rsplit_once(':') else {
            return vec![ValidationError::new(
                FIELD,
                format!(
                    "invalid bind address '{}': expected format 'host:port'",
                    self.bind
                ),
            )];
        };

        match port.parse::<u16>() {
            Ok(0) => vec![ValidationError::new(FIELD, "port cannot be 0")],
            Ok(_) => Vec::new(),
            Err(_) => vec![ValidationError::new(
                FIELD,
                format!("invalid port '{}': must be a number 1-65535", port),
            )],
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file path.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: ruuvi_store::default_db_path(),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        if self.path.as_os_str().is_empty() {
            vec![ValidationError::new(
                "storage.path",
                "database path cannot be empty",
            )]
        } else {
            Vec::new()
        }
    }
}

/// Minimum flush interval in seconds.
pub const MIN_FLUSH_INTERVAL: u64 = 1;
/// Maximum flush interval in seconds (1 hour).
pub const MAX_FLUSH_INTERVAL: u64 = 3600;

/// Ingestion buffer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Seconds between periodic flushes.
    pub flush_interval_secs: u64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            flush_interval_secs: 60,
        }
    }
}

impl BufferConfig {
    /// Validate buffer configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let field = "buffer.flush_interval_secs";
        let secs = self.flush_interval_secs;

        if secs < MIN_FLUSH_INTERVAL {
            vec![ValidationError::new(
                field,
                format!(
                    "flush interval {} is too short (minimum {} second)",
                    secs, MIN_FLUSH_INTERVAL
                ),
            )]
        } else if secs > MAX_FLUSH_INTERVAL {
            vec![ValidationError::new(
                field,
                format!(
                    "flush interval {} is too long (maximum {} seconds / 1 hour)",
                    secs, MAX_FLUSH_INTERVAL
                ),
            )]
        } else {
            Vec::new()
        }
    }
}

fn validate_trends(trends: &TrendConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if trends.window_minutes == 0 {
        errors.push(ValidationError::new(
            "trends.window_minutes",
            "search window must be at least 1 minute",
        ));
    }
    if trends.lookback_minutes <= trends.window_minutes {
        errors.push(ValidationError::new(
            "trends.lookback_minutes",
            format!(
                "look-back {} must be longer than the search window ({} minutes)",
                trends.lookback_minutes, trends.window_minutes
            ),
        ));
    }

    errors.extend(validate_thresholds("trends.temperature", &trends.temperature));
    errors.extend(validate_thresholds("trends.humidity", &trends.humidity));
    errors
}

fn validate_thresholds(prefix: &str, thresholds: &MetricThresholds) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if thresholds.slight.is_nan() || thresholds.slight <= 0.0 {
        errors.push(ValidationError::new(
            format!("{}.slight", prefix),
            format!("threshold {} must be positive", thresholds.slight),
        ));
    }
    if thresholds.significant.is_nan() || thresholds.significant <= thresholds.slight {
        errors.push(ValidationError::new(
            format!("{}.significant", prefix),
            format!(
                "threshold {} must be greater than slight threshold {}",
                thresholds.significant, thresholds.slight
            ),
        ));
    }

    errors
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path (e.g., `server.bind` or `trends.humidity.slight`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
///
/// - Linux: `~/.config/ruuvi/server.toml`
/// - macOS: `~/Library/Application Support/ruuvi/server.toml`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ruuvi")
        .join("server.toml")
}
