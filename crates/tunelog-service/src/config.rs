//! Server configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tunelog_store::{DEFAULT_MAX_POINTS, LogPaths};

/// Server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server settings.
    pub server: ServerConfig,
    /// Durable log settings.
    pub storage: StorageConfig,
    /// In-memory history settings.
    pub history: HistoryConfig,
    /// Live plot refresh settings.
    pub refresh: RefreshConfig,
}

impl Config {
    /// Load configuration from the default path.
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
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return any errors.
    ///
    /// This checks:
    /// - Server bind address is valid (host:port format)
    /// - Broadcast buffer is at least 1
    /// - Data directory and log file names are set, and the two files differ
    /// - History capacity is within bounds (1 - 100000)
    /// - Refresh interval is within bounds (10ms - 60s)
    ///
    /// # Example
    ///
    /// ```
    /// use tunelog_service::Config;
    ///
    /// let config = Config::default();
    /// config.validate().expect("Default config should be valid");
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        errors.extend(self.server.validate());
        errors.extend(self.storage.validate());
        errors.extend(self.history.validate());
        errors.extend(self.refresh.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load and validate configuration from a file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind: String,
    /// Capacity of the WebSocket broadcast channel.
    pub broadcast_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
            broadcast_buffer: 100,
        }
    }
}

impl ServerConfig {
    /// Validate server configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.bind.is_empty() {
            errors.push(ValidationError {
                field: "server.bind".to_string(),
                message: "bind address cannot be empty".to_string(),
            });
        } else {
            match self.bind.rsplit_once(':') {
                None => errors.push(ValidationError {
                    field: "server.bind".to_string(),
                    message: format!(
                        "invalid bind address '{}': expected format 'host:port'",
                        self.bind
                    ),
                }),
                Some((_, port)) => match port.parse::<u16>() {
                    Ok(0) => errors.push(ValidationError {
                        field: "server.bind".to_string(),
                        message: "port cannot be 0".to_string(),
                    }),
                    Err(_) => errors.push(ValidationError {
                        field: "server.bind".to_string(),
                        message: format!("invalid port '{}': must be a number 1-65535", port),
                    }),
                    Ok(_) => {}
                },
            }
        }

        if self.broadcast_buffer == 0 {
            errors.push(ValidationError {
                field: "server.broadcast_buffer".to_string(),
                message: "broadcast buffer must be at least 1".to_string(),
            });
        }

        errors
    }
}

/// Durable log configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding both log files.
    pub data_dir: PathBuf,
    /// Delimited text log file name.
    pub csv_file: String,
    /// Spreadsheet workbook file name.
    pub workbook_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("guitar_tuner_data"),
            csv_file: "tuning_data.csv".to_string(),
            workbook_file: "tuning_data.xlsx".to_string(),
        }
    }
}

impl StorageConfig {
    /// Locations of the two log files.
    pub fn log_paths(&self) -> LogPaths {
        LogPaths::new(&self.data_dir, &self.csv_file, &self.workbook_file)
    }

    /// Validate storage configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.data_dir.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "storage.data_dir".to_string(),
                message: "data directory cannot be empty".to_string(),
            });
        }
        if self.csv_file.is_empty() {
            errors.push(ValidationError {
                field: "storage.csv_file".to_string(),
                message: "CSV file name cannot be empty".to_string(),
            });
        }
        if self.workbook_file.is_empty() {
            errors.push(ValidationError {
                field: "storage.workbook_file".to_string(),
                message: "workbook file name cannot be empty".to_string(),
            });
        }
        if !self.csv_file.is_empty() && self.csv_file == self.workbook_file {
            errors.push(ValidationError {
                field: "storage.workbook_file".to_string(),
                message: format!(
                    "workbook file '{}' must differ from the CSV file",
                    self.workbook_file
                ),
            });
        }

        errors
    }
}

/// Maximum history capacity.
pub const MAX_HISTORY_POINTS: usize = 100_000;

/// In-memory history configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Number of recent readings kept in memory.
    pub max_points: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_points: DEFAULT_MAX_POINTS,
        }
    }
}

impl HistoryConfig {
    /// Validate history configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.max_points == 0 {
            errors.push(ValidationError {
                field: "history.max_points".to_string(),
                message: "history must keep at least 1 point".to_string(),
            });
        } else if self.max_points > MAX_HISTORY_POINTS {
            errors.push(ValidationError {
                field: "history.max_points".to_string(),
                message: format!(
                    "history size {} is too large (maximum {})",
                    self.max_points, MAX_HISTORY_POINTS
                ),
            });
        }

        errors
    }
}

/// Minimum refresh interval in milliseconds.
pub const MIN_REFRESH_INTERVAL_MS: u64 = 10;
/// Maximum refresh interval in milliseconds (1 minute).
pub const MAX_REFRESH_INTERVAL_MS: u64 = 60_000;

/// Live plot refresh configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Whether the refresh loop runs.
    pub enabled: bool,
    /// Period between refresh ticks in milliseconds.
    pub interval_ms: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 100,
        }
    }
}

impl RefreshConfig {
    /// Refresh period.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Validate refresh configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.interval_ms < MIN_REFRESH_INTERVAL_MS {
            errors.push(ValidationError {
                field: "refresh.interval_ms".to_string(),
                message: format!(
                    "refresh interval {} is too short (minimum {} ms)",
                    self.interval_ms, MIN_REFRESH_INTERVAL_MS
                ),
            });
        } else if self.interval_ms > MAX_REFRESH_INTERVAL_MS {
            errors.push(ValidationError {
                field: "refresh.interval_ms".to_string(),
                message: format!(
                    "refresh interval {} is too long (maximum {} ms)",
                    self.interval_ms, MAX_REFRESH_INTERVAL_MS
                ),
            });
        }

        errors
    }
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
    /// The field path (e.g., `server.bind` or `refresh.interval_ms`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
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
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tunelog")
        .join("server.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.server.bind, "0.0.0.0:8000");
        assert_eq!(config.server.broadcast_buffer, 100);
        assert_eq!(config.storage.data_dir, PathBuf::from("guitar_tuner_data"));
        assert_eq!(config.history.max_points, 100);
        assert!(config.refresh.enabled);
        assert_eq!(config.refresh.interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_log_paths() {
        let paths = StorageConfig::default().log_paths();
        assert_eq!(
            paths.csv_path(),
            PathBuf::from("guitar_tuner_data").join("tuning_data.csv")
        );
        assert_eq!(
            paths.workbook_path(),
            PathBuf::from("guitar_tuner_data").join("tuning_data.xlsx")
        );
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml = r#"
            [history]
            max_points = 250
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.history.max_points, 250);
        assert_eq!(config.server.bind, "0.0.0.0:8000");
        assert_eq!(config.storage.csv_file, "tuning_data.csv");
        assert_eq!(config.refresh.interval_ms, 100);
    }

    #[test]
    fn test_config_full_toml() {
        let toml = r#"
            [server]
            bind = "192.168.1.1:8888"
            broadcast_buffer = 16

            [storage]
            data_dir = "/var/lib/tunelog"
            csv_file = "strings.csv"
            workbook_file = "strings.xlsx"

            [history]
            max_points = 500

            [refresh]
            enabled = false
            interval_ms = 250
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.bind, "192.168.1.1:8888");
        assert_eq!(config.server.broadcast_buffer, 16);
        assert_eq!(config.storage.data_dir, PathBuf::from("/var/lib/tunelog"));
        assert_eq!(config.storage.csv_file, "strings.csv");
        assert_eq!(config.storage.workbook_file, "strings.xlsx");
        assert_eq!(config.history.max_points, 500);
        assert!(!config.refresh.enabled);
        assert_eq!(config.refresh.interval_ms, 250);
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("nested").join("server.toml");

        let mut config = Config::default();
        config.server.bind = "127.0.0.1:9090".to_string();
        config.history.max_points = 42;

        config.save(&config_path).unwrap();
        let loaded = Config::load(&config_path).unwrap();

        assert_eq!(loaded.server.bind, "127.0.0.1:9090");
        assert_eq!(loaded.history.max_points, 42);
        assert_eq!(loaded.storage.workbook_file, "tuning_data.xlsx");
    }

    #[test]
    fn test_config_load_nonexistent() {
        let result = Config::load("/nonexistent/path/config.toml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_config_load_invalid_toml() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("invalid.toml");
        std::fs::write(&config_path, "this is not valid { toml").unwrap();

        let result = Config::load(&config_path);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_load_validated_rejects_bad_values() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("server.toml");
        std::fs::write(&config_path, "[history]\nmax_points = 0\n").unwrap();

        let result = Config::load_validated(&config_path);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_default_config_path() {
        let path = default_config_path();
        assert!(path.ends_with("tunelog/server.toml"));
    }

    #[test]
    fn test_default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_server_bind_validation() {
        let valid = ServerConfig::default();
        assert!(valid.validate().is_empty());

        let valid_ipv6 = ServerConfig {
            bind: "[::1]:8000".to_string(),
            ..ServerConfig::default()
        };
        assert!(valid_ipv6.validate().is_empty());

        let empty = ServerConfig {
            bind: "".to_string(),
            ..ServerConfig::default()
        };
        let errors = empty.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("cannot be empty"));

        let no_port = ServerConfig {
            bind: "127.0.0.1".to_string(),
            ..ServerConfig::default()
        };
        let errors = no_port.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("host:port"));

        let port_zero = ServerConfig {
            bind: "127.0.0.1:0".to_string(),
            ..ServerConfig::default()
        };
        let errors = port_zero.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("cannot be 0"));

        let bad_port = ServerConfig {
            bind: "127.0.0.1:abc".to_string(),
            ..ServerConfig::default()
        };
        let errors = bad_port.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("must be a number"));
    }

    #[test]
    fn test_broadcast_buffer_validation() {
        let config = ServerConfig {
            broadcast_buffer: 0,
            ..ServerConfig::default()
        };
        let errors = config.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "server.broadcast_buffer");
    }

    #[test]
    fn test_storage_validation() {
        assert!(StorageConfig::default().validate().is_empty());

        let empty = StorageConfig {
            data_dir: PathBuf::new(),
            csv_file: String::new(),
            workbook_file: String::new(),
        };
        assert_eq!(empty.validate().len(), 3);

        let same_file = StorageConfig {
            workbook_file: "tuning_data.csv".to_string(),
            ..StorageConfig::default()
        };
        let errors = same_file.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("must differ"));
    }

    #[test]
    fn test_history_validation() {
        assert!(HistoryConfig { max_points: 1 }.validate().is_empty());
        assert!(
            HistoryConfig {
                max_points: MAX_HISTORY_POINTS
            }
            .validate()
            .is_empty()
        );

        let zero = HistoryConfig { max_points: 0 }.validate();
        assert!(zero[0].message.contains("at least 1"));

        let huge = HistoryConfig {
            max_points: MAX_HISTORY_POINTS + 1,
        }
        .validate();
        assert!(huge[0].message.contains("too large"));
    }

    #[test]
    fn test_refresh_validation() {
        let short = RefreshConfig {
            enabled: true,
            interval_ms: 5,
        };
        assert!(short.validate()[0].message.contains("too short"));

        let long = RefreshConfig {
            enabled: true,
            interval_ms: 120_000,
        };
        assert!(long.validate()[0].message.contains("too long"));

        let dashboard_rate = RefreshConfig {
            enabled: true,
            interval_ms: 1000,
        };
        assert!(dashboard_rate.validate().is_empty());
    }

    #[test]
    fn test_config_validation_error_display() {
        let mut config = Config::default();
        config.server.bind = "127.0.0.1:0".to_string();
        config.refresh.interval_ms = 1;

        let display = config.validate().unwrap_err().to_string();
        assert!(display.contains("server.bind"));
        assert!(display.contains("refresh.interval_ms"));
    }
}
