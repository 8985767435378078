//! spywatch configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Project-local config file name
pub const LOCAL_CONFIG_FILE: &str = ".spywatch.yml";

/// Main spywatch configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Server connection settings
    pub server: ServerConfig,

    /// Event watcher settings
    pub watcher: WatcherConfig,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        for candidate in Self::fallback_paths() {
            if candidate.exists() {
                match Self::load_from_file(&candidate) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", candidate.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is set up
    ///
    /// Errors are swallowed; the full load reports them once logging works.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let paths = match config_path {
            Some(path) => vec![path.clone()],
            None => Self::fallback_paths(),
        };
        paths
            .iter()
            .filter(|p| p.exists())
            .find_map(|p| Self::load_from_file(p).ok())
            .and_then(|config| config.log_level)
    }

    /// `./.spywatch.yml`, then `~/.config/spywatch/spywatch.yml`
    fn fallback_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("spywatch").join("spywatch.yml"));
        }
        paths
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Server connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the server, e.g. `http://192.168.1.10:8000`
    pub url: String,

    /// Username for HTTP basic auth; anonymous when unset
    pub username: Option<String>,

    /// Environment variable containing the password
    #[serde(rename = "password-env")]
    pub password_env: String,

    /// Verify the server's TLS certificate
    #[serde(rename = "verify-ssl")]
    pub verify_ssl: bool,

    /// Timeout for the state refresh request in milliseconds
    #[serde(rename = "refresh-timeout-ms")]
    pub refresh_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8000".to_string(),
            username: None,
            password_env: "SECURITYSPY_PASSWORD".to_string(),
            verify_ssl: true,
            refresh_timeout_ms: 10_000,
        }
    }
}

impl ServerConfig {
    /// Password from the configured environment variable, if set
    pub fn get_password(&self) -> Option<String> {
        std::env::var(&self.password_env).ok()
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh_timeout_ms)
    }
}

/// Event watcher settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Delay between reconnect attempts in milliseconds
    #[serde(rename = "retry-interval-ms")]
    pub retry_interval_ms: u64,

    /// Interval between state refreshes in milliseconds; 0 disables refresh
    #[serde(rename = "refresh-interval-ms")]
    pub refresh_interval_ms: u64,

    /// Capacity of the internal event queue
    #[serde(rename = "queue-capacity")]
    pub queue_capacity: usize,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            retry_interval_ms: 10_000,
            refresh_interval_ms: 0,
            queue_capacity: 1000,
        }
    }
}

impl WatcherConfig {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }
}
