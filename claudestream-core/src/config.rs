//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/claudestream/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/claudestream/` (~/.config/claudestream/)
//! - Data: `$XDG_DATA_HOME/claudestream/` (~/.local/share/claudestream/)
//! - State/Logs: `$XDG_STATE_HOME/claudestream/` (~/.local/state/claudestream/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// `$var` if set, else `~/<fallback>`.
fn xdg_base(var: &str, fallback: &str) -> PathBuf {
    std::env::var_os(var)
        .map(PathBuf::from)
        .unwrap_or_else(|| home_dir().join(fallback))
}

const XDG_DIRS: [(&str, &str); 3] = [
    ("XDG_CONFIG_HOME", ".config"),
    ("XDG_DATA_HOME", ".local/share"),
    ("XDG_STATE_HOME", ".local/state"),
];

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Stream pipeline configuration
    #[serde(default)]
    pub stream: StreamConfig,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,

    /// Also print warnings and errors to stderr
    #[serde(default)]
    pub stderr: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
            stderr: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

/// Session pipeline configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StreamConfig {
    /// Capacity of the ordered update channel towards the display side.
    ///
    /// A full channel makes the worker wait; updates are never dropped.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Append a visible error entry for lines that fail to decode
    #[serde(default = "default_report_decode_errors")]
    pub report_decode_errors: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            report_decode_errors: default_report_decode_errors(),
        }
    }
}

impl StreamConfig {
    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.channel_capacity == 0 {
            return Err(Error::Config(
                "stream.channel_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_channel_capacity() -> usize {
    1024
}

fn default_report_decode_errors() -> bool {
    true
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate all sections
    pub fn validate(&self) -> Result<()> {
        self.stream.validate()
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/claudestream/config.toml` (~/.config/claudestream/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_base("XDG_CONFIG_HOME", ".config").join("claudestream").join("config.toml")
    }

    /// Returns the data directory path
    ///
    /// `$XDG_DATA_HOME/claudestream/` (~/.local/share/claudestream/)
    pub fn data_dir() -> PathBuf {
        xdg_base("XDG_DATA_HOME", ".local/share").join("claudestream")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/claudestream/` (~/.local/state/claudestream/)
    pub fn state_dir() -> PathBuf {
        xdg_base("XDG_STATE_HOME", ".local/state").join("claudestream")
    }

    /// Returns the directory session summaries are written to
    ///
    /// `$XDG_DATA_HOME/claudestream/sessions/`
    pub fn sessions_dir() -> PathBuf {
        Self::data_dir().join("sessions")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/claudestream/claudestream.log` (~/.local/state/claudestream/claudestream.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("claudestream.log")
    }

    /// Ensure XDG base directory environment variables are set.
    ///
    /// This is mainly for CLI binaries that want explicit, stable path behavior
    /// before invoking other components that read these env vars.
    pub fn ensure_xdg_env() {
        let home = home_dir();
        for (var, fallback) in XDG_DIRS {
            if std::env::var_os(var).is_none() {
                std::env::set_var(var, home.join(fallback));
            }
        }
    }
}
