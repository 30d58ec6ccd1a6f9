//! Configuration management for the kabu tools.
//!
//! All tools share a configuration file at `~/.kabu/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (KABU_* prefix)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `KABU_SCREENER_URL` → screener.base_url
//! - `KABU_SCREENER_TIMEOUT_SECS` → screener.timeout_secs
//! - `KABU_SNAPSHOT_PATH` → snapshot.path
//! - `KABU_LOG_LEVEL` → observability.log_level
//! - `KABU_LOG_FORMAT` → observability.log_format

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result, ResultExt};

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".kabu"),
        |dirs| dirs.home_dir().join(".kabu"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Screener Configuration
// ============================================================================

/// Connection settings for the backend screening service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenerConfig {
    /// Base URL of the screening backend (chart and analysis views live here too)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout for a screening query
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_timeout_secs() -> u64 {
    60 // full-market scans with many joins are slow
}

// ============================================================================
// Snapshot Configuration
// ============================================================================

/// Where the analysis snapshot is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// SQLite file holding the current snapshot. `~` is expanded.
    #[serde(default = "default_snapshot_path")]
    pub path: String,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            path: default_snapshot_path(),
        }
    }
}

impl SnapshotConfig {
    /// Resolved snapshot path with `~` expanded.
    pub fn resolved_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.path).into_owned())
    }
}

fn default_snapshot_path() -> String {
    "~/.kabu/snapshot.db".to_string()
}

// ============================================================================
// Observability Configuration
// ============================================================================

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Additional module targets to hold at `warn`.
    #[serde(default)]
    pub excluded_targets: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            excluded_targets: Vec::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration shared by the kabu tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub screener: ScreenerConfig,

    #[serde(default)]
    pub snapshot: SnapshotConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// A missing file is not an error; defaults are used instead.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .context(format!("Failed to parse config from {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Apply `KABU_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("KABU_SCREENER_URL") {
            self.screener.base_url = url;
        }
        if let Some(secs) = lookup("KABU_SCREENER_TIMEOUT_SECS") {
            match secs.parse() {
                Ok(s) => self.screener.timeout_secs = s,
                Err(_) => tracing::warn!(value = %secs, "Ignoring invalid KABU_SCREENER_TIMEOUT_SECS"),
            }
        }
        if let Some(path) = lookup("KABU_SNAPSHOT_PATH") {
            self.snapshot.path = path;
        }
        if let Some(level) = lookup("KABU_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = lookup("KABU_LOG_FORMAT") {
            self.observability.log_format = format;
        }
    }

    /// Check values that serde defaults cannot guard.
    pub fn validate(&self) -> Result<()> {
        let url = self.screener.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "screener.base_url must be an http(s) URL, got {:?}",
                self.screener.base_url
            )));
        }
        if self.screener.timeout_secs == 0 {
            return Err(Error::Config("screener.timeout_secs must be positive".into()));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
