//! Configuration management for the R-Factor scanner.
//!
//! The scanner reads a JSON configuration from `~/.rfactor/config.json`,
//! optionally merged with `~/.rfactor/scanner.json` (see [`crate::config_loader`]).
//!
//! # Configuration Priority
//!
//! 1. Environment variables (RFACTOR_* prefix)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `RFACTOR_PORT` → scanner.port
//! - `RFACTOR_BIND_ADDRESS` → network.bind
//! - `RFACTOR_LOG_LEVEL` → observability.log_level
//! - `RFACTOR_LOG_FORMAT` → observability.log_format
//! - `RFACTOR_CACHE_TTL_SECS` → scanner.cache_ttl_secs
//! - `RFACTOR_REQUEST_DELAY_MS` → scanner.request_delay_ms
//! - `RFACTOR_PROVIDER_URL` → scanner.provider_base_url

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config_loader::load_modular_config;

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".rfactor"),
        |dirs| dirs.home_dir().join(".rfactor"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Network Configuration
// ============================================================================

/// Global network configuration.
///
/// Default is `127.0.0.1` (local only). Set to `0.0.0.0` to allow remote access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Bind address for the HTTP service
    #[serde(default = "default_bind_address")]
    pub bind: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind: default_bind_address(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".into()
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

    /// Additional module targets to exclude from logging.
    ///
    /// These modules will be set to `warn` level to reduce noise.
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
// Scanner Configuration
// ============================================================================

/// Named scan presets that can be selected without listing symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanModeName {
    /// Three reference symbols used to cross-check the formula
    Test,
    /// The first 50 symbols of the universe
    #[default]
    Quick,
    /// The whole universe
    Full,
}

/// Scanner service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// HTTP port of the scanner service
    #[serde(default = "default_scanner_port")]
    pub port: u16,

    /// Base URL of the chart provider
    #[serde(default = "default_provider_base_url")]
    pub provider_base_url: String,

    /// Exchange suffix appended to symbols for the provider (e.g. ".NS")
    #[serde(default = "default_market_suffix")]
    pub market_suffix: String,

    /// History window requested from the provider
    #[serde(default = "default_history_range")]
    pub history_range: String,

    /// Bar interval requested from the provider
    #[serde(default = "default_bar_interval")]
    pub bar_interval: String,

    /// Provider request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Snapshot cache time-to-live in seconds
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Minimum spacing between consecutive provider calls in milliseconds
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    /// Number of symbols fetched concurrently during a scan
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Minimum number of bars for a usable history
    #[serde(default = "default_min_bars")]
    pub min_bars: usize,

    /// ATR lookback period
    #[serde(default = "default_atr_period")]
    pub atr_period: usize,

    /// Trailing window for the average volume baseline
    #[serde(default = "default_volume_window")]
    pub volume_window: usize,

    /// Re-run the default scan every N seconds (disabled when unset)
    #[serde(default)]
    pub auto_refresh_secs: Option<u64>,

    /// Scan preset used by auto-refresh and by scan requests without symbols
    #[serde(default)]
    pub default_mode: ScanModeName,

    /// Replaces the built-in symbol universe when set
    #[serde(default)]
    pub universe: Option<Vec<String>>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            port: default_scanner_port(),
            provider_base_url: default_provider_base_url(),
            market_suffix: default_market_suffix(),
            history_range: default_history_range(),
            bar_interval: default_bar_interval(),
            request_timeout_secs: default_request_timeout_secs(),
            cache_ttl_secs: default_cache_ttl_secs(),
            request_delay_ms: default_request_delay_ms(),
            max_concurrency: default_max_concurrency(),
            min_bars: default_min_bars(),
            atr_period: default_atr_period(),
            volume_window: default_volume_window(),
            auto_refresh_secs: None,
            default_mode: ScanModeName::default(),
            universe: None,
        }
    }
}

fn default_scanner_port() -> u16 {
    4440
}

fn default_provider_base_url() -> String {
    "https://query1.finance.yahoo.com".into()
}

fn default_market_suffix() -> String {
    ".NS".into()
}

fn default_history_range() -> String {
    "1mo".into()
}

fn default_bar_interval() -> String {
    "1d".into()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_cache_ttl_secs() -> u64 {
    60
}

fn default_request_delay_ms() -> u64 {
    100
}

fn default_max_concurrency() -> usize {
    1
}

fn default_min_bars() -> usize {
    14
}

fn default_atr_period() -> usize {
    14
}

fn default_volume_window() -> usize {
    20
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// JSON Schema reference
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Network configuration (bind address)
    #[serde(default)]
    pub network: NetworkConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Scanner configuration
    #[serde(default)]
    pub scanner: ScannerConfig,
}

impl Config {
    /// Load configuration from the default directory.
    ///
    /// Missing files are not an error; defaults are used instead.
    pub fn load() -> Result<Self> {
        Self::load_dir(&config_dir())
    }

    /// Load configuration from a specific directory (`config.json` + `scanner.json`).
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let value = load_modular_config(Some(dir.to_path_buf()))?;
        if value.as_object().map_or(true, |o| o.is_empty()) {
            tracing::info!(dir = %dir.display(), "Config files not found, using defaults");
        }

        serde_json::from_value(value)
            .with_context(|| format!("Failed to parse config from {}", dir.display()))
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable source.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("RFACTOR_PORT").and_then(|v| v.parse().ok()) {
            self.scanner.port = port;
        }

        if let Some(bind) = lookup("RFACTOR_BIND_ADDRESS") {
            self.network.bind = bind;
        }

        if let Some(level) = lookup("RFACTOR_LOG_LEVEL") {
            self.observability.log_level = level;
        }

        if let Some(format) = lookup("RFACTOR_LOG_FORMAT") {
            self.observability.log_format = format;
        }

        if let Some(ttl) = lookup("RFACTOR_CACHE_TTL_SECS").and_then(|v| v.parse().ok()) {
            self.scanner.cache_ttl_secs = ttl;
        }

        if let Some(delay) = lookup("RFACTOR_REQUEST_DELAY_MS").and_then(|v| v.parse().ok()) {
            self.scanner.request_delay_ms = delay;
        }

        if let Some(url) = lookup("RFACTOR_PROVIDER_URL") {
            self.scanner.provider_base_url = url;
        }
    }

    /// Socket address string the HTTP service binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.network.bind, self.scanner.port)
    }
}

// ============================================================================
// Tests
// ============================================================================
