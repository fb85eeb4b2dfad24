//! Configuration management for the analyst services.
//!
//! The CLI and the dashboard share one configuration file at `~/.analyst/config.json`.
//! A missing file means all defaults.
//!
//! # Configuration Priority
//!
//! 1. Environment variables
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `FMP_API_KEY` → fmp.api_key
//! - `ANALYST_HOST` → server.host
//! - `ANALYST_PORT` → server.port
//! - `ANALYST_DB_PATH` → storage.db_path
//! - `ANALYST_LOG_LEVEL` → observability.log_level
//! - `ANALYST_LOG_FORMAT` → observability.log_format

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".analyst"),
        |dirs| dirs.home_dir().join(".analyst"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub fmp: FmpConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub screener: ScreenerConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default path, falling back to defaults.
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
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration (explicit path or default) with environment variable overrides.
    pub fn load_with_env(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => Self::load()?,
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("FMP_API_KEY").filter(|k| !k.is_empty()) {
            self.fmp.api_key = Some(key);
        }
        if let Some(host) = lookup("ANALYST_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("ANALYST_PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(path) = lookup("ANALYST_DB_PATH") {
            self.storage.db_path = Some(PathBuf::from(path));
        }
        if let Some(level) = lookup("ANALYST_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = lookup("ANALYST_LOG_FORMAT") {
            self.observability.log_format = format;
        }
    }

    /// Save configuration to the default path.
    pub fn save(&self) -> Result<()> {
        let dir = config_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create config directory {}", dir.display()))?;
        }

        let path = config_path();
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }
}

// ============================================================================
// Server Configuration
// ============================================================================

/// Dashboard HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address. Default "127.0.0.1" (local only).
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

// ============================================================================
// Market Data API Configuration
// ============================================================================

/// Financial Modeling Prep API configuration.
///
/// The request budget drives the fetch batch size:
/// `(requests_per_minute - rate_limit_buffer) / requests_per_symbol`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FmpConfig {
    /// API base URL, with trailing slash.
    #[serde(default = "default_fmp_base_url")]
    pub base_url: String,

    /// API key. Usually supplied through `FMP_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Requests allowed per minute by the subscription plan.
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,

    /// Requests issued for one symbol (statements + prices).
    #[serde(default = "default_requests_per_symbol")]
    pub requests_per_symbol: u32,

    /// Requests per minute held back from the budget.
    #[serde(default = "default_rate_limit_buffer")]
    pub rate_limit_buffer: u32,

    /// Pause between symbol submissions within a batch.
    #[serde(default = "default_delay_per_symbol_ms")]
    pub delay_per_symbol_ms: u64,

    /// Pause between batches.
    #[serde(default = "default_delay_per_batch_secs")]
    pub delay_per_batch_secs: u64,

    /// Retries on HTTP 429.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff between retries, doubled on each attempt.
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: f64,

    /// Request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_fmp_base_url() -> String {
    "https://financialmodelingprep.com/api/v3/".into()
}

fn default_requests_per_minute() -> u32 {
    300
}

fn default_requests_per_symbol() -> u32 {
    2
}

fn default_rate_limit_buffer() -> u32 {
    10
}

fn default_delay_per_symbol_ms() -> u64 {
    200
}

fn default_delay_per_batch_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_secs() -> f64 {
    1.0
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for FmpConfig {
    fn default() -> Self {
        Self {
            base_url: default_fmp_base_url(),
            api_key: None,
            requests_per_minute: default_requests_per_minute(),
            requests_per_symbol: default_requests_per_symbol(),
            rate_limit_buffer: default_rate_limit_buffer(),
            delay_per_symbol_ms: default_delay_per_symbol_ms(),
            delay_per_batch_secs: default_delay_per_batch_secs(),
            max_retries: default_max_retries(),
            backoff_secs: default_backoff_secs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

// ============================================================================
// Storage Configuration
// ============================================================================

/// Document store configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path. Defaults to `~/.analyst/analyst.db`.
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

impl StorageConfig {
    /// Effective database path.
    pub fn db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| config_dir().join("analyst.db"))
    }
}

// ============================================================================
// Screener Configuration
// ============================================================================

/// Defaults for the fetch and screener tasks and the chart endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenerConfig {
    /// Symbols trading below this price are not fetched.
    #[serde(default = "default_min_price")]
    pub min_price: f64,

    /// Days of daily prices fetched per symbol.
    #[serde(default = "default_price_history_days")]
    pub price_history_days: i64,

    /// Quarters of statements shown on the dashboard; twice as many are fetched
    /// so year-over-year changes are defined for each of them.
    #[serde(default = "default_financial_quarters")]
    pub financial_quarters: u32,

    /// Symbols evaluated concurrently by a screener task.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Days shown by the chart endpoint when the request does not say.
    #[serde(default = "default_chart_days")]
    pub chart_days: usize,

    /// Smoothing threshold used for chart pivots.
    #[serde(default = "default_chart_threshold_pct")]
    pub chart_threshold_pct: f64,
}

fn default_min_price() -> f64 {
    20.0
}

fn default_price_history_days() -> i64 {
    365
}

fn default_financial_quarters() -> u32 {
    4
}

fn default_concurrency() -> usize {
    16
}

fn default_chart_days() -> usize {
    100
}

fn default_chart_threshold_pct() -> f64 {
    0.05
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            min_price: default_min_price(),
            price_history_days: default_price_history_days(),
            financial_quarters: default_financial_quarters(),
            concurrency: default_concurrency(),
            chart_days: default_chart_days(),
            chart_threshold_pct: default_chart_threshold_pct(),
        }
    }
}

// ============================================================================
// Observability Configuration
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Additional module targets forced to `warn`.
    #[serde(default)]
    pub excluded_targets: Vec<String>,
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.fmp.requests_per_minute, 300);
        assert_eq!(config.fmp.max_retries, 3);
        assert_eq!(config.screener.min_price, 20.0);
        assert_eq!(config.screener.price_history_days, 365);
        assert!(config.fmp.api_key.is_none());
    }

    #[test]
    fn test_load_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"server": {"port": 8080}, "fmp": {"api_key": "abc"}, "observability": {"level": "debug"}}"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.fmp.api_key.as_deref(), Some("abc"));
        assert_eq!(config.fmp.requests_per_symbol, 2);
        assert_eq!(config.observability.log_level, "debug");
    }

    #[test]
    fn test_load_invalid_json_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("FMP_API_KEY", "secret"),
            ("ANALYST_PORT", "9000"),
            ("ANALYST_DB_PATH", "/tmp/a.db"),
            ("ANALYST_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.fmp.api_key.as_deref(), Some("secret"));
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.storage.db_path(), PathBuf::from("/tmp/a.db"));
        assert_eq!(config.observability.log_format, "json");
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn test_unparseable_port_override_is_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|key| (key == "ANALYST_PORT").then(|| "not-a-port".to_string()));
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn test_default_db_path_under_config_dir() {
        let storage = StorageConfig::default();
        assert!(storage.db_path().ends_with("analyst.db"));
    }
}
