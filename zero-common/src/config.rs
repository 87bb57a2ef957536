//! Configuration management for Zero services.
//!
//! All Zero services share a unified configuration file at `~/.codecoder/config.json`,
//! optionally split into modular files (see [`crate::config_loader`]).
//!
//! # Configuration Priority
//!
//! 1. Environment variables (ZERO_* prefix, credential fallbacks)
//! 2. Modular files (`secrets.json`, `sentiment.json`)
//! 3. `config.json`
//! 4. Default values
//!
//! # Environment Variable Mapping
//!
//! ## Service
//! - `ZERO_SENTIMENT_PORT` → services.sentiment.port
//! - `ZERO_BIND_ADDRESS` → network.bind
//! - `ZERO_LOG_LEVEL` → observability.log_level
//! - `ZERO_LOG_FORMAT` → observability.log_format
//! - `ZERO_SENTIMENT_INTERVAL` → sentiment.interval_secs (e.g. "30m")
//! - `ZERO_SENTIMENT_RECOVERY` → sentiment.recovery_backoff_secs (e.g. "5m")
//!
//! ## Credentials (→ secrets.external.*)
//! - `NEWS_API_KEY` → secrets.external.news_api
//! - `HUGGINGFACE_TOKEN` → secrets.external.huggingface
//! - `SUPABASE_URL` → secrets.external.supabase_url
//! - `SUPABASE_KEY` → secrets.external.supabase_key

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::util::parse_duration_secs;

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new()
        .map_or_else(
            || PathBuf::from(".codecoder"),
            |dirs| dirs.home_dir().join(".codecoder"),
        )
}

// ============================================================================
// Network Configuration (Global bind address)
// ============================================================================

/// Global network configuration.
///
/// Controls the bind address for all services. Default is `127.0.0.1` (local only).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Bind address for all services.
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
// Services Port Configuration
// ============================================================================

/// Service port configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServicesConfig {
    /// Sentiment service
    #[serde(default)]
    pub sentiment: ServicePortConfig,
}

/// Individual service port configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServicePortConfig {
    /// Port number for the service
    #[serde(default)]
    pub port: Option<u16>,
}

// ============================================================================
// Secrets Configuration
// ============================================================================

/// Grouped secrets configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SecretsConfig {
    /// External service credentials
    #[serde(default)]
    pub external: ExternalSecretsConfig,
}

/// External service credentials.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExternalSecretsConfig {
    /// NewsAPI key (https://newsapi.org)
    #[serde(default)]
    pub news_api: Option<String>,
    /// Hugging Face access token for the inference endpoint
    #[serde(default)]
    pub huggingface: Option<String>,
    /// Supabase project URL
    #[serde(default)]
    pub supabase_url: Option<String>,
    /// Supabase service key
    #[serde(default)]
    pub supabase_key: Option<String>,
}

// ============================================================================
// Observability
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

    /// Additional module targets to force to `warn`.
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
// Sentiment Configuration
// ============================================================================

/// A tracked ticker: symbol plus the company name used in the news query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerEntry {
    /// Stock symbol, e.g. "AAPL"
    pub symbol: String,
    /// Company display name, e.g. "Apple"
    pub company: String,
}

impl TickerEntry {
    pub fn new(symbol: impl Into<String>, company: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            company: company.into(),
        }
    }
}

/// News source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsSourceConfig {
    /// NewsAPI base URL
    #[serde(default = "default_news_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for NewsSourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_news_base_url(),
            timeout_secs: default_http_timeout_secs(),
        }
    }
}

fn default_news_base_url() -> String {
    "https://newsapi.org".into()
}

fn default_http_timeout_secs() -> u64 {
    30
}

/// Text classifier settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Inference endpoint base URL
    #[serde(default = "default_classifier_base_url")]
    pub base_url: String,

    /// Model identifier
    #[serde(default = "default_classifier_model")]
    pub model: String,

    /// Maximum input length handed to the model
    #[serde(default = "default_max_length")]
    pub max_length: usize,

    /// Request timeout in seconds
    #[serde(default = "default_classifier_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            base_url: default_classifier_base_url(),
            model: default_classifier_model(),
            max_length: default_max_length(),
            timeout_secs: default_classifier_timeout_secs(),
        }
    }
}

fn default_classifier_base_url() -> String {
    "https://api-inference.huggingface.co".into()
}

fn default_classifier_model() -> String {
    "ProsusAI/finbert".into()
}

fn default_max_length() -> usize {
    512
}

fn default_classifier_timeout_secs() -> u64 {
    60
}

/// Storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentStorageConfig {
    /// Backend type (sqlite, supabase)
    #[serde(default = "default_storage_backend")]
    pub backend: String,

    /// SQLite database path (sqlite backend only)
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

impl Default for SentimentStorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            db_path: default_db_path(),
        }
    }
}

fn default_storage_backend() -> String {
    "sqlite".into()
}

fn default_db_path() -> PathBuf {
    config_dir().join("sentiment.db")
}

/// Sentiment service configuration.
///
/// ```json
/// {
///   "sentiment": {
///     "tickers": [{ "symbol": "AAPL", "company": "Apple" }],
///     "interval_secs": 1800,
///     "recovery_backoff_secs": 300,
///     "page_size": 20,
///     "storage": { "backend": "sqlite" }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentConfig {
    /// Tracked tickers, processed in this order
    #[serde(default = "default_tickers")]
    pub tickers: Vec<TickerEntry>,

    /// Wait between cycles, measured from cycle completion
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Wait after a failed cycle
    #[serde(default = "default_recovery_backoff_secs")]
    pub recovery_backoff_secs: u64,

    /// Articles requested per ticker
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Article language filter
    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default)]
    pub news: NewsSourceConfig,

    #[serde(default)]
    pub classifier: ClassifierConfig,

    #[serde(default)]
    pub storage: SentimentStorageConfig,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            tickers: default_tickers(),
            interval_secs: default_interval_secs(),
            recovery_backoff_secs: default_recovery_backoff_secs(),
            page_size: default_page_size(),
            language: default_language(),
            news: NewsSourceConfig::default(),
            classifier: ClassifierConfig::default(),
            storage: SentimentStorageConfig::default(),
        }
    }
}

fn default_tickers() -> Vec<TickerEntry> {
    vec![
        TickerEntry::new("AAPL", "Apple"),
        TickerEntry::new("NVDA", "NVIDIA"),
        TickerEntry::new("TSLA", "Tesla"),
    ]
}

fn default_interval_secs() -> u64 {
    30 * 60
}

fn default_recovery_backoff_secs() -> u64 {
    5 * 60
}

fn default_page_size() -> u32 {
    20
}

fn default_language() -> String {
    "en".into()
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

    /// Global network configuration (bind address)
    #[serde(default)]
    pub network: NetworkConfig,

    /// Service port configuration
    #[serde(default)]
    pub services: ServicesConfig,

    /// Grouped secrets
    #[serde(default)]
    pub secrets: SecretsConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Sentiment service configuration
    #[serde(default)]
    pub sentiment: SentimentConfig,
}

impl Config {
    /// Load configuration from the default directory, including modular files
    /// and environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from_dir(&config_dir())
    }

    /// Load configuration from `dir`, including modular files and environment
    /// overrides.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        if !dir.join("config.json").exists() && !dir.join("sentiment.json").exists() {
            tracing::info!("Config file not found, using defaults");
        }

        let value = crate::config_loader::load_modular_config(Some(dir.to_path_buf()))?;
        let mut config: Self = serde_json::from_value(value)
            .with_context(|| format!("Failed to parse config from {}", dir.display()))?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("ZERO_SENTIMENT_PORT") {
            if let Ok(p) = port.parse() {
                self.services.sentiment.port = Some(p);
            }
        }

        if let Ok(bind) = std::env::var("ZERO_BIND_ADDRESS") {
            self.network.bind = bind;
        }

        if let Ok(level) = std::env::var("ZERO_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Ok(format) = std::env::var("ZERO_LOG_FORMAT") {
            self.observability.log_format = format;
        }

        if let Ok(interval) = std::env::var("ZERO_SENTIMENT_INTERVAL") {
            match parse_duration_secs(&interval) {
                Ok(secs) => self.sentiment.interval_secs = secs,
                Err(e) => tracing::warn!(value = %interval, error = %e, "Ignoring ZERO_SENTIMENT_INTERVAL"),
            }
        }
        if let Ok(recovery) = std::env::var("ZERO_SENTIMENT_RECOVERY") {
            match parse_duration_secs(&recovery) {
                Ok(secs) => self.sentiment.recovery_backoff_secs = secs,
                Err(e) => tracing::warn!(value = %recovery, error = %e, "Ignoring ZERO_SENTIMENT_RECOVERY"),
            }
        }

        self.apply_secret_env_fallbacks();
    }

    /// Apply credential environment variable fallbacks.
    fn apply_secret_env_fallbacks(&mut self) {
        let external = &mut self.secrets.external;
        if let Ok(key) = std::env::var("NEWS_API_KEY") {
            external.news_api = Some(key);
        }
        if let Ok(token) = std::env::var("HUGGINGFACE_TOKEN")
            .or_else(|_| std::env::var("HUGGING_FACE_HUB_TOKEN"))
        {
            external.huggingface = Some(token);
        }
        if let Ok(url) = std::env::var("SUPABASE_URL") {
            external.supabase_url = Some(url);
        }
        if let Ok(key) = std::env::var("SUPABASE_KEY") {
            external.supabase_key = Some(key);
        }
    }

    // =========================================================================
    // Convenience accessors
    // =========================================================================

    pub fn bind_address(&self) -> &str {
        &self.network.bind
    }

    pub fn sentiment_port(&self) -> u16 {
        self.services.sentiment.port.unwrap_or(4436)
    }

    pub fn sentiment_endpoint(&self) -> String {
        format!("http://{}:{}", self.bind_address(), self.sentiment_port())
    }

    /// NewsAPI key, ignoring empty values.
    pub fn news_api_key(&self) -> Option<String> {
        non_empty(self.secrets.external.news_api.as_deref())
    }

    pub fn huggingface_token(&self) -> Option<String> {
        non_empty(self.secrets.external.huggingface.as_deref())
    }

    /// Supabase URL and key, only when both are present.
    pub fn supabase_credentials(&self) -> Option<(String, String)> {
        let url = non_empty(self.secrets.external.supabase_url.as_deref())?;
        let key = non_empty(self.secrets.external.supabase_key.as_deref())?;
        Some((url, key))
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}
