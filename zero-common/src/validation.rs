//! Configuration validation for Zero services.
//!
//! Provides validation logic for configuration fields to ensure
//! all required values are present and within valid ranges.

use std::collections::HashSet;
use thiserror::Error;

use crate::config::{Config, ObservabilityConfig, SentimentConfig};

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid port {port}: must be between 1 and 65535")]
    InvalidPort { port: u16, field: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Configuration conflict: {reason}")]
    Conflict { reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

/// Largest page size NewsAPI accepts.
pub const MAX_PAGE_SIZE: u32 = 100;

impl Config {
    /// Validate the entire configuration.
    pub fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Some(port) = self.services.sentiment.port {
            if port == 0 {
                errors.push(ValidationError::InvalidPort {
                    port,
                    field: "services.sentiment.port".into(),
                });
            }
        }

        if let Err(e) = self.observability.validate() {
            errors.push(e);
        }

        if let Err(e) = self.sentiment.validate() {
            errors.push(e);
        }

        if let Err(e) = self.check_storage_credentials() {
            errors.push(e);
        }

        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            Err(ValidationError::Multiple(errors))
        }
    }

    /// The supabase backend cannot start without its project URL and key.
    fn check_storage_credentials(&self) -> ValidationResult<()> {
        if self.sentiment.storage.backend.eq_ignore_ascii_case("supabase")
            && self.supabase_credentials().is_none()
        {
            return Err(ValidationError::MissingField {
                field: "secrets.external.supabase_url / supabase_key (required for supabase backend)"
                    .into(),
            });
        }
        Ok(())
    }

    /// Load and validate configuration.
    pub fn load_and_validate() -> anyhow::Result<Self> {
        let config = Self::load()?;
        config.validate().map_err(|e| anyhow::anyhow!("{}", e))?;
        Ok(config)
    }
}

impl Validate for SentimentConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.tickers.is_empty() {
            return Err(ValidationError::MissingField {
                field: "sentiment.tickers".into(),
            });
        }

        let mut seen = HashSet::new();
        for (idx, ticker) in self.tickers.iter().enumerate() {
            let symbol = ticker.symbol.trim();
            if symbol.is_empty() {
                return Err(ValidationError::MissingField {
                    field: format!("sentiment.tickers[{}].symbol", idx),
                });
            }
            if ticker.company.trim().is_empty() {
                return Err(ValidationError::MissingField {
                    field: format!("sentiment.tickers[{}].company", idx),
                });
            }
            if !seen.insert(symbol.to_uppercase()) {
                return Err(ValidationError::Conflict {
                    reason: format!("ticker {} is configured more than once", symbol),
                });
            }
        }

        if self.interval_secs == 0 {
            return Err(ValidationError::InvalidValue {
                field: "sentiment.interval_secs".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.recovery_backoff_secs == 0 {
            return Err(ValidationError::InvalidValue {
                field: "sentiment.recovery_backoff_secs".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.recovery_backoff_secs > self.interval_secs {
            return Err(ValidationError::InvalidValue {
                field: "sentiment.recovery_backoff_secs".into(),
                reason: format!(
                    "must not exceed interval_secs ({})",
                    self.interval_secs
                ),
            });
        }

        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(ValidationError::InvalidValue {
                field: "sentiment.page_size".into(),
                reason: format!("must be between 1 and {}", MAX_PAGE_SIZE),
            });
        }

        if self.classifier.max_length == 0 {
            return Err(ValidationError::InvalidValue {
                field: "sentiment.classifier.max_length".into(),
                reason: "must be greater than 0".into(),
            });
        }

        let valid_backends = ["sqlite", "supabase"];
        if !valid_backends.contains(&self.storage.backend.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "sentiment.storage.backend".into(),
                reason: format!("must be one of: {}", valid_backends.join(", ")),
            });
        }

        Ok(())
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_level".into(),
                reason: format!(
                    "must be one of: {}",
                    valid_levels.join(", ")
                ),
            });
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.log_format.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_format".into(),
                reason: format!(
                    "must be one of: {}",
                    valid_formats.join(", ")
                ),
            });
        }

        Ok(())
    }
}
