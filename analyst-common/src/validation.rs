//! Configuration validation.
//!
//! Catches settings that would make the fetch task stall or the dashboard
//! fail to bind before any work starts.

use thiserror::Error;

use crate::config::{Config, FmpConfig, ObservabilityConfig, ScreenerConfig, ServerConfig};

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid port {port}: must be between 1 and 65535")]
    InvalidPort { port: u16, field: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Longest base retry backoff accepted for the FMP client, in seconds.
pub const MAX_BACKOFF_SECS: f64 = 3600.0;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

impl Config {
    /// Validate the entire configuration.
    pub fn validate(&self) -> ValidationResult<()> {
        let mut errors: Vec<ValidationError> = [
            self.server.validate(),
            self.fmp.validate(),
            self.screener.validate(),
            self.observability.validate(),
        ]
        .into_iter()
        .filter_map(Result::err)
        .collect();

        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            Err(ValidationError::Multiple(errors))
        }
    }

    /// Require an API key, as the fetch task does.
    pub fn require_api_key(&self) -> ValidationResult<&str> {
        self.fmp
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ValidationError::MissingField {
                field: "fmp.api_key (or FMP_API_KEY)".into(),
            })
    }
}

impl Validate for ServerConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort {
                port: self.port,
                field: "server.port".into(),
            });
        }
        if self.host.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "server.host".into(),
            });
        }
        Ok(())
    }
}

impl Validate for FmpConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.requests_per_symbol == 0 {
            return Err(ValidationError::InvalidValue {
                field: "fmp.requests_per_symbol".into(),
                reason: "must be at least 1".into(),
            });
        }

        if self.requests_per_minute <= self.rate_limit_buffer {
            return Err(ValidationError::InvalidValue {
                field: "fmp.rate_limit_buffer".into(),
                reason: format!(
                    "buffer {} leaves no requests out of {} per minute",
                    self.rate_limit_buffer, self.requests_per_minute
                ),
            });
        }

        if !(0.0..=MAX_BACKOFF_SECS).contains(&self.backoff_secs) {
            return Err(ValidationError::InvalidValue {
                field: "fmp.backoff_secs".into(),
                reason: format!("must be between 0 and {MAX_BACKOFF_SECS} seconds"),
            });
        }

        if self.base_url.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "fmp.base_url".into(),
            });
        }

        Ok(())
    }
}

impl Validate for ScreenerConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.concurrency == 0 {
            return Err(ValidationError::InvalidValue {
                field: "screener.concurrency".into(),
                reason: "must be at least 1".into(),
            });
        }

        if !self.min_price.is_finite() {
            return Err(ValidationError::InvalidValue {
                field: "screener.min_price".into(),
                reason: "must be a finite number".into(),
            });
        }

        if !(self.chart_threshold_pct > 0.0 && self.chart_threshold_pct < 1.0) {
            return Err(ValidationError::InvalidValue {
                field: "screener.chart_threshold_pct".into(),
                reason: "must be between 0 and 1 (exclusive)".into(),
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
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            });
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.log_format.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_format".into(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            });
        }

        Ok(())
    }
}
