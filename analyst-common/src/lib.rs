//! Analyst Common - Shared configuration, errors, logging, and utilities.
//!
//! This crate provides:
//! - Configuration types and loading (`~/.analyst/config.json` plus env overrides)
//! - Configuration validation
//! - Error types and handling utilities
//! - Logging setup with noise filtering
//! - Date and number formatting helpers used by the screener and dashboard

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;
pub mod util;
pub mod validation;

pub use config::{
    Config, FmpConfig, ObservabilityConfig, ScreenerConfig, ServerConfig, StorageConfig,
};
pub use error::{Error, Result};
pub use validation::{Validate, ValidationError, ValidationResult};

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result, ResultExt};
    pub use crate::logging::init_logging;
    pub use crate::validation::{Validate, ValidationError};
}
