//! Data provider abstraction.
//!
//! Defines the `StockDataProvider` trait implemented by the market data
//! client, so the fetch task can be driven by a mock in tests.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::{FinancialRecord, PriceHistory, SymbolInfo};

// ============================================================================
// Provider Errors
// ============================================================================

/// Errors raised by data providers.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Request succeeded but the payload was empty
    #[error("No data returned: {0}")]
    NoData(String),

    /// Still rate limited after all retries
    #[error("Rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },

    /// Authentication failed (bad or missing API key)
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Non-success HTTP status
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Connection or timeout failure
    #[error("Network error: {0}")]
    Network(String),

    /// Payload did not have the expected shape
    #[error("Invalid response: {0}")]
    Parse(String),
}

impl ProviderError {
    /// Whether retrying later could succeed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Network(_) => true,
            Self::Http { status, .. } => *status >= 500,
            Self::NoData(_) | Self::Auth(_) | Self::Parse(_) => false,
        }
    }

    /// Whether this only means "nothing to fetch for this symbol".
    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::NoData(_))
    }
}

// ============================================================================
// Statement Period
// ============================================================================

/// Reporting period for financial statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    #[default]
    Quarter,
    Annual,
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quarter => write!(f, "quarter"),
            Self::Annual => write!(f, "annual"),
        }
    }
}

// ============================================================================
// Provider Trait
// ============================================================================

/// Source of symbol listings, financial statements, and daily prices.
#[async_trait]
pub trait StockDataProvider: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    /// US-listed common stocks priced at or above `min_price`.
    async fn list_symbols(&self, min_price: f64) -> Result<Vec<SymbolInfo>, ProviderError>;

    /// Most recent `limit` income statements, newest first.
    async fn get_financial_statements(
        &self,
        symbol: &str,
        limit: u32,
        period: Period,
    ) -> Result<Vec<FinancialRecord>, ProviderError>;

    /// Daily prices between `from` and `to` (inclusive), either bound optional.
    async fn get_daily_prices(
        &self,
        symbol: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<PriceHistory, ProviderError>;
}
