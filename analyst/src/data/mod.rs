//! Market data types, the data provider abstraction, and local storage.
//!
//! Documents mirror what the market data API returns so they can be stored
//! as-is and re-read by the screener and the dashboard.

pub mod fmp;
pub mod local_storage;
pub mod provider;
pub mod throttle;

pub use fmp::FmpClient;
pub use local_storage::{LocalStorage, LocalStorageConfig, StockDataPage};
pub use provider::{Period, ProviderError, StockDataProvider};
pub use throttle::{batch_size, Throttle};

use analyst_common::util::parse_iso_date;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// Core Data Types
// ============================================================================

/// One daily OHLCV bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Epoch milliseconds, midnight UTC for daily bars
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// One financial statement (usually quarterly).
///
/// Only `date` is interpreted structurally; everything else is kept as the
/// upstream document so metrics can be looked up by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialRecord {
    /// ISO 8601 date (`YYYY-MM-DD`)
    pub date: String,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl FinancialRecord {
    /// Create a record with the given metric values.
    pub fn new(date: impl Into<String>, metrics: &[(&str, f64)]) -> Self {
        let mut record = Self {
            date: date.into(),
            fields: Map::new(),
        };
        for (name, value) in metrics {
            record.set_metric(name, Some(*value));
        }
        record
    }

    /// Numeric value of a metric, `None` if absent, null, or not a number.
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.fields.get(name).and_then(Value::as_f64)
    }

    /// Set a metric; `None` (or a non-finite value) is stored as null.
    pub fn set_metric(&mut self, name: &str, value: Option<f64>) {
        let value = value
            .and_then(serde_json::Number::from_f64)
            .map_or(Value::Null, Value::Number);
        self.fields.insert(name.to_string(), value);
    }
}

/// Listing entry from the symbol list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInfo {
    pub symbol: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub price: Option<f64>,

    #[serde(default)]
    pub exchange: Option<String>,

    #[serde(default)]
    pub exchange_short_name: Option<String>,

    /// "stock", "etf", "trust", ...
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

impl SymbolInfo {
    /// Bare entry with only a ticker.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            name: None,
            price: None,
            exchange: None,
            exchange_short_name: None,
            kind: None,
        }
    }
}

/// One daily bar as returned by the price history endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalPrice {
    /// ISO date
    pub date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,

    /// adjClose, vwap, changePercent, ...
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Daily price history for one symbol, newest first as delivered upstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceHistory {
    pub symbol: String,

    #[serde(default)]
    pub historical: Vec<HistoricalPrice>,
}

impl PriceHistory {
    /// Convert to price points ordered ascending by timestamp.
    ///
    /// Bars with unparseable dates are dropped.
    pub fn to_price_points(&self) -> Vec<PricePoint> {
        let mut points: Vec<PricePoint> = self
            .historical
            .iter()
            .filter_map(|bar| {
                let date = parse_iso_date(&bar.date).ok()?;
                let timestamp = date.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis();
                Some(PricePoint {
                    timestamp,
                    open: bar.open,
                    high: bar.high,
                    low: bar.low,
                    close: bar.close,
                    volume: bar.volume,
                })
            })
            .collect();
        points.sort_by_key(|p| p.timestamp);
        points
    }
}

/// Quarterly statements keyed the way they are stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialStatements {
    #[serde(default)]
    pub quarter: Vec<FinancialRecord>,
}

/// Everything fetched for one symbol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StockData {
    pub financial_statements: FinancialStatements,
    pub prices: PriceHistory,
}

/// Stored stock data document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockDataDocument {
    pub task_id: String,
    pub symbol: SymbolInfo,
    pub data: StockData,
}

/// Stored screener result: the symbols a task produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenerResult {
    pub task_id: String,
    /// Fetch task whose stock data the symbols refer to; a fetch names itself
    pub data_task_id: String,
    pub description: String,
    pub ticker_symbols: Vec<String>,
}
