//! Financial Modeling Prep (FMP) API client.
//!
//! # Endpoints
//! - `stock/list` - every listed security with its last price
//! - `income-statement/{symbol}` - quarterly or annual income statements
//! - `historical-price-full/{symbol}` - daily OHLCV history
//!
//! # Rate Limits
//! HTTP 429 responses are retried with exponential backoff. Staying under the
//! plan's per-minute budget is the fetch task's job (see `Throttle`).

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use analyst_common::util::{redact_api_key, ISO_DATE};
use analyst_common::FmpConfig;

use super::provider::{Period, ProviderError, StockDataProvider};
use super::{FinancialRecord, PriceHistory, SymbolInfo};

// ============================================================================
// Constants
// ============================================================================

const STOCK_LIST_ENDPOINT: &str = "stock/list";
const INCOME_STATEMENT_ENDPOINT: &str = "income-statement";
const HISTORICAL_PRICE_ENDPOINT: &str = "historical-price-full";

/// Exchange name prefixes (lowercase) considered US listings.
const US_EXCHANGE_PREFIXES: &[&str] = &[
    "american stock exchange",
    "nasdaq",
    "new york stock exchange",
];

/// Whether a listing is a common stock on a US exchange priced at or above `min_price`.
pub fn is_us_listed_stock(info: &SymbolInfo, min_price: f64) -> bool {
    let is_stock = info.kind.as_deref() == Some("stock");
    let on_us_exchange = info.exchange.as_deref().is_some_and(|exchange| {
        let exchange = exchange.to_lowercase();
        US_EXCHANGE_PREFIXES
            .iter()
            .any(|prefix| exchange.starts_with(prefix))
    });
    let priced = info.price.is_some_and(|price| price >= min_price);
    is_stock && on_us_exchange && priced
}

fn is_empty_payload(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

// ============================================================================
// Client
// ============================================================================

/// FMP REST client.
pub struct FmpClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    max_retries: u32,
    backoff: Duration,
}

impl FmpClient {
    /// Create a client from configuration. Fails without an API key.
    pub fn new(config: &FmpConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .context("FMP API key not configured (set fmp.api_key or FMP_API_KEY)")?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        let mut base_url = config.base_url.clone();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        let backoff_secs = if config.backoff_secs.is_finite() {
            config.backoff_secs.max(0.0)
        } else {
            0.0
        };

        Ok(Self {
            client,
            base_url,
            api_key,
            max_retries: config.max_retries,
            backoff: Duration::try_from_secs_f64(backoff_secs)
                .context("Invalid fmp.backoff_secs")?,
        })
    }

    fn endpoint_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Backoff before retry number `attempt` (1-based).
    fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }

    /// GET an endpoint and return the JSON payload.
    ///
    /// Retries on HTTP 429; an empty payload is `ProviderError::NoData`.
    async fn get_json(&self, path: &str, params: &[(&str, String)]) -> Result<Value, ProviderError> {
        let url = self.endpoint_url(path);
        let mut attempt = 0u32;

        loop {
            let response = self
                .client
                .get(&url)
                .query(&[("apikey", self.api_key.as_str())])
                .query(params)
                .send()
                .await
                .map_err(|e| ProviderError::Network(redact_api_key(&e.to_string())))?;

            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                attempt += 1;
                if attempt > self.max_retries {
                    return Err(ProviderError::RateLimited { attempts: attempt });
                }
                let wait = self.backoff_for(attempt);
                warn!(
                    path,
                    attempt,
                    wait_ms = wait.as_millis() as u64,
                    "Rate limited by FMP, backing off"
                );
                tokio::time::sleep(wait).await;
                continue;
            }

            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                let message = response.text().await.unwrap_or_default();
                return Err(ProviderError::Auth(message));
            }

            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(ProviderError::Http {
                    status: status.as_u16(),
                    message,
                });
            }

            let value: Value = response
                .json()
                .await
                .map_err(|e| ProviderError::Parse(format!("{path}: {e}")))?;

            if is_empty_payload(&value) {
                return Err(ProviderError::NoData(path.to_string()));
            }

            debug!(path, "FMP request succeeded");
            return Ok(value);
        }
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let value = self.get_json(path, params).await?;
        serde_json::from_value(value).map_err(|e| ProviderError::Parse(format!("{path}: {e}")))
    }
}

#[async_trait]
impl StockDataProvider for FmpClient {
    fn name(&self) -> &str {
        "fmp"
    }

    async fn list_symbols(&self, min_price: f64) -> Result<Vec<SymbolInfo>, ProviderError> {
        let listings: Vec<SymbolInfo> = self.get(STOCK_LIST_ENDPOINT, &[]).await?;
        let total = listings.len();

        let symbols: Vec<SymbolInfo> = listings
            .into_iter()
            .filter(|info| is_us_listed_stock(info, min_price))
            .collect();

        debug!(total, kept = symbols.len(), min_price, "Filtered symbol list");
        Ok(symbols)
    }

    async fn get_financial_statements(
        &self,
        symbol: &str,
        limit: u32,
        period: Period,
    ) -> Result<Vec<FinancialRecord>, ProviderError> {
        let path = format!("{INCOME_STATEMENT_ENDPOINT}/{symbol}");
        self.get(
            &path,
            &[("limit", limit.to_string()), ("period", period.to_string())],
        )
        .await
    }

    async fn get_daily_prices(
        &self,
        symbol: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<PriceHistory, ProviderError> {
        let path = format!("{HISTORICAL_PRICE_ENDPOINT}/{symbol}");

        let mut params = Vec::new();
        if let Some(from) = from {
            params.push(("from", from.format(ISO_DATE).to_string()));
        }
        if let Some(to) = to {
            params.push(("to", to.format(ISO_DATE).to_string()));
        }

        let history: PriceHistory = self.get(&path, &params).await?;
        if history.historical.is_empty() {
            return Err(ProviderError::NoData(path));
        }
        Ok(history)
    }
}
