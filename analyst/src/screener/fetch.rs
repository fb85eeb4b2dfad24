//! Stock data fetch task.
//!
//! Lists candidate symbols, then downloads quarterly statements and a year
//! of daily prices for each, in throttled batches sized to the API budget.
//! Per-symbol failures are logged and counted; they never abort the run.

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use analyst_common::util::date_window;
use analyst_common::Config;

use crate::algo::preprocess_financials;
use crate::data::{
    batch_size, FinancialStatements, LocalStorage, Period, ScreenerResult, StockData,
    StockDataDocument, StockDataProvider, SymbolInfo, Throttle,
};
use crate::task::{TaskTracker, TaskType};

// ============================================================================
// Settings
// ============================================================================

/// Parameters of one fetch run.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Symbols priced below this are not listed
    pub min_price: f64,
    /// Days of daily prices per symbol
    pub price_history_days: i64,
    /// Income statements requested per symbol
    pub statement_limit: u32,
    /// Symbols submitted per batch
    pub batch_size: usize,
    pub throttle: Throttle,
    /// Close date of the price window
    pub as_of: NaiveDate,
}

impl FetchSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            min_price: config.screener.min_price,
            price_history_days: config.screener.price_history_days,
            statement_limit: config.screener.financial_quarters * 2,
            batch_size: batch_size(
                config.fmp.requests_per_minute,
                config.fmp.rate_limit_buffer,
                config.fmp.requests_per_symbol,
            ),
            throttle: Throttle::from_config(&config.fmp),
            as_of: Utc::now().date_naive(),
        }
    }

    pub fn with_min_price(mut self, min_price: f64) -> Self {
        self.min_price = min_price;
        self
    }
}

// ============================================================================
// Summary
// ============================================================================

/// Outcome of a fetch run.
#[derive(Debug, Clone, Serialize)]
pub struct FetchSummary {
    pub task_id: String,
    /// Symbols returned by the listing
    pub listed: usize,
    /// Symbols whose data was saved, sorted
    pub saved: Vec<String>,
    /// Symbols without statements or prices
    pub skipped: usize,
    /// Symbols whose fetch failed
    pub failed: usize,
    pub duration_secs: f64,
}

enum SymbolOutcome {
    Saved,
    Skipped,
}

// ============================================================================
// Task
// ============================================================================

/// Downloads and stores data for every listed symbol.
pub struct GetStockDataTask {
    provider: Arc<dyn StockDataProvider>,
    storage: Arc<LocalStorage>,
    settings: FetchSettings,
}

impl GetStockDataTask {
    pub fn new(
        provider: Arc<dyn StockDataProvider>,
        storage: Arc<LocalStorage>,
        settings: FetchSettings,
    ) -> Self {
        Self {
            provider,
            storage,
            settings,
        }
    }

    pub fn description(&self) -> String {
        format!(
            "Fetch stock data from {} (min price ${})",
            self.provider.name(),
            self.settings.min_price
        )
    }

    /// Run the fetch and record the saved symbols as a screener result under
    /// this task's id, so screener tasks can target it.
    pub async fn run(&self) -> Result<FetchSummary> {
        let started = Instant::now();
        let description = self.description();

        let mut tracker =
            TaskTracker::new(self.storage.clone(), TaskType::GetStockData, description.clone());
        tracker.mark_start().await?;
        let task_id = tracker.task_id().to_string();

        let symbols = self
            .provider
            .list_symbols(self.settings.min_price)
            .await
            .context("Failed to list symbols")?;

        let (from, to) = date_window(self.settings.as_of, self.settings.price_history_days);
        let batch_size = self.settings.batch_size.max(1);
        let batch_count = symbols.len().div_ceil(batch_size);

        info!(
            task_id = %task_id,
            symbols = symbols.len(),
            batch_size,
            batch_count,
            from = %from,
            to = %to,
            "Fetching stock data"
        );

        let mut skipped = 0;
        let mut failed = 0;

        for (batch_index, batch) in symbols.chunks(batch_size).enumerate() {
            let mut set = JoinSet::new();

            for info in batch {
                let provider = self.provider.clone();
                let storage = self.storage.clone();
                let task_id = task_id.clone();
                let info = info.clone();
                let limit = self.settings.statement_limit;

                set.spawn(async move {
                    let symbol = info.symbol.clone();
                    let outcome =
                        fetch_symbol(provider, storage, task_id, info, limit, from, to).await;
                    (symbol, outcome)
                });
                self.settings.throttle.pause_request().await;
            }

            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok((_, Ok(SymbolOutcome::Saved))) => {}
                    Ok((_, Ok(SymbolOutcome::Skipped))) => skipped += 1,
                    Ok((symbol, Err(e))) => {
                        let reason = format!("{e:#}");
                        warn!(symbol = %symbol, error = %reason, "Failed to fetch stock data");
                        failed += 1;
                    }
                    Err(e) => {
                        error!(error = %e, "Fetch worker panicked");
                        failed += 1;
                    }
                }
            }

            debug!(batch = batch_index + 1, batch_count, "Batch complete");
            if batch_index + 1 < batch_count {
                self.settings.throttle.pause_batch().await;
            }
        }

        let saved = self.storage.list_task_symbols(&task_id).await?;
        self.storage
            .save_screener_result(&ScreenerResult {
                task_id: task_id.clone(),
                data_task_id: task_id.clone(),
                description,
                ticker_symbols: saved.clone(),
            })
            .await?;

        tracker.mark_complete().await?;

        let summary = FetchSummary {
            task_id,
            listed: symbols.len(),
            saved,
            skipped,
            failed,
            duration_secs: started.elapsed().as_secs_f64(),
        };

        info!(
            task_id = %summary.task_id,
            saved = summary.saved.len(),
            skipped,
            failed,
            duration_secs = summary.duration_secs,
            "Stock data fetch complete"
        );

        Ok(summary)
    }
}

/// Fetch statements and prices for one symbol and store them.
async fn fetch_symbol(
    provider: Arc<dyn StockDataProvider>,
    storage: Arc<LocalStorage>,
    task_id: String,
    info: SymbolInfo,
    statement_limit: u32,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<SymbolOutcome> {
    let symbol = info.symbol.as_str();

    let statements = match provider
        .get_financial_statements(symbol, statement_limit, Period::Quarter)
        .await
    {
        Ok(statements) => statements,
        Err(e) if e.is_no_data() => {
            debug!(symbol, "No financial statements");
            return Ok(SymbolOutcome::Skipped);
        }
        Err(e) => return Err(e).context("Failed to fetch financial statements"),
    };

    let prices = match provider.get_daily_prices(symbol, Some(from), Some(to)).await {
        Ok(prices) => prices,
        Err(e) if e.is_no_data() => {
            debug!(symbol, "No daily prices");
            return Ok(SymbolOutcome::Skipped);
        }
        Err(e) => return Err(e).context("Failed to fetch daily prices"),
    };

    let document = StockDataDocument {
        task_id,
        data: StockData {
            financial_statements: FinancialStatements {
                quarter: preprocess_financials(&statements),
            },
            prices,
        },
        symbol: info,
    };
    storage.save_stock_data(&document).await?;

    Ok(SymbolOutcome::Saved)
}
