//! Screener task.
//!
//! Applies a `ScreenFilter` to every symbol produced by an earlier task (a
//! fetch or another screener run) and records the symbols that pass.

use anyhow::Result;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use analyst_common::Error;

use crate::data::{LocalStorage, ScreenerResult};
use crate::task::{TaskTracker, TaskType};

use super::config::ScreenFilter;

/// Default number of symbols evaluated at once.
const DEFAULT_CONCURRENCY: usize = 16;

/// Outcome of a screener run.
#[derive(Debug, Clone, Serialize)]
pub struct ScreenerSummary {
    pub task_id: String,
    pub description: String,
    /// Symbols read from the target task
    pub scanned: usize,
    /// Symbols that passed, sorted
    pub matched: Vec<String>,
    /// Symbols that could not be evaluated
    pub failed: usize,
    pub duration_secs: f64,
}

/// One screener run over a target task's symbols.
pub struct ScreenerTask {
    storage: Arc<LocalStorage>,
    target_task_id: String,
    filter: ScreenFilter,
    description: String,
    concurrency: usize,
}

impl ScreenerTask {
    pub fn new(
        storage: Arc<LocalStorage>,
        target_task_id: impl Into<String>,
        filter: ScreenFilter,
    ) -> Self {
        Self {
            storage,
            target_task_id: target_task_id.into(),
            description: filter.describe(),
            filter,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Evaluate every target symbol and save the matches.
    ///
    /// Fails before recording anything if the filter arguments are invalid
    /// or the target task has no result.
    pub async fn run(&self) -> Result<ScreenerSummary> {
        let started = Instant::now();

        self.filter
            .validate()
            .map_err(|e| Error::InvalidInput(e.to_string()))?;

        let target = self
            .storage
            .get_screener_result(&self.target_task_id)
            .await?
            .ok_or_else(|| {
                Error::NotFound(format!("screener result for task {}", self.target_task_id))
            })?;

        let mut tracker = TaskTracker::new(
            self.storage.clone(),
            TaskType::Screener,
            self.description.clone(),
        );
        tracker.mark_start().await?;
        let task_id = tracker.task_id().to_string();

        info!(
            task_id = %task_id,
            target_task_id = %self.target_task_id,
            symbols = target.ticker_symbols.len(),
            filter = %self.description,
            "Running screener"
        );

        let data_task_id = target.data_task_id.as_str();
        let outcomes: Vec<(String, Result<bool>)> = stream::iter(target.ticker_symbols.iter().cloned())
            .map(|symbol| async move {
                let outcome = self.evaluate_symbol(data_task_id, &symbol).await;
                (symbol, outcome)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut matched = Vec::new();
        let mut failed = 0;
        for (symbol, outcome) in outcomes {
            match outcome {
                Ok(true) => matched.push(symbol),
                Ok(false) => {}
                Err(e) => {
                    let reason = format!("{e:#}");
                    warn!(symbol = %symbol, error = %reason, "Failed to screen symbol");
                    failed += 1;
                }
            }
        }
        matched.sort();

        self.storage
            .save_screener_result(&ScreenerResult {
                task_id: task_id.clone(),
                data_task_id: target.data_task_id.clone(),
                description: self.description.clone(),
                ticker_symbols: matched.clone(),
            })
            .await?;

        tracker.mark_complete().await?;

        let summary = ScreenerSummary {
            task_id,
            description: self.description.clone(),
            scanned: target.ticker_symbols.len(),
            matched,
            failed,
            duration_secs: started.elapsed().as_secs_f64(),
        };

        info!(
            task_id = %summary.task_id,
            scanned = summary.scanned,
            matched = summary.matched.len(),
            failed,
            "Screener complete"
        );

        Ok(summary)
    }

    /// Screen the document the originating fetch saved for `symbol`.
    async fn evaluate_symbol(&self, data_task_id: &str, symbol: &str) -> Result<bool> {
        let document = self
            .storage
            .get_task_stock_data(data_task_id, symbol)
            .await?
            .ok_or_else(|| {
                Error::NotFound(format!("stock data for {symbol} from task {data_task_id}"))
            })?;

        let passed = self.filter.evaluate(&document.data)?;
        debug!(symbol, passed, "Evaluated symbol");
        Ok(passed)
    }
}
