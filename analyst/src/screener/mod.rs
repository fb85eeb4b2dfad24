//! Screening tasks.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────┐     ┌──────────────────┐
//! │ GetStockDataTask │────▶│ LocalStorage │────▶│   ScreenerTask   │
//! │  (FMP, batched)  │     │   (SQLite)   │     │ (ScreenFilter)   │
//! └──────────────────┘     └──────┬───────┘     └────────┬─────────┘
//!                                 │  screener_results    │
//!                                 └◀─────────────────────┘
//! ```
//!
//! A fetch run stores one document per symbol and records the saved symbols
//! as a screener result. Screener runs read a result, filter its symbols,
//! and record their own result, so runs can be chained.
//!
//! # Usage
//!
//! ```ignore
//! use analyst::screener::{GetStockDataTask, FetchSettings, ScreenerTask, ScreenFilter};
//!
//! let fetch = GetStockDataTask::new(provider, storage.clone(), FetchSettings::from_config(&config));
//! let fetched = fetch.run().await?;
//!
//! let filter = ScreenFilter::PriceMove { threshold_pct: 0.03, multiple: 2.0, min_price: Some(1.0) };
//! let screened = ScreenerTask::new(storage, fetched.task_id, filter).run().await?;
//! ```

pub mod config;
pub mod engine;
pub mod fetch;

pub use config::ScreenFilter;
pub use engine::{ScreenerSummary, ScreenerTask};
pub use fetch::{FetchSettings, FetchSummary, GetStockDataTask};
