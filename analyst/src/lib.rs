//! Analyst Library
//!
//! A personal stock screener: downloads fundamentals and daily prices from
//! Financial Modeling Prep, screens them for price moves and year-over-year
//! growth, and serves the results on a small dashboard.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                        analyst (Rust Service)                       │
//! │                               :5000                                 │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────┐     │
//! │  │  Data           │  │  Screener       │  │  Dashboard      │     │
//! │  │  (FMP, SQLite)  │  │  Tasks          │  │  (axum)         │     │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────┘     │
//! │                 ┌─────────────────────────────┐                     │
//! │                 │  Algorithms (pivots, moves, │                     │
//! │                 │  growth)                    │                     │
//! │                 └─────────────────────────────┘                     │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Concepts
//!
//! ## Pivots
//! - **Raw pivot**: a bar whose high (or low) is strictly beyond both neighbours
//! - **Smoothed pivot**: raw pivots thinned so peaks and troughs alternate and
//!   each swing clears a percentage threshold
//!
//! ## Screens
//! - **Price move**: price rose N times from a smoothed trough to a later peak
//! - **YoY growth**: the latest quarter grew at least a given fraction over the
//!   same quarter a year earlier

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod algo;
pub mod chart;
pub mod data;
pub mod routes;
pub mod screener;
pub mod task;
pub mod templates;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use analyst_common::Config;

use crate::data::LocalStorage;
use crate::templates::Templates;

/// Dashboard state
pub struct AnalystState {
    /// Configuration
    pub config: Config,
    /// Document store shared with the screening tasks
    pub storage: Arc<LocalStorage>,
    /// Page templates
    pub templates: Templates,
}

impl AnalystState {
    /// Create a new dashboard state
    pub fn new(config: Config, storage: Arc<LocalStorage>) -> Result<Self> {
        Ok(Self {
            config,
            storage,
            templates: Templates::new()?,
        })
    }
}

/// Dashboard service
pub struct AnalystService {
    state: Arc<AnalystState>,
}

impl AnalystService {
    /// Create a new dashboard service
    pub fn new(config: Config, storage: Arc<LocalStorage>) -> Result<Self> {
        let state = Arc::new(AnalystState::new(config, storage)?);
        Ok(Self { state })
    }

    /// Serve the dashboard until the process is stopped
    pub async fn start(self) -> Result<()> {
        let host = &self.state.config.server.host;
        let port = self.state.config.server.port;

        let app = routes::router(self.state.clone());

        let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
        tracing::info!(address = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}
