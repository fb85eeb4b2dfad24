//! Analyst - personal stock screener.
//!
//! Fetches stock data, runs screeners over it, and serves the dashboard.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;

use analyst::data::{FmpClient, LocalStorage, LocalStorageConfig};
use analyst::screener::{FetchSettings, GetStockDataTask, ScreenFilter, ScreenerTask};
use analyst::AnalystService;
use analyst_common::logging::init_logging_with_exclusions;
use analyst_common::Config;

/// Smoothing threshold used when `--threshold` is omitted for price moves.
const DEFAULT_SMOOTHING_PCT: f64 = 0.05;
const DEFAULT_MULTIPLE: f64 = 2.0;
const DEFAULT_METRIC: &str = "revenue";

#[derive(Parser, Debug)]
#[command(name = "analyst")]
#[command(version)]
#[command(about = "Personal stock screener", long_about = None)]
struct Cli {
    /// Config file (default: ~/.analyst/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FilterKind {
    /// Smoothed trough-to-peak price move
    PriceMove,
    /// Year-over-year growth of a quarterly metric
    YoyGrowth,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Download statements and daily prices for every listed stock
    #[command(alias = "getstockdata")]
    GetStockData {
        /// Skip symbols priced below this (default: screener.min_price)
        #[arg(long)]
        min_price: Option<f64>,

        /// Keep previously fetched stock data instead of dropping it first
        #[arg(long)]
        keep_existing: bool,
    },

    /// Filter the symbols produced by an earlier task
    Screener {
        /// Fetch or screener task whose symbols are screened
        #[arg(long)]
        target_task_id: String,

        /// Task description (default: derived from the filter)
        #[arg(long)]
        description: Option<String>,

        #[arg(long, value_enum)]
        filter: FilterKind,

        /// Smoothing threshold for price-move, growth threshold for yoy-growth (fractions)
        #[arg(long)]
        threshold: Option<f64>,

        /// Required trough-to-peak multiple (price-move)
        #[arg(long)]
        multiple: Option<f64>,

        /// Ignore troughs below this price (price-move)
        #[arg(long)]
        min_price: Option<f64>,

        /// Statement field to compare (yoy-growth)
        #[arg(long)]
        metric: Option<String>,
    },

    /// Serve the dashboard
    Serve {
        /// Host to bind to (default: server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (default: server.port)
        #[arg(long)]
        port: Option<u16>,
    },
}

fn build_filter(
    kind: FilterKind,
    threshold: Option<f64>,
    multiple: Option<f64>,
    min_price: Option<f64>,
    metric: Option<String>,
) -> ScreenFilter {
    match kind {
        FilterKind::PriceMove => ScreenFilter::PriceMove {
            threshold_pct: threshold.unwrap_or(DEFAULT_SMOOTHING_PCT),
            multiple: multiple.unwrap_or(DEFAULT_MULTIPLE),
            min_price,
        },
        FilterKind::YoyGrowth => ScreenFilter::YoyGrowth {
            metric: metric.unwrap_or_else(|| DEFAULT_METRIC.to_string()),
            threshold_pct: threshold.unwrap_or(0.0),
        },
    }
}

fn open_storage(config: &Config) -> Result<Arc<LocalStorage>> {
    let storage = LocalStorage::new(LocalStorageConfig::from(&config.storage))?;
    Ok(Arc::new(storage))
}

async fn get_stock_data(config: &Config, min_price: Option<f64>, keep_existing: bool) -> Result<()> {
    config.require_api_key()?;
    let provider = Arc::new(FmpClient::new(&config.fmp)?);
    let storage = open_storage(config)?;

    if !keep_existing {
        storage.drop_stock_data().await?;
    }

    let mut settings = FetchSettings::from_config(config);
    if let Some(min_price) = min_price {
        settings = settings.with_min_price(min_price);
    }

    let summary = GetStockDataTask::new(provider, storage, settings).run().await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn run_screener(
    config: &Config,
    target_task_id: String,
    filter: ScreenFilter,
    description: Option<String>,
) -> Result<()> {
    let storage = open_storage(config)?;

    let mut task = ScreenerTask::new(storage, target_task_id, filter)
        .with_concurrency(config.screener.concurrency);
    if let Some(description) = description {
        task = task.with_description(description);
    }

    let summary = task.run().await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    // Load configuration
    let mut config = Config::load_with_env(cli.config.as_deref())?;

    if let Commands::Serve { host, port } = &command {
        if let Some(host) = host {
            config.server.host = host.clone();
        }
        if let Some(port) = port {
            config.server.port = *port;
        }
    }

    // Initialize logging
    init_logging_with_exclusions(
        &config.observability.log_level,
        &config.observability.log_format,
        &config.observability.excluded_targets,
    );

    config.validate().context("Invalid configuration")?;

    tracing::info!("Analyst v{}", env!("CARGO_PKG_VERSION"));

    match command {
        Commands::GetStockData {
            min_price,
            keep_existing,
        } => get_stock_data(&config, min_price, keep_existing).await,
        Commands::Screener {
            target_task_id,
            description,
            filter,
            threshold,
            multiple,
            min_price,
            metric,
        } => {
            let filter = build_filter(filter, threshold, multiple, min_price, metric);
            run_screener(&config, target_task_id, filter, description).await
        }
        Commands::Serve { .. } => {
            let storage = open_storage(&config)?;
            AnalystService::new(config, storage)?.start().await
        }
    }
}
