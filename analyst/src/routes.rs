//! HTTP routes for the analyst dashboard.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tracing::{debug, error};

use analyst_common::Error;

use crate::chart::ChartData;
use crate::data::{FinancialRecord, ScreenerResult};
use crate::task::{TaskRecord, TaskType};
use crate::templates;
use crate::AnalystState;

/// Stocks shown per screener result page.
pub const PAGE_SIZE: usize = 5;

/// Quarters shown per stock, newest first.
const QUARTERS_SHOWN: usize = 4;

const DEFAULT_TASK_LIMIT: usize = 100;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Errors
// ============================================================================

/// Handler error, rendered with the status code of the wrapped error.
#[derive(Debug)]
pub struct ApiError(Error);

impl<E: Into<Error>> From<E> for ApiError {
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        } else {
            debug!(status = status.as_u16(), error = %self.0, "Request rejected");
        }
        (status, Json(ErrorResponse { error: self.0.to_string() })).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub service: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Deserialize)]
pub struct TaskListQuery {
    #[serde(default = "default_task_limit")]
    pub limit: usize,
}

fn default_task_limit() -> usize {
    DEFAULT_TASK_LIMIT
}

#[derive(Debug, Deserialize)]
pub struct ChartQuery {
    pub days: Option<usize>,
}

/// Links and counts for one page of a screener result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pagination {
    pub prev: Option<usize>,
    pub next: Option<usize>,
    /// e.g. "6 - 10"
    pub current: String,
    pub total: usize,
}

impl Pagination {
    /// Pagination for 1-based `page` of `total` items.
    pub fn new(page: usize, page_size: usize, total: usize) -> Self {
        let skip = page.saturating_sub(1).saturating_mul(page_size);
        let end = skip.saturating_add(page_size);
        let current = if skip >= total {
            "0 - 0".to_string()
        } else {
            format!("{} - {}", skip + 1, end.min(total))
        };

        Self {
            prev: (page > 1).then(|| page - 1),
            next: (total > end).then(|| page.checked_add(1)).flatten(),
            current,
            total,
        }
    }
}

#[derive(Debug, Serialize)]
struct StockView {
    symbol: String,
    name: Option<String>,
    financials: Vec<FinancialRecord>,
}

#[derive(Debug, Serialize)]
struct StockPageView {
    task_id: String,
    description: String,
    stocks: Vec<StockView>,
    pagination: Pagination,
}

#[derive(Debug, Serialize)]
struct TaskListView {
    tasks: Vec<TaskRecord>,
    latest_fetch: Option<TaskRecord>,
}

fn latest_quarters(records: &[FinancialRecord]) -> Vec<FinancialRecord> {
    let mut sorted = records.to_vec();
    sorted.sort_by(|a, b| b.date.cmp(&a.date));
    sorted.truncate(QUARTERS_SHOWN);
    sorted
}

fn parse_page(raw: &str) -> Result<usize, Error> {
    match raw.parse::<usize>() {
        Ok(page) if page > 0 => Ok(page),
        _ => Err(Error::InvalidInput(format!(
            "Invalid page '{raw}': must be a positive integer"
        ))),
    }
}

/// Rows skipped before 1-based `page`, or `None` if that overflows.
fn page_offset(page: usize, page_size: usize) -> Option<usize> {
    page.checked_sub(1)?.checked_mul(page_size)
}

async fn load_result(state: &AnalystState, task_id: &str) -> Result<ScreenerResult, Error> {
    state
        .storage
        .get_screener_result(task_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("screener result for task {task_id}")))
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        service: "analyst".to_string(),
    })
}

/// Landing page
pub async fn index(State(state): State<Arc<AnalystState>>) -> ApiResult<Html<String>> {
    let html = state.templates.render(
        templates::INDEX,
        &serde_json::json!({ "version": env!("CARGO_PKG_VERSION") }),
    )?;
    Ok(Html(html))
}

/// Screener runs, newest first
pub async fn screener_tasks(
    State(state): State<Arc<AnalystState>>,
    Query(query): Query<TaskListQuery>,
) -> ApiResult<Html<String>> {
    let view = TaskListView {
        tasks: state.storage.list_tasks(TaskType::Screener, query.limit).await?,
        latest_fetch: state.storage.latest_complete_task(TaskType::GetStockData).await?,
    };
    Ok(Html(state.templates.render(templates::SCREENER_TASKS, &view)?))
}

/// One page of the stocks a task produced, with their latest quarters
pub async fn screener_stock_data(
    State(state): State<Arc<AnalystState>>,
    Path((task_id, page)): Path<(String, String)>,
) -> ApiResult<Html<String>> {
    let page = parse_page(&page)?;
    let skip = page_offset(page, PAGE_SIZE)
        .ok_or_else(|| Error::InvalidInput(format!("Page {page} is out of range")))?;
    let result = load_result(&state, &task_id).await?;

    let stock_page = state
        .storage
        .page_stock_data(&result.data_task_id, &result.ticker_symbols, skip, PAGE_SIZE)
        .await?;

    let stocks = stock_page
        .documents
        .into_iter()
        .map(|doc| StockView {
            financials: latest_quarters(&doc.data.financial_statements.quarter),
            symbol: doc.symbol.symbol,
            name: doc.symbol.name,
        })
        .collect();

    let view = StockPageView {
        task_id: result.task_id,
        description: result.description,
        stocks,
        pagination: Pagination::new(page, PAGE_SIZE, stock_page.total),
    };
    Ok(Html(state.templates.render(templates::SCREENER_STOCK_DATA, &view)?))
}

/// Symbols a task produced, as JSON
pub async fn screener_result(
    State(state): State<Arc<AnalystState>>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<ScreenerResult>> {
    Ok(Json(load_result(&state, &task_id).await?))
}

/// Recent daily candles for a symbol with smoothed pivots
pub async fn chart_simple(
    State(state): State<Arc<AnalystState>>,
    Path(symbol): Path<String>,
    Query(query): Query<ChartQuery>,
) -> ApiResult<Json<ChartData>> {
    let days = query.days.unwrap_or(state.config.screener.chart_days);
    if days == 0 {
        return Err(Error::InvalidInput("days must be positive".into()).into());
    }

    let document = state
        .storage
        .get_stock_data(&symbol)
        .await?
        .ok_or_else(|| Error::NotFound(format!("stock data for {symbol}")))?;

    let chart = ChartData::build(
        symbol,
        &document.data.prices.to_price_points(),
        days,
        state.config.screener.chart_threshold_pct,
    )
    .map_err(|e| Error::InvalidInput(e.to_string()))?;

    Ok(Json(chart))
}

/// Build the dashboard router.
pub fn router(state: Arc<AnalystState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/screener", get(screener_tasks))
        .route("/screener/:task_id/:page", get(screener_stock_data))
        .route("/chart/simple/:symbol", get(chart_simple))
        .route("/api/v1/screener/:task_id", get(screener_result))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(1, 12 => (None, Some(2), "1 - 5".to_string()); "first of three")]
    #[test_case(2, 12 => (Some(1), Some(3), "6 - 10".to_string()); "middle")]
    #[test_case(3, 12 => (Some(2), None, "11 - 12".to_string()); "last partial")]
    #[test_case(1, 5 => (None, None, "1 - 5".to_string()); "exactly one page")]
    #[test_case(1, 0 => (None, None, "0 - 0".to_string()); "empty")]
    #[test_case(4, 12 => (Some(3), None, "0 - 0".to_string()); "past the end")]
    #[test_case(usize::MAX, 12 => (Some(usize::MAX - 1), None, "0 - 0".to_string()); "largest page")]
    fn test_pagination(page: usize, total: usize) -> (Option<usize>, Option<usize>, String) {
        let p = Pagination::new(page, PAGE_SIZE, total);
        (p.prev, p.next, p.current)
    }

    #[test]
    fn test_parse_page() {
        assert_eq!(parse_page("3").unwrap(), 3);
        assert!(parse_page("0").is_err());
        assert!(parse_page("-1").is_err());
        assert!(parse_page("abc").is_err());
    }

    #[test]
    fn test_page_offset() {
        assert_eq!(page_offset(1, PAGE_SIZE), Some(0));
        assert_eq!(page_offset(3, PAGE_SIZE), Some(10));
        assert_eq!(page_offset(0, PAGE_SIZE), None);
        assert_eq!(page_offset(usize::MAX, PAGE_SIZE), None);
        let last = usize::MAX / PAGE_SIZE + 1;
        assert_eq!(page_offset(last, PAGE_SIZE), Some((last - 1) * PAGE_SIZE));
    }

    #[test]
    fn test_latest_quarters() {
        let records: Vec<FinancialRecord> = ["2023-03-31", "2023-06-30", "2023-09-30", "2023-12-31", "2024-03-31"]
            .iter()
            .map(|d| FinancialRecord::new(*d, &[("revenue", 1.0)]))
            .collect();
        let latest = latest_quarters(&records);
        let dates: Vec<&str> = latest.iter().map(|r| r.date.as_str()).collect();
        assert_eq!(dates, vec!["2024-03-31", "2023-12-31", "2023-09-30", "2023-06-30"]);
    }

    #[test]
    fn test_api_error_status() {
        let response = ApiError::from(Error::NotFound("x".into())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let response = ApiError::from(anyhow::anyhow!("boom")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
