//! Local document storage using SQLite.
//!
//! Provides persistent storage for:
//! - Task bookkeeping records
//! - Stock data documents (statements + daily prices per symbol)
//! - Screener results (the symbols each task produced)
//!
//! Documents are stored as JSON next to the columns they are queried by.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, ToSql};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{ScreenerResult, StockData, StockDataDocument, SymbolInfo};
use crate::task::{TaskRecord, TaskType};

// ============================================================================
// Database Schema
// ============================================================================

const CREATE_TABLES_SQL: &str = r#"
-- Task bookkeeping
CREATE TABLE IF NOT EXISTS tasks (
    task_id TEXT PRIMARY KEY,
    task_type TEXT NOT NULL,
    description TEXT NOT NULL,
    started TEXT NOT NULL,
    ended TEXT,
    complete INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_tasks_type_started
ON tasks(task_type, started DESC);

-- Stock data documents
CREATE TABLE IF NOT EXISTS stock_data (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    task_id TEXT NOT NULL,
    symbol TEXT NOT NULL,
    symbol_json TEXT NOT NULL,
    data_json TEXT NOT NULL,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP,
    UNIQUE(task_id, symbol)
);

CREATE INDEX IF NOT EXISTS idx_stock_data_symbol
ON stock_data(symbol);

-- Screener results
CREATE TABLE IF NOT EXISTS screener_results (
    task_id TEXT PRIMARY KEY,
    data_task_id TEXT NOT NULL,
    description TEXT NOT NULL,
    ticker_symbols_json TEXT NOT NULL,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP
);
"#;

// ============================================================================
// Configuration
// ============================================================================

/// Local storage configuration
#[derive(Debug, Clone)]
pub struct LocalStorageConfig {
    /// Database file path
    pub db_path: PathBuf,
}

impl Default for LocalStorageConfig {
    fn default() -> Self {
        Self {
            db_path: analyst_common::StorageConfig::default().db_path(),
        }
    }
}

impl From<&analyst_common::StorageConfig> for LocalStorageConfig {
    fn from(config: &analyst_common::StorageConfig) -> Self {
        Self {
            db_path: config.db_path(),
        }
    }
}

/// One page of stock data documents for a symbol set.
#[derive(Debug, Clone)]
pub struct StockDataPage {
    pub documents: Vec<StockDataDocument>,
    /// Documents matching the symbol set across all pages
    pub total: usize,
}

// ============================================================================
// Local Storage
// ============================================================================

/// Local SQLite document store
pub struct LocalStorage {
    /// rusqlite::Connection is Send but not Sync, so it lives behind a Mutex
    db: Arc<Mutex<Connection>>,
    config: LocalStorageConfig,
}

fn document_from_row(task_id: String, symbol_json: &str, data_json: &str) -> Result<StockDataDocument> {
    let symbol: SymbolInfo =
        serde_json::from_str(symbol_json).context("Failed to decode stored symbol")?;
    let data: StockData =
        serde_json::from_str(data_json).context("Failed to decode stored stock data")?;
    Ok(StockDataDocument {
        task_id,
        symbol,
        data,
    })
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

impl LocalStorage {
    /// Open (or create) the database.
    pub fn new(config: LocalStorageConfig) -> Result<Self> {
        if let Some(parent) = config.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&config.db_path).context("Failed to open analyst database")?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .context("Failed to set database pragmas")?;

        conn.execute_batch(CREATE_TABLES_SQL)
            .context("Failed to create database tables")?;

        info!(db_path = %config.db_path.display(), "Initialized local storage");

        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
            config,
        })
    }

    /// Get the database path
    pub fn db_path(&self) -> &PathBuf {
        &self.config.db_path
    }

    // ========================================================================
    // Task Operations
    // ========================================================================

    /// Insert or replace a task record
    pub async fn save_task(&self, task: &TaskRecord) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            r#"
            INSERT OR REPLACE INTO tasks
            (task_id, task_type, description, started, ended, complete)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                task.task_id,
                task.task_type.as_str(),
                task.description,
                task.started,
                task.ended,
                task.complete,
            ],
        )
        .context("Failed to save task")?;
        Ok(())
    }

    /// Mark a task complete with its end timestamp
    pub async fn complete_task(&self, task_id: &str, ended: &str) -> Result<()> {
        let db = self.db.lock().await;
        let updated = db.execute(
            "UPDATE tasks SET complete = 1, ended = ?2 WHERE task_id = ?1",
            params![task_id, ended],
        )?;
        if updated == 0 {
            anyhow::bail!("Task {task_id} not found");
        }
        Ok(())
    }

    /// Get a task by id
    pub async fn get_task(&self, task_id: &str) -> Result<Option<TaskRecord>> {
        let db = self.db.lock().await;
        db.query_row(
            "SELECT task_id, task_type, description, started, ended, complete FROM tasks WHERE task_id = ?1",
            params![task_id],
            TaskRecord::from_row,
        )
        .optional()
        .context("Failed to load task")
    }

    /// Tasks of one type, newest first
    pub async fn list_tasks(&self, task_type: TaskType, limit: usize) -> Result<Vec<TaskRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            r#"
            SELECT task_id, task_type, description, started, ended, complete
            FROM tasks
            WHERE task_type = ?1
            ORDER BY started DESC
            LIMIT ?2
            "#,
        )?;

        let tasks = stmt
            .query_map(params![task_type.as_str(), limit as i64], TaskRecord::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tasks)
    }

    /// Most recent completed task of one type
    pub async fn latest_complete_task(&self, task_type: TaskType) -> Result<Option<TaskRecord>> {
        let db = self.db.lock().await;
        db.query_row(
            r#"
            SELECT task_id, task_type, description, started, ended, complete
            FROM tasks
            WHERE task_type = ?1 AND complete = 1
            ORDER BY started DESC
            LIMIT 1
            "#,
            params![task_type.as_str()],
            TaskRecord::from_row,
        )
        .optional()
        .context("Failed to load latest task")
    }

    // ========================================================================
    // Stock Data Operations
    // ========================================================================

    /// Save the stock data fetched for one symbol by a task
    pub async fn save_stock_data(&self, document: &StockDataDocument) -> Result<()> {
        let symbol_json = serde_json::to_string(&document.symbol)?;
        let data_json = serde_json::to_string(&document.data)?;

        let db = self.db.lock().await;
        db.execute(
            r#"
            INSERT OR REPLACE INTO stock_data (task_id, symbol, symbol_json, data_json)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                document.task_id,
                document.symbol.symbol,
                symbol_json,
                data_json
            ],
        )
        .context("Failed to save stock data")?;

        debug!(task_id = %document.task_id, symbol = %document.symbol.symbol, "Saved stock data");
        Ok(())
    }

    /// Latest stored stock data for a symbol, whichever task fetched it
    pub async fn get_stock_data(&self, symbol: &str) -> Result<Option<StockDataDocument>> {
        let row: Option<(String, String, String)> = {
            let db = self.db.lock().await;
            db.query_row(
                r#"
                SELECT task_id, symbol_json, data_json FROM stock_data
                WHERE symbol = ?1
                ORDER BY id DESC
                LIMIT 1
                "#,
                params![symbol],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?
        };

        row.map(|(task_id, symbol_json, data_json)| {
            document_from_row(task_id, &symbol_json, &data_json)
        })
        .transpose()
    }

    /// Stock data a specific task saved for a symbol
    pub async fn get_task_stock_data(
        &self,
        task_id: &str,
        symbol: &str,
    ) -> Result<Option<StockDataDocument>> {
        let row: Option<(String, String)> = {
            let db = self.db.lock().await;
            db.query_row(
                "SELECT symbol_json, data_json FROM stock_data WHERE task_id = ?1 AND symbol = ?2",
                params![task_id, symbol],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
        };

        row.map(|(symbol_json, data_json)| {
            document_from_row(task_id.to_string(), &symbol_json, &data_json)
        })
        .transpose()
    }

    /// Symbols saved by one task, sorted
    pub async fn list_task_symbols(&self, task_id: &str) -> Result<Vec<String>> {
        let db = self.db.lock().await;
        let mut stmt =
            db.prepare("SELECT symbol FROM stock_data WHERE task_id = ?1 ORDER BY symbol")?;
        let symbols = stmt
            .query_map(params![task_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(symbols)
    }

    /// One page of the stock data `data_task_id` saved for a symbol set, ordered by symbol
    pub async fn page_stock_data(
        &self,
        data_task_id: &str,
        symbols: &[String],
        offset: usize,
        limit: usize,
    ) -> Result<StockDataPage> {
        if symbols.is_empty() {
            return Ok(StockDataPage {
                documents: Vec::new(),
                total: 0,
            });
        }

        let db = self.db.lock().await;
        let marks = placeholders(symbols.len());

        let mut args: Vec<&dyn ToSql> = Vec::with_capacity(symbols.len() + 3);
        args.push(&data_task_id);
        args.extend(symbols.iter().map(|s| s as &dyn ToSql));

        let total: i64 = db.query_row(
            &format!("SELECT COUNT(*) FROM stock_data WHERE task_id = ? AND symbol IN ({marks})"),
            args.as_slice(),
            |row| row.get(0),
        )?;
        let total = total as usize;

        if offset >= total || limit == 0 {
            return Ok(StockDataPage {
                documents: Vec::new(),
                total,
            });
        }

        // offset < total, so both fit in SQLite's integer range
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let offset = offset as i64;
        args.push(&limit);
        args.push(&offset);

        let mut stmt = db.prepare(&format!(
            r#"
            SELECT task_id, symbol_json, data_json FROM stock_data
            WHERE task_id = ? AND symbol IN ({marks})
            ORDER BY symbol ASC
            LIMIT ? OFFSET ?
            "#
        ))?;

        let rows = stmt
            .query_map(args.as_slice(), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let documents = rows
            .into_iter()
            .map(|(task_id, symbol_json, data_json)| {
                document_from_row(task_id, &symbol_json, &data_json)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(StockDataPage { documents, total })
    }

    /// Number of stored stock data documents
    pub async fn count_stock_data(&self) -> Result<usize> {
        let db = self.db.lock().await;
        let count: i64 = db.query_row("SELECT COUNT(*) FROM stock_data", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Remove every stored stock data document
    pub async fn drop_stock_data(&self) -> Result<usize> {
        let db = self.db.lock().await;
        let removed = db
            .execute("DELETE FROM stock_data", [])
            .context("Failed to drop stock data")?;
        info!(removed, "Dropped stored stock data");
        Ok(removed)
    }

    // ========================================================================
    // Screener Result Operations
    // ========================================================================

    /// Save the symbols a task produced
    pub async fn save_screener_result(&self, result: &ScreenerResult) -> Result<()> {
        let symbols_json = serde_json::to_string(&result.ticker_symbols)?;

        let db = self.db.lock().await;
        db.execute(
            r#"
            INSERT OR REPLACE INTO screener_results
            (task_id, data_task_id, description, ticker_symbols_json)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                result.task_id,
                result.data_task_id,
                result.description,
                symbols_json
            ],
        )
        .context("Failed to save screener result")?;
        Ok(())
    }

    /// Symbols a task produced
    pub async fn get_screener_result(&self, task_id: &str) -> Result<Option<ScreenerResult>> {
        let row: Option<(String, String, String, String)> = {
            let db = self.db.lock().await;
            db.query_row(
                r#"
                SELECT task_id, data_task_id, description, ticker_symbols_json
                FROM screener_results WHERE task_id = ?1
                "#,
                params![task_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?
        };

        row.map(|(task_id, data_task_id, description, symbols_json)| {
            let ticker_symbols: Vec<String> = serde_json::from_str(&symbols_json)
                .context("Failed to decode stored ticker symbols")?;
            Ok(ScreenerResult {
                task_id,
                data_task_id,
                description,
                ticker_symbols,
            })
        })
        .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{FinancialRecord, FinancialStatements, PriceHistory};
    use tempfile::{tempdir, TempDir};

    fn create_test_storage() -> (LocalStorage, TempDir) {
        let dir = tempdir().unwrap();
        let config = LocalStorageConfig {
            db_path: dir.path().join("test_analyst.db"),
        };
        (LocalStorage::new(config).unwrap(), dir)
    }

    fn document(task_id: &str, symbol: &str) -> StockDataDocument {
        StockDataDocument {
            task_id: task_id.into(),
            symbol: SymbolInfo::new(symbol),
            data: StockData {
                financial_statements: FinancialStatements {
                    quarter: vec![FinancialRecord::new("2024-03-31", &[("revenue", 10.0)])],
                },
                prices: PriceHistory {
                    symbol: symbol.into(),
                    historical: Vec::new(),
                },
            },
        }
    }

    fn task(task_id: &str, task_type: TaskType, started: &str) -> TaskRecord {
        TaskRecord {
            task_id: task_id.into(),
            task_type,
            description: format!("{task_id} description"),
            started: started.into(),
            ended: None,
            complete: false,
        }
    }

    #[tokio::test]
    async fn test_task_lifecycle() {
        let (storage, _dir) = create_test_storage();

        storage
            .save_task(&task("t1", TaskType::Screener, "2024-01-01T00:00:00+00:00"))
            .await
            .unwrap();
        storage.complete_task("t1", "2024-01-01T00:05:00+00:00").await.unwrap();

        let loaded = storage.get_task("t1").await.unwrap().unwrap();
        assert!(loaded.complete);
        assert_eq!(loaded.ended.as_deref(), Some("2024-01-01T00:05:00+00:00"));
        assert!(storage.get_task("missing").await.unwrap().is_none());
        assert!(storage.complete_task("missing", "now").await.is_err());
    }

    #[tokio::test]
    async fn test_list_tasks_newest_first_by_type() {
        let (storage, _dir) = create_test_storage();

        for (id, kind, started) in [
            ("old", TaskType::Screener, "2024-01-01T00:00:00+00:00"),
            ("new", TaskType::Screener, "2024-02-01T00:00:00+00:00"),
            ("fetch", TaskType::GetStockData, "2024-03-01T00:00:00+00:00"),
        ] {
            storage.save_task(&task(id, kind, started)).await.unwrap();
        }

        let screeners = storage.list_tasks(TaskType::Screener, 100).await.unwrap();
        let ids: Vec<&str> = screeners.iter().map(|t| t.task_id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old"]);

        let limited = storage.list_tasks(TaskType::Screener, 1).await.unwrap();
        assert_eq!(limited.len(), 1);

        assert!(storage
            .latest_complete_task(TaskType::GetStockData)
            .await
            .unwrap()
            .is_none());
        storage.complete_task("fetch", "2024-03-01T01:00:00+00:00").await.unwrap();
        let latest = storage
            .latest_complete_task(TaskType::GetStockData)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.task_id, "fetch");
    }

    #[tokio::test]
    async fn test_stock_data_save_and_query() {
        let (storage, _dir) = create_test_storage();

        for symbol in ["MSFT", "AAPL", "NVDA"] {
            storage.save_stock_data(&document("fetch-1", symbol)).await.unwrap();
        }

        assert_eq!(storage.count_stock_data().await.unwrap(), 3);
        assert_eq!(
            storage.list_task_symbols("fetch-1").await.unwrap(),
            vec!["AAPL", "MSFT", "NVDA"]
        );

        let doc = storage.get_stock_data("AAPL").await.unwrap().unwrap();
        assert_eq!(doc.task_id, "fetch-1");
        assert_eq!(doc.data.financial_statements.quarter[0].metric("revenue"), Some(10.0));
        assert!(storage.get_stock_data("TSLA").await.unwrap().is_none());

        let removed = storage.drop_stock_data().await.unwrap();
        assert_eq!(removed, 3);
        assert_eq!(storage.count_stock_data().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_page_stock_data() {
        let (storage, _dir) = create_test_storage();
        for symbol in ["E", "D", "C", "B", "A", "Z"] {
            storage.save_stock_data(&document("fetch-1", symbol)).await.unwrap();
        }

        let wanted: Vec<String> = ["A", "B", "C", "D", "E"].iter().map(|s| s.to_string()).collect();

        let first = storage.page_stock_data("fetch-1", &wanted, 0, 3).await.unwrap();
        assert_eq!(first.total, 5);
        let symbols: Vec<&str> = first.documents.iter().map(|d| d.symbol.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["A", "B", "C"]);

        let second = storage.page_stock_data("fetch-1", &wanted, 3, 3).await.unwrap();
        assert_eq!(second.documents.len(), 2);

        let past_end = storage
            .page_stock_data("fetch-1", &wanted, usize::MAX - 4, 5)
            .await
            .unwrap();
        assert!(past_end.documents.is_empty());
        assert_eq!(past_end.total, 5);

        let empty = storage.page_stock_data("fetch-1", &[], 0, 5).await.unwrap();
        assert_eq!(empty.total, 0);
    }

    #[tokio::test]
    async fn test_page_stock_data_scoped_to_one_fetch() {
        let (storage, _dir) = create_test_storage();
        for task_id in ["fetch-1", "fetch-2"] {
            for symbol in ["AAPL", "MSFT"] {
                storage.save_stock_data(&document(task_id, symbol)).await.unwrap();
            }
        }

        let wanted = vec!["AAPL".to_string()];
        let page = storage.page_stock_data("fetch-2", &wanted, 0, 5).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.documents.len(), 1);
        assert_eq!(page.documents[0].task_id, "fetch-2");

        let older = storage.page_stock_data("fetch-1", &wanted, 0, 5).await.unwrap();
        assert_eq!(older.documents[0].task_id, "fetch-1");
    }

    #[tokio::test]
    async fn test_get_task_stock_data() {
        let (storage, _dir) = create_test_storage();
        storage.save_stock_data(&document("fetch-1", "AAPL")).await.unwrap();
        storage.save_stock_data(&document("fetch-2", "AAPL")).await.unwrap();

        let doc = storage.get_task_stock_data("fetch-1", "AAPL").await.unwrap().unwrap();
        assert_eq!(doc.task_id, "fetch-1");
        assert_eq!(storage.get_stock_data("AAPL").await.unwrap().unwrap().task_id, "fetch-2");
        assert!(storage.get_task_stock_data("fetch-3", "AAPL").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_screener_result_roundtrip() {
        let (storage, _dir) = create_test_storage();
        let result = ScreenerResult {
            task_id: "s1".into(),
            data_task_id: "fetch-1".into(),
            description: "2x movers".into(),
            ticker_symbols: vec!["AAPL".into(), "MSFT".into()],
        };

        storage.save_screener_result(&result).await.unwrap();
        assert_eq!(storage.get_screener_result("s1").await.unwrap(), Some(result));
        assert!(storage.get_screener_result("s2").await.unwrap().is_none());
    }
}
