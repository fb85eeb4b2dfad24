//! Task bookkeeping.
//!
//! Every fetch or screener run is recorded with a start time, an end time,
//! and a completion flag so the dashboard can list runs and find the data
//! they produced.

use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::data::LocalStorage;

/// Kind of recorded task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    GetStockData,
    Screener,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GetStockData => "get_stock_data",
            Self::Screener => "screener",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("Unknown task type: {0}")]
pub struct UnknownTaskType(String);

impl FromStr for TaskType {
    type Err = UnknownTaskType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "get_stock_data" => Ok(Self::GetStockData),
            "screener" => Ok(Self::Screener),
            other => Err(UnknownTaskType(other.to_string())),
        }
    }
}

/// Stored task record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: String,
    pub task_type: TaskType,
    pub description: String,
    /// RFC 3339 start timestamp
    pub started: String,
    /// RFC 3339 end timestamp, set on completion
    pub ended: Option<String>,
    pub complete: bool,
}

impl TaskRecord {
    /// New, not yet started record with a fresh id.
    pub fn new(task_type: TaskType, description: impl Into<String>) -> Self {
        Self {
            task_id: uuid::Uuid::new_v4().to_string(),
            task_type,
            description: description.into(),
            started: now_timestamp(),
            ended: None,
            complete: false,
        }
    }

    /// Map a `tasks` row (task_id, task_type, description, started, ended, complete).
    pub(crate) fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let task_type: String = row.get(1)?;
        let task_type = task_type.parse().map_err(|e: UnknownTaskType| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(Self {
            task_id: row.get(0)?,
            task_type,
            description: row.get(2)?,
            started: row.get(3)?,
            ended: row.get(4)?,
            complete: row.get(5)?,
        })
    }
}

/// UTC timestamp with microseconds, sortable as text.
fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Records the start and completion of one task run.
pub struct TaskTracker {
    record: TaskRecord,
    storage: Arc<LocalStorage>,
}

impl TaskTracker {
    pub fn new(storage: Arc<LocalStorage>, task_type: TaskType, description: impl Into<String>) -> Self {
        Self {
            record: TaskRecord::new(task_type, description),
            storage,
        }
    }

    pub fn task_id(&self) -> &str {
        &self.record.task_id
    }

    pub fn record(&self) -> &TaskRecord {
        &self.record
    }

    /// Stamp the start time and insert the record.
    pub async fn mark_start(&mut self) -> Result<()> {
        self.record.started = now_timestamp();
        self.storage.save_task(&self.record).await?;
        info!(
            task_id = %self.record.task_id,
            task_type = %self.record.task_type,
            description = %self.record.description,
            "Task started"
        );
        Ok(())
    }

    /// Stamp the end time and flag the record complete.
    pub async fn mark_complete(&mut self) -> Result<()> {
        let ended = now_timestamp();
        self.storage.complete_task(&self.record.task_id, &ended).await?;
        self.record.ended = Some(ended);
        self.record.complete = true;
        info!(task_id = %self.record.task_id, "Task complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::LocalStorageConfig;
    use tempfile::tempdir;

    #[test]
    fn test_task_type_strings() {
        assert_eq!(TaskType::GetStockData.as_str(), "get_stock_data");
        assert_eq!("screener".parse::<TaskType>().unwrap(), TaskType::Screener);
        assert!("other".parse::<TaskType>().is_err());
        assert_eq!(
            serde_json::to_string(&TaskType::GetStockData).unwrap(),
            "\"get_stock_data\""
        );
    }

    #[test]
    fn test_new_records_have_unique_ids() {
        let a = TaskRecord::new(TaskType::Screener, "a");
        let b = TaskRecord::new(TaskType::Screener, "b");
        assert_ne!(a.task_id, b.task_id);
        assert_eq!(a.task_id.len(), 36);
        assert!(!a.complete);
    }

    #[tokio::test]
    async fn test_tracker_marks_start_and_complete() {
        let dir = tempdir().unwrap();
        let storage = Arc::new(
            LocalStorage::new(LocalStorageConfig {
                db_path: dir.path().join("tasks.db"),
            })
            .unwrap(),
        );

        let mut tracker = TaskTracker::new(storage.clone(), TaskType::GetStockData, "fetch");
        tracker.mark_start().await.unwrap();

        let stored = storage.get_task(tracker.task_id()).await.unwrap().unwrap();
        assert!(!stored.complete);
        assert_eq!(stored.task_type, TaskType::GetStockData);

        tracker.mark_complete().await.unwrap();
        let stored = storage.get_task(tracker.task_id()).await.unwrap().unwrap();
        assert!(stored.complete);
        assert!(stored.ended.unwrap() >= stored.started);
    }
}
