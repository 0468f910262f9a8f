//! Mock execution channel for testing.
//!
//! Returns scripted results or failures per SQL text, so engine and
//! comparator behavior can be tested without a live data source.

use super::{ColumnInfo, ExecutionChannel, NormalizedResult, NormalizedRow};
use crate::error::{ExecutionError, ExecutionErrorKind, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// An execution channel that replays scripted outcomes.
///
/// Unscripted SELECT statements fall back to a canned single-row result;
/// anything else returns an invalid-SQL failure, mirroring how a
/// read-only sandbox rejects unexpected statements.
#[derive(Default)]
pub struct MockChannel {
    scripted: HashMap<String, std::result::Result<NormalizedResult, ExecutionError>>,
}

impl MockChannel {
    /// Creates a mock channel with no scripted outcomes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts a successful result for the given SQL text.
    pub fn with_result(
        mut self,
        sql: impl Into<String>,
        columns: Vec<ColumnInfo>,
        rows: Vec<NormalizedRow>,
    ) -> Self {
        self.scripted.insert(
            sql.into(),
            Ok(NormalizedResult::with_data(columns, rows)
                .with_execution_time(Duration::from_millis(1))),
        );
        self
    }

    /// Scripts row data for the given SQL text, with generated column labels.
    pub fn with_rows(self, sql: impl Into<String>, rows: Vec<Vec<&str>>) -> Self {
        let width = rows.first().map(|r| r.len()).unwrap_or(0);
        let columns = (0..width)
            .map(|i| ColumnInfo::new(format!("col{i}"), "TEXT"))
            .collect();
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(String::from).collect())
            .collect();
        self.with_result(sql, columns, rows)
    }

    /// Scripts a failure for the given SQL text.
    pub fn with_failure(
        mut self,
        sql: impl Into<String>,
        kind: ExecutionErrorKind,
        message: impl Into<String>,
    ) -> Self {
        self.scripted
            .insert(sql.into(), Err(ExecutionError::new(kind, message)));
        self
    }
}

#[async_trait]
impl ExecutionChannel for MockChannel {
    async fn execute(&self, sql: &str) -> std::result::Result<NormalizedResult, ExecutionError> {
        if let Some(outcome) = self.scripted.get(sql) {
            return outcome.clone();
        }

        if sql.trim_start().to_uppercase().starts_with("SELECT") {
            let columns = vec![ColumnInfo::new("result", "TEXT")];
            let rows = vec![vec![format!("Mock result for: {sql}")]];
            Ok(NormalizedResult::with_data(columns, rows)
                .with_execution_time(Duration::from_millis(1)))
        } else {
            Err(ExecutionError::new(
                ExecutionErrorKind::InvalidSql,
                format!("statement rejected by mock channel: {sql}"),
            ))
        }
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_result() {
        let channel = MockChannel::new().with_rows("SELECT a", vec![vec!["1", "x"]]);
        let result = channel.execute("SELECT a").await.unwrap();
        assert_eq!(result.rows, vec![vec!["1".to_string(), "x".to_string()]]);
        assert_eq!(result.column_labels(), vec!["col0", "col1"]);
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let channel = MockChannel::new().with_failure(
            "SELECT broken",
            ExecutionErrorKind::InvalidSql,
            "syntax error",
        );
        let error = channel.execute("SELECT broken").await.unwrap_err();
        assert_eq!(error.kind, ExecutionErrorKind::InvalidSql);
    }

    #[tokio::test]
    async fn test_unscripted_select_falls_back() {
        let channel = MockChannel::new();
        let result = channel.execute("SELECT 1").await.unwrap();
        assert_eq!(result.row_count(), 1);
        assert_eq!(result.columns.len(), 1);
    }

    #[tokio::test]
    async fn test_unscripted_non_select_fails() {
        let channel = MockChannel::new();
        let error = channel.execute("DROP TABLE users").await.unwrap_err();
        assert_eq!(error.kind, ExecutionErrorKind::InvalidSql);
    }
}
