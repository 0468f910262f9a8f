//! Normalized query result types.
//!
//! A result set's shape is only known after execution, so results are
//! modeled as ordered column metadata plus rows of stringified cells
//! rather than per-query record types.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Sentinel for SQL NULL in a normalized row.
///
/// NULL deliberately collapses to the empty string: grading compares
/// stringified output only, so `NULL` and `''` are indistinguishable.
/// This is a documented lossy normalization, not an accident.
pub const NULL_SENTINEL: &str = "";

/// A normalized row: one stringified cell per result column, in column order.
pub type NormalizedRow = Vec<String>;

/// The result of executing a SQL text, materialized into a uniform
/// tabular form suitable for comparison and rendering.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizedResult {
    /// Column metadata, in the order the data source returned it.
    pub columns: Vec<ColumnInfo>,

    /// Rows in the exact order returned. No implicit sorting.
    pub rows: Vec<NormalizedRow>,

    /// Time taken to execute the query.
    #[serde(with = "duration_serde")]
    pub execution_time: Duration,
}

impl NormalizedResult {
    /// Creates a new empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a result with the given columns and rows.
    pub fn with_data(columns: Vec<ColumnInfo>, rows: Vec<NormalizedRow>) -> Self {
        Self {
            columns,
            rows,
            execution_time: Duration::ZERO,
        }
    }

    /// Sets the execution time.
    pub fn with_execution_time(mut self, duration: Duration) -> Self {
        self.execution_time = duration;
        self
    }

    /// Returns true if the result set has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Returns the column labels in order.
    pub fn column_labels(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Metadata about a column in a result set, discovered at execution time.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Column label as reported by the data source.
    pub name: String,

    /// Column data type name as reported by the data source.
    pub data_type: String,
}

impl ColumnInfo {
    /// Creates a new column info with the given name and type.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// Serde support for Duration (not natively supported by serde).
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_nanos().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let nanos = u128::deserialize(deserializer)?;
        Ok(Duration::from_nanos(nanos as u64))
    }
}
