//! PostgreSQL grading channel.
//!
//! Implements the `ExecutionChannel` trait using sqlx against a
//! sandboxed PostgreSQL role. Submitted SQL is passed through verbatim;
//! whatever the role's privileges allow is what runs.

use crate::config::ConnectionConfig;
use crate::db::{ColumnInfo, ExecutionChannel, NormalizedResult, NormalizedRow, NULL_SENTINEL};
use crate::error::{ExecutionError, ExecutionErrorKind, GraderError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Column as SqlxColumn, Executor, Row as SqlxRow, Statement, TypeInfo, ValueRef};
use uuid::Uuid;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Query timeout in seconds. Expiry is classified as an execution error;
/// there is no other cancellation mechanism.
const QUERY_TIMEOUT_SECS: u64 = 30;

/// Maximum number of connection retry attempts.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay between retry attempts (doubles each retry).
const RETRY_BASE_DELAY_MS: u64 = 500;

/// PostgreSQL execution channel over a small connection pool.
///
/// Each grading call checks a connection out of the pool and returns it
/// on every exit path, so concurrent grading requests stay independent.
#[derive(Debug)]
pub struct PostgresChannel {
    pool: PgPool,
}

impl PostgresChannel {
    /// Connects to the grading data source with bounded retries.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let conn_str = config.to_connection_string()?;

        let mut last_error = None;
        let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);

        for attempt in 1..=MAX_RETRY_ATTEMPTS {
            debug!("Connection attempt {} of {}", attempt, MAX_RETRY_ATTEMPTS);

            let result = PgPoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Duration::from_secs(10))
                .connect(&conn_str)
                .await;

            match result {
                Ok(pool) => {
                    debug!("Connected to grading data source");
                    return Ok(Self { pool });
                }
                Err(e) => {
                    let is_transient = is_transient_error(&e);
                    last_error = Some(e);

                    if attempt < MAX_RETRY_ATTEMPTS && is_transient {
                        warn!(
                            "Connection attempt {} failed (transient error), retrying in {:?}",
                            attempt, delay
                        );
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    }
                }
            }
        }

        // All retries exhausted
        Err(map_connection_error(
            last_error.expect("at least one attempt was made"),
            config,
        ))
    }

    /// Creates a channel from an existing pool. Primarily for testing.
    #[allow(dead_code)]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Recovers column metadata for a query that returned no rows by
    /// preparing the statement and reading its describe output.
    ///
    /// Best-effort: a statement the server cannot describe yields no
    /// metadata rather than failing the whole execution.
    async fn fetch_column_metadata(&self, sql: &str) -> Vec<ColumnInfo> {
        match self.pool.prepare(sql).await {
            Ok(statement) => statement
                .columns()
                .iter()
                .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                .collect(),
            Err(e) => {
                debug!("Could not describe statement for column metadata: {e}");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl ExecutionChannel for PostgresChannel {
    async fn execute(&self, sql: &str) -> std::result::Result<NormalizedResult, ExecutionError> {
        let start = Instant::now();

        let result = tokio::time::timeout(
            Duration::from_secs(QUERY_TIMEOUT_SECS),
            sqlx::query(sql).fetch_all(&self.pool),
        )
        .await
        .map_err(|_| {
            ExecutionError::timeout(format!("Query timed out after {QUERY_TIMEOUT_SECS} seconds"))
        })?
        .map_err(classify_query_error)?;

        let execution_time = start.elapsed();
        debug!(
            rows = result.len(),
            elapsed_ms = execution_time.as_millis() as u64,
            "Query executed"
        );

        let columns: Vec<ColumnInfo> = if let Some(first_row) = result.first() {
            first_row
                .columns()
                .iter()
                .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                .collect()
        } else {
            // No rows came back, so recover the shape from the
            // prepared statement's describe output.
            self.fetch_column_metadata(sql).await
        };

        let rows = result
            .iter()
            .map(normalize_row)
            .collect::<std::result::Result<Vec<NormalizedRow>, ExecutionError>>()?;

        Ok(NormalizedResult {
            columns,
            rows,
            execution_time,
        })
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

/// Stringifies every cell of a PgRow, preserving column order.
fn normalize_row(row: &PgRow) -> std::result::Result<NormalizedRow, ExecutionError> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| normalize_value(row, i, col.type_info().name()))
        .collect()
}

/// Stringifies a single cell. NULL maps to the empty-string sentinel.
///
/// NULL is detected on the raw value before any decode runs, so a
/// decode failure can never masquerade as NULL. Types without a native
/// decode surface an execution error instead of a blank cell.
fn normalize_value(
    row: &PgRow,
    index: usize,
    type_name: &str,
) -> std::result::Result<String, ExecutionError> {
    let raw = row
        .try_get_raw(index)
        .map_err(|e| decode_error(index, type_name, &e))?;
    if raw.is_null() {
        return Ok(NULL_SENTINEL.to_string());
    }

    let decoded = match type_name.to_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => row.try_get::<bool, _>(index).map(|v| v.to_string()),
        "INT2" | "SMALLINT" => row.try_get::<i16, _>(index).map(|v| v.to_string()),
        "INT4" | "INT" | "INTEGER" => row.try_get::<i32, _>(index).map(|v| v.to_string()),
        "INT8" | "BIGINT" => row.try_get::<i64, _>(index).map(|v| v.to_string()),
        "FLOAT4" | "REAL" => row.try_get::<f32, _>(index).map(|v| v.to_string()),
        "FLOAT8" | "DOUBLE PRECISION" => row.try_get::<f64, _>(index).map(|v| v.to_string()),
        "NUMERIC" | "DECIMAL" => row.try_get::<Decimal, _>(index).map(|v| v.to_string()),
        "DATE" => row.try_get::<NaiveDate, _>(index).map(|v| v.to_string()),
        "TIME" => row.try_get::<NaiveTime, _>(index).map(|v| v.to_string()),
        "TIMESTAMP" => row.try_get::<NaiveDateTime, _>(index).map(|v| v.to_string()),
        "TIMESTAMPTZ" => row
            .try_get::<DateTime<Utc>, _>(index)
            .map(|v| v.to_string()),
        "UUID" => row.try_get::<Uuid, _>(index).map(|v| v.to_string()),
        // Everything else as text
        _ => row.try_get::<String, _>(index),
    };

    decoded.map_err(|e| decode_error(index, type_name, &e))
}

fn decode_error(index: usize, type_name: &str, error: &sqlx::Error) -> ExecutionError {
    ExecutionError::new(
        ExecutionErrorKind::UnsupportedType,
        format!("Cannot stringify column {index} of type {type_name}: {error}"),
    )
}

/// Classifies a sqlx query error into the execution taxonomy.
///
/// PostgreSQL SQLSTATE codes distinguish malformed SQL (42601) and
/// unknown objects (42P01 table, 42703 column, 42883 function) from
/// connectivity failures.
fn classify_query_error(error: sqlx::Error) -> ExecutionError {
    if let Some(db_error) = error.as_database_error() {
        let kind = match db_error.code().as_deref() {
            Some("42601") => ExecutionErrorKind::InvalidSql,
            Some("42P01") | Some("42703") | Some("42883") => ExecutionErrorKind::UnknownObject,
            Some(code) if code.starts_with("42") => ExecutionErrorKind::InvalidSql,
            _ => ExecutionErrorKind::Connection,
        };
        return ExecutionError::new(kind, format_database_error(db_error));
    }

    let error_str = error.to_string();
    let kind = if error_str.to_lowercase().contains("timed out") {
        ExecutionErrorKind::Timeout
    } else {
        ExecutionErrorKind::Connection
    };
    ExecutionError::new(kind, error_str)
}

/// Formats a database error with server-side DETAIL and HINT if available.
fn format_database_error(db_error: &dyn sqlx::error::DatabaseError) -> String {
    let mut result = String::new();
    result.push_str(db_error.message());

    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        if let Some(detail) = pg_error.detail() {
            result.push_str("\n  DETAIL: ");
            result.push_str(detail);
        }

        if let Some(hint) = pg_error.hint() {
            result.push_str("\n  HINT: ");
            result.push_str(hint);
        }
    }

    result
}

/// Determines if a connection error is transient and worth retrying.
fn is_transient_error(error: &sqlx::Error) -> bool {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused")
        || error_str.contains("timed out")
        || error_str.contains("timeout")
        || error_str.contains("temporarily unavailable")
        || error_str.contains("connection reset")
        || error_str.contains("broken pipe")
    {
        return true;
    }

    // Authentication and database-not-found errors are not transient
    if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
        || error_str.contains("does not exist")
        || error_str.contains("ssl")
        || error_str.contains("tls")
    {
        return false;
    }

    false
}

/// Maps sqlx connection errors to user-friendly messages.
fn map_connection_error(error: sqlx::Error, config: &ConnectionConfig) -> GraderError {
    let host = config.host.as_deref().unwrap_or("localhost");
    let port = config.port;
    let user = config.user.as_deref().unwrap_or("unknown");
    let database = config.database.as_deref().unwrap_or("unknown");

    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        GraderError::connection(format!(
            "Cannot connect to {host}:{port}. Check that the server is running."
        ))
    } else if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
    {
        GraderError::connection(format!(
            "Authentication failed for user '{user}'. Check your credentials."
        ))
    } else if error_str.contains("does not exist") && error_str.contains("database") {
        GraderError::connection(format!("Database '{database}' does not exist."))
    } else if error_str.contains("ssl") || error_str.contains("tls") {
        GraderError::connection(
            "Server requires SSL. Add '?sslmode=require' to connection string.".to_string(),
        )
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        GraderError::connection(format!(
            "Connection to {host}:{port} timed out. The server may be overloaded or unreachable."
        ))
    } else {
        GraderError::connection(error.to_string())
    }
}
