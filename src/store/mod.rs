//! Record store for the grading platform.
//!
//! SQLite-backed storage for assignments and grades. This is the
//! platform's own record store, deliberately separate from the
//! sandboxed grading data source that student SQL runs against.

pub mod assignments;
pub mod grades;
mod migrations;

pub use assignments::Assignment;
pub use grades::AssignmentScore;

use crate::error::{GraderError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

const MAX_RETRY_ATTEMPTS: u32 = 3;
const RETRY_DELAY_MS: u64 = 100;

/// Main persistence interface for the record database.
pub struct RecordStore {
    pool: SqlitePool,
}

impl RecordStore {
    /// Opens or creates the record database at the specified path.
    pub async fn open(path: &PathBuf) -> Result<Self> {
        Self::ensure_parent_dirs(path)?;

        match Self::try_open(path).await {
            Ok(store) => Ok(store),
            Err(e) => {
                warn!("Failed to open record database: {e}. Attempting recovery...");
                Self::attempt_recovery(path).await
            }
        }
    }

    /// Returns the default record database path for the current platform.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| GraderError::persistence("Could not determine config directory"))?;
        Ok(config_dir.join("sql-grader").join("records.db"))
    }

    /// Attempts to open the database with retries for lock contention.
    async fn try_open(path: &PathBuf) -> Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRY_ATTEMPTS {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS * 2u64.pow(attempt)))
                    .await;
            }

            match Self::connect(path).await {
                Ok(pool) => {
                    migrations::run_migrations(&pool).await?;
                    info!("Record database opened at {}", path.display());
                    return Ok(Self { pool });
                }
                Err(e) => {
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| GraderError::persistence("Failed to open database after retries")))
    }

    /// Creates a connection pool to the SQLite database.
    async fn connect(path: &PathBuf) -> Result<SqlitePool> {
        let conn_str = format!("sqlite:{}?mode=rwc", path.display());
        let options = SqliteConnectOptions::from_str(&conn_str)
            .map_err(|e| GraderError::persistence(format!("Invalid database path: {e}")))?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .create_if_missing(true);

        SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(|e| {
                GraderError::persistence(format!("Failed to connect to record database: {e}"))
            })
    }

    /// Ensures parent directories exist for the database path.
    fn ensure_parent_dirs(path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                GraderError::persistence(format!(
                    "Failed to create config directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
        Ok(())
    }

    /// Attempts to recover from a corrupted database by backing up and recreating.
    async fn attempt_recovery(path: &PathBuf) -> Result<Self> {
        let backup_path = path.with_extension("db.bak");

        if path.exists() {
            std::fs::rename(path, &backup_path).map_err(|e| {
                GraderError::persistence(format!(
                    "Failed to backup corrupted database to {}: {e}",
                    backup_path.display()
                ))
            })?;
            warn!("Backed up corrupted database to {}", backup_path.display());
        }

        Self::try_open(path).await.map_err(|e| {
            GraderError::persistence(format!("Failed to recreate database after backup: {e}"))
        })
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Closes the database connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
