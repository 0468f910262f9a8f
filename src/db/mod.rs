//! Grading channel abstraction.
//!
//! Provides a trait-based interface for executing arbitrary SQL text
//! against the sandboxed grading data source, allowing different
//! backends (and a mock for tests) to be used interchangeably.

mod mock;
mod postgres;
mod types;

pub use mock::MockChannel;
pub use postgres::PostgresChannel;
pub use types::{ColumnInfo, NormalizedResult, NormalizedRow, NULL_SENTINEL};

use crate::config::ConnectionConfig;
use crate::error::{ExecutionError, Result};
use async_trait::async_trait;

/// Supported grading data source backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelBackend {
    #[default]
    Postgres,
    // Future: MySQL, SQLite, etc.
}

/// Opens an execution channel for the given backend and configuration.
///
/// This is the central factory function for grading connections. The
/// returned channel must be bound to a sandboxed role: the engine does
/// not inspect or restrict the SQL it is given.
pub async fn connect(config: &ConnectionConfig) -> Result<Box<dyn ExecutionChannel>> {
    match config.backend {
        ChannelBackend::Postgres => {
            let channel = PostgresChannel::connect(config).await?;
            Ok(Box::new(channel))
        }
    }
}

/// A channel that runs untrusted SQL text and returns normalized results.
///
/// Implementations discover the result shape at execution time and
/// stringify every value, mapping SQL NULL to [`NULL_SENTINEL`]. Row
/// order must be preserved exactly as returned by the data source.
#[async_trait]
pub trait ExecutionChannel: Send + Sync {
    /// Executes a SQL text and materializes its result.
    async fn execute(&self, sql: &str) -> std::result::Result<NormalizedResult, ExecutionError>;

    /// Closes the channel.
    async fn close(&self) -> Result<()>;
}
