//! Assignment lookup.
//!
//! Assignments are authored elsewhere; the engine only reads them to
//! obtain the answer key and display metadata.

use crate::error::{GraderError, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;
use sqlx::FromRow;

/// A SQL exercise: what the learner sees, plus the reference query
/// whose output defines correctness.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Assignment {
    pub id: i64,
    pub name: String,
    pub instructions: String,
    /// The reference SQL query. Immutable except via external authoring.
    pub answer_key: String,
}

/// Fetches an assignment by id.
pub async fn get_assignment(pool: &SqlitePool, id: i64) -> Result<Option<Assignment>> {
    sqlx::query_as::<_, Assignment>(
        "SELECT id, name, instructions, answer_key FROM assignments WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(|e| GraderError::persistence(format!("Failed to fetch assignment {id}: {e}")))
}

/// Lists all assignments, ordered by name.
pub async fn list_assignments(pool: &SqlitePool) -> Result<Vec<Assignment>> {
    sqlx::query_as::<_, Assignment>(
        "SELECT id, name, instructions, answer_key FROM assignments ORDER BY name",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| GraderError::persistence(format!("Failed to list assignments: {e}")))
}
