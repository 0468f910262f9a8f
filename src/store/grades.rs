//! Grade persistence.
//!
//! A grade is keyed by (user_id, assignment_id) and only ever moves up.
//! The merge is a single conditional upsert so concurrent resubmissions
//! for the same key cannot lose updates.

use crate::error::{GraderError, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;
use sqlx::FromRow;

/// One row of a learner's score report.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AssignmentScore {
    pub assignment_id: i64,
    pub assignment_name: String,
    pub grade: i64,
}

/// Fetches the stored grade for a (user, assignment) pair.
pub async fn get_grade(pool: &SqlitePool, user_id: i64, assignment_id: i64) -> Result<Option<i64>> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT grade FROM grades WHERE user_id = ? AND assignment_id = ?")
            .bind(user_id)
            .bind(assignment_id)
            .fetch_optional(pool)
            .await
            .map_err(|e| GraderError::persistence(format!("Failed to fetch grade: {e}")))?;

    Ok(row.map(|(g,)| g))
}

/// Commits a new score, keeping the stored grade monotonic.
///
/// Absent a prior grade the score is stored unconditionally; otherwise
/// the stored grade becomes `max(existing, new)`. One statement, atomic
/// at the storage layer. Returns the stored (best) grade.
pub async fn upsert_with_max(
    pool: &SqlitePool,
    user_id: i64,
    assignment_id: i64,
    score: i64,
) -> Result<i64> {
    let (grade,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO grades (user_id, assignment_id, grade)
        VALUES (?, ?, ?)
        ON CONFLICT (user_id, assignment_id) DO UPDATE SET
            grade = MAX(grades.grade, excluded.grade),
            updated_at = datetime('now')
        RETURNING grade
        "#,
    )
    .bind(user_id)
    .bind(assignment_id)
    .bind(score)
    .fetch_one(pool)
    .await
    .map_err(|e| GraderError::persistence(format!("Failed to commit grade: {e}")))?;

    Ok(grade)
}

/// Lists a learner's graded assignments with their best scores.
pub async fn assignment_scores(pool: &SqlitePool, user_id: i64) -> Result<Vec<AssignmentScore>> {
    sqlx::query_as::<_, AssignmentScore>(
        r#"
        SELECT g.assignment_id, a.name AS assignment_name, g.grade
        FROM grades g
        JOIN assignments a ON g.assignment_id = a.id
        WHERE g.user_id = ?
        ORDER BY a.name
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(|e| GraderError::persistence(format!("Failed to fetch scores: {e}")))
}

/// Returns a learner's average grade, or None with no grades yet.
pub async fn average_grade(pool: &SqlitePool, user_id: i64) -> Result<Option<f64>> {
    let (avg,): (Option<f64>,) =
        sqlx::query_as("SELECT AVG(grade) FROM grades WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(pool)
            .await
            .map_err(|e| GraderError::persistence(format!("Failed to fetch average: {e}")))?;

    Ok(avg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RecordStore;
    use tempfile::tempdir;

    async fn test_store() -> (RecordStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("records.db");
        let store = RecordStore::open(&path).await.unwrap();
        (store, dir)
    }

    async fn insert_assignment(store: &RecordStore, id: i64, name: &str) {
        sqlx::query("INSERT INTO assignments (id, name, answer_key) VALUES (?, ?, 'SELECT 1')")
            .bind(id)
            .bind(name)
            .execute(store.pool())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_first_submission_stores_unconditionally() {
        let (store, _dir) = test_store().await;
        insert_assignment(&store, 1, "basics").await;

        assert_eq!(get_grade(store.pool(), 5, 1).await.unwrap(), None);

        let best = upsert_with_max(store.pool(), 5, 1, 0).await.unwrap();
        assert_eq!(best, 0);
        assert_eq!(get_grade(store.pool(), 5, 1).await.unwrap(), Some(0));

        store.close().await;
    }

    #[tokio::test]
    async fn test_upsert_raises_and_never_lowers() {
        let (store, _dir) = test_store().await;
        insert_assignment(&store, 1, "basics").await;

        assert_eq!(upsert_with_max(store.pool(), 5, 1, 50).await.unwrap(), 50);
        assert_eq!(upsert_with_max(store.pool(), 5, 1, 100).await.unwrap(), 100);
        assert_eq!(upsert_with_max(store.pool(), 5, 1, 50).await.unwrap(), 100);

        assert_eq!(get_grade(store.pool(), 5, 1).await.unwrap(), Some(100));

        store.close().await;
    }

    #[tokio::test]
    async fn test_grades_keyed_per_user_and_assignment() {
        let (store, _dir) = test_store().await;
        insert_assignment(&store, 1, "basics").await;
        insert_assignment(&store, 2, "joins").await;

        upsert_with_max(store.pool(), 5, 1, 100).await.unwrap();
        upsert_with_max(store.pool(), 5, 2, 50).await.unwrap();
        upsert_with_max(store.pool(), 6, 1, 0).await.unwrap();

        assert_eq!(get_grade(store.pool(), 5, 1).await.unwrap(), Some(100));
        assert_eq!(get_grade(store.pool(), 5, 2).await.unwrap(), Some(50));
        assert_eq!(get_grade(store.pool(), 6, 1).await.unwrap(), Some(0));

        store.close().await;
    }

    #[tokio::test]
    async fn test_assignment_scores_and_average() {
        let (store, _dir) = test_store().await;
        insert_assignment(&store, 1, "basics").await;
        insert_assignment(&store, 2, "joins").await;

        upsert_with_max(store.pool(), 5, 1, 100).await.unwrap();
        upsert_with_max(store.pool(), 5, 2, 50).await.unwrap();

        let scores = assignment_scores(store.pool(), 5).await.unwrap();
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0].assignment_name, "basics");
        assert_eq!(scores[0].grade, 100);
        assert_eq!(scores[1].assignment_name, "joins");
        assert_eq!(scores[1].grade, 50);

        let avg = average_grade(store.pool(), 5).await.unwrap();
        assert_eq!(avg, Some(75.0));

        store.close().await;
    }

    #[tokio::test]
    async fn test_average_grade_none_without_grades() {
        let (store, _dir) = test_store().await;
        let avg = average_grade(store.pool(), 99).await.unwrap();
        assert_eq!(avg, None);
        store.close().await;
    }
}
