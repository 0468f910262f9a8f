//! Grading engine.
//!
//! Runs the submitted and reference queries on the grading channel,
//! classifies their results, maps the tier to a score, and merges the
//! score into the persisted grade monotonically. The engine holds no
//! state between calls; everything durable lives in the record store.

use crate::db::ExecutionChannel;
use crate::error::{GraderError, GradingError, QueryRole, Result};
use crate::grading::compare::{compare, ComparisonTier};
use crate::store::{assignments, grades, RecordStore};
use tracing::{debug, info};

/// Per-call grading context.
///
/// Passed explicitly into each grading call; there is no ambient
/// "current user" anywhere in the engine.
#[derive(Debug, Clone, Copy)]
pub struct GradingSession {
    pub user_id: i64,
    pub assignment_id: i64,
}

/// Outcome of grading one submission.
#[derive(Debug, Clone)]
pub struct GradeReport {
    /// Score of this submission: 0, 50 or 100.
    pub score: i64,
    /// Best score stored for this (user, assignment) after the merge.
    /// Equal to `score` when grading without persistence.
    pub best_score: i64,
    /// Equivalence tier, when both queries executed.
    pub tier: Option<ComparisonTier>,
    /// The execution failure that produced a 0 score, if any. Kept for
    /// diagnostics even though it does not abort the grading flow.
    pub failure: Option<GradingError>,
}

impl GradeReport {
    /// User-facing feedback line.
    ///
    /// Distinguishes "your query failed to run" from "you scored 0
    /// because the results differ".
    pub fn feedback(&self) -> String {
        if let Some(failure) = &self.failure {
            return match failure.role {
                QueryRole::User => format!("Your query failed to run: {}", failure.source),
                QueryRole::Reference => {
                    "The assignment's answer key failed to run. Please contact your instructor."
                        .to_string()
                }
            };
        }

        match self.tier {
            Some(ComparisonTier::Exact) => "Correct: results match exactly.".to_string(),
            Some(ComparisonTier::SetEquivalent) => {
                "Partially correct: same rows, but order or duplicates differ.".to_string()
            }
            _ => "Incorrect: your results differ from the expected output.".to_string(),
        }
    }
}

/// The query-execution-and-comparison engine.
pub struct GradingEngine<'a> {
    channel: &'a dyn ExecutionChannel,
    store: &'a RecordStore,
}

impl<'a> GradingEngine<'a> {
    /// Creates an engine over a grading channel and a record store.
    pub fn new(channel: &'a dyn ExecutionChannel, store: &'a RecordStore) -> Self {
        Self { channel, store }
    }

    /// Grades a submission against its assignment's answer key and
    /// merges the score into the stored grade.
    ///
    /// Exactly two queries run on the grading channel per call, and at
    /// most one write hits the store. A failing query (either one)
    /// yields a 0 score with the failure attached; a failing store
    /// write is fatal and never reported as success.
    pub async fn grade(
        &self,
        session: &GradingSession,
        submitted_sql: &str,
    ) -> Result<GradeReport> {
        let assignment = assignments::get_assignment(self.store.pool(), session.assignment_id)
            .await?
            .ok_or_else(|| {
                GraderError::not_found(format!("assignment {}", session.assignment_id))
            })?;

        let mut report = self.evaluate(submitted_sql, &assignment.answer_key).await;

        let best = grades::upsert_with_max(
            self.store.pool(),
            session.user_id,
            session.assignment_id,
            report.score,
        )
        .await?;
        report.best_score = best;

        info!(
            user_id = session.user_id,
            assignment_id = session.assignment_id,
            score = report.score,
            best_score = best,
            "Graded submission"
        );

        Ok(report)
    }

    /// Runs the two-query execute/compare/score flow without touching
    /// the store. Used for practice runs and by `grade`.
    ///
    /// Both queries are always executed, sequentially, so a malformed
    /// user query still exercises the reference query independently.
    /// When both fail, the user failure is the one attached.
    pub async fn evaluate(&self, user_sql: &str, answer_key: &str) -> GradeReport {
        let user_result = self.channel.execute(user_sql).await;
        let reference_result = self.channel.execute(answer_key).await;

        if let Err(e) = &user_result {
            debug!(role = "user", error = %e, "Graded query failed");
        }
        if let Err(e) = &reference_result {
            debug!(role = "reference", error = %e, "Graded query failed");
        }

        match (user_result, reference_result) {
            (Ok(user), Ok(reference)) => {
                let tier = compare(&user, &reference);
                let score = tier.score();
                GradeReport {
                    score,
                    best_score: score,
                    tier: Some(tier),
                    failure: None,
                }
            }
            (Err(source), _) => GradeReport {
                score: 0,
                best_score: 0,
                tier: None,
                failure: Some(GradingError::new(QueryRole::User, source)),
            },
            (_, Err(source)) => GradeReport {
                score: 0,
                best_score: 0,
                tier: None,
                failure: Some(GradingError::new(QueryRole::Reference, source)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MockChannel;
    use crate::error::ExecutionErrorKind;
    use crate::store::RecordStore;
    use tempfile::tempdir;

    async fn test_store() -> (RecordStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("records.db");
        let store = RecordStore::open(&path).await.unwrap();
        (store, dir)
    }

    async fn seed_assignment(store: &RecordStore, id: i64, answer_key: &str) {
        sqlx::query("INSERT INTO assignments (id, name, instructions, answer_key) VALUES (?, ?, ?, ?)")
            .bind(id)
            .bind(format!("assignment-{id}"))
            .bind("solve it")
            .bind(answer_key)
            .execute(store.pool())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_exact_match_scores_100() {
        let (store, _dir) = test_store().await;
        seed_assignment(&store, 1, "SELECT ref").await;

        let channel = MockChannel::new()
            .with_rows("SELECT mine", vec![vec!["a", "1"], vec!["b", "2"]])
            .with_rows("SELECT ref", vec![vec!["a", "1"], vec!["b", "2"]]);
        let engine = GradingEngine::new(&channel, &store);

        let session = GradingSession {
            user_id: 7,
            assignment_id: 1,
        };
        let report = engine.grade(&session, "SELECT mine").await.unwrap();

        assert_eq!(report.score, 100);
        assert_eq!(report.best_score, 100);
        assert_eq!(report.tier, Some(ComparisonTier::Exact));
        assert!(report.failure.is_none());
    }

    #[tokio::test]
    async fn test_reordered_rows_score_50() {
        let (store, _dir) = test_store().await;
        seed_assignment(&store, 1, "SELECT ref").await;

        let channel = MockChannel::new()
            .with_rows("SELECT mine", vec![vec!["a", "1"], vec!["b", "2"]])
            .with_rows("SELECT ref", vec![vec!["b", "2"], vec!["a", "1"]]);
        let engine = GradingEngine::new(&channel, &store);

        let session = GradingSession {
            user_id: 7,
            assignment_id: 1,
        };
        let report = engine.grade(&session, "SELECT mine").await.unwrap();

        assert_eq!(report.score, 50);
        assert_eq!(report.tier, Some(ComparisonTier::SetEquivalent));
    }

    #[tokio::test]
    async fn test_mismatched_rows_score_0() {
        let (store, _dir) = test_store().await;
        seed_assignment(&store, 1, "SELECT ref").await;

        let channel = MockChannel::new()
            .with_rows("SELECT mine", vec![vec!["a", "1"], vec!["b", "2"]])
            .with_rows("SELECT ref", vec![vec!["a", "1"], vec!["c", "3"]]);
        let engine = GradingEngine::new(&channel, &store);

        let session = GradingSession {
            user_id: 7,
            assignment_id: 1,
        };
        let report = engine.grade(&session, "SELECT mine").await.unwrap();

        assert_eq!(report.score, 0);
        assert_eq!(report.tier, Some(ComparisonTier::Different));
        assert!(report.failure.is_none());
    }

    #[tokio::test]
    async fn test_user_failure_scores_0_with_role() {
        let (store, _dir) = test_store().await;
        seed_assignment(&store, 1, "SELECT ref").await;

        let channel = MockChannel::new()
            .with_failure("SELEC mine", ExecutionErrorKind::InvalidSql, "syntax error")
            .with_rows("SELECT ref", vec![vec!["a"]]);
        let engine = GradingEngine::new(&channel, &store);

        let session = GradingSession {
            user_id: 7,
            assignment_id: 1,
        };
        let report = engine.grade(&session, "SELEC mine").await.unwrap();

        assert_eq!(report.score, 0);
        assert!(report.tier.is_none());
        let failure = report.failure.as_ref().unwrap();
        assert_eq!(failure.role, QueryRole::User);
        assert_eq!(failure.source.kind, ExecutionErrorKind::InvalidSql);
        assert!(report.feedback().starts_with("Your query failed to run"));

        // The 0 is still persisted for a first submission.
        let stored = grades::get_grade(store.pool(), 7, 1).await.unwrap();
        assert_eq!(stored, Some(0));
    }

    #[tokio::test]
    async fn test_reference_failure_scores_0_with_role() {
        let (store, _dir) = test_store().await;
        seed_assignment(&store, 1, "SELECT ref").await;

        let channel = MockChannel::new()
            .with_rows("SELECT mine", vec![vec!["a"]])
            .with_failure(
                "SELECT ref",
                ExecutionErrorKind::UnknownObject,
                "relation \"answers\" does not exist",
            );
        let engine = GradingEngine::new(&channel, &store);

        let session = GradingSession {
            user_id: 7,
            assignment_id: 1,
        };
        let report = engine.grade(&session, "SELECT mine").await.unwrap();

        assert_eq!(report.score, 0);
        let failure = report.failure.as_ref().unwrap();
        assert_eq!(failure.role, QueryRole::Reference);
        assert!(report.feedback().contains("answer key failed"));
    }

    #[tokio::test]
    async fn test_both_failing_attaches_user_failure_first() {
        let (store, _dir) = test_store().await;
        let channel = MockChannel::new()
            .with_failure("bad user", ExecutionErrorKind::InvalidSql, "nope")
            .with_failure("bad ref", ExecutionErrorKind::Timeout, "too slow");
        let engine = GradingEngine::new(&channel, &store);

        let report = engine.evaluate("bad user", "bad ref").await;
        assert_eq!(report.failure.as_ref().unwrap().role, QueryRole::User);
    }

    #[tokio::test]
    async fn test_grade_is_monotonic_across_submissions() {
        let (store, _dir) = test_store().await;
        seed_assignment(&store, 1, "SELECT ref").await;

        let channel = MockChannel::new()
            .with_rows("SELECT reordered", vec![vec!["b"], vec!["a"]])
            .with_rows("SELECT exact", vec![vec!["a"], vec!["b"]])
            .with_rows("SELECT ref", vec![vec!["a"], vec!["b"]]);
        let engine = GradingEngine::new(&channel, &store);
        let session = GradingSession {
            user_id: 7,
            assignment_id: 1,
        };

        // 50 first, then 100 raises it.
        let report = engine.grade(&session, "SELECT reordered").await.unwrap();
        assert_eq!((report.score, report.best_score), (50, 50));

        let report = engine.grade(&session, "SELECT exact").await.unwrap();
        assert_eq!((report.score, report.best_score), (100, 100));

        // A later 50 never lowers the stored 100.
        let report = engine.grade(&session, "SELECT reordered").await.unwrap();
        assert_eq!((report.score, report.best_score), (50, 100));
        assert_eq!(grades::get_grade(store.pool(), 7, 1).await.unwrap(), Some(100));
    }

    #[tokio::test]
    async fn test_missing_assignment_is_not_found() {
        let (store, _dir) = test_store().await;
        let channel = MockChannel::new();
        let engine = GradingEngine::new(&channel, &store);

        let session = GradingSession {
            user_id: 7,
            assignment_id: 42,
        };
        let error = engine.grade(&session, "SELECT 1").await.unwrap_err();
        assert!(matches!(error, GraderError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_null_and_empty_string_grade_as_exact() {
        let (store, _dir) = test_store().await;
        // Normalization has already collapsed NULL to "" by the time
        // results reach the comparator.
        let channel = MockChannel::new()
            .with_rows("SELECT null_row", vec![vec![""]])
            .with_rows("SELECT empty_row", vec![vec![""]]);
        let engine = GradingEngine::new(&channel, &store);

        let report = engine.evaluate("SELECT null_row", "SELECT empty_row").await;
        assert_eq!(report.score, 100);
        assert_eq!(report.tier, Some(ComparisonTier::Exact));
    }
}
