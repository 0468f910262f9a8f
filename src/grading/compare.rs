//! Two-tier result set comparison.
//!
//! Classifies a pair of normalized results as exactly equal, equal as
//! unordered sets of distinct rows, or different. Rows are compared
//! structurally, cell by cell, so a delimiter appearing inside a value
//! can never collapse a column boundary.

use crate::db::NormalizedResult;
use std::collections::HashSet;

/// Equivalence tier for a pair of result sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonTier {
    /// Row sequences identical element-for-element, preserving order
    /// and duplicate multiplicities.
    Exact,
    /// Same distinct rows, ignoring order and duplicate counts.
    SetEquivalent,
    /// Neither of the above.
    Different,
}

impl ComparisonTier {
    /// Maps the tier to its grading score.
    pub fn score(&self) -> i64 {
        match self {
            Self::Exact => 100,
            Self::SetEquivalent => 50,
            Self::Different => 0,
        }
    }
}

impl std::fmt::Display for ComparisonTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact => write!(f, "exact match"),
            Self::SetEquivalent => write!(f, "set-equivalent"),
            Self::Different => write!(f, "different"),
        }
    }
}

/// Classifies two normalized results into an equivalence tier.
///
/// Only row data participates: column labels are not compared, and
/// results with differing column counts fall out as `Different` through
/// row-shape inequality. Two empty results are `Exact`.
pub fn compare(a: &NormalizedResult, b: &NormalizedResult) -> ComparisonTier {
    if a.rows == b.rows {
        return ComparisonTier::Exact;
    }

    let distinct_a: HashSet<&Vec<String>> = a.rows.iter().collect();
    let distinct_b: HashSet<&Vec<String>> = b.rows.iter().collect();

    if distinct_a == distinct_b {
        ComparisonTier::SetEquivalent
    } else {
        ComparisonTier::Different
    }
}
