//! Grading core: result comparison and the grading engine.

mod compare;
mod engine;

pub use compare::{compare, ComparisonTier};
pub use engine::{GradeReport, GradingEngine, GradingSession};
