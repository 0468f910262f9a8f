//! sql-grader - query-execution-and-comparison engine for grading SQL
//! exercises.
//!
//! A learner's SQL text and an assignment's answer key both run against
//! a sandboxed grading data source; their normalized outputs are
//! classified into an equivalence tier and mapped to a score that is
//! merged monotonically into the stored grade.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod grading;
pub mod render;
pub mod store;
