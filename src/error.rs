//! Error types for the grading engine.
//!
//! Two layers: `GraderError` is the crate-wide error enum, while
//! `ExecutionError` and `GradingError` carry the structure the grading
//! flow needs (what kind of failure, and whose query caused it).

use thiserror::Error;

/// Main error type for grader operations.
#[derive(Error, Debug)]
pub enum GraderError {
    /// Grading channel connection errors (host unreachable, auth failed, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// A grading-flow failure caused by one of the two graded queries.
    #[error(transparent)]
    Grading(#[from] GradingError),

    /// Record store errors (open, migrate, read/write failures).
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Configuration errors (invalid config file, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A referenced record (assignment, grade) does not exist.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl GraderError {
    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a persistence error with the given message.
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a not-found error with the given message.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "Connection Error",
            Self::Grading(_) => "Grading Error",
            Self::Persistence(_) => "Persistence Error",
            Self::Config(_) => "Configuration Error",
            Self::NotFound(_) => "Not Found",
        }
    }
}

/// What kind of failure the grading channel reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionErrorKind {
    /// The SQL text could not be parsed by the server.
    InvalidSql,
    /// The query references a table or column that does not exist.
    UnknownObject,
    /// The channel could not reach or stay connected to the data source.
    Connection,
    /// The query exceeded the execution deadline.
    Timeout,
    /// A result column's type has no supported textual decoding.
    UnsupportedType,
}

impl ExecutionErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidSql => "invalid SQL",
            Self::UnknownObject => "unknown object",
            Self::Connection => "connection failure",
            Self::Timeout => "timeout",
            Self::UnsupportedType => "unsupported column type",
        }
    }
}

impl std::fmt::Display for ExecutionErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A failure executing a single SQL text on the grading channel.
#[derive(Error, Debug, Clone)]
#[error("{kind}: {message}")]
pub struct ExecutionError {
    pub kind: ExecutionErrorKind,
    pub message: String,
}

impl ExecutionError {
    pub fn new(kind: ExecutionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ExecutionErrorKind::Timeout, message)
    }
}

/// Which of the two graded queries a failure originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryRole {
    /// The learner's submitted query.
    User,
    /// The assignment's answer-key query.
    Reference,
}

impl std::fmt::Display for QueryRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Reference => write!(f, "reference"),
        }
    }
}

/// An execution failure attributed to the query that caused it.
///
/// Both user and reference failures collapse to a 0 score, but the role
/// keeps them distinguishable for diagnostics and user-facing messaging.
#[derive(Error, Debug, Clone)]
#[error("{role} query failed to run: {source}")]
pub struct GradingError {
    pub role: QueryRole,
    #[source]
    pub source: ExecutionError,
}

impl GradingError {
    pub fn new(role: QueryRole, source: ExecutionError) -> Self {
        Self { role, source }
    }
}

/// Result type alias using GraderError.
pub type Result<T> = std::result::Result<T, GraderError>;
