//! Graph Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A content graph error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for content graph operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The database could not be reached, or a statement failed. Nothing
    /// from the failed operation was committed.
    #[display("database error")]
    Database,
    #[display("database migration error")]
    Migration,
    #[display("not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// A stored value could not be converted (or a value could not be stored).
    #[display("invalid data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
    /// The operation would break an invariant of the graph.
    #[display("constraint violated: {_0}")]
    Constraint(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database)
    }
}
