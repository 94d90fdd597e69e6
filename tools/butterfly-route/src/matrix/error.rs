//! Matrix error taxonomy
//!
//! Unresolved locations are not errors; they become sentinel cells. Every
//! variant here aborts the whole request.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MatrixError {
    /// The request cannot run on this graph (e.g. hierarchy-restricted
    /// search without contraction metadata).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Visited-node budget exhausted before all targets settled. The caller
    /// may retry with a larger budget or fewer locations.
    #[error("search limit exceeded: visited {visited} nodes (limit {limit})")]
    SearchLimitExceeded { visited: usize, limit: usize },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Broken internal invariant; indicates a bug, never a user error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MatrixError {
    /// Whether retrying with a larger budget or a smaller request can help.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, MatrixError::SearchLimitExceeded { .. })
    }
}

pub type Result<T> = std::result::Result<T, MatrixError>;
