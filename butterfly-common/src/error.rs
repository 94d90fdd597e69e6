//! Error types shared across the butterfly-osm toolkit
//!
//! Leaf-level failures, such as unit parsing, that do not belong to a
//! specific engine. Engine crates define their own typed errors.

use std::fmt;

/// Main error type for butterfly-osm operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Invalid configuration or parameters
    InvalidInput(String),

    /// A value named a unit this toolkit does not know
    UnknownUnit(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidInput(msg) => {
                write!(f, "Invalid input: {msg}")
            }
            Error::UnknownUnit(unit) => {
                write!(f, "Unknown distance unit '{unit}' (expected m, km or mi)")
            }
        }
    }
}

impl std::error::Error for Error {}

/// Convenience result type for butterfly-osm operations
pub type Result<T> = std::result::Result<T, Error>;
