//! Error types for notestore

use std::io;
use thiserror::Error;

/// Result type alias for notestore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the data model and data sources
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error while loading a snapshot
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Snapshot or attribute payload could not be decoded
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// No container, item or root with this id
    #[error("Not found: {0}")]
    NotFound(String),

    /// The remote call itself failed
    #[error("Remote call failed: {0}")]
    Remote(String),

    /// A node is missing data required to build it
    #[error("Malformed node '{id}': {reason}")]
    Malformed {
        /// Offending node id (may be empty)
        id: String,
        /// What was wrong with it
        reason: String,
    },
}

impl Error {
    /// Shorthand for a [`Error::Malformed`] error
    pub fn malformed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Malformed {
            id: id.into(),
            reason: reason.into(),
        }
    }
}
