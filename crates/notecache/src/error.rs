//! Error types for notecache
//!
//! Only fetch paths return errors. Cache misses and staleness are reported
//! through boolean flags on the store.

use thiserror::Error;

/// Result type alias for fetch operations
pub type Result<T> = std::result::Result<T, FetchError>;

/// Errors surfaced by fetch and lookup operations
#[derive(Debug, Error)]
pub enum FetchError {
    /// Listing the requested container (or a by-id lookup) failed
    #[error("remote source error: {0}")]
    Source(#[from] notestore::Error),

    /// The caller cancelled the operation
    #[error("operation cancelled")]
    Cancelled,

    /// The operation needs a selected root and none is selected
    #[error("no root selected")]
    NoRootSelected,

    /// No root matched the requested name or id
    #[error("root not found: {0}")]
    RootNotFound(String),
}

impl FetchError {
    /// Whether this error came from cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }
}
