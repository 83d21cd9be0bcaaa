//! # notecache
//!
//! Time-bounded cache of a remote notebook hierarchy.
//!
//! ## Architecture
//! - **CacheStore**: selected root, hierarchy tree, per-container child
//!   lists, search results and root lookups behind one `RwLock`
//! - **HierarchyFetcher**: depth-first tree walk with progress and
//!   cancellation
//! - **NameResolver**: cached name lookup with a one-shot remote fallback
//! - **Notebooks**: cache-first reads and invalidation hooks

#![warn(missing_docs)]

mod entry;
mod error;
mod fetcher;
mod progress;
mod resolve;
mod service;
mod stats;
mod store;

#[cfg(test)]
mod testing;

pub use entry::{CacheConfig, CacheEntry, DEFAULT_TTL};
pub use error::{FetchError, Result};
pub use fetcher::{FetchConfig, HierarchyFetcher, DEFAULT_MAX_DEPTH};
pub use progress::{
    ChannelProgress, NoProgress, ProgressError, ProgressEvent, ProgressRange, ProgressReporter,
    ProgressSink, ScaledProgress, TracingProgress, PROGRESS_TOTAL,
};
pub use resolve::NameResolver;
pub use service::Notebooks;
pub use stats::{CacheKind, CacheStats, KindStats};
pub use store::{CacheStore, SearchResult};

pub use tokio_util::sync::CancellationToken;
