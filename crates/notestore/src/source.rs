//! Remote data source seam
//!
//! [`DataSource`] is everything the cache layer needs from the remote API.
//! [`SnapshotSource`] serves a JSON snapshot from memory:
//! ```text
//! {
//!   "roots":    [ { "id": "...", "displayName": "..." }, ... ],
//!   "children": { "<container id>": [ { "id": "...", ... }, ... ] }
//! }
//! ```

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::RandomState;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{RawNode, Root};

/// Remote operations consumed by the cache layer
#[async_trait]
pub trait DataSource: Send + Sync {
    /// List the selectable roots
    async fn list_roots(&self) -> Result<Vec<Root>>;

    /// List the immediate children (containers or items) of a container
    async fn list_children(&self, container_id: &str) -> Result<Vec<RawNode>>;

    /// Fetch a single root, container or item by id
    async fn get_by_id(&self, id: &str) -> Result<RawNode>;
}

/// Serialized form of a [`SnapshotSource`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// Selectable roots
    #[serde(default)]
    pub roots: Vec<Root>,

    /// Listing results keyed by container id
    #[serde(default)]
    pub children: HashMap<String, Vec<RawNode>>,
}

/// In-memory [`DataSource`] backed by a [`Snapshot`]
///
/// Listing and lookup failures can be injected per id, and every remote
/// call is counted.
#[derive(Default)]
pub struct SnapshotSource {
    snapshot: RwLock<Snapshot>,
    failing: RwLock<HashSet<String, RandomState>>,
    list_calls: AtomicU64,
    lookup_calls: AtomicU64,
    root_calls: AtomicU64,
}

impl SnapshotSource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a source serving the given snapshot
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
            ..Self::default()
        }
    }

    /// Load a snapshot from a JSON file
    ///
    /// # Arguments
    /// * `path` - Snapshot file path
    ///
    /// # Returns
    /// * `Result<SnapshotSource>` - Source serving the file's contents
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
        debug!(
            "Loaded snapshot with {} roots and {} listings",
            snapshot.roots.len(),
            snapshot.children.len()
        );
        Ok(Self::from_snapshot(snapshot))
    }

    /// Add a root
    pub fn add_root(&self, root: Root) {
        self.snapshot.write().roots.push(root);
    }

    /// Replace the listing of a container
    pub fn set_children(&self, container_id: impl Into<String>, children: Vec<RawNode>) {
        self.snapshot
            .write()
            .children
            .insert(container_id.into(), children);
    }

    /// Make every listing of and lookup for `id` fail
    pub fn fail_on(&self, id: impl Into<String>) {
        self.failing.write().insert(id.into());
    }

    /// Stop failing calls for `id`
    pub fn heal(&self, id: &str) {
        self.failing.write().remove(id);
    }

    /// Number of `list_children` calls served so far
    pub fn list_calls(&self) -> u64 {
        self.list_calls.load(Ordering::Relaxed)
    }

    /// Number of `get_by_id` calls served so far
    pub fn lookup_calls(&self) -> u64 {
        self.lookup_calls.load(Ordering::Relaxed)
    }

    /// Number of `list_roots` calls served so far
    pub fn root_calls(&self) -> u64 {
        self.root_calls.load(Ordering::Relaxed)
    }

    fn check_failing(&self, id: &str) -> Result<()> {
        if self.failing.read().contains(id) {
            return Err(Error::Remote(format!("injected failure for '{}'", id)));
        }
        Ok(())
    }
}

#[async_trait]
impl DataSource for SnapshotSource {
    async fn list_roots(&self) -> Result<Vec<Root>> {
        self.root_calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.snapshot.read().roots.clone())
    }

    async fn list_children(&self, container_id: &str) -> Result<Vec<RawNode>> {
        self.list_calls.fetch_add(1, Ordering::Relaxed);
        self.check_failing(container_id)?;

        let snapshot = self.snapshot.read();
        match snapshot.children.get(container_id) {
            Some(children) => Ok(children.clone()),
            None => Err(Error::NotFound(container_id.to_string())),
        }
    }

    async fn get_by_id(&self, id: &str) -> Result<RawNode> {
        self.lookup_calls.fetch_add(1, Ordering::Relaxed);
        self.check_failing(id)?;

        let snapshot = self.snapshot.read();
        if let Some(root) = snapshot.roots.iter().find(|r| r.id == id) {
            return Ok(root.to_raw());
        }
        snapshot
            .children
            .values()
            .flatten()
            .find(|node| node.id == id)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }
}
