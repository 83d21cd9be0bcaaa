//! CacheStore: selected-root state plus the caches scoped to it
//!
//! Five independent caches share one reader/writer lock:
//! - selected root
//! - hierarchy tree (no TTL, cleared only by root change or explicitly)
//! - child lists per container (TTL)
//! - search results per (root id, name) (TTL)
//! - root lookups per name (TTL)
//!
//! Every getter hands back a clone. Misses and stale entries are reported
//! through a `bool`, never as errors.

use std::collections::HashMap;
use std::time::Duration;

use ahash::RandomState;
use notestore::{ContainerNode, Item, Root};
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::entry::{CacheConfig, CacheEntry};
use crate::stats::{CacheKind, CacheStats};

/// Outcome of a by-name item search under a root
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// Matching item, if any
    pub item: Option<Item>,
    /// Container that owns the item (empty when not found)
    pub owner_id: String,
    /// Whether a match was found
    pub found: bool,
}

impl SearchResult {
    /// A successful search
    pub fn found(item: Item, owner_id: impl Into<String>) -> Self {
        Self {
            item: Some(item),
            owner_id: owner_id.into(),
            found: true,
        }
    }

    /// A search that came back empty
    pub fn not_found() -> Self {
        Self {
            item: None,
            owner_id: String::new(),
            found: false,
        }
    }
}

type Map<K, V> = HashMap<K, V, RandomState>;

#[derive(Default)]
struct Inner {
    root: Option<Root>,
    /// Bumped by every selection and full clear
    generation: u64,
    tree: Option<Vec<ContainerNode>>,
    children: Map<String, CacheEntry<Vec<Item>>>,
    searches: Map<(String, String), CacheEntry<SearchResult>>,
    lookups: Map<String, CacheEntry<Root>>,
}

impl Inner {
    fn clear_dependent(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.tree = None;
        self.children.clear();
        self.searches.clear();
        self.lookups.clear();
    }
}

fn read_entry<V: Clone>(entry: Option<&CacheEntry<V>>, ttl: Duration) -> (Option<V>, bool) {
    match entry {
        Some(entry) => (Some(entry.value().clone()), entry.is_fresh(ttl)),
        None => (None, false),
    }
}

/// Process-lifetime cache of a notebook hierarchy
///
/// Writes that follow a remote call should use the `*_at` variants with the
/// [`generation`](CacheStore::generation) read before the call; they drop the
/// write if the root was reselected or the store cleared in between.
pub struct CacheStore {
    inner: RwLock<Inner>,
    ttl: Duration,
    stats: CacheStats,
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl CacheStore {
    /// Create an empty store
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            ttl: config.ttl,
            stats: CacheStats::new(),
        }
    }

    /// Configured time-to-live
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get cache statistics
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Current selection generation
    pub fn generation(&self) -> u64 {
        self.inner.read().generation
    }

    /// Selected root id and generation, read together
    pub fn selection(&self) -> (Option<String>, u64) {
        let inner = self.inner.read();
        (inner.root.as_ref().map(|r| r.id.clone()), inner.generation)
    }

    // ---- root selection ----

    /// Select a root and drop every cache scoped to the previous one
    ///
    /// Reselecting the current root still clears.
    pub fn select_root(&self, root: Root) {
        let mut inner = self.inner.write();
        info!("Selected root '{}' ({})", root.display_name, root.id);
        inner.root = Some(root);
        inner.clear_dependent();
        for kind in CacheKind::ALL {
            self.stats.record_invalidation(kind);
        }
    }

    /// Currently selected root
    pub fn root(&self) -> Option<Root> {
        self.inner.read().root.clone()
    }

    /// Id of the selected root
    pub fn root_id(&self) -> Option<String> {
        self.inner.read().root.as_ref().map(|r| r.id.clone())
    }

    /// Display name of the selected root
    pub fn root_name(&self) -> Option<String> {
        self.inner.read().root.as_ref().map(|r| r.display_name.clone())
    }

    // ---- hierarchy tree ----

    /// Cache the whole hierarchy under the selected root
    pub fn set_hierarchy_tree(&self, tree: Vec<ContainerNode>) {
        self.inner.write().tree = Some(tree);
        self.stats.record_insert(CacheKind::Tree);
    }

    /// Cache a hierarchy fetched under `generation`
    ///
    /// Returns `false` (and caches nothing) if the selection changed while
    /// the tree was being fetched.
    pub fn set_hierarchy_tree_at(&self, generation: u64, tree: Vec<ContainerNode>) -> bool {
        let mut inner = self.inner.write();
        if inner.generation != generation {
            return false;
        }
        inner.tree = Some(tree);
        self.stats.record_insert(CacheKind::Tree);
        true
    }

    /// Cached hierarchy, if any
    ///
    /// The tree carries no TTL; presence is authoritative.
    pub fn hierarchy_tree(&self) -> Option<Vec<ContainerNode>> {
        let tree = self.inner.read().tree.clone();
        self.stats
            .record_read(CacheKind::Tree, tree.is_some(), tree.is_some());
        tree
    }

    /// Drop the cached hierarchy
    pub fn clear_hierarchy_tree(&self) {
        self.inner.write().tree = None;
        self.stats.record_invalidation(CacheKind::Tree);
    }

    /// Find a container's name in the cached hierarchy
    ///
    /// Never fetches; `None` if the tree is absent or has no such node.
    pub fn resolve_name_in_tree(&self, container_id: &str) -> Option<String> {
        let inner = self.inner.read();
        let tree = inner.tree.as_deref()?;
        ContainerNode::find(tree, container_id).map(|node| node.name().to_string())
    }

    // ---- child lists ----

    /// Cache the items of a container
    pub fn set_children(&self, container_id: impl Into<String>, items: Vec<Item>) {
        let mut inner = self.inner.write();
        inner
            .children
            .insert(container_id.into(), CacheEntry::new(items));
        self.stats.record_insert(CacheKind::Children);
    }

    /// Cache the items of a container listed under `generation`
    pub fn set_children_at(
        &self,
        generation: u64,
        container_id: impl Into<String>,
        items: Vec<Item>,
    ) -> bool {
        let mut inner = self.inner.write();
        if inner.generation != generation {
            return false;
        }
        inner
            .children
            .insert(container_id.into(), CacheEntry::new(items));
        self.stats.record_insert(CacheKind::Children);
        true
    }

    /// Cached items of a container and whether they are fresh
    ///
    /// # Returns
    /// * `(Some(items), true)` - entry within TTL
    /// * `(Some(items), false)` - stale entry, value kept until overwritten
    /// * `(None, false)` - never cached or cleared
    pub fn children(&self, container_id: &str) -> (Option<Vec<Item>>, bool) {
        let read = read_entry(self.inner.read().children.get(container_id), self.ttl);
        self.stats
            .record_read(CacheKind::Children, read.0.is_some(), read.1);
        read
    }

    /// Drop the cached items of one container
    pub fn clear_children(&self, container_id: &str) {
        if self.inner.write().children.remove(container_id).is_some() {
            debug!("Invalidated child list of {}", container_id);
        }
        self.stats.record_invalidation(CacheKind::Children);
    }

    /// Drop every cached child list
    pub fn clear_all_children(&self) {
        self.inner.write().children.clear();
        debug!("Invalidated all child lists");
        self.stats.record_invalidation(CacheKind::Children);
    }

    /// Find an item among fresh child lists
    ///
    /// # Returns
    /// * `Option<(Item, String)>` - the item and its owning container id
    pub fn find_item_in_children(&self, item_id: &str) -> Option<(Item, String)> {
        let inner = self.inner.read();
        inner
            .children
            .iter()
            .filter(|(_, entry)| entry.is_fresh(self.ttl))
            .find_map(|(owner, entry)| {
                entry
                    .value()
                    .iter()
                    .find(|item| item.id == item_id)
                    .map(|item| (item.clone(), owner.clone()))
            })
    }

    // ---- search results ----

    /// Cache the result of a by-name search under a root
    pub fn set_search_result(&self, root_id: &str, name: &str, result: SearchResult) {
        self.inner.write().searches.insert(
            (root_id.to_string(), name.to_string()),
            CacheEntry::new(result),
        );
        self.stats.record_insert(CacheKind::Search);
    }

    /// Cache a search result computed under `generation`
    pub fn set_search_result_at(
        &self,
        generation: u64,
        root_id: &str,
        name: &str,
        result: SearchResult,
    ) -> bool {
        let mut inner = self.inner.write();
        if inner.generation != generation {
            return false;
        }
        inner.searches.insert(
            (root_id.to_string(), name.to_string()),
            CacheEntry::new(result),
        );
        self.stats.record_insert(CacheKind::Search);
        true
    }

    /// Cached search result and whether it is fresh
    pub fn search_result(&self, root_id: &str, name: &str) -> (Option<SearchResult>, bool) {
        let key = (root_id.to_string(), name.to_string());
        let read = read_entry(self.inner.read().searches.get(&key), self.ttl);
        self.stats
            .record_read(CacheKind::Search, read.0.is_some(), read.1);
        read
    }

    /// Drop one cached search result
    pub fn clear_search_result(&self, root_id: &str, name: &str) {
        self.inner
            .write()
            .searches
            .remove(&(root_id.to_string(), name.to_string()));
        self.stats.record_invalidation(CacheKind::Search);
    }

    /// Drop every cached search result
    pub fn clear_all_search_results(&self) {
        self.inner.write().searches.clear();
        self.stats.record_invalidation(CacheKind::Search);
    }

    // ---- root lookups ----

    /// Cache the root a name resolved to
    pub fn set_lookup(&self, name: impl Into<String>, root: Root) {
        self.inner
            .write()
            .lookups
            .insert(name.into(), CacheEntry::new(root));
        self.stats.record_insert(CacheKind::Lookup);
    }

    /// Cache a root lookup resolved under `generation`
    pub fn set_lookup_at(&self, generation: u64, name: impl Into<String>, root: Root) -> bool {
        let mut inner = self.inner.write();
        if inner.generation != generation {
            return false;
        }
        inner.lookups.insert(name.into(), CacheEntry::new(root));
        self.stats.record_insert(CacheKind::Lookup);
        true
    }

    /// Cached root for a name and whether it is fresh
    pub fn lookup(&self, name: &str) -> (Option<Root>, bool) {
        let read = read_entry(self.inner.read().lookups.get(name), self.ttl);
        self.stats
            .record_read(CacheKind::Lookup, read.0.is_some(), read.1);
        read
    }

    // ---- bulk ----

    /// Clear every cache but keep the selected root
    pub fn clear_all(&self) {
        self.inner.write().clear_dependent();
        self.stats.reset();
        debug!("Cleared all caches");
    }

    /// Number of cached child lists, stale ones included
    pub fn children_len(&self) -> usize {
        self.inner.read().children.len()
    }
}
