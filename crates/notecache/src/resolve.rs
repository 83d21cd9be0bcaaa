//! Name resolution with a single-id remote fallback
//!
//! Lookup order: cached hierarchy, fresh child lists, selected root, then
//! one by-id call to the remote. The remote answer is returned but never
//! written back into any cache.

use std::sync::Arc;

use notestore::DataSource;
use tracing::debug;

use crate::store::CacheStore;

/// Resolves display names for container and item ids
pub struct NameResolver {
    store: Arc<CacheStore>,
    source: Arc<dyn DataSource>,
}

impl NameResolver {
    /// Create a resolver reading from `store` and falling back to `source`
    pub fn new(store: Arc<CacheStore>, source: Arc<dyn DataSource>) -> Self {
        Self { store, source }
    }

    /// Resolve the name of a container or item
    ///
    /// Returns `None` when the id is unknown or the remote call fails.
    pub async fn resolve_name(&self, id: &str) -> Option<String> {
        if let Some(name) = self.resolve_cached(id) {
            return Some(name);
        }

        match self.source.get_by_id(id).await {
            Ok(raw) => raw
                .str_attr("displayName")
                .or_else(|| raw.str_attr("title"))
                .map(str::to_string),
            Err(e) => {
                debug!("Name lookup for {} failed: {}", id, e);
                None
            }
        }
    }

    /// Resolve from cached state only
    pub fn resolve_cached(&self, id: &str) -> Option<String> {
        if let Some(name) = self.store.resolve_name_in_tree(id) {
            return Some(name);
        }
        if let Some((item, _)) = self.store.find_item_in_children(id) {
            return Some(item.title);
        }
        self.store
            .root()
            .filter(|root| root.id == id)
            .map(|root| root.display_name)
    }
}
