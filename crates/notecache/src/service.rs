//! Notebooks: cache-first access to a remote notebook hierarchy
//!
//! Every read checks the [`CacheStore`] first and only goes to the
//! [`DataSource`] on a miss or stale entry. Reads report whether they were
//! served from cache. Mutations elsewhere call the `invalidate_on_*` hooks.

use std::sync::Arc;

use notestore::{ContainerNode, DataSource, Item, Root};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::entry::CacheConfig;
use crate::error::{FetchError, Result};
use crate::fetcher::{cancellable, FetchConfig, HierarchyFetcher};
use crate::progress::{ProgressRange, ProgressReporter, ProgressSink, ScaledProgress};
use crate::resolve::NameResolver;
use crate::store::{CacheStore, SearchResult};

/// Cache-backed front end over a [`DataSource`]
pub struct Notebooks {
    store: Arc<CacheStore>,
    source: Arc<dyn DataSource>,
    fetcher: HierarchyFetcher,
    resolver: NameResolver,
}

impl Notebooks {
    /// Create a service with its own cache store
    pub fn new(source: Arc<dyn DataSource>, cache: CacheConfig, fetch: FetchConfig) -> Self {
        Self::with_store(Arc::new(CacheStore::new(cache)), source, fetch)
    }

    /// Create a service over an existing cache store
    pub fn with_store(store: Arc<CacheStore>, source: Arc<dyn DataSource>, fetch: FetchConfig) -> Self {
        Self {
            fetcher: HierarchyFetcher::new(Arc::clone(&source), fetch),
            resolver: NameResolver::new(Arc::clone(&store), Arc::clone(&source)),
            store,
            source,
        }
    }

    /// The underlying cache store
    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    // ---- roots ----

    /// Select a root, clearing everything cached for the previous one
    pub fn select_root(&self, root: Root) {
        self.store.select_root(root);
    }

    /// Currently selected root
    pub fn root(&self) -> Option<Root> {
        self.store.root()
    }

    /// Id of the selected root
    pub fn root_id(&self) -> Option<String> {
        self.store.root_id()
    }

    /// Name of the selected root
    pub fn root_name(&self) -> Option<String> {
        self.store.root_name()
    }

    /// List every selectable root (always remote)
    pub async fn list_roots(&self, cancel: &CancellationToken) -> Result<Vec<Root>> {
        cancellable(cancel, self.source.list_roots()).await
    }

    /// Find a root by display name or id
    ///
    /// Ids match exactly, names case-insensitively. An id match is cached
    /// under the id, a name match under the lowercased name.
    ///
    /// # Returns
    /// * `Result<(Option<Root>, bool)>` - the root if any, and whether the
    ///   answer came from cache
    pub async fn find_root(&self, name: &str, cancel: &CancellationToken) -> Result<(Option<Root>, bool)> {
        let query = name.trim();
        let key = query.to_lowercase();
        let matches = |root: &Root| root.id == query || root.display_name.to_lowercase() == key;

        let mut keys = vec![query];
        if key != query {
            keys.push(key.as_str());
        }
        for candidate in keys {
            if let (Some(root), true) = self.store.lookup(candidate) {
                if matches(&root) {
                    debug!("Root lookup hit for '{}'", query);
                    return Ok((Some(root), true));
                }
            }
        }

        let generation = self.store.generation();
        let roots = cancellable(cancel, self.source.list_roots()).await?;
        let found = roots.into_iter().find(|r| matches(r));

        if let Some(root) = &found {
            let cache_key = if root.id == query { query.to_string() } else { key.clone() };
            if !self.store.set_lookup_at(generation, cache_key, root.clone()) {
                debug!("Selection changed while looking up '{}', not caching", query);
            }
        }
        Ok((found, false))
    }

    /// Resolve a root by name or id and select it
    pub async fn select_root_by(&self, name_or_id: &str, cancel: &CancellationToken) -> Result<Root> {
        let (root, _) = self.find_root(name_or_id, cancel).await?;
        let root = root.ok_or_else(|| FetchError::RootNotFound(name_or_id.to_string()))?;
        self.select_root(root.clone());
        Ok(root)
    }

    // ---- hierarchy ----

    /// Cached hierarchy of `root_id`, or fetch it
    ///
    /// Only the selected root's hierarchy is cached. Fetching any other
    /// root works but leaves the cache alone.
    ///
    /// # Returns
    /// * `Result<(Vec<ContainerNode>, bool)>` - the tree, and whether it was
    ///   a cache hit
    pub async fn get_or_fetch_tree(
        &self,
        root_id: &str,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<(Vec<ContainerNode>, bool)> {
        let (selected_id, generation) = self.store.selection();
        let selected = selected_id.as_deref() == Some(root_id);
        if selected {
            if let Some(tree) = self.store.hierarchy_tree() {
                debug!("Hierarchy cache hit for {}", root_id);
                ProgressReporter::new(progress)
                    .finish("Hierarchy served from cache")
                    .await;
                return Ok((tree, true));
            }
        }

        let tree = self.fetcher.fetch(root_id, progress, cancel).await?;
        if selected && !self.store.set_hierarchy_tree_at(generation, tree.clone()) {
            info!("Root changed while fetching {}, not caching its hierarchy", root_id);
        }
        Ok((tree, false))
    }

    /// Hierarchy of the selected root
    pub async fn selected_tree(
        &self,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<(Vec<ContainerNode>, bool)> {
        let root_id = self.store.root_id().ok_or(FetchError::NoRootSelected)?;
        self.get_or_fetch_tree(&root_id, progress, cancel).await
    }

    // ---- child lists ----

    /// Fresh cached items of a leaf container, or list them
    ///
    /// Children that are not valid items are dropped with a warning.
    pub async fn get_or_fetch_children(
        &self,
        container_id: &str,
        cancel: &CancellationToken,
    ) -> Result<(Vec<Item>, bool)> {
        if let (Some(items), true) = self.store.children(container_id) {
            debug!("Child list cache hit for {}", container_id);
            return Ok((items, true));
        }

        let generation = self.store.generation();
        let listed = cancellable(cancel, self.source.list_children(container_id)).await?;
        let items: Vec<Item> = listed
            .iter()
            .filter_map(|raw| match Item::from_raw(raw) {
                Ok(item) => Some(item),
                Err(e) => {
                    warn!("Dropping child of {}: {}", container_id, e);
                    None
                }
            })
            .collect();

        if !self.store.set_children_at(generation, container_id, items.clone()) {
            debug!("Selection changed while listing {}, not caching", container_id);
        }
        Ok((items, false))
    }

    // ---- search ----

    /// Find an item by title under the selected root
    ///
    /// Titles match case-insensitively, and results (hits and misses alike)
    /// are cached under the trimmed, lowercased title. Leaf containers whose
    /// listing fails are skipped.
    ///
    /// Progress: the hierarchy fetch fills `[0, 10]`, the section scan the
    /// rest.
    pub async fn find_item(
        &self,
        name: &str,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<(SearchResult, bool)> {
        let (root_id, generation) = self.store.selection();
        let root_id = root_id.ok_or(FetchError::NoRootSelected)?;
        let wanted = name.trim().to_lowercase();
        if let (Some(result), true) = self.store.search_result(&root_id, &wanted) {
            debug!("Search cache hit for '{}'", wanted);
            return Ok((result, true));
        }

        let reporter = ProgressReporter::new(progress);
        reporter.emit(0.0, &format!("Searching for '{}'", name)).await;

        let range = ProgressRange::full().tail(0.1);
        let fetch_progress = ScaledProgress::new(progress, ProgressRange::new(0.0, range.lo));
        let (tree, _) = self.get_or_fetch_tree(&root_id, &fetch_progress, cancel).await?;
        let leaves = ContainerNode::leaves(&tree);
        reporter
            .emit(range.lo, &format!("Scanning {} sections", leaves.len()))
            .await;

        let mut result = SearchResult::not_found();
        for (i, leaf) in leaves.iter().enumerate() {
            reporter
                .emit(range.split(i, leaves.len()).lo, &format!("Scanning {}", leaf.name()))
                .await;

            let items = match self.get_or_fetch_children(leaf.id(), cancel).await {
                Ok((items, _)) => items,
                Err(FetchError::Cancelled) => return Err(FetchError::Cancelled),
                Err(e) => {
                    warn!("Skipping section '{}' during search: {}", leaf.id(), e);
                    continue;
                }
            };

            if let Some(item) = items.into_iter().find(|item| item.title.to_lowercase() == wanted) {
                result = SearchResult::found(item, leaf.id());
                break;
            }
        }

        reporter.finish("Search complete").await;
        if !self
            .store
            .set_search_result_at(generation, &root_id, &wanted, result.clone())
        {
            debug!("Selection changed while searching for '{}', not caching", wanted);
        }
        Ok((result, false))
    }

    // ---- names ----

    /// Display name of a container or item id, if it can be found
    pub async fn resolve_name(&self, id: &str) -> Option<String> {
        self.resolver.resolve_name(id).await
    }

    // ---- invalidation ----

    /// An item was created in `container_id`
    pub fn invalidate_on_create(&self, container_id: &str) {
        self.store.clear_children(container_id);
        self.store.clear_all_search_results();
    }

    /// An item was updated (renamed, edited)
    pub fn invalidate_on_update(&self, item_id: &str, owner_id: Option<&str>) {
        self.invalidate_owner(item_id, owner_id);
        self.store.clear_all_search_results();
    }

    /// An item was deleted
    pub fn invalidate_on_delete(&self, item_id: &str, owner_id: Option<&str>) {
        self.invalidate_owner(item_id, owner_id);
        self.store.clear_all_search_results();
    }

    /// An item was moved into `target_id`
    ///
    /// Without a known source every child list is dropped.
    pub fn invalidate_on_move(&self, source_id: Option<&str>, target_id: &str) {
        match source_id {
            Some(source_id) => self.store.clear_children(source_id),
            None => self.store.clear_all_children(),
        }
        self.store.clear_children(target_id);
        self.store.clear_all_search_results();
    }

    /// An item was copied into `target_id`
    pub fn invalidate_on_copy(&self, target_id: &str) {
        self.store.clear_children(target_id);
        self.store.clear_all_search_results();
    }

    /// Drop every cache, keep the selected root
    pub fn clear_all(&self) {
        self.store.clear_all();
    }

    fn invalidate_owner(&self, item_id: &str, owner_id: Option<&str>) {
        let owner = owner_id
            .map(str::to_string)
            .or_else(|| self.store.find_item_in_children(item_id).map(|(_, owner)| owner));
        match owner {
            Some(owner) => self.store.clear_children(&owner),
            None => self.store.clear_all_children(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{ChannelProgress, NoProgress};
    use crate::testing::GatedSource;
    use notestore::{RawNode, SnapshotSource};
    use serde_json::json;

    fn section(id: &str, name: &str) -> RawNode {
        RawNode::new(id, [("displayName", json!(name)), ("pagesUrl", json!("p"))])
    }

    fn group(id: &str, name: &str) -> RawNode {
        RawNode::new(id, [("displayName", json!(name)), ("sectionGroupsUrl", json!("g"))])
    }

    fn page(id: &str, title: &str) -> RawNode {
        RawNode::new(id, [("title", json!(title))])
    }

    fn source() -> Arc<SnapshotSource> {
        let source = SnapshotSource::new();
        source.add_root(Root::new("nb1", "Work"));
        source.add_root(Root::new("nb2", "Personal"));
        source.set_children("nb1", vec![section("S1", "Inbox"), group("G1", "Projects")]);
        source.set_children("G1", vec![section("S2", "Alpha")]);
        source.set_children("S1", vec![page("pA", "Page A"), page("pB", "Page B")]);
        source.set_children("S2", vec![page("pC", "Roadmap")]);
        source.set_children("nb2", vec![section("S9", "Diary")]);
        source.set_children("S9", vec![]);
        Arc::new(source)
    }

    fn service(source: &Arc<SnapshotSource>) -> Notebooks {
        Notebooks::new(source.clone(), CacheConfig::default(), FetchConfig::default())
    }

    #[tokio::test]
    async fn test_tree_cache_hit() {
        let source = source();
        let notebooks = service(&source);
        let cancel = CancellationToken::new();
        notebooks.select_root(Root::new("nb1", "Work"));

        let (tree, hit) = notebooks.get_or_fetch_tree("nb1", &NoProgress, &cancel).await.unwrap();
        assert!(!hit);
        assert_eq!(tree.len(), 2);
        let calls = source.list_calls();

        let (again, hit) = notebooks.get_or_fetch_tree("nb1", &NoProgress, &cancel).await.unwrap();
        assert!(hit);
        assert_eq!(again, tree);
        assert_eq!(source.list_calls(), calls);
    }

    #[tokio::test]
    async fn test_cache_hit_reports_completion() {
        let source = source();
        let notebooks = service(&source);
        let cancel = CancellationToken::new();
        notebooks.select_root(Root::new("nb1", "Work"));
        notebooks.selected_tree(&NoProgress, &cancel).await.unwrap();

        let (sink, mut rx) = ChannelProgress::new();
        notebooks.selected_tree(&sink, &cancel).await.unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!((event.current, event.total), (100, 100));
    }

    #[tokio::test]
    async fn test_unselected_root_is_not_cached() {
        let source = source();
        let notebooks = service(&source);
        let cancel = CancellationToken::new();
        notebooks.select_root(Root::new("nb1", "Work"));

        let (tree, hit) = notebooks.get_or_fetch_tree("nb2", &NoProgress, &cancel).await.unwrap();
        assert!(!hit);
        assert_eq!(tree, vec![ContainerNode::leaf("S9", "Diary")]);
        assert!(notebooks.store().hierarchy_tree().is_none());
    }

    #[tokio::test]
    async fn test_selected_tree_requires_root() {
        let notebooks = service(&source());
        let result = notebooks
            .selected_tree(&NoProgress, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(FetchError::NoRootSelected)));
    }

    #[tokio::test]
    async fn test_children_end_to_end() {
        let source = source();
        let notebooks = service(&source);
        let cancel = CancellationToken::new();

        notebooks
            .store()
            .set_children("S1", vec![Item::new("pA", "Page A"), Item::new("pB", "Page B")]);
        let (items, hit) = notebooks.get_or_fetch_children("S1", &cancel).await.unwrap();
        assert!(hit);
        assert_eq!(items.len(), 2);
        assert_eq!(source.list_calls(), 0);

        notebooks.invalidate_on_create("S1");
        assert!(!notebooks.store().children("S1").1);

        let (items, hit) = notebooks.get_or_fetch_children("S1", &cancel).await.unwrap();
        assert!(!hit);
        assert_eq!(items[0].title, "Page A");
        assert_eq!(source.list_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_children_are_refetched() {
        let source = source();
        let notebooks = service(&source);
        let cancel = CancellationToken::new();

        notebooks.get_or_fetch_children("S2", &cancel).await.unwrap();
        tokio::time::advance(CacheConfig::default().ttl + std::time::Duration::from_secs(1)).await;

        let (_, hit) = notebooks.get_or_fetch_children("S2", &cancel).await.unwrap();
        assert!(!hit);
        assert_eq!(source.list_calls(), 2);
    }

    #[tokio::test]
    async fn test_children_listing_error_propagates() {
        let source = source();
        source.fail_on("S1");
        let notebooks = service(&source);

        let result = notebooks
            .get_or_fetch_children("S1", &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(FetchError::Source(_))));
    }

    #[tokio::test]
    async fn test_find_item_caches_result() {
        let source = source();
        let notebooks = service(&source);
        let cancel = CancellationToken::new();
        notebooks.select_root(Root::new("nb1", "Work"));

        let (result, hit) = notebooks.find_item("roadmap", &NoProgress, &cancel).await.unwrap();
        assert!(!hit);
        assert!(result.found);
        assert_eq!(result.owner_id, "S2");
        assert_eq!(result.item.map(|i| i.id).as_deref(), Some("pC"));

        let calls = source.list_calls();
        let (_, hit) = notebooks.find_item("roadmap", &NoProgress, &cancel).await.unwrap();
        assert!(hit);
        assert_eq!(source.list_calls(), calls);
    }

    #[tokio::test]
    async fn test_find_item_cache_ignores_case() {
        let source = source();
        let notebooks = service(&source);
        let cancel = CancellationToken::new();
        notebooks.select_root(Root::new("nb1", "Work"));

        let (first, hit) = notebooks.find_item("Roadmap", &NoProgress, &cancel).await.unwrap();
        assert!(!hit);
        let calls = source.list_calls();

        let (second, hit) = notebooks.find_item(" roadmap ", &NoProgress, &cancel).await.unwrap();
        assert!(hit);
        assert_eq!(second, first);
        assert_eq!(source.list_calls(), calls);
    }

    #[tokio::test]
    async fn test_find_item_not_found_is_cached() {
        let source = source();
        let notebooks = service(&source);
        let cancel = CancellationToken::new();
        notebooks.select_root(Root::new("nb1", "Work"));

        let (result, _) = notebooks.find_item("Nope", &NoProgress, &cancel).await.unwrap();
        assert!(!result.found);
        assert!(result.item.is_none());
        assert_eq!(notebooks.store().search_result("nb1", "nope"), (Some(result), true));
    }

    #[tokio::test]
    async fn test_find_item_skips_failing_section() {
        let source = source();
        source.fail_on("S1");
        let notebooks = service(&source);
        let cancel = CancellationToken::new();
        notebooks.select_root(Root::new("nb1", "Work"));

        let (result, _) = notebooks.find_item("Roadmap", &NoProgress, &cancel).await.unwrap();
        assert!(result.found);
    }

    #[tokio::test]
    async fn test_find_item_progress_ends_at_100() {
        let source = source();
        let notebooks = service(&source);
        notebooks.select_root(Root::new("nb1", "Work"));
        let (sink, mut rx) = ChannelProgress::new();

        notebooks
            .find_item("Page B", &sink, &CancellationToken::new())
            .await
            .unwrap();
        drop(sink);

        let mut currents = Vec::new();
        while let Some(event) = rx.recv().await {
            currents.push(event.current);
        }
        assert!(currents.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(currents.last(), Some(&100));
    }

    #[tokio::test]
    async fn test_cold_search_reports_hierarchy_progress() {
        let source = source();
        let notebooks = service(&source);
        notebooks.select_root(Root::new("nb1", "Work"));
        let (sink, mut rx) = ChannelProgress::new();

        notebooks
            .find_item("Roadmap", &sink, &CancellationToken::new())
            .await
            .unwrap();
        drop(sink);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        let scan = events
            .iter()
            .position(|e| e.message.starts_with("Scanning 2 sections"))
            .unwrap();
        let walk = &events[..scan];

        // Fetch milestones land inside the search's first tenth
        assert!(walk.iter().any(|e| e.message == "Found 2 top-level containers" && e.current == 1));
        assert!(walk.iter().any(|e| e.message == "Loading Projects"));
        assert!(walk.iter().any(|e| e.message == "Hierarchy loaded" && e.current == 10));
        assert!(walk.iter().all(|e| e.current <= 10));
        let currents: Vec<u32> = events.iter().map(|e| e.current).collect();
        assert!(currents.windows(2).all(|w| w[0] <= w[1]), "{:?}", currents);
        assert_eq!(currents.last(), Some(&100));
    }

    #[tokio::test]
    async fn test_find_root_uses_lookup_cache() {
        let source = source();
        let notebooks = service(&source);
        let cancel = CancellationToken::new();

        let (root, hit) = notebooks.find_root("personal", &cancel).await.unwrap();
        assert!(!hit);
        assert_eq!(root.map(|r| r.id).as_deref(), Some("nb2"));

        let (_, hit) = notebooks.find_root("Personal", &cancel).await.unwrap();
        assert!(hit);
        assert_eq!(source.root_calls(), 1);

        let (missing, _) = notebooks.find_root("Nothing", &cancel).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_find_root_by_id_is_exact() {
        let source = source();
        let notebooks = service(&source);
        let cancel = CancellationToken::new();

        let (root, _) = notebooks.find_root("nb2", &cancel).await.unwrap();
        assert_eq!(root.map(|r| r.id).as_deref(), Some("nb2"));
        assert!(notebooks.store().lookup("nb2").1);

        // A case variant of an id is not an id match and must not hit the cache
        let (root, hit) = notebooks.find_root("NB2", &cancel).await.unwrap();
        assert!(root.is_none());
        assert!(!hit);
        assert_eq!(source.root_calls(), 2);

        let (_, hit) = notebooks.find_root("nb2", &cancel).await.unwrap();
        assert!(hit);
        assert_eq!(source.root_calls(), 2);
    }

    #[tokio::test]
    async fn test_select_root_by_name_and_id() {
        let source = source();
        let notebooks = service(&source);
        let cancel = CancellationToken::new();

        let root = notebooks.select_root_by("work", &cancel).await.unwrap();
        assert_eq!(root.id, "nb1");
        assert_eq!(notebooks.root_name().as_deref(), Some("Work"));

        notebooks.select_root_by("nb2", &cancel).await.unwrap();
        assert_eq!(notebooks.root_id().as_deref(), Some("nb2"));

        let result = notebooks.select_root_by("ghost", &cancel).await;
        assert!(matches!(result, Err(FetchError::RootNotFound(_))));
    }

    #[tokio::test]
    async fn test_switching_root_clears_everything() {
        let source = source();
        let notebooks = service(&source);
        let cancel = CancellationToken::new();
        notebooks.select_root(Root::new("nb1", "Work"));
        notebooks.find_item("Roadmap", &NoProgress, &cancel).await.unwrap();
        notebooks.find_root("work", &cancel).await.unwrap();

        notebooks.select_root(Root::new("nb2", "Personal"));

        let store = notebooks.store();
        assert!(store.hierarchy_tree().is_none());
        assert_eq!(store.children("S2"), (None, false));
        assert_eq!(store.search_result("nb1", "roadmap"), (None, false));
        assert_eq!(store.lookup("work"), (None, false));
    }

    #[tokio::test]
    async fn test_invalidate_on_delete_with_unknown_owner() {
        let notebooks = service(&source());
        notebooks.store().set_children("S1", vec![Item::new("pA", "Page A")]);
        notebooks.store().set_children("S2", vec![Item::new("pC", "Roadmap")]);

        // Owner found by scanning the cached lists
        notebooks.invalidate_on_delete("pC", None);
        assert!(notebooks.store().children("S1").1);
        assert!(!notebooks.store().children("S2").1);

        // Owner unknown and not cached: everything goes
        notebooks.invalidate_on_delete("pZ", None);
        assert_eq!(notebooks.store().children_len(), 0);
    }

    #[tokio::test]
    async fn test_invalidate_on_move() {
        let notebooks = service(&source());
        let store = notebooks.store();
        for id in ["S1", "S2", "S3"] {
            store.set_children(id, vec![]);
        }

        notebooks.invalidate_on_move(Some("S1"), "S2");
        assert!(!store.children("S1").1);
        assert!(!store.children("S2").1);
        assert!(store.children("S3").1);

        notebooks.invalidate_on_move(None, "S2");
        assert_eq!(store.children_len(), 0);
    }

    #[tokio::test]
    async fn test_mutations_clear_search_results() {
        let notebooks = service(&source());
        let store = notebooks.store();
        store.set_search_result("nb1", "x", SearchResult::not_found());
        store.set_children("S1", vec![]);
        store.set_children("S2", vec![]);

        notebooks.invalidate_on_copy("S1");
        assert!(store.search_result("nb1", "x").0.is_none());
        assert!(store.children("S2").1);

        store.set_search_result("nb1", "x", SearchResult::not_found());
        notebooks.invalidate_on_update("pA", Some("S2"));
        assert!(store.search_result("nb1", "x").0.is_none());
        assert!(!store.children("S2").1);
    }

    #[tokio::test]
    async fn test_cancelled_fetch_leaves_cache_empty() {
        let source = source();
        let notebooks = service(&source);
        notebooks.select_root(Root::new("nb1", "Work"));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = notebooks.get_or_fetch_tree("nb1", &NoProgress, &cancel).await;
        assert!(matches!(result, Err(FetchError::Cancelled)));
        assert!(notebooks.store().hierarchy_tree().is_none());
    }

    #[tokio::test]
    async fn test_resolve_name_prefers_cache() {
        let source = source();
        let notebooks = service(&source);
        let cancel = CancellationToken::new();
        notebooks.select_root(Root::new("nb1", "Work"));
        notebooks.selected_tree(&NoProgress, &cancel).await.unwrap();

        assert_eq!(notebooks.resolve_name("S2").await.as_deref(), Some("Alpha"));
        assert_eq!(source.lookup_calls(), 0);

        assert_eq!(notebooks.resolve_name("pC").await.as_deref(), Some("Roadmap"));
        assert_eq!(source.lookup_calls(), 1);
    }

    #[tokio::test]
    async fn test_children_listed_across_reselect_are_not_cached() {
        let gated = GatedSource::new(source());
        gated.hold("S1");
        let notebooks = Notebooks::new(gated.clone(), CacheConfig::default(), FetchConfig::default());
        notebooks.select_root(Root::new("nb1", "Work"));
        let cancel = CancellationToken::new();

        let (result, _) = tokio::join!(notebooks.get_or_fetch_children("S1", &cancel), async {
            gated.entered().await;
            notebooks.select_root(Root::new("nb2", "Personal"));
            gated.release();
        });

        // The caller still gets its answer, the cache does not keep it
        assert_eq!(result.unwrap().0.len(), 2);
        assert_eq!(notebooks.store().children("S1"), (None, false));
    }

    #[tokio::test]
    async fn test_search_across_reselect_is_not_cached() {
        let gated = GatedSource::new(source());
        gated.hold("S2");
        let notebooks = Notebooks::new(gated.clone(), CacheConfig::default(), FetchConfig::default());
        notebooks.select_root(Root::new("nb1", "Work"));
        let cancel = CancellationToken::new();

        let (result, _) = tokio::join!(notebooks.find_item("Roadmap", &NoProgress, &cancel), async {
            gated.entered().await;
            notebooks.select_root(Root::new("nb2", "Personal"));
            gated.release();
        });

        assert!(result.unwrap().0.found);
        let store = notebooks.store();
        assert_eq!(store.search_result("nb1", "roadmap"), (None, false));
        assert_eq!(store.children("S2"), (None, false));
        assert!(store.hierarchy_tree().is_none());
    }

    #[tokio::test]
    async fn test_root_lookup_across_reselect_is_not_cached() {
        let gated = GatedSource::new(source());
        gated.hold(crate::testing::ROOTS);
        let notebooks = Notebooks::new(gated.clone(), CacheConfig::default(), FetchConfig::default());
        let cancel = CancellationToken::new();

        let (result, _) = tokio::join!(notebooks.find_root("personal", &cancel), async {
            gated.entered().await;
            notebooks.select_root(Root::new("nb1", "Work"));
            gated.release();
        });

        assert_eq!(result.unwrap().0.map(|r| r.id).as_deref(), Some("nb2"));
        assert_eq!(notebooks.store().lookup("personal"), (None, false));
    }

    #[tokio::test]
    async fn test_cancel_during_listing_leaves_tree_uncached() {
        let gated = GatedSource::new(source());
        gated.hold("G1");
        let notebooks = Notebooks::new(gated.clone(), CacheConfig::default(), FetchConfig::default());
        notebooks.select_root(Root::new("nb1", "Work"));
        let cancel = CancellationToken::new();

        let (result, _) = tokio::join!(notebooks.get_or_fetch_tree("nb1", &NoProgress, &cancel), async {
            gated.entered().await;
            cancel.cancel();
        });

        assert!(matches!(result, Err(FetchError::Cancelled)));
        assert!(notebooks.store().hierarchy_tree().is_none());
        assert_eq!(gated.inner.list_calls(), 1);
    }
}
