//! Recursive hierarchy fetcher
//!
//! Walks a root depth-first, one listing call at a time:
//! 1. list the root's children (failure here fails the whole fetch)
//! 2. classify each child as leaf or group
//! 3. list and recurse into groups; a failed listing leaves the group empty
//! 4. skip children that cannot be built, keep their siblings
//!
//! Progress runs 0 → 10 around the root listing, then each top-level child
//! owns an equal slice of `[10, 100)`, subdivided again by its own children.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use notestore::{classify, container_name, ContainerNode, DataSource, NodeKind, RawNode};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{FetchError, Result};
use crate::progress::{ProgressRange, ProgressReporter, ProgressSink};

/// Default limit on how many container levels are expanded
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Progress position once the root has been listed
const LISTED: f64 = 10.0;

/// Run a remote call unless `cancel` fires first
pub(crate) async fn cancellable<T, F>(cancel: &CancellationToken, call: F) -> Result<T>
where
    F: std::future::Future<Output = notestore::Result<T>>,
{
    if cancel.is_cancelled() {
        return Err(FetchError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(FetchError::Cancelled),
        result = call => Ok(result?),
    }
}

/// Fetcher configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchConfig {
    /// Groups at this depth (top level is 1) are returned without children
    pub max_depth: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Builds the ordered container tree under a root
pub struct HierarchyFetcher {
    source: Arc<dyn DataSource>,
    config: FetchConfig,
}

impl HierarchyFetcher {
    /// Create a fetcher over a data source
    pub fn new(source: Arc<dyn DataSource>, config: FetchConfig) -> Self {
        Self { source, config }
    }

    /// Fetch the full hierarchy under `root_id`
    ///
    /// # Arguments
    /// * `root_id` - Container to start from
    /// * `progress` - Receives milestones on a 0..=100 scale, ending at 100
    /// * `cancel` - Checked before every listing call and raced against it
    ///
    /// # Returns
    /// * `Result<Vec<ContainerNode>>` - Top-level nodes in listing order
    pub async fn fetch(
        &self,
        root_id: &str,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<Vec<ContainerNode>> {
        let reporter = ProgressReporter::new(progress);

        reporter
            .emit(0.0, &format!("Listing contents of {}", root_id))
            .await;
        let children = self.list(root_id, cancel).await?;
        let total = children.len();
        reporter
            .emit(LISTED, &format!("Found {} top-level containers", total))
            .await;

        let range = ProgressRange::new(LISTED, ProgressRange::full().hi);
        let mut nodes = Vec::with_capacity(total);
        for (i, raw) in children.iter().enumerate() {
            match self
                .build_node(raw, 1, range.split(i, total), &reporter, cancel)
                .await
            {
                Ok(node) => nodes.push(node),
                Err(FetchError::Cancelled) => return Err(FetchError::Cancelled),
                Err(e) => warn!("Skipping top-level item '{}': {}", raw.id, e),
            }
        }

        reporter.finish("Hierarchy loaded").await;
        info!(
            "Fetched hierarchy of {}: {} of {} top-level containers",
            root_id,
            nodes.len(),
            total
        );
        Ok(nodes)
    }

    async fn list(&self, container_id: &str, cancel: &CancellationToken) -> Result<Vec<RawNode>> {
        cancellable(cancel, self.source.list_children(container_id)).await
    }

    fn build_node<'a>(
        &'a self,
        raw: &'a RawNode,
        depth: usize,
        range: ProgressRange,
        reporter: &'a ProgressReporter<'a>,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<ContainerNode>> {
        async move {
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }

            let name = container_name(raw)?;
            reporter.emit(range.lo, &format!("Loading {}", name)).await;

            if classify(raw) == NodeKind::Leaf {
                return Ok(ContainerNode::leaf(raw.id.clone(), name));
            }

            if depth >= self.config.max_depth {
                warn!(
                    "Group '{}' is at depth {}, not expanding (max {})",
                    raw.id, depth, self.config.max_depth
                );
                return Ok(ContainerNode::group(raw.id.clone(), name, Vec::new()));
            }

            let listed = match self.list(&raw.id, cancel).await {
                Ok(listed) => listed,
                Err(FetchError::Cancelled) => return Err(FetchError::Cancelled),
                Err(e) => {
                    warn!("Listing group '{}' failed, treating as empty: {}", raw.id, e);
                    return Ok(ContainerNode::group(raw.id.clone(), name, Vec::new()));
                }
            };

            let count = listed.len();
            let mut children = Vec::with_capacity(count);
            for (i, child) in listed.iter().enumerate() {
                match self
                    .build_node(child, depth + 1, range.split(i, count), reporter, cancel)
                    .await
                {
                    Ok(node) => children.push(node),
                    Err(FetchError::Cancelled) => return Err(FetchError::Cancelled),
                    Err(e) => warn!("Skipping child '{}' of '{}': {}", child.id, raw.id, e),
                }
            }
            debug!("Group '{}' has {} children", raw.id, children.len());

            Ok(ContainerNode::group(raw.id.clone(), name, children))
        }
        .boxed()
    }
}
