//! Test doubles shared by the unit tests

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use notestore::{DataSource, RawNode, Root, SnapshotSource};
use parking_lot::Mutex;
use tokio::sync::{Notify, Semaphore};

/// Key that holds `list_roots` in a [`GatedSource`]
pub const ROOTS: &str = "<roots>";

/// [`DataSource`] whose calls for chosen ids block until released
///
/// A held call signals `entered` once it is parked, so a test can change
/// cache state while the remote call is provably in flight.
pub struct GatedSource {
    pub inner: Arc<SnapshotSource>,
    held: Mutex<HashSet<String>>,
    gate: Semaphore,
    entered: Notify,
}

impl GatedSource {
    pub fn new(inner: Arc<SnapshotSource>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            held: Mutex::new(HashSet::new()),
            gate: Semaphore::new(0),
            entered: Notify::new(),
        })
    }

    /// Block calls for `id` until [`release`](Self::release)
    pub fn hold(&self, id: &str) {
        self.held.lock().insert(id.to_string());
    }

    /// Wait until a held call is parked
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let one held call through
    pub fn release(&self) {
        self.gate.add_permits(1);
    }

    async fn pass(&self, id: &str) {
        let held = self.held.lock().contains(id);
        if !held {
            return;
        }
        self.entered.notify_one();
        self.gate.acquire().await.unwrap().forget();
    }
}

#[async_trait]
impl DataSource for GatedSource {
    async fn list_roots(&self) -> notestore::Result<Vec<Root>> {
        self.pass(ROOTS).await;
        self.inner.list_roots().await
    }

    async fn list_children(&self, container_id: &str) -> notestore::Result<Vec<RawNode>> {
        self.pass(container_id).await;
        self.inner.list_children(container_id).await
    }

    async fn get_by_id(&self, id: &str) -> notestore::Result<RawNode> {
        self.pass(id).await;
        self.inner.get_by_id(id).await
    }
}
