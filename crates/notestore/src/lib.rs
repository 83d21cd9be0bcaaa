//! # notestore
//!
//! Data model and remote-source seam for a notebook hierarchy.
//!
//! ## Layout
//! - **Roots**: selectable top-level containers (notebooks)
//! - **Containers**: leaves (sections) and groups (section groups)
//! - **Items**: documents owned by a leaf container (pages)
//! - **DataSource**: the remote API as seen by the cache layer

#![warn(missing_docs)]

mod classify;
mod error;
mod model;
mod source;

pub use classify::{classify, container_name, GROUP_INDICATORS, LEAF_INDICATOR};
pub use error::{Error, Result};
pub use model::{ContainerNode, Item, NodeKind, RawNode, Root};
pub use source::{DataSource, Snapshot, SnapshotSource};
