//! Leaf/group classification of raw child nodes
//!
//! The remote API does not tag children with an explicit kind. Sections
//! advertise where their pages live, section groups advertise where their
//! nested sections and groups live:
//! ```text
//! { "id": "...", "displayName": "...", "pagesUrl": "..." }          -> leaf
//! { "id": "...", "displayName": "...", "sectionsUrl": "...", ... }  -> group
//! ```
//! Anything else is treated as a leaf, which can never trigger recursion.

use crate::error::{Error, Result};
use crate::model::{NodeKind, RawNode};

/// Attribute whose presence marks a leaf container
pub const LEAF_INDICATOR: &str = "pagesUrl";

/// Attributes whose presence marks a group container
pub const GROUP_INDICATORS: &[&str] = &["sectionsUrl", "sectionGroupsUrl"];

/// Classify a listed child as leaf or group
///
/// The leaf indicator wins when both kinds of indicator are present.
pub fn classify(node: &RawNode) -> NodeKind {
    if node.has_attr(LEAF_INDICATOR) {
        return NodeKind::Leaf;
    }
    if GROUP_INDICATORS.iter().any(|key| node.has_attr(key)) {
        return NodeKind::Group;
    }
    NodeKind::Leaf
}

/// Extract the display name of a container
///
/// # Returns
/// * `Result<String>` - The name, or [`Error::Malformed`] when the id is
///   empty or `displayName` is missing
pub fn container_name(node: &RawNode) -> Result<String> {
    if node.id.is_empty() {
        return Err(Error::malformed("", "container without id"));
    }
    node.str_attr("displayName")
        .map(str::to_string)
        .ok_or_else(|| Error::malformed(&node.id, "container without displayName"))
}
