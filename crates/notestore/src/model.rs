//! Notebook hierarchy types
//!
//! Raw nodes come straight from the remote API and carry their attributes
//! as an open JSON map. Container nodes are the classified, ordered tree
//! built from them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// A selectable top-level container (a notebook)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Root {
    /// Remote id
    pub id: String,

    /// Human readable name
    #[serde(rename = "displayName")]
    pub display_name: String,

    /// Everything else the remote returned
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Root {
    /// Create a root with no extra attributes
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            attributes: Map::new(),
        }
    }

    /// Flatten into the raw shape returned by a by-id lookup
    pub fn to_raw(&self) -> RawNode {
        let mut attributes = self.attributes.clone();
        attributes.insert(
            "displayName".to_string(),
            Value::String(self.display_name.clone()),
        );
        RawNode {
            id: self.id.clone(),
            attributes,
        }
    }
}

/// An unclassified child as listed by the remote API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawNode {
    /// Remote id
    pub id: String,

    /// Remaining attributes, untyped
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl RawNode {
    /// Create a raw node from an id and attribute pairs
    pub fn new<I, K>(id: impl Into<String>, attributes: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self {
            id: id.into(),
            attributes: attributes.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Look up a string attribute
    pub fn str_attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    /// Check whether an attribute is present (any value)
    pub fn has_attr(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }
}

/// A document owned by a leaf container (a page)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Remote id
    pub id: String,

    /// Page title
    pub title: String,

    /// Remaining attributes
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Item {
    /// Create an item with no extra attributes
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            attributes: Map::new(),
        }
    }

    /// Build an item from a listed child
    ///
    /// Fails with [`Error::Malformed`] if the id is empty or there is no title.
    pub fn from_raw(raw: &RawNode) -> Result<Self> {
        if raw.id.is_empty() {
            return Err(Error::malformed("", "item without id"));
        }
        let title = raw
            .str_attr("title")
            .ok_or_else(|| Error::malformed(&raw.id, "item without title"))?
            .to_string();

        let mut attributes = raw.attributes.clone();
        attributes.remove("title");

        Ok(Self {
            id: raw.id.clone(),
            title,
            attributes,
        })
    }
}

/// Discriminant of a [`ContainerNode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Terminal container; owns items, never containers
    Leaf,
    /// Nested container; always has a (possibly empty) children list
    Group,
}

/// One node of the classified hierarchy under a root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContainerNode {
    /// A section
    Leaf {
        /// Remote id
        id: String,
        /// Display name
        name: String,
    },
    /// A section group
    Group {
        /// Remote id
        id: String,
        /// Display name
        name: String,
        /// Ordered children
        children: Vec<ContainerNode>,
    },
}

impl ContainerNode {
    /// Create a leaf node
    pub fn leaf(id: impl Into<String>, name: impl Into<String>) -> Self {
        ContainerNode::Leaf {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Create a group node
    pub fn group(id: impl Into<String>, name: impl Into<String>, children: Vec<ContainerNode>) -> Self {
        ContainerNode::Group {
            id: id.into(),
            name: name.into(),
            children,
        }
    }

    /// Node id
    pub fn id(&self) -> &str {
        match self {
            ContainerNode::Leaf { id, .. } | ContainerNode::Group { id, .. } => id,
        }
    }

    /// Node display name
    pub fn name(&self) -> &str {
        match self {
            ContainerNode::Leaf { name, .. } | ContainerNode::Group { name, .. } => name,
        }
    }

    /// Node kind
    pub fn kind(&self) -> NodeKind {
        match self {
            ContainerNode::Leaf { .. } => NodeKind::Leaf,
            ContainerNode::Group { .. } => NodeKind::Group,
        }
    }

    /// Children of a group; `None` for leaves
    pub fn children(&self) -> Option<&[ContainerNode]> {
        match self {
            ContainerNode::Leaf { .. } => None,
            ContainerNode::Group { children, .. } => Some(children),
        }
    }

    /// Depth-first search of a forest for a node with the given id
    pub fn find<'a>(forest: &'a [ContainerNode], id: &str) -> Option<&'a ContainerNode> {
        let mut stack: Vec<&ContainerNode> = forest.iter().rev().collect();
        while let Some(node) = stack.pop() {
            if node.id() == id {
                return Some(node);
            }
            if let Some(children) = node.children() {
                stack.extend(children.iter().rev());
            }
        }
        None
    }

    /// Collect every leaf of a forest in depth-first order
    pub fn leaves(forest: &[ContainerNode]) -> Vec<&ContainerNode> {
        let mut out = Vec::new();
        let mut stack: Vec<&ContainerNode> = forest.iter().rev().collect();
        while let Some(node) = stack.pop() {
            match node.children() {
                Some(children) => stack.extend(children.iter().rev()),
                None => out.push(node),
            }
        }
        out
    }
}
