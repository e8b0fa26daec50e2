//! Region anchors and templates.
//!
//! A region is anchored either on an element (content = its children) or on
//! a pair of marker comments (content = the siblings strictly between them):
//!
//! ```text
//! <div data-bind="with: a"> ...content... </div>
//! <!-- ko with: a --> ...content... <!-- /ko -->
//! ```
//!
//! Markers nest, so the end of a start marker is found by counting.

use tracing::trace;

use super::parser::{is_end_marker, is_start_marker};
use crate::engine::{BindError, Document, NodeId, NodeType};

/// Where a region lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegionAnchor {
    Element(NodeId),
    Markers { start: NodeId, end: NodeId },
}

impl RegionAnchor {
    /// Anchor for `node`: an element, or a start marker comment.
    pub fn resolve(document: &Document, node: NodeId) -> Result<Self, BindError> {
        match document.node_type(node) {
            Some(NodeType::Element) => Ok(Self::Element(node)),
            Some(NodeType::Comment) if is_virtual_start(document, node) => {
                let end = matching_end_marker(document, node)?;
                Ok(Self::Markers { start: node, end })
            }
            _ => Err(BindError::UnmatchedMarker(describe(document, node))),
        }
    }

    /// The node bindings and disposers hang off.
    pub fn node(&self) -> NodeId {
        match *self {
            Self::Element(node) => node,
            Self::Markers { start, .. } => start,
        }
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self, Self::Markers { .. })
    }

    /// Current top-level content nodes.
    pub fn content(&self, document: &Document) -> Vec<NodeId> {
        match *self {
            Self::Element(node) => document.children(node),
            Self::Markers { start, end } => {
                let mut nodes = Vec::new();
                let mut current = document.next_sibling(start);
                while let Some(node) = current {
                    if node == end {
                        break;
                    }
                    nodes.push(node);
                    current = document.next_sibling(node);
                }
                nodes
            }
        }
    }

    /// Insert `nodes` at the end of the region.
    pub fn insert(&self, document: &Document, nodes: &[NodeId]) {
        match *self {
            Self::Element(parent) => {
                for &node in nodes {
                    document.append_child(parent, node);
                }
            }
            Self::Markers { end, .. } => {
                let Some(parent) = document.parent(end) else {
                    return;
                };
                for &node in nodes {
                    document.insert_before(parent, node, Some(end));
                }
            }
        }
    }

    /// Remove and release every content node. Callers clean bound content first.
    pub fn clear(&self, document: &Document) {
        let content = self.content(document);
        trace!(anchor = ?self.node(), removed = content.len(), "region cleared");
        for node in content {
            document.release(node);
        }
    }

    /// Snapshot the current content into a detached fragment.
    pub fn capture_template(&self, document: &Document) -> Template {
        let fragment = document.create_fragment();
        for node in self.content(document) {
            if let Some(copy) = document.clone_subtree(node) {
                document.append_child(fragment, copy);
            }
        }
        Template { fragment }
    }
}

/// Read-only snapshot of a region's content.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Template {
    fragment: NodeId,
}

impl Template {
    /// Fresh detached copies of the template's top-level nodes.
    pub fn instantiate(&self, document: &Document) -> Vec<NodeId> {
        document
            .children(self.fragment)
            .into_iter()
            .filter_map(|node| document.clone_subtree(node))
            .collect()
    }

    pub fn is_empty(&self, document: &Document) -> bool {
        document.child_count(self.fragment) == 0
    }

    pub fn release(self, document: &Document) {
        document.release(self.fragment);
    }
}

/// True if `node` is a `<!-- ko ... -->` comment.
pub fn is_virtual_start(document: &Document, node: NodeId) -> bool {
    document.is_comment(node) && document.data(node).is_some_and(|text| is_start_marker(&text))
}

/// True if `node` is a `<!-- /ko -->` comment.
pub fn is_virtual_end(document: &Document, node: NodeId) -> bool {
    document.is_comment(node) && document.data(node).is_some_and(|text| is_end_marker(&text))
}

/// The `/ko` that closes `start`, skipping nested pairs.
pub fn matching_end_marker(document: &Document, start: NodeId) -> Result<NodeId, BindError> {
    let mut depth = 0usize;
    let mut current = document.next_sibling(start);
    while let Some(node) = current {
        if is_virtual_start(document, node) {
            depth += 1;
        } else if is_virtual_end(document, node) {
            if depth == 0 {
                return Ok(node);
            }
            depth -= 1;
        }
        current = document.next_sibling(node);
    }
    Err(BindError::UnmatchedMarker(describe(document, start)))
}

fn describe(document: &Document, node: NodeId) -> String {
    match document.node_type(node) {
        Some(NodeType::Comment) => format!("<!--{}-->", document.data(node).unwrap_or_default()),
        Some(kind) => format!("{kind:?} node"),
        None => "released node".to_string(),
    }
}
