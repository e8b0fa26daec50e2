//! Document - the node arena.
//!
//! Nodes are NOT objects. They are slots in an arena, addressed by
//! [`NodeId`]:
//!
//! ```text
//! Slot 0: Element "div"    (parent=None, children=[1, 2])
//! Slot 1: Text "hello "    (parent=0)
//! Slot 2: Comment " ko "   (parent=0)
//! ```
//!
//! Released slots go back to a free pool for reuse. Each slot carries a
//! generation that is bumped on release, so a stale `NodeId` never resolves to
//! the node that later reuses its slot.
//!
//! Tree mutation follows DOM rules: inserting a node that already has a parent
//! moves it. Operations on stale ids are no-ops.
//!
//! # Ownership
//!
//! Closures the document stores in its own side tables (binding effects,
//! listeners, disposers) hold a [`WeakDocument`]. Dropping the last
//! [`Document`] therefore frees the arena, and the registry runs every
//! pending disposer on the way out.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::{trace, warn};

use super::options::{options, Options};
use super::registry::NodeRegistry;

// =============================================================================
// Node types
// =============================================================================

/// Generational handle to a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

/// Node category.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeType {
    Element,
    Text,
    Comment,
    Fragment,
}

/// Element payload.
#[derive(Clone, Debug, PartialEq)]
pub struct ElementData {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    /// The live `value` property. Separate from the attribute and never
    /// serialized or cloned.
    pub value: Option<String>,
}

#[derive(Clone, Debug)]
enum NodeKind {
    Element(ElementData),
    Text(String),
    Comment(String),
    Fragment,
}

struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

struct Slot {
    generation: u32,
    node: Option<NodeData>,
}

#[derive(Default)]
struct Tree {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl Tree {
    fn get(&self, id: NodeId) -> Option<&NodeData> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_ref()
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_mut()
    }

    fn allocate(&mut self, kind: NodeKind) -> NodeId {
        let node = NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        };
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(node);
                NodeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                NodeId { index, generation: 0 }
            }
        }
    }

    fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.get(id).and_then(|n| n.parent) else {
            return;
        };
        if let Some(parent_node) = self.get_mut(parent) {
            parent_node.children.retain(|c| *c != id);
        }
        if let Some(node) = self.get_mut(id) {
            node.parent = None;
        }
    }

    fn is_ancestor_or_self(&self, candidate: NodeId, of: NodeId) -> bool {
        let mut current = Some(of);
        while let Some(id) = current {
            if id == candidate {
                return true;
            }
            current = self.get(id).and_then(|n| n.parent);
        }
        false
    }
}

// =============================================================================
// Document
// =============================================================================

pub(crate) struct DocumentInner {
    tree: RefCell<Tree>,
    pub(crate) registry: RefCell<NodeRegistry>,
    options: Options,
}

/// A node tree plus its side tables. Cloning shares the document.
///
/// # Example
///
/// ```ignore
/// use spark_bind::Document;
///
/// let doc = Document::new();
/// let list = doc.create_element("ul");
/// let item = doc.create_element("li");
/// doc.append_child(list, item);
/// doc.set_text_content(item, "one");
///
/// assert_eq!(doc.outer_html(list), "<ul><li>one</li></ul>");
/// ```
#[derive(Clone)]
pub struct Document {
    pub(crate) inner: Rc<DocumentInner>,
}

/// Non-owning handle to a [`Document`].
///
/// Held by closures that the document itself stores, so the document and
/// its bindings never keep each other alive.
#[derive(Clone)]
pub struct WeakDocument {
    inner: Weak<DocumentInner>,
}

impl WeakDocument {
    /// The document, if any strong handle is still around.
    pub fn upgrade(&self) -> Option<Document> {
        self.inner.upgrade().map(|inner| Document { inner })
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// New document using a snapshot of the process-wide default options.
    pub fn new() -> Self {
        Self::with_options(options())
    }

    /// New document with explicit options.
    pub fn with_options(options: Options) -> Self {
        Self {
            inner: Rc::new(DocumentInner {
                tree: RefCell::new(Tree::default()),
                registry: RefCell::new(NodeRegistry::default()),
                options,
            }),
        }
    }

    /// Options this document was created with.
    pub fn options(&self) -> &Options {
        &self.inner.options
    }

    /// Whether both handles share one document.
    pub fn ptr_eq(&self, other: &Document) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// A handle that does not keep the document alive.
    pub fn downgrade(&self) -> WeakDocument {
        WeakDocument {
            inner: Rc::downgrade(&self.inner),
        }
    }

    // -------------------------------------------------------------------------
    // Creation
    // -------------------------------------------------------------------------

    /// Create a detached element.
    ///
    /// # Arguments
    ///
    /// * `tag` - Tag name, stored lowercase
    ///
    /// # Example
    ///
    /// ```ignore
    /// let div = doc.create_element("DIV");
    /// assert_eq!(doc.tag_name(div).as_deref(), Some("div"));
    /// assert_eq!(doc.parent(div), None);
    /// ```
    pub fn create_element(&self, tag: &str) -> NodeId {
        self.allocate(NodeKind::Element(ElementData {
            tag: tag.to_ascii_lowercase(),
            attributes: Vec::new(),
            value: None,
        }))
    }

    /// Create a detached text node holding `text` verbatim.
    pub fn create_text(&self, text: &str) -> NodeId {
        self.allocate(NodeKind::Text(text.to_string()))
    }

    /// Create a detached comment. `text` is the part between `<!--` and `-->`,
    /// so `create_comment(" ko with: item ")` makes a region start marker.
    pub fn create_comment(&self, text: &str) -> NodeId {
        self.allocate(NodeKind::Comment(text.to_string()))
    }

    /// A detached container with no markup of its own.
    pub fn create_fragment(&self) -> NodeId {
        self.allocate(NodeKind::Fragment)
    }

    fn allocate(&self, kind: NodeKind) -> NodeId {
        self.inner.tree.borrow_mut().allocate(kind)
    }

    // -------------------------------------------------------------------------
    // Inspection
    // -------------------------------------------------------------------------

    /// Whether `node` still refers to a live slot.
    pub fn is_alive(&self, node: NodeId) -> bool {
        self.inner.tree.borrow().get(node).is_some()
    }

    /// Number of live nodes (attached or not).
    pub fn node_count(&self) -> usize {
        self.inner
            .tree
            .borrow()
            .slots
            .iter()
            .filter(|s| s.node.is_some())
            .count()
    }

    /// Category of `node`, or `None` for a stale id.
    pub fn node_type(&self, node: NodeId) -> Option<NodeType> {
        let tree = self.inner.tree.borrow();
        Some(match tree.get(node)?.kind {
            NodeKind::Element(_) => NodeType::Element,
            NodeKind::Text(_) => NodeType::Text,
            NodeKind::Comment(_) => NodeType::Comment,
            NodeKind::Fragment => NodeType::Fragment,
        })
    }

    pub fn is_element(&self, node: NodeId) -> bool {
        self.node_type(node) == Some(NodeType::Element)
    }

    pub fn is_comment(&self, node: NodeId) -> bool {
        self.node_type(node) == Some(NodeType::Comment)
    }

    /// Lowercase tag name of an element.
    pub fn tag_name(&self, node: NodeId) -> Option<String> {
        match &self.inner.tree.borrow().get(node)?.kind {
            NodeKind::Element(el) => Some(el.tag.clone()),
            _ => None,
        }
    }

    /// Copy of an element's payload.
    pub fn element(&self, node: NodeId) -> Option<ElementData> {
        match &self.inner.tree.borrow().get(node)?.kind {
            NodeKind::Element(el) => Some(el.clone()),
            _ => None,
        }
    }

    /// Character data of a text or comment node.
    pub fn data(&self, node: NodeId) -> Option<String> {
        match &self.inner.tree.borrow().get(node)?.kind {
            NodeKind::Text(s) | NodeKind::Comment(s) => Some(s.clone()),
            _ => None,
        }
    }

    /// Replace the character data of a text or comment node.
    pub fn set_data(&self, node: NodeId, data: &str) {
        let mut tree = self.inner.tree.borrow_mut();
        if let Some(n) = tree.get_mut(node) {
            match &mut n.kind {
                NodeKind::Text(s) | NodeKind::Comment(s) => *s = data.to_string(),
                _ => {}
            }
        }
    }

    /// Value of attribute `name` on an element.
    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        match &self.inner.tree.borrow().get(node)?.kind {
            NodeKind::Element(el) => el
                .attributes
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone()),
            _ => None,
        }
    }

    /// Set or replace attribute `name`. Ignored for non-elements.
    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) {
        let mut tree = self.inner.tree.borrow_mut();
        if let Some(NodeData {
            kind: NodeKind::Element(el),
            ..
        }) = tree.get_mut(node)
        {
            match el.attributes.iter_mut().find(|(k, _)| k == name) {
                Some((_, v)) => *v = value.to_string(),
                None => el.attributes.push((name.to_string(), value.to_string())),
            }
        }
    }

    /// The element's `value` property, falling back to its `value` attribute.
    pub fn value(&self, node: NodeId) -> Option<String> {
        let from_property = match &self.inner.tree.borrow().get(node)?.kind {
            NodeKind::Element(el) => el.value.clone(),
            _ => return None,
        };
        from_property.or_else(|| self.attribute(node, "value"))
    }

    /// Set the element's `value` property. The attribute is left alone.
    pub fn set_value(&self, node: NodeId, value: &str) {
        let mut tree = self.inner.tree.borrow_mut();
        if let Some(NodeData {
            kind: NodeKind::Element(el),
            ..
        }) = tree.get_mut(node)
        {
            el.value = Some(value.to_string());
        }
    }

    // -------------------------------------------------------------------------
    // Navigation
    // -------------------------------------------------------------------------

    /// Parent of `node`. `None` for detached nodes and stale ids.
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.inner.tree.borrow().get(node)?.parent
    }

    /// Snapshot of the children of `node`, in order.
    ///
    /// The returned list does not follow later mutation, so it is safe to
    /// iterate while moving or releasing the children.
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.inner
            .tree
            .borrow()
            .get(node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    /// Number of children of `node`.
    pub fn child_count(&self, node: NodeId) -> usize {
        self.inner
            .tree
            .borrow()
            .get(node)
            .map_or(0, |n| n.children.len())
    }

    /// Child at `index`, like `childNodes[index]`.
    pub fn child(&self, node: NodeId, index: usize) -> Option<NodeId> {
        self.inner.tree.borrow().get(node)?.children.get(index).copied()
    }

    /// First child of `node`.
    pub fn first_child(&self, node: NodeId) -> Option<NodeId> {
        self.child(node, 0)
    }

    /// Following sibling of `node`.
    pub fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.sibling_at(node, 1)
    }

    /// Preceding sibling of `node`.
    pub fn previous_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.sibling_at(node, -1)
    }

    fn sibling_at(&self, node: NodeId, offset: isize) -> Option<NodeId> {
        let tree = self.inner.tree.borrow();
        let parent = tree.get(tree.get(node)?.parent?)?;
        let position = parent.children.iter().position(|c| *c == node)? as isize;
        let target = position + offset;
        if target < 0 {
            return None;
        }
        parent.children.get(target as usize).copied()
    }

    /// `node` and all its descendants, depth first, parents before children.
    pub fn descendants_inclusive(&self, node: NodeId) -> Vec<NodeId> {
        let tree = self.inner.tree.borrow();
        let mut out = Vec::new();
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            let Some(data) = tree.get(id) else { continue };
            out.push(id);
            stack.extend(data.children.iter().rev().copied());
        }
        out
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        for id in self.descendants_inclusive(node) {
            if self.node_type(id) == Some(NodeType::Text) {
                if let Some(text) = self.data(id) {
                    out.push_str(&text);
                }
            }
        }
        out
    }

    // -------------------------------------------------------------------------
    // Mutation
    // -------------------------------------------------------------------------

    /// Insert `child` as the last child of `parent`, moving it if attached.
    pub fn append_child(&self, parent: NodeId, child: NodeId) {
        self.insert_before(parent, child, None);
    }

    /// Insert `child` into `parent` before `reference` (or at the end).
    ///
    /// A `reference` that is not a child of `parent` appends. Inserting a node
    /// into itself or its own descendant is ignored.
    ///
    /// # Arguments
    ///
    /// * `parent` - New parent of `child`
    /// * `child` - Node to insert; detached from its old parent first
    /// * `reference` - Sibling to insert before, `None` to append
    ///
    /// # Example
    ///
    /// ```ignore
    /// // Region content goes in front of the closing marker.
    /// let end = doc.create_comment(" /ko ");
    /// doc.append_child(root, end);
    /// let item = doc.create_text("x");
    /// doc.insert_before(root, item, Some(end));
    /// assert_eq!(doc.children(root), vec![item, end]);
    /// ```
    pub fn insert_before(&self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        let mut tree = self.inner.tree.borrow_mut();
        if tree.get(parent).is_none() || tree.get(child).is_none() {
            return;
        }
        if tree.is_ancestor_or_self(child, parent) {
            return;
        }

        tree.detach(child);

        let Some(parent_node) = tree.get_mut(parent) else { return };
        let position = reference
            .and_then(|r| parent_node.children.iter().position(|c| *c == r))
            .unwrap_or(parent_node.children.len());
        parent_node.children.insert(position, child);

        if let Some(child_node) = tree.get_mut(child) {
            child_node.parent = Some(parent);
        }
    }

    /// Detach `node` from its parent. The node stays alive.
    pub fn remove(&self, node: NodeId) {
        self.inner.tree.borrow_mut().detach(node);
    }

    /// Detach `node` and free it with its whole subtree.
    ///
    /// Side-table entries for the freed nodes are dropped. Disposal callbacks
    /// that are still pending run after the slots are freed, so they see the
    /// nodes as gone; clean the subtree first (see [`Document::clean_node`])
    /// to run them while the nodes still exist.
    pub fn release(&self, node: NodeId) {
        let doomed = self.descendants_inclusive(node);
        if doomed.is_empty() {
            return;
        }

        {
            let mut tree = self.inner.tree.borrow_mut();
            tree.detach(node);
            for id in &doomed {
                let slot = &mut tree.slots[id.index as usize];
                slot.node = None;
                slot.generation = slot.generation.wrapping_add(1);
                tree.free.push(id.index);
            }
        }

        let leftover = self.inner.registry.borrow_mut().purge(&doomed);
        trace!(root = ?node, count = doomed.len(), "released nodes");

        for (id, disposers) in leftover {
            for disposer in disposers {
                if let Err(err) = disposer() {
                    warn!(node = ?id, error = %err, "disposal callback of released node failed");
                }
            }
        }
    }

    /// Release every child of `node`.
    pub fn release_children(&self, node: NodeId) {
        for child in self.children(node) {
            self.release(child);
        }
    }

    /// Deep copy of `node`, detached. The `value` property is not copied.
    pub fn clone_subtree(&self, node: NodeId) -> Option<NodeId> {
        let (kind, children) = {
            let tree = self.inner.tree.borrow();
            let data = tree.get(node)?;
            let kind = match &data.kind {
                NodeKind::Element(el) => NodeKind::Element(ElementData {
                    tag: el.tag.clone(),
                    attributes: el.attributes.clone(),
                    value: None,
                }),
                other => other.clone(),
            };
            (kind, data.children.clone())
        };

        let copy = self.allocate(kind);
        for child in children {
            if let Some(child_copy) = self.clone_subtree(child) {
                self.append_child(copy, child_copy);
            }
        }
        Some(copy)
    }

    /// Replace the children of `node` with a single text node.
    ///
    /// When the only child already is a text node its data is updated in
    /// place instead.
    pub fn set_text_content(&self, node: NodeId, text: &str) {
        let children = self.children(node);
        if let [only] = children.as_slice() {
            if self.node_type(*only) == Some(NodeType::Text) {
                self.set_data(*only, text);
                return;
            }
        }
        for child in children {
            self.clean_node(child);
            self.release(child);
        }
        let text_node = self.create_text(text);
        self.append_child(node, text_node);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Document, NodeId, NodeId, NodeId, NodeId) {
        let doc = Document::new();
        let root = doc.create_element("DIV");
        let a = doc.create_text("a");
        let b = doc.create_element("span");
        let c = doc.create_comment(" c ");
        doc.append_child(root, a);
        doc.append_child(root, b);
        doc.append_child(root, c);
        (doc, root, a, b, c)
    }

    #[test]
    fn test_tree_navigation() {
        let (doc, root, a, b, c) = sample();

        assert_eq!(doc.tag_name(root).as_deref(), Some("div"));
        assert_eq!(doc.children(root), vec![a, b, c]);
        assert_eq!(doc.next_sibling(a), Some(b));
        assert_eq!(doc.previous_sibling(c), Some(b));
        assert_eq!(doc.previous_sibling(a), None);
        assert_eq!(doc.next_sibling(c), None);
        assert_eq!(doc.parent(b), Some(root));
    }

    #[test]
    fn test_insert_before_moves_node() {
        let (doc, root, a, b, c) = sample();

        doc.insert_before(root, c, Some(a));
        assert_eq!(doc.children(root), vec![c, a, b]);

        let other = doc.create_element("p");
        doc.append_child(other, a);
        assert_eq!(doc.children(root), vec![c, b]);
        assert_eq!(doc.parent(a), Some(other));
    }

    #[test]
    fn test_cannot_insert_into_own_descendant() {
        let (doc, root, _a, b, _c) = sample();
        doc.append_child(b, root);
        assert_eq!(doc.parent(root), None);
    }

    #[test]
    fn test_release_recycles_with_new_generation() {
        let (doc, root, _a, b, _c) = sample();
        let before = doc.node_count();

        doc.release(b);
        assert!(!doc.is_alive(b));
        assert_eq!(doc.node_count(), before - 1);
        assert_eq!(doc.child_count(root), 2);

        let reused = doc.create_text("new");
        assert_ne!(reused, b, "stale id must not alias the new node");
        assert_eq!(doc.data(b), None);
    }

    #[test]
    fn test_clone_subtree_is_deep_and_detached() {
        let (doc, root, _a, b, _c) = sample();
        doc.set_attribute(b, "data-bind", "text: x");
        doc.set_value(b, "typed");

        let copy = doc.clone_subtree(root).expect("root is alive");
        assert_eq!(doc.parent(copy), None);
        assert_eq!(doc.child_count(copy), 3);

        let copied_span = doc.child(copy, 1).expect("span copied");
        assert_ne!(copied_span, b);
        assert_eq!(doc.attribute(copied_span, "data-bind").as_deref(), Some("text: x"));
        assert_eq!(doc.element(copied_span).and_then(|e| e.value), None);
    }

    #[test]
    fn test_set_text_content_reuses_sole_text_node() {
        let doc = Document::new();
        let span = doc.create_element("span");

        doc.set_text_content(span, "one");
        let first = doc.first_child(span);
        doc.set_text_content(span, "two");

        assert_eq!(doc.first_child(span), first);
        assert_eq!(doc.text_content(span), "two");
    }

    #[test]
    fn test_value_property_shadows_attribute() {
        let doc = Document::new();
        let input = doc.create_element("input");
        doc.set_attribute(input, "value", "attr");
        assert_eq!(doc.value(input).as_deref(), Some("attr"));

        doc.set_value(input, "prop");
        assert_eq!(doc.value(input).as_deref(), Some("prop"));
        assert_eq!(doc.attribute(input, "value").as_deref(), Some("attr"));
    }

    #[test]
    fn test_weak_handle_does_not_keep_document_alive() {
        let doc = Document::new();
        let weak = doc.downgrade();

        let again = weak.upgrade().expect("still held");
        assert!(again.ptr_eq(&doc));

        drop(again);
        drop(doc);
        assert!(weak.upgrade().is_none());
    }
}
