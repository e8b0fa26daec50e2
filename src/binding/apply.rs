//! Bind Dispatcher - walks a subtree applying binding handlers.
//!
//! # Walk
//!
//! ```text
//! element with data-bind   → store context, run handlers in order,
//!                            descend unless one controls descendants
//! <!-- ko ... -->          → run handlers virtually, resume after <!-- /ko -->
//! anything else            → descend (elements) or skip
//! ```
//!
//! The next node to visit is computed before the current one is bound, so
//! handlers may insert content without confusing the walk.

use tracing::trace;

use super::context::{BindingContext, Context};
use super::handlers::{handler, BindingCall, BindingFlow};
use super::parser::{parse_bindings, start_marker_bindings};
use super::virtual_elements::{is_virtual_start, matching_end_marker};
use crate::engine::{BindError, Document, Features, NodeId, NodeType};
use crate::types::Value;
use std::rc::Rc;

/// Nodes bound by one [`bind_nodes`] call. Disposing cleans all of them.
#[derive(Debug, Default)]
pub struct DisposeHandle {
    nodes: Vec<NodeId>,
}

impl DisposeHandle {
    pub(crate) fn new(nodes: Vec<NodeId>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Release every subscription, listener and context under the handle's
    /// nodes. The nodes stay in the tree.
    pub fn dispose(self, document: &Document) -> Vec<BindError> {
        let mut errors = Vec::new();
        for node in self.nodes {
            if document.is_alive(node) {
                errors.extend(document.clean_node(node));
            }
        }
        errors
    }
}

/// Bind `root` and its descendants against `view_model`.
pub fn apply_bindings(document: &Document, view_model: Value, root: NodeId) -> Result<(), BindError> {
    let context = BindingContext::derive(None, view_model);
    document.store_context(root, context.clone());
    trace!(?root, "apply bindings");
    bind_sequence(document, &[root], &context)
}

/// Bind `nodes` (siblings, in order) with `context`.
pub fn bind_nodes(document: &Document, nodes: &[NodeId], context: &Context) -> Result<DisposeHandle, BindError> {
    bind_sequence(document, nodes, context)?;
    Ok(DisposeHandle::new(nodes.to_vec()))
}

/// Same as [`DisposeHandle::dispose`].
pub fn dispose(document: &Document, handle: DisposeHandle) -> Vec<BindError> {
    handle.dispose(document)
}

/// Store `context` on each top-level node and bind them. Marker pairs inside
/// `nodes` are handled as a unit.
pub(crate) fn bind_sequence(document: &Document, nodes: &[NodeId], context: &Context) -> Result<(), BindError> {
    for &node in nodes {
        document.store_context(node, context.clone());
    }

    let mut skip_to: Option<NodeId> = None;
    for &node in nodes {
        if let Some(end) = skip_to {
            if node == end {
                skip_to = None;
            }
            continue;
        }
        if !document.is_alive(node) {
            continue;
        }
        if let Some(end) = virtual_end(document, node)? {
            skip_to = Some(end);
            bind_virtual(document, node, end, context)?;
        } else {
            bind_node(document, node, context)?;
        }
    }
    Ok(())
}

fn bind_children(document: &Document, parent: NodeId, context: &Context) -> Result<(), BindError> {
    let mut current = document.first_child(parent);
    while let Some(node) = current {
        match virtual_end(document, node)? {
            Some(end) => {
                current = document.next_sibling(end);
                bind_virtual(document, node, end, context)?;
            }
            None => {
                current = document.next_sibling(node);
                bind_node(document, node, context)?;
            }
        }
    }
    Ok(())
}

/// The closing marker if `node` opens a virtual element.
fn virtual_end(document: &Document, node: NodeId) -> Result<Option<NodeId>, BindError> {
    if !document.options().features.contains(Features::VIRTUAL_ELEMENTS) || !is_virtual_start(document, node) {
        return Ok(None);
    }
    matching_end_marker(document, node).map(Some)
}

fn bind_node(document: &Document, node: NodeId, context: &Context) -> Result<(), BindError> {
    if document.node_type(node) != Some(NodeType::Element) {
        return Ok(());
    }

    let options = document.options();
    let declared = options
        .features
        .contains(Features::DATA_BIND_ATTRIBUTES)
        .then(|| document.attribute(node, &options.binding_attribute))
        .flatten();

    let flow = match declared {
        Some(source) => {
            document.store_context(node, context.clone());
            apply_declared(document, node, &source, context, false)?
        }
        None => BindingFlow::Continue,
    };

    if flow == BindingFlow::Continue {
        bind_children(document, node, context)?;
    }
    Ok(())
}

fn bind_virtual(document: &Document, start: NodeId, end: NodeId, context: &Context) -> Result<(), BindError> {
    let source = document.data(start).unwrap_or_default();
    let flow = match start_marker_bindings(&source) {
        Some(bindings) => apply_declared(document, start, bindings, context, true)?,
        None => BindingFlow::Continue,
    };

    if flow == BindingFlow::Continue {
        let mut current = document.next_sibling(start);
        while let Some(node) = current.filter(|&n| n != end) {
            match virtual_end(document, node)? {
                Some(inner_end) => {
                    current = document.next_sibling(inner_end);
                    bind_virtual(document, node, inner_end, context)?;
                }
                None => {
                    current = document.next_sibling(node);
                    bind_node(document, node, context)?;
                }
            }
        }
    }
    Ok(())
}

fn apply_declared(
    document: &Document,
    node: NodeId,
    source: &str,
    context: &Context,
    is_virtual: bool,
) -> Result<BindingFlow, BindError> {
    let mut controller: Option<String> = None;

    for declaration in parse_bindings(source)? {
        let found = handler(&declaration.name).ok_or_else(|| BindError::UnknownBinding(declaration.name.clone()))?;
        if is_virtual && !found.allows_virtual() {
            return Err(BindError::VirtualNotAllowed(declaration.name));
        }

        trace!(?node, binding = %declaration.name, expression = declaration.expression.source(), "init binding");
        let call = BindingCall {
            document: document.clone(),
            node,
            name: declaration.name.clone(),
            expression: Rc::new(declaration.expression),
            context: context.clone(),
        };

        if found.init(&call)? == BindingFlow::ControlsDescendants {
            if let Some(first) = controller.take() {
                return Err(BindError::MultipleControllers {
                    first,
                    second: declaration.name,
                });
            }
            controller = Some(declaration.name);
        }

        if !document.is_alive(node) {
            trace!(?node, "node released while binding, skipping the rest");
            return Ok(BindingFlow::ControlsDescendants);
        }
    }

    Ok(if controller.is_some() {
        BindingFlow::ControlsDescendants
    } else {
        BindingFlow::Continue
    })
}
