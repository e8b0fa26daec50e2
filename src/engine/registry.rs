//! Node Registry - per-document side tables.
//!
//! Bound nodes carry state that does not belong in the tree itself:
//! - the binding context they were bound with
//! - disposal callbacks (subscriptions and listeners to release)
//! - event listeners
//!
//! All three live here, keyed by [`NodeId`], and are dropped when the node is
//! cleaned or released.
//!
//! Disposers still pending when the document itself is dropped run from the
//! registry's `Drop`. By then the document can no longer be upgraded, so they
//! only release what lives outside it (observable subscriptions).
//!
//! # Cleaning
//!
//! [`Document::clean_node`] is the recursive teardown: it runs the disposal
//! callbacks of a node and all its descendants, parents first, and forgets
//! their contexts and listeners. Cleaning is idempotent.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::{trace, warn};

use super::document::{Document, NodeId};
use super::error::BindError;
use crate::binding::Context;
use crate::state::events::Event;

/// Disposal callback. An `Err` is logged and reported, but never stops the
/// rest of the teardown.
pub type Disposer = Box<dyn FnOnce() -> Result<(), BindError>>;

/// Handle for removing an event listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub(crate) struct ListenerEntry {
    pub(crate) id: ListenerId,
    pub(crate) event: String,
    pub(crate) handler: Rc<dyn Fn(&Event)>,
}

#[derive(Default)]
pub(crate) struct NodeRegistry {
    contexts: HashMap<NodeId, Context>,
    disposers: HashMap<NodeId, Vec<Disposer>>,
    listeners: HashMap<NodeId, Vec<ListenerEntry>>,
    next_listener: u64,
}

impl NodeRegistry {
    /// Forget `nodes`, handing back any disposers that never ran.
    pub(crate) fn purge(&mut self, nodes: &[NodeId]) -> Vec<(NodeId, Vec<Disposer>)> {
        let mut leftover = Vec::new();
        for node in nodes {
            self.contexts.remove(node);
            self.listeners.remove(node);
            if let Some(disposers) = self.disposers.remove(node) {
                leftover.push((*node, disposers));
            }
        }
        leftover
    }
}

impl Drop for NodeRegistry {
    fn drop(&mut self) {
        let pending: Vec<(NodeId, Vec<Disposer>)> = self.disposers.drain().collect();
        for (node, disposers) in pending {
            trace!(?node, count = disposers.len(), "running disposers of dropped document");
            for disposer in disposers {
                if let Err(err) = disposer() {
                    warn!(?node, error = %err, "disposer failed while dropping document");
                }
            }
        }
    }
}

// =============================================================================
// Contexts
// =============================================================================

impl Document {
    /// Associate `context` with `node`.
    pub fn store_context(&self, node: NodeId, context: Context) {
        if self.is_alive(node) {
            self.inner.registry.borrow_mut().contexts.insert(node, context);
        }
    }

    /// The context stored on `node` itself.
    pub fn stored_context(&self, node: NodeId) -> Option<Context> {
        self.inner.registry.borrow().contexts.get(&node).cloned()
    }

    /// The context of `node` or of its nearest ancestor that has one.
    pub fn context_for(&self, node: NodeId) -> Option<Context> {
        let mut current = Some(node);
        while let Some(id) = current {
            if !self.is_alive(id) {
                return None;
            }
            if let Some(context) = self.stored_context(id) {
                return Some(context);
            }
            current = self.parent(id);
        }
        None
    }

    // =========================================================================
    // Disposal
    // =========================================================================

    /// Register a callback to run when `node` is cleaned.
    ///
    /// A node that is already gone will never be cleaned, so the callback
    /// runs right away instead.
    pub fn on_dispose(&self, node: NodeId, disposer: impl FnOnce() -> Result<(), BindError> + 'static) {
        if !self.is_alive(node) {
            trace!(?node, "disposer registered on released node, running now");
            if let Err(err) = disposer() {
                warn!(?node, error = %err, "disposer failed");
            }
            return;
        }
        self.inner
            .registry
            .borrow_mut()
            .disposers
            .entry(node)
            .or_default()
            .push(Box::new(disposer));
    }

    /// Number of pending disposal callbacks on `node`.
    pub fn disposer_count(&self, node: NodeId) -> usize {
        self.inner
            .registry
            .borrow()
            .disposers
            .get(&node)
            .map_or(0, Vec::len)
    }

    /// Tear down `node` and its descendants.
    ///
    /// Runs every disposal callback (parents first), then forgets contexts and
    /// listeners. Failed callbacks are logged and returned; the walk always
    /// completes.
    pub fn clean_node(&self, node: NodeId) -> Vec<BindError> {
        let mut errors = Vec::new();

        for id in self.descendants_inclusive(node) {
            let (disposers, had_context) = {
                let mut registry = self.inner.registry.borrow_mut();
                let disposers = registry.disposers.remove(&id).unwrap_or_default();
                let had_context = registry.contexts.remove(&id).is_some();
                registry.listeners.remove(&id);
                (disposers, had_context)
            };

            if had_context || !disposers.is_empty() {
                trace!(node = ?id, disposers = disposers.len(), "clean node");
            }

            for disposer in disposers {
                if let Err(err) = disposer() {
                    warn!(node = ?id, error = %err, "disposal callback failed");
                    errors.push(err);
                }
            }
        }

        errors
    }

    // =========================================================================
    // Event listeners
    // =========================================================================

    /// Listen for `event` on `node`.
    pub fn add_event_listener(&self, node: NodeId, event: &str, handler: impl Fn(&Event) + 'static) -> ListenerId {
        let mut registry = self.inner.registry.borrow_mut();
        let id = ListenerId(registry.next_listener);
        registry.next_listener += 1;
        if self.is_alive(node) {
            registry.listeners.entry(node).or_default().push(ListenerEntry {
                id,
                event: event.to_string(),
                handler: Rc::new(handler),
            });
        }
        id
    }

    /// Remove a listener. Returns false if it was already gone.
    pub fn remove_event_listener(&self, node: NodeId, id: ListenerId) -> bool {
        let mut registry = self.inner.registry.borrow_mut();
        let Some(listeners) = registry.listeners.get_mut(&node) else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        let removed = listeners.len() != before;
        if listeners.is_empty() {
            registry.listeners.remove(&node);
        }
        removed
    }

    /// Number of listeners for `event` on `node`.
    pub fn listener_count(&self, node: NodeId, event: &str) -> usize {
        self.inner
            .registry
            .borrow()
            .listeners
            .get(&node)
            .map_or(0, |ls| ls.iter().filter(|l| l.event == event).count())
    }

    /// Snapshot of the listeners for `event` on `node`.
    pub(crate) fn listeners_for(&self, node: NodeId, event: &str) -> Vec<(ListenerId, Rc<dyn Fn(&Event)>)> {
        self.inner
            .registry
            .borrow()
            .listeners
            .get(&node)
            .map(|ls| {
                ls.iter()
                    .filter(|l| l.event == event)
                    .map(|l| (l.id, l.handler.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn has_listener(&self, node: NodeId, id: ListenerId) -> bool {
        self.inner
            .registry
            .borrow()
            .listeners
            .get(&node)
            .is_some_and(|ls| ls.iter().any(|l| l.id == id))
    }
}

// =============================================================================
// Tests
// =============================================================================
