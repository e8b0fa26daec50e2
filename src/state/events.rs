//! Events Module - DOM-style event dispatch.
//!
//! Listeners are stored per node in the document registry
//! (see [`Document::add_event_listener`]). Dispatch bubbles: the target's
//! listeners run first, then each ancestor's, until a listener calls
//! [`Event::stop_propagation`] or the root is reached.
//!
//! # Example
//!
//! ```ignore
//! use spark_bind::state::trigger_event;
//!
//! document.add_event_listener(button, "click", |event| {
//!     println!("clicked {:?}", event.target);
//! });
//! trigger_event(&document, button, "click");
//! ```

use std::cell::Cell;

use tracing::trace;

use crate::engine::{Document, NodeId};

// =============================================================================
// TYPES
// =============================================================================

/// An event in flight.
#[derive(Debug)]
pub struct Event {
    /// Event name, e.g. `"click"`.
    pub name: String,
    /// Node the event was triggered on.
    pub target: NodeId,
    /// Node whose listeners are currently running.
    pub current_target: Cell<NodeId>,
    propagation_stopped: Cell<bool>,
}

impl Event {
    pub fn new(name: impl Into<String>, target: NodeId) -> Self {
        Self {
            name: name.into(),
            target,
            current_target: Cell::new(target),
            propagation_stopped: Cell::new(false),
        }
    }

    /// Keep the event from reaching further ancestors.
    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped.get()
    }
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Dispatch `name` at `target` and bubble it up. Returns how many listeners ran.
pub fn trigger_event(document: &Document, target: NodeId, name: &str) -> usize {
    let event = Event::new(name, target);
    let mut invoked = 0;
    let mut current = Some(target);

    while let Some(node) = current {
        event.current_target.set(node);
        for (id, handler) in document.listeners_for(node, name) {
            // A listener earlier in this dispatch may have removed this one.
            if document.has_listener(node, id) {
                handler(&event);
                invoked += 1;
            }
        }
        if event.is_propagation_stopped() {
            break;
        }
        current = document.parent(node);
    }

    trace!(?target, name, invoked, "event dispatched");
    invoked
}
