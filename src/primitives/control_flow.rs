//! Control Flow Bindings - `with`, `if` and `ifnot` regions.
//!
//! All three are driven by one region lifecycle manager. A region watches an
//! expression and decides whether its content exists:
//!
//! ```text
//!            truthy                    falsey
//! Unbound ─────────→ Bound   Unbound ─────────→ Empty
//! Empty   ─────────→ Bound   Bound   ─────────→ Empty
//! Bound   ─────────→ Bound   (with only: new identity or forced notify)
//! ```
//!
//! `ifnot` inverts the test. `with` binds its content in a child context
//! whose `$data` is the value; `if`/`ifnot` keep the parent context.
//!
//! # Pattern: Template Capture
//!
//! The content is cloned into a detached fragment once, when the binding is
//! initialized. Every later build clones that fragment; the live DOM is
//! never re-read. The first truthy activation binds the original nodes in
//! place so their identity is preserved.
//!
//! # Pattern: Dispose → Remove → Insert → Bind
//!
//! Every teardown disposes what the previous build bound (subscriptions,
//! listeners, nested regions) before removing the nodes; a rebuild then
//! inserts fresh clones and binds them. The region's own subscription to
//! its expression lives as long as the region.
//!
//! # Component Lifecycle
//!
//! - Created when the dispatcher meets the declaration
//! - Destroyed when its anchor is cleaned (an ancestor tore down), which
//!   disposes the effect, the bound content and the template

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::{debug, warn};

use crate::binding::apply::bind_sequence;
use crate::binding::{
    BindingCall, BindingFlow, BindingHandler, Context, DisposeHandle, Expression, RegionAnchor, Template,
};
use crate::engine::{report_error, BindError, Document, NodeId, WeakDocument};
use crate::state::{dependency, Effect, Trigger};
use crate::types::Value;

/// Which binding a region implements.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegionKind {
    With,
    If,
    IfNot,
}

impl RegionKind {
    fn shows(self, data: &Value) -> bool {
        match self {
            RegionKind::With | RegionKind::If => data.is_truthy(),
            RegionKind::IfNot => !data.is_truthy(),
        }
    }
}

/// Activation state of a region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegionState {
    /// Never evaluated.
    Unbound,
    /// Evaluated; no content.
    Empty,
    /// Content present and bound.
    Bound,
}

/// Handler for `with`, `if` and `ifnot`.
pub struct RegionHandler {
    kind: RegionKind,
}

impl RegionHandler {
    pub fn new(kind: RegionKind) -> Self {
        Self { kind }
    }
}

impl BindingHandler for RegionHandler {
    fn init(&self, call: &BindingCall) -> Result<BindingFlow, BindError> {
        let anchor = RegionAnchor::resolve(&call.document, call.node)?;
        let region = Rc::new(Region {
            kind: self.kind,
            document: call.document.downgrade(),
            template: Cell::new(Some(anchor.capture_template(&call.document))),
            anchor,
            expression: call.expression.clone(),
            parent: call.context.clone(),
            state: Cell::new(RegionState::Unbound),
            destroyed: Cell::new(false),
            data: RefCell::new(Value::Undefined),
            bound: RefCell::new(None),
        });

        let effect = {
            let region = region.clone();
            Effect::new(move |trigger| region.refresh(trigger))
        };

        call.document.on_dispose(anchor.node(), move || region.destroy(&effect));

        Ok(BindingFlow::ControlsDescendants)
    }

    fn allows_virtual(&self) -> bool {
        true
    }
}

// =============================================================================
// Region
// =============================================================================

struct Region {
    kind: RegionKind,
    document: WeakDocument,
    anchor: RegionAnchor,
    expression: Rc<Expression>,
    parent: Context,
    template: Cell<Option<Template>>,
    state: Cell<RegionState>,
    /// Set once the anchor is cleaned. A build still in flight stops there.
    destroyed: Cell<bool>,
    /// `$data` of the last evaluation, for identity checks.
    data: RefCell<Value>,
    bound: RefCell<Option<DisposeHandle>>,
}

impl Region {
    /// Effect body: evaluate (tracked), then transition (untracked).
    fn refresh(&self, trigger: Trigger) {
        if self.destroyed.get() {
            return;
        }
        let Some(document) = self.document.upgrade() else {
            return;
        };
        let raw = match self.expression.evaluate(&self.parent) {
            Ok(raw) => raw,
            Err(err) => {
                report_error(&document, err);
                return;
            }
        };
        let data = raw.read();
        dependency::ignore(|| self.transition(&document, &raw, data, trigger));
    }

    fn transition(&self, document: &Document, raw: &Value, data: Value, trigger: Trigger) {
        let show = self.kind.shows(&data);
        let previous = self.data.replace(data.clone());
        let state = self.state.get();

        match (state, show) {
            (RegionState::Unbound, true) => {
                debug!(kind = ?self.kind, anchor = ?self.anchor.node(), "region bound in place");
                let nodes = self.anchor.content(document);
                self.bind(document, nodes, raw);
            }
            (RegionState::Unbound, false) => {
                debug!(kind = ?self.kind, anchor = ?self.anchor.node(), "region emptied");
                self.anchor.clear(document);
                self.state.set(RegionState::Empty);
            }
            (RegionState::Empty, true) => {
                debug!(kind = ?self.kind, anchor = ?self.anchor.node(), "region shown");
                self.build(document, raw);
            }
            (RegionState::Bound, false) => {
                debug!(kind = ?self.kind, anchor = ?self.anchor.node(), "region hidden");
                self.teardown(document);
                self.state.set(RegionState::Empty);
            }
            (RegionState::Bound, true)
                if self.kind == RegionKind::With && (trigger.forced || !Value::identical(&previous, &data)) =>
            {
                debug!(kind = ?self.kind, anchor = ?self.anchor.node(), forced = trigger.forced, "region rebuilt");
                self.teardown(document);
                self.build(document, raw);
            }
            (RegionState::Empty, false) | (RegionState::Bound, true) => {}
        }
    }

    /// Clone the template in at the anchor and bind it.
    fn build(&self, document: &Document, raw: &Value) {
        if self.destroyed.get() {
            return;
        }
        let Some(template) = self.template.get() else {
            return;
        };
        let nodes = template.instantiate(document);
        self.anchor.insert(document, &nodes);
        if self.destroyed.get() || !document.is_alive(self.anchor.node()) {
            for node in nodes {
                document.release(node);
            }
            return;
        }
        self.bind(document, nodes, raw);
    }

    fn bind(&self, document: &Document, nodes: Vec<NodeId>, raw: &Value) {
        let context = match self.kind {
            RegionKind::With => self.parent.create_child(raw.clone()),
            RegionKind::If | RegionKind::IfNot => self.parent.clone(),
        };

        // Recorded first: a failed bind still leaves something to dispose.
        *self.bound.borrow_mut() = Some(DisposeHandle::new(nodes.clone()));
        self.state.set(RegionState::Bound);

        let result = bind_sequence(document, &nodes, &context);

        if self.destroyed.get() {
            // Torn down by an ancestor while binding: whatever was bound after
            // the teardown is released here.
            debug!(kind = ?self.kind, anchor = ?self.anchor.node(), "region destroyed while binding");
            for err in DisposeHandle::new(nodes).dispose(document) {
                warn!(kind = ?self.kind, error = %err, "disposal after destroy failed");
            }
            return;
        }
        if let Err(err) = result {
            report_error(document, err);
        }
    }

    /// Dispose the bound content, then remove it.
    fn teardown(&self, document: &Document) {
        let errors = self.dispose_bound(document);
        self.anchor.clear(document);
        for err in errors {
            report_error(document, err);
        }
    }

    fn dispose_bound(&self, document: &Document) -> Vec<BindError> {
        let handle = self.bound.borrow_mut().take();
        handle.map(|h| h.dispose(document)).unwrap_or_default()
    }

    /// Anchor cleaned: stop watching and let go of everything.
    ///
    /// Also runs when the document is dropped, in which case only the
    /// subscriptions are released.
    fn destroy(&self, effect: &Effect) -> Result<(), BindError> {
        self.destroyed.set(true);
        effect.dispose();

        let errors = match self.document.upgrade() {
            Some(document) => {
                let errors = self.dispose_bound(&document);
                if let Some(template) = self.template.take() {
                    template.release(&document);
                }
                errors
            }
            None => {
                self.bound.borrow_mut().take();
                self.template.take();
                Vec::new()
            }
        };
        self.state.set(RegionState::Unbound);
        debug!(kind = ?self.kind, anchor = ?self.anchor.node(), "region destroyed");

        match errors.into_iter().next() {
            Some(first) => Err(first),
            None => Ok(()),
        }
    }
}
