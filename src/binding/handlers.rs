//! Binding handler registry.
//!
//! A handler turns one `name: expr` pair on one node into live behavior.
//! Handlers are looked up by name in a thread-local registry seeded with the
//! built-ins (`text`, `value`, `click`, `with`, `if`, `ifnot`).
//!
//! ```ignore
//! struct Title;
//! impl BindingHandler for Title {
//!     fn init(&self, call: &BindingCall) -> Result<BindingFlow, BindError> {
//!         let title = call.evaluate()?.read().to_text();
//!         call.document.set_attribute(call.node, "title", &title);
//!         Ok(BindingFlow::Continue)
//!     }
//! }
//! register_handler("title", Title);
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::context::Context;
use super::expression::Expression;
use crate::engine::{BindError, Document, NodeId};
use crate::types::Value;

/// What the dispatcher does after a handler ran.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindingFlow {
    /// Keep walking into the node's descendants.
    Continue,
    /// The handler binds (or withholds) the descendants itself.
    ControlsDescendants,
}

/// Everything a handler gets for one binding.
pub struct BindingCall {
    pub document: Document,
    /// The element, or the start marker for a virtual binding.
    pub node: NodeId,
    pub name: String,
    pub expression: Rc<Expression>,
    pub context: Context,
}

impl BindingCall {
    /// Evaluate the binding's expression in its context.
    pub fn evaluate(&self) -> Result<Value, BindError> {
        self.expression.evaluate(&self.context)
    }
}

pub trait BindingHandler {
    fn init(&self, call: &BindingCall) -> Result<BindingFlow, BindError>;

    /// Whether the binding may appear in a `<!-- ko -->` comment.
    fn allows_virtual(&self) -> bool {
        false
    }
}

thread_local! {
    static HANDLERS: RefCell<HashMap<String, Rc<dyn BindingHandler>>> =
        RefCell::new(crate::primitives::builtin_handlers());
}

/// Register (or replace) the handler for `name`.
pub fn register_handler(name: &str, handler: impl BindingHandler + 'static) {
    HANDLERS.with(|h| h.borrow_mut().insert(name.to_string(), Rc::new(handler)));
}

/// The handler registered for `name`.
pub fn handler(name: &str) -> Option<Rc<dyn BindingHandler>> {
    HANDLERS.with(|h| h.borrow().get(name).cloned())
}

/// Drop custom handlers and restore the built-ins (for testing).
pub fn reset_handlers() {
    HANDLERS.with(|h| *h.borrow_mut() = crate::primitives::builtin_handlers());
}
