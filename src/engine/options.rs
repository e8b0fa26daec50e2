//! Engine options.
//!
//! One [`Options`] record per document, fixed at construction. The
//! process-wide default lives in a thread-local:
//!
//! - [`options`] returns a copy of the default
//! - [`configure`] edits the default in place; documents created afterwards,
//!   and all observables, see the change
//! - [`reset_options`] restores the built-in default (for testing)
//!
//! Observables are not tied to a document, so deferral
//! ([`Features::DEFER_UPDATES`]) is always read from the process-wide default.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::error::{raise, BindError};

bitflags::bitflags! {
    /// Optional engine behaviors.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Features: u8 {
        /// Read bindings from the binding attribute on elements.
        const DATA_BIND_ATTRIBUTES = 1 << 0;
        /// Read bindings from `<!-- ko ... -->` marker comments.
        const VIRTUAL_ELEMENTS = 1 << 1;
        /// Queue change notifications until `process_deferred_updates`.
        const DEFER_UPDATES = 1 << 2;
    }
}

impl Default for Features {
    fn default() -> Self {
        Features::DATA_BIND_ATTRIBUTES | Features::VIRTUAL_ELEMENTS
    }
}

/// Error hook signature.
pub type ErrorHook = Rc<dyn Fn(&BindError)>;

/// Engine configuration.
#[derive(Clone)]
pub struct Options {
    pub features: Features,
    /// Attribute the dispatcher reads bindings from.
    pub binding_attribute: String,
    /// Receives errors raised during region transitions.
    pub on_error: ErrorHook,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            features: Features::default(),
            binding_attribute: "data-bind".to_string(),
            on_error: Rc::new(raise),
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("features", &self.features)
            .field("binding_attribute", &self.binding_attribute)
            .finish_non_exhaustive()
    }
}

thread_local! {
    static DEFAULT_OPTIONS: RefCell<Options> = RefCell::new(Options::default());
}

/// Copy of the process-wide default options.
pub fn options() -> Options {
    DEFAULT_OPTIONS.with(|o| o.borrow().clone())
}

/// Feature flags of the process-wide default options.
pub fn default_features() -> Features {
    DEFAULT_OPTIONS.with(|o| o.borrow().features)
}

/// Edit the process-wide default options in place.
pub fn configure(f: impl FnOnce(&mut Options)) {
    DEFAULT_OPTIONS.with(|o| f(&mut o.borrow_mut()));
}

/// Restore the built-in defaults (for testing).
pub fn reset_options() {
    DEFAULT_OPTIONS.with(|o| *o.borrow_mut() = Options::default());
}
