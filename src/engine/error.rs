//! Binding errors and the process-wide error hook.
//!
//! Errors raised while activating or rebuilding a region cannot travel back
//! to the code that wrote the observable, so they go to
//! [`Options::on_error`](super::Options). The default hook re-raises: it logs
//! the error and panics with it.

use thiserror::Error;
use tracing::error;

use super::Document;

/// Everything that can go wrong while binding or disposing.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindError {
    /// A binding attribute or expression could not be parsed.
    #[error("syntax error in `{source_text}`: {message}")]
    Syntax { source_text: String, message: String },

    /// An expression failed while being evaluated.
    #[error("unable to evaluate `{expression}`: {message}")]
    Expression { expression: String, message: String },

    /// No handler is registered under this name.
    #[error("unknown binding `{0}`")]
    UnknownBinding(String),

    /// The binding was used on a marker comment but only works on elements.
    #[error("the binding `{0}` cannot be used with virtual elements")]
    VirtualNotAllowed(String),

    /// Two bindings on one node both want to control its descendants.
    #[error("multiple bindings (`{first}` and `{second}`) are trying to control descendant bindings of the same element")]
    MultipleControllers { first: String, second: String },

    /// A `<!-- ko -->` marker without its `<!-- /ko -->`.
    #[error("cannot find closing comment tag to match: {0}")]
    UnmatchedMarker(String),

    /// An event binding resolved to something that is not a function.
    #[error("the value bound to `{binding}` is not a function")]
    NotCallable { binding: String },

    /// A disposal callback failed.
    #[error("disposal failed: {0}")]
    Disposal(String),
}

/// Hand an error to the document's error hook.
pub fn report_error(document: &Document, err: BindError) {
    (document.options().on_error)(&err);
}

/// The default hook: log, then re-raise.
pub(crate) fn raise(err: &BindError) {
    error!(error = %err, "uncaught binding error");
    panic!("{err}");
}
