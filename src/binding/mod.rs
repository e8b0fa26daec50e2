//! Binding Module - contexts, expressions and the dispatcher.
//!
//! - **Context** - `$data` / `$parent` / `$parents` / `$root` / `$rawData` chain
//! - **Expression** - property-path expressions evaluated against a context
//! - **Parser** - `name: expr` lists and `<!-- ko -->` marker grammar
//! - **Virtual elements** - region anchors (element or marker pair) and templates
//! - **Handlers** - the binding handler trait and registry
//! - **Apply** - walks a subtree and applies handlers

pub mod apply;
pub mod context;
pub mod expression;
pub mod handlers;
pub mod parser;
pub mod virtual_elements;

pub use apply::{apply_bindings, bind_nodes, dispose, DisposeHandle};
pub use context::{context_for, data_for, BindingContext, Context};
pub use expression::Expression;
pub use handlers::{handler, register_handler, reset_handlers, BindingCall, BindingFlow, BindingHandler};
pub use parser::{parse_bindings, BindingDeclaration};
pub use virtual_elements::{RegionAnchor, Template};
