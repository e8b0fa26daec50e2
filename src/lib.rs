//! # spark-bind
//!
//! Declarative data binding for document trees.
//!
//! A view model's observables drive regions of a document: `with`, `if` and
//! `ifnot` decide whether a subtree exists, rebuild it when its data is
//! replaced or reports an in-place mutation, and hand each nested region a
//! binding context (`$data`, `$parent`, `$parents`, `$root`, `$rawData`).
//!
//! ## Architecture
//!
//! ```text
//! Observable change → region Effect → dispose old content → clear
//!                   → clone template → insert → bind with derived context
//! ```
//!
//! Documents are arenas of generational node ids. Contexts, disposal
//! callbacks and event listeners live in side tables keyed by node, and are
//! dropped when a node is cleaned.
//!
//! ## Modules
//!
//! - [`types`] - Dynamic [`Value`]s for view models
//! - [`state`] - Observables, effects, deferred updates, events
//! - [`engine`] - Document arena, side tables, options, errors
//! - [`binding`] - Contexts, expressions, declarations, dispatcher
//! - [`primitives`] - Built-in bindings (`text`, `value`, `click`, `with`, `if`, `ifnot`)
//! - [`markup`] - HTML parsing and serialization
//!
//! ## Example
//!
//! ```ignore
//! use spark_bind::{apply_bindings, observable, Document, Value};
//!
//! let doc = Document::new();
//! let root = doc.create_element("div");
//! doc.set_inner_html(root, r#"<div data-bind="with: user"><b data-bind="text: name"></b></div>"#);
//!
//! let user = observable(Value::Null);
//! apply_bindings(&doc, Value::object([("user", user.clone().into())]), root)?;
//! user.set(Value::object([("name", "Ada".into())]));
//! assert_eq!(doc.text_content(root), "Ada");
//! ```

pub mod binding;
pub mod engine;
pub mod markup;
pub mod primitives;
pub mod state;
pub mod types;

// Re-export commonly used items
pub use types::*;

pub use engine::{
    configure, default_features, options, report_error, reset_options, BindError, Disposer, Document, ElementData,
    ErrorHook, Features, ListenerId, NodeId, NodeType, Options, WeakDocument,
};

pub use state::{
    batch, observable, pending_count, process_deferred_updates, reset_deferred, trigger_event, Effect, Event,
    Notification, Observable, ObservableEvent, Subscription, Trigger,
};

pub use binding::{
    apply_bindings, bind_nodes, context_for, data_for, dispose, register_handler, reset_handlers, BindingCall,
    BindingContext, BindingFlow, BindingHandler, Context, DisposeHandle, Expression, RegionAnchor,
};

pub use primitives::{RegionKind, RegionState};
