//! Binding Engine - documents, side tables, options and errors.
//!
//! The engine owns the data structures everything else works on:
//! - Document: node arena with generational ids
//! - Registry: node → context, node → disposers, node → listeners
//! - Options: features and the error hook
//! - Errors: [`BindError`] and [`report_error`]
//!
//! # Architecture
//!
//! A bound node is an index plus side-table rows:
//!
//! ```text
//! Node 4: <span>  context=ctx#2  disposers=[text effect]  listeners=[click]
//! Node 5: "hi"    (no rows; context_for(5) walks up to node 4)
//! ```
//!
//! Cleaning a node deletes its rows; releasing it frees the slot.

mod document;
mod error;
mod options;
mod registry;

pub use document::*;
pub use error::{report_error, BindError};
pub use options::*;
pub use registry::{Disposer, ListenerId};
