//! Binding Context - the scoped data chain.
//!
//! Every bound node sees a [`BindingContext`]:
//!
//! ```text
//! $data     the value in scope
//! $rawData  the observable $data was read from, or $data itself
//! $parent   the enclosing context (None at the root)
//! $parents  ancestor $data values, nearest first
//! $root     the outermost $data
//! ```
//!
//! Contexts are immutable. A region derives a fresh one each time it
//! activates; siblings may derive from the same parent independently.

use std::fmt;
use std::rc::Rc;

use crate::engine::{Document, NodeId};
use crate::types::Value;

/// Shared handle to a context.
pub type Context = Rc<BindingContext>;

pub struct BindingContext {
    data: Value,
    raw_data: Value,
    parent: Option<Context>,
    parents: Vec<Value>,
    root: Value,
}

impl BindingContext {
    /// Build a context for `value` under `parent`.
    ///
    /// When `value` is an observable, `$data` is its current value (read
    /// untracked) and `$rawData` the observable itself.
    pub fn derive(parent: Option<&Context>, value: Value) -> Context {
        let data = value.peek();
        let raw_data = value;

        let context = match parent {
            Some(parent) => {
                let mut parents = Vec::with_capacity(parent.parents.len() + 1);
                parents.push(parent.data.clone());
                parents.extend(parent.parents.iter().cloned());
                BindingContext {
                    data,
                    raw_data,
                    parent: Some(parent.clone()),
                    parents,
                    root: parent.root.clone(),
                }
            }
            None => BindingContext {
                root: data.clone(),
                data,
                raw_data,
                parent: None,
                parents: Vec::new(),
            },
        };
        Rc::new(context)
    }

    /// Child context of `self` for `value`.
    pub fn create_child(self: &Rc<Self>, value: Value) -> Context {
        Self::derive(Some(self), value)
    }

    /// `$data`
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// `$rawData`
    pub fn raw_data(&self) -> &Value {
        &self.raw_data
    }

    /// `$parent` as a context.
    pub fn parent(&self) -> Option<&Context> {
        self.parent.as_ref()
    }

    /// `$parents`
    pub fn parents(&self) -> &[Value] {
        &self.parents
    }

    /// `$root`
    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Nesting depth; the root context is 0.
    pub fn depth(&self) -> usize {
        self.parents.len()
    }

    /// Resolve one of the `$`-prefixed context names.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        Some(match name {
            "$data" | "$context" => self.data.clone(),
            "$rawData" => self.raw_data.clone(),
            "$parent" => self
                .parent
                .as_ref()
                .map(|p| p.data.clone())
                .unwrap_or_default(),
            "$parents" => Value::array(self.parents.iter().cloned()),
            "$root" => self.root.clone(),
            _ => return None,
        })
    }
}

impl fmt::Debug for BindingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingContext")
            .field("data", &self.data)
            .field("depth", &self.depth())
            .finish_non_exhaustive()
    }
}

/// The context `node` was bound with, found by walking up from `node`.
pub fn context_for(document: &Document, node: NodeId) -> Option<Context> {
    document.context_for(node)
}

/// Shorthand for `context_for(..).data()`.
pub fn data_for(document: &Document, node: NodeId) -> Option<Value> {
    context_for(document, node).map(|c| c.data().clone())
}
