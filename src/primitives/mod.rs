//! Built-in Bindings.
//!
//! - [`TextHandler`] - `text: expr`
//! - [`ValueHandler`] - `value: expr` (two-way)
//! - [`ClickHandler`] - `click: fn`
//! - [`RegionHandler`] - `with`, `if`, `ifnot`
//!
//! # Cleanup
//!
//! Every handler hangs its effect and listeners off the bound node with
//! [`Document::on_dispose`](crate::engine::Document::on_dispose). Cleaning the
//! node (directly, or because an enclosing region tore down) releases them,
//! so a rebuilt region never carries two subscriptions for one binding.

mod control_flow;
mod event;
mod text;
mod value;

use std::collections::HashMap;
use std::rc::Rc;

use crate::binding::BindingHandler;

pub use control_flow::{RegionHandler, RegionKind, RegionState};
pub use event::ClickHandler;
pub use text::TextHandler;
pub use value::ValueHandler;

/// The handlers every registry starts with.
pub(crate) fn builtin_handlers() -> HashMap<String, Rc<dyn BindingHandler>> {
    let handlers: [(&str, Rc<dyn BindingHandler>); 6] = [
        ("text", Rc::new(TextHandler)),
        ("value", Rc::new(ValueHandler)),
        ("click", Rc::new(ClickHandler)),
        ("with", Rc::new(RegionHandler::new(RegionKind::With))),
        ("if", Rc::new(RegionHandler::new(RegionKind::If))),
        ("ifnot", Rc::new(RegionHandler::new(RegionKind::IfNot))),
    ];
    handlers
        .into_iter()
        .map(|(name, handler)| (name.to_string(), handler))
        .collect()
}
