//! Click binding - `click: handler`.
//!
//! The expression is resolved when the event fires, so a handler replaced on
//! the view model is picked up without rebinding. The function receives
//! `$data` as its only argument.

use crate::binding::{BindingCall, BindingFlow, BindingHandler};
use crate::engine::{report_error, BindError};
use crate::state::dependency;

pub struct ClickHandler;

impl BindingHandler for ClickHandler {
    fn init(&self, call: &BindingCall) -> Result<BindingFlow, BindError> {
        let node = call.node;
        let name = call.name.clone();
        let document = call.document.downgrade();
        let expression = call.expression.clone();
        let context = call.context.clone();

        let listener = call.document.add_event_listener(node, "click", move |_| {
            let Some(document) = document.upgrade() else {
                return;
            };
            let resolved = dependency::ignore(|| expression.evaluate(&context)).map(|v| v.peek());
            match resolved {
                Ok(value) => match value.as_function() {
                    Some(function) => {
                        function.call(&[context.data().clone()]);
                    }
                    None => report_error(&document, BindError::NotCallable { binding: name.clone() }),
                },
                Err(err) => report_error(&document, err),
            }
        });

        let document = call.document.downgrade();
        call.document.on_dispose(node, move || {
            if let Some(document) = document.upgrade() {
                document.remove_event_listener(node, listener);
            }
            Ok(())
        });

        Ok(BindingFlow::Continue)
    }
}
