//! Value binding - `value: expr`, two-way.
//!
//! Model → element: a tracked effect writes the element's `value` property.
//! Element → model: a `change` listener writes the element's value back
//! through the expression (observable set, or property assignment).

use tracing::trace;

use crate::binding::{BindingCall, BindingFlow, BindingHandler};
use crate::engine::{report_error, BindError};
use crate::state::{dependency, Effect};
use crate::types::Value;

pub struct ValueHandler;

impl BindingHandler for ValueHandler {
    fn init(&self, call: &BindingCall) -> Result<BindingFlow, BindError> {
        let node = call.node;

        let effect = {
            let document = call.document.downgrade();
            let expression = call.expression.clone();
            let context = call.context.clone();
            Effect::new(move |_| {
                let Some(document) = document.upgrade() else {
                    return;
                };
                match expression.evaluate(&context) {
                    Ok(value) => {
                        let text = value.read().to_text();
                        if document.value(node).as_deref() != Some(text.as_str()) {
                            document.set_value(node, &text);
                        }
                    }
                    Err(err) => report_error(&document, err),
                }
            })
        };

        let listener = {
            let document = call.document.downgrade();
            let expression = call.expression.clone();
            let context = call.context.clone();
            call.document.add_event_listener(node, "change", move |_| {
                let Some(document) = document.upgrade() else {
                    return;
                };
                let entered = Value::from(document.value(node).unwrap_or_default());
                match dependency::ignore(|| expression.assign(&context, entered)) {
                    Ok(true) => {}
                    Ok(false) => trace!(?node, expression = expression.source(), "value not writable"),
                    Err(err) => report_error(&document, err),
                }
            })
        };

        let document = call.document.downgrade();
        call.document.on_dispose(node, move || {
            effect.dispose();
            if let Some(document) = document.upgrade() {
                document.remove_event_listener(node, listener);
            }
            Ok(())
        });

        Ok(BindingFlow::Continue)
    }
}
