//! Text binding - `text: expr`.
//!
//! Replaces the element's children with a single text node holding the
//! value's text form, and keeps it in sync.
//!
//! ```ignore
//! <span data-bind="text: name"></span>
//! ```

use crate::binding::{BindingCall, BindingFlow, BindingHandler};
use crate::engine::{report_error, BindError};
use crate::state::{dependency, Effect};

pub struct TextHandler;

impl BindingHandler for TextHandler {
    fn init(&self, call: &BindingCall) -> Result<BindingFlow, BindError> {
        let document = call.document.downgrade();
        let node = call.node;
        let expression = call.expression.clone();
        let context = call.context.clone();

        let effect = Effect::new(move |_| {
            let Some(document) = document.upgrade() else {
                return;
            };
            match expression.evaluate(&context) {
                Ok(value) => {
                    let text = value.read().to_text();
                    dependency::ignore(|| document.set_text_content(node, &text));
                }
                Err(err) => report_error(&document, err),
            }
        });

        call.document.on_dispose(node, move || {
            effect.dispose();
            Ok(())
        });

        // Existing children are replaced, never bound.
        Ok(BindingFlow::ControlsDescendants)
    }
}
