//! Region invariants over generated inputs.

use proptest::prelude::*;
use spark_bind::{apply_bindings, context_for, observable, Document, NodeId, Value};

fn falsey() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Undefined),
        Just(Value::Null),
        Just(Value::Bool(false)),
        Just(Value::Number(0.0)),
        Just(Value::Number(f64::NAN)),
        Just(Value::from("")),
    ]
}

fn truthy_object() -> impl Strategy<Value = Value> {
    "[a-z]{1,8}".prop_map(|label| Value::object([("label", Value::from(label))]))
}

proptest! {
    /// Falsey empties the region; a truthy object brings back exactly the
    /// template's nodes, bound.
    #[test]
    fn toggle_restores_template(
        steps in prop::collection::vec(prop_oneof![falsey().prop_map(Err::<Value, Value>), truthy_object().prop_map(Ok::<Value, Value>)], 1..12)
    ) {
        let doc = Document::new();
        let root = doc.create_element("div");
        doc.set_inner_html(root, r#"<div data-bind="with: item"><b data-bind="text: label"></b><i>static</i></div>"#);
        let item = observable(Value::Null);
        apply_bindings(&doc, Value::object([("item", item.clone().into())]), root).expect("binds");
        let region = doc.first_child(root).expect("region");

        for step in steps {
            match step {
                Err(falsey) => {
                    item.set(falsey);
                    prop_assert_eq!(doc.child_count(region), 0);
                }
                Ok(object) => {
                    let label = object.get("label").to_text();
                    item.set(object);
                    prop_assert_eq!(doc.child_count(region), 2);
                    prop_assert_eq!(doc.text_content(region), format!("{label}static"));
                }
            }
        }
    }

    /// At depth k a node sees k parents, nearest first, and the outermost
    /// data as `$root`.
    #[test]
    fn context_chain_matches_nesting(depth in 0usize..8) {
        let mut html = String::new();
        for _ in 0..depth {
            html.push_str(r#"<div data-bind="with: child">"#);
        }
        html.push_str(r#"<span data-bind="text: name"></span>"#);
        for _ in 0..depth {
            html.push_str("</div>");
        }

        let mut model = Value::object([("name", Value::from(format!("level{depth}")))]);
        for level in (0..depth).rev() {
            model = Value::object([("name", Value::from(format!("level{level}"))), ("child", model)]);
        }

        let doc = Document::new();
        let root = doc.create_element("div");
        doc.set_inner_html(root, &html);
        apply_bindings(&doc, model, root).expect("binds");

        let mut span: NodeId = root;
        for _ in 0..=depth {
            span = doc.first_child(span).expect("nested child");
        }
        let context = context_for(&doc, span).expect("bound");

        prop_assert_eq!(context.parents().len(), depth);
        prop_assert_eq!(context.data().get("name").to_text(), format!("level{depth}"));
        for (i, parent) in context.parents().iter().enumerate() {
            prop_assert_eq!(parent.get("name").to_text(), format!("level{}", depth - 1 - i));
        }
        prop_assert_eq!(context.root().get("name").to_text(), "level0");
        prop_assert_eq!(doc.text_content(span), format!("level{depth}"));
    }
}
