//! `with` regions end to end: markup in, bindings applied, observables driven,
//! markup out.

use std::cell::Cell;
use std::rc::Rc;

use serde_json::json;
use spark_bind::{
    apply_bindings, context_for, observable, register_handler, reset_handlers, trigger_event, BindError, BindingCall,
    BindingFlow, BindingHandler, Document, NodeId, Observable, ObservableEvent, Value,
};

fn test_node(html: &str) -> (Document, NodeId) {
    let doc = Document::new();
    let root = doc.create_element("div");
    doc.set_inner_html(root, html);
    (doc, root)
}

fn child(doc: &Document, node: NodeId, path: &[usize]) -> NodeId {
    path.iter().fold(node, |current, &i| {
        doc.child(current, i)
            .unwrap_or_else(|| panic!("no child {i} under {current:?}"))
    })
}

#[test]
fn falsey_value_removes_descendants_without_binding_them() {
    let (doc, root) = test_node(
        r#"<div data-bind="with: someItem"><span data-bind="text: someItem.nonExistentChildProp"></span></div>"#,
    );
    let region = child(&doc, root, &[0]);
    assert_eq!(doc.child_count(region), 1);

    apply_bindings(&doc, Value::from_json(json!({ "someItem": null })), root).expect("binds");
    assert_eq!(doc.child_count(region), 0);
}

#[test]
fn truthy_value_binds_descendants_in_its_context() {
    let (doc, root) = test_node(r#"<div data-bind="with: someItem"><span data-bind="text: existentChildProp"></span></div>"#);

    apply_bindings(
        &doc,
        Value::from_json(json!({ "someItem": { "existentChildProp": "Child prop value" } })),
        root,
    )
    .expect("binds");
    let region = child(&doc, root, &[0]);
    assert_eq!(doc.child_count(region), 1);
    assert_eq!(doc.text_content(child(&doc, region, &[0])), "Child prop value");
}

#[test]
fn truthy_value_leaves_original_nodes_in_place() {
    let (doc, root) = test_node(r#"<div data-bind="with: someItem"><span data-bind="text: childProp"></span></div>"#);
    let original = child(&doc, root, &[0, 0]);
    let some_item = observable(Value::from_json(json!({ "childProp": "child prop value" })));

    apply_bindings(&doc, Value::object([("someItem", some_item.into())]), root).expect("binds");
    assert_eq!(child(&doc, root, &[0, 0]), original);
    assert_eq!(doc.text_content(original), "child prop value");
}

#[test]
fn toggles_presence_with_truthiness() {
    let (doc, root) =
        test_node(r#"<div data-bind="with: someItem"><span data-bind="text: occasionallyExistentChildProp"></span></div>"#);
    let some_item = observable(Value::Undefined);
    apply_bindings(&doc, Value::object([("someItem", some_item.clone().into())]), root).expect("binds");
    let region = child(&doc, root, &[0]);

    assert_eq!(doc.child_count(region), 0);

    some_item.set(Value::from_json(json!({ "occasionallyExistentChildProp": "Child prop value" })));
    assert_eq!(doc.child_count(region), 1);
    assert_eq!(doc.text_content(child(&doc, region, &[0])), "Child prop value");

    some_item.set(Value::Null);
    assert_eq!(doc.child_count(region), 0);
}

#[test]
fn forced_notify_reconstructs_descendants() {
    let (doc, root) = test_node(r#"<div data-bind="with: someItem"><span data-bind="text: childProp"></span></div>"#);
    let some_item = observable(Value::from_json(json!({ "childProp": "Hello" })));
    apply_bindings(&doc, Value::object([("someItem", some_item.clone().into())]), root).expect("binds");
    assert_eq!(doc.text_content(root), "Hello");

    some_item.peek().set("childProp", Value::from("Goodbye"));
    some_item.value_has_mutated();
    assert_eq!(doc.text_content(child(&doc, root, &[0, 0])), "Goodbye");
}

#[test]
fn forced_notify_does_not_bind_twice() {
    let (doc, root) =
        test_node(r#"<div data-bind="with: someItem"><span data-bind="text: childProp, click: handleClick"></span></div>"#);
    let clicks = Rc::new(Cell::new(0));
    let clicks_for_handler = clicks.clone();
    let child_prop = observable(Value::from("Hello"));
    let some_item = observable(Value::object([
        ("childProp", child_prop.clone().into()),
        (
            "handleClick",
            Value::function(move |_| {
                clicks_for_handler.set(clicks_for_handler.get() + 1);
                Value::Undefined
            }),
        ),
    ]));
    apply_bindings(&doc, Value::object([("someItem", some_item.clone().into())]), root).expect("binds");

    assert_eq!(doc.text_content(root), "Hello");
    assert_eq!(child_prop.subscription_count(None), 1);
    trigger_event(&doc, child(&doc, root, &[0, 0]), "click");
    assert_eq!(clicks.get(), 1);

    some_item.value_has_mutated();
    assert_eq!(child_prop.subscription_count(None), 1);

    clicks.set(0);
    trigger_event(&doc, child(&doc, root, &[0, 0]), "click");
    assert_eq!(clicks.get(), 1);
}

#[test]
fn parent_context_is_reachable() {
    let (doc, root) = test_node(r#"<div data-bind="with: someItem"><span data-bind="text: $parent.parentProp"></span></div>"#);

    apply_bindings(
        &doc,
        Value::from_json(json!({ "someItem": {}, "parentProp": "Parent prop value" })),
        root,
    )
    .expect("binds");
    assert_eq!(doc.text_content(child(&doc, root, &[0, 0])), "Parent prop value");
}

#[test]
fn parents_and_root_are_reachable_and_consistent() {
    let (doc, root) = test_node(concat!(
        r#"<div data-bind="with: topItem">"#,
        r#"<div data-bind="with: middleItem">"#,
        r#"<div data-bind="with: bottomItem">"#,
        r#"<span data-bind="text: name"></span>"#,
        r#"<span data-bind="text: $parent.name"></span>"#,
        r#"<span data-bind="text: $parents[1].name"></span>"#,
        r#"<span data-bind="text: $parents[2].name"></span>"#,
        r#"<span data-bind="text: $root.name"></span>"#,
        "</div></div></div>",
    ));
    apply_bindings(
        &doc,
        Value::from_json(json!({
            "name": "outer",
            "topItem": {
                "name": "top",
                "middleItem": {
                    "name": "middle",
                    "bottomItem": { "name": "bottom" }
                }
            }
        })),
        root,
    )
    .expect("binds");

    let container = child(&doc, root, &[0, 0, 0]);
    let texts: Vec<String> = doc.children(container).into_iter().map(|n| doc.text_content(n)).collect();
    assert_eq!(texts, ["bottom", "middle", "top", "outer", "outer"]);

    let name_at = |node: NodeId| {
        context_for(&doc, node)
            .map(|c| c.data().get("name").to_text())
            .unwrap_or_default()
    };
    assert_eq!(name_at(root), "outer");
    assert_eq!(name_at(child(&doc, root, &[0])), "outer");
    assert_eq!(name_at(child(&doc, root, &[0, 0])), "top");
    assert_eq!(name_at(child(&doc, root, &[0, 0, 0])), "middle");
    assert_eq!(name_at(child(&doc, root, &[0, 0, 0, 0])), "bottom");

    let first_span = child(&doc, root, &[0, 0, 0, 0]);
    assert_eq!(doc.tag_name(first_span).as_deref(), Some("span"));
    let context = context_for(&doc, first_span).expect("bound");
    assert_eq!(context.data().get("name").to_text(), "bottom");
    assert_eq!(context.root().get("name").to_text(), "outer");
    assert_eq!(context.parents()[1].get("name").to_text(), "top");
}

#[test]
fn containerless_region_round_trips() {
    let (doc, root) = test_node(
        r#"hello <!-- ko with: someitem --><span data-bind="text: occasionallyexistentchildprop"></span><!-- /ko --> goodbye"#,
    );
    let some_item = observable(Value::Undefined);
    apply_bindings(&doc, Value::object([("someitem", some_item.clone().into())]), root).expect("binds");

    let empty = "hello <!-- ko with: someitem --><!-- /ko --> goodbye";
    assert_eq!(doc.inner_html(root), empty);

    some_item.set(Value::from_json(json!({ "occasionallyexistentchildprop": "child prop value" })));
    assert_eq!(
        doc.inner_html(root),
        r#"hello <!-- ko with: someitem --><span data-bind="text: occasionallyexistentchildprop">child prop value</span><!-- /ko --> goodbye"#
    );

    some_item.set(Value::Null);
    assert_eq!(doc.inner_html(root), empty);
}

#[test]
fn containerless_regions_nest() {
    let (doc, root) = test_node(concat!(
        "hello <!-- ko with: topitem -->",
        r#"Got top: <span data-bind="text: topprop"></span>"#,
        "<!-- ko with: childitem -->",
        r#"Got child: <span data-bind="text: childprop"></span>"#,
        "<!-- /ko -->",
        "<!-- /ko -->",
    ));
    let top_item = observable(Value::Null);
    apply_bindings(&doc, Value::object([("topitem", top_item.clone().into())]), root).expect("binds");

    assert_eq!(doc.inner_html(root), "hello <!-- ko with: topitem --><!-- /ko -->");

    let child_item = observable(Value::Undefined);
    top_item.set(Value::object([
        ("topprop", Value::from("property of top")),
        ("childitem", child_item.clone().into()),
    ]));
    assert_eq!(
        doc.inner_html(root),
        concat!(
            "hello <!-- ko with: topitem -->",
            r#"Got top: <span data-bind="text: topprop">property of top</span>"#,
            "<!-- ko with: childitem --><!-- /ko -->",
            "<!-- /ko -->",
        )
    );

    child_item.set(Value::from_json(json!({ "childprop": "property of child" })));
    assert_eq!(
        doc.inner_html(root),
        concat!(
            "hello <!-- ko with: topitem -->",
            r#"Got top: <span data-bind="text: topprop">property of top</span>"#,
            "<!-- ko with: childitem -->",
            r#"Got child: <span data-bind="text: childprop">property of child</span>"#,
            "<!-- /ko -->",
            "<!-- /ko -->",
        )
    );

    top_item.set(Value::Null);
    assert_eq!(doc.inner_html(root), "hello <!-- ko with: topitem --><!-- /ko -->");
    assert_eq!(child_item.subscription_count(None), 0);
}

#[test]
fn raw_data_exposes_the_observable_for_two_way_value() {
    let (doc, root) = test_node(r#"<div data-bind="with: item"><input data-bind="value: $rawData"></div>"#);
    let item = observable(Value::from("one"));
    apply_bindings(&doc, Value::object([("item", item.clone().into())]), root).expect("binds");

    // The region and the value binding.
    assert_eq!(item.subscription_count(Some(ObservableEvent::Change)), 2);
    assert_eq!(doc.value(child(&doc, root, &[0, 0])).as_deref(), Some("one"));

    let input = child(&doc, root, &[0, 0]);
    doc.set_value(input, "two");
    trigger_event(&doc, input, "change");
    assert_eq!(item.peek().to_text(), "two");

    item.set(Value::from("three"));
    assert_eq!(doc.value(child(&doc, root, &[0, 0])).as_deref(), Some("three"));
    assert_eq!(item.subscription_count(Some(ObservableEvent::Change)), 2);
}

#[test]
fn tearing_down_outer_region_disposes_nested_regions() {
    let (doc, root) = test_node(concat!(
        r#"<div data-bind="with: outer">"#,
        r#"<div data-bind="with: inner"><span data-bind="text: label"></span></div>"#,
        "</div>",
    ));
    let label = observable(Value::from("deep"));
    let inner = observable(Value::object([("label", label.clone().into())]));
    let outer = observable(Value::object([("inner", inner.clone().into())]));
    apply_bindings(&doc, Value::object([("outer", outer.clone().into())]), root).expect("binds");

    let nested_region = child(&doc, root, &[0, 0]);
    let span = child(&doc, root, &[0, 0, 0]);
    assert_eq!(doc.text_content(span), "deep");
    assert_eq!(inner.subscription_count(None), 1);
    assert_eq!(label.subscription_count(None), 1);

    outer.set(Value::Null);

    assert_eq!(doc.child_count(child(&doc, root, &[0])), 0);
    assert!(context_for(&doc, nested_region).is_none());
    assert!(context_for(&doc, span).is_none());
    assert_eq!(inner.subscription_count(None), 0);
    assert_eq!(label.subscription_count(None), 0);
}

/// Empties an observable from inside its own `init`.
struct Collapse(Observable);

impl BindingHandler for Collapse {
    fn init(&self, _call: &BindingCall) -> Result<BindingFlow, BindError> {
        self.0.set(Value::Null);
        Ok(BindingFlow::Continue)
    }
}

#[test]
fn ancestor_teardown_during_rebuild_leaves_no_subscriptions() {
    let (doc, root) = test_node(concat!(
        "<!-- ko with: outer --><!-- ko with: inner -->",
        r#"<i data-bind="collapse: 1, text: $root.label"></i>"#,
        "<!-- /ko --><!-- /ko -->",
    ));
    let label = observable(Value::from("L"));
    let inner = observable(Value::Null);
    let outer = observable(Value::object([("inner", inner.clone().into())]));
    register_handler("collapse", Collapse(outer.clone()));

    apply_bindings(
        &doc,
        Value::object([("outer", outer.clone().into()), ("label", label.clone().into())]),
        root,
    )
    .expect("binds");
    assert_eq!(inner.subscription_count(None), 1);

    inner.set(Value::from_json(json!({ "x": 1 })));
    reset_handlers();

    assert_eq!(doc.inner_html(root), "<!-- ko with: outer --><!-- /ko -->");
    assert_eq!(label.subscription_count(None), 0);
    assert_eq!(inner.subscription_count(None), 0);
    assert_eq!(outer.subscription_count(None), 1);

    label.set(Value::from("changed"));
    assert_eq!(doc.inner_html(root), "<!-- ko with: outer --><!-- /ko -->");
}

#[test]
fn dropping_a_bound_document_releases_its_subscriptions() {
    let label = observable(Value::from("kept"));
    let item = observable(Value::object([("x", Value::from(1))]));
    {
        let (doc, root) =
            test_node(r#"<div data-bind="with: item"><span data-bind="text: $parent.label"></span></div>"#);
        apply_bindings(
            &doc,
            Value::object([("item", item.clone().into()), ("label", label.clone().into())]),
            root,
        )
        .expect("binds");
        assert_eq!(doc.text_content(root), "kept");
        assert_eq!(item.subscription_count(None), 1);
        assert_eq!(label.subscription_count(None), 1);
    }

    assert_eq!(item.subscription_count(None), 0);
    assert_eq!(label.subscription_count(None), 0);
    item.value_has_mutated();
    label.set(Value::from("after"));
}
