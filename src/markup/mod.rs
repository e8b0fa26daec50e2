//! Markup - HTML fragments in and out of a [`Document`].
//!
//! Parsing goes through html5ever's fragment parser (in a `<body>` context)
//! into an `RcDom`, which is then copied into the document's arena.
//! Serialization is done here:
//!
//! ```text
//! <div class="a">x &amp; y<!-- ko with: b --><br><!-- /ko --></div>
//! ```
//!
//! - tag and attribute names lowercase, attributes in source order
//! - void elements have no closing tag
//! - comments verbatim, text escaped, the `value` property omitted

use html5ever::tendril::TendrilSink;
use html5ever::{local_name, namespace_url, ns, parse_fragment, ParseOpts, QualName};
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use tracing::trace;

use crate::engine::{Document, NodeId, NodeType};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track", "wbr",
];

impl Document {
    /// Replace the children of `node` with the parsed `html`.
    ///
    /// Old children are cleaned before they are released.
    pub fn set_inner_html(&self, node: NodeId, html: &str) {
        for child in self.children(node) {
            self.clean_node(child);
            self.release(child);
        }
        for child in parse_html(self, html) {
            self.append_child(node, child);
        }
    }

    /// Serialized children of `node`.
    pub fn inner_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(node) {
            serialize(self, child, &mut out);
        }
        out
    }

    /// Serialized `node` itself.
    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        serialize(self, node, &mut out);
        out
    }
}

/// Parse an HTML fragment into detached top-level nodes.
pub fn parse_html(document: &Document, html: &str) -> Vec<NodeId> {
    let context = QualName::new(None, ns!(html), local_name!("body"));
    let dom = parse_fragment(RcDom::default(), ParseOpts::default(), context, Vec::new()).one(html);
    if !dom.errors.is_empty() {
        trace!(errors = dom.errors.len(), "html parse recovered from errors");
    }

    // The fragment parser wraps its output in a single <html> element.
    let mut nodes = Vec::new();
    for root in dom.document.children.borrow().iter() {
        for child in root.children.borrow().iter() {
            if let Some(node) = convert(document, child) {
                nodes.push(node);
            }
        }
    }
    nodes
}

fn convert(document: &Document, handle: &Handle) -> Option<NodeId> {
    match &handle.data {
        NodeData::Element { name, attrs, .. } => {
            let element = document.create_element(&name.local);
            for attr in attrs.borrow().iter() {
                document.set_attribute(element, &attr.name.local, &attr.value);
            }
            for child in handle.children.borrow().iter() {
                if let Some(node) = convert(document, child) {
                    document.append_child(element, node);
                }
            }
            Some(element)
        }
        NodeData::Text { contents } => Some(document.create_text(&contents.borrow())),
        NodeData::Comment { contents } => Some(document.create_comment(contents)),
        _ => None,
    }
}

fn serialize(document: &Document, node: NodeId, out: &mut String) {
    match document.node_type(node) {
        Some(NodeType::Element) => {
            let Some(element) = document.element(node) else {
                return;
            };
            out.push('<');
            out.push_str(&element.tag);
            for (name, value) in &element.attributes {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                escape(value, true, out);
                out.push('"');
            }
            out.push('>');
            if VOID_ELEMENTS.contains(&element.tag.as_str()) {
                return;
            }
            for child in document.children(node) {
                serialize(document, child, out);
            }
            out.push_str("</");
            out.push_str(&element.tag);
            out.push('>');
        }
        Some(NodeType::Text) => escape(&document.data(node).unwrap_or_default(), false, out),
        Some(NodeType::Comment) => {
            out.push_str("<!--");
            out.push_str(&document.data(node).unwrap_or_default());
            out.push_str("-->");
        }
        Some(NodeType::Fragment) => {
            for child in document.children(node) {
                serialize(document, child, out);
            }
        }
        None => {}
    }
}

fn escape(text: &str, attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let doc = Document::new();
        let root = doc.create_element("div");
        let html = r#"hello <!-- ko with: someitem --><span data-bind="text: a">x</span><!-- /ko --> goodbye"#;

        doc.set_inner_html(root, html);
        assert_eq!(doc.child_count(root), 5);
        assert_eq!(doc.inner_html(root), html);
    }

    #[test]
    fn test_void_elements_and_escaping() {
        let doc = Document::new();
        let root = doc.create_element("div");

        doc.set_inner_html(root, r#"<INPUT Type="text" title='a "b"'><br>1 &lt; 2 &amp; 3"#);
        assert_eq!(
            doc.inner_html(root),
            r#"<input type="text" title="a &quot;b&quot;"><br>1 &lt; 2 &amp; 3"#
        );
    }

    #[test]
    fn test_outer_html_and_value_property() {
        let doc = Document::new();
        let root = doc.create_element("div");
        doc.set_inner_html(root, "<input>");
        let input = doc.first_child(root).expect("input");
        doc.set_value(input, "typed");

        assert_eq!(doc.outer_html(root), "<div><input></div>");
    }

    #[test]
    fn test_replacing_cleans_old_children() {
        let doc = Document::new();
        let root = doc.create_element("div");
        doc.set_inner_html(root, "<b></b>");
        let old = doc.first_child(root).expect("b");
        let ran = std::rc::Rc::new(std::cell::Cell::new(false));
        let ran_clone = ran.clone();
        doc.on_dispose(old, move || {
            ran_clone.set(true);
            Ok(())
        });

        doc.set_inner_html(root, "<i></i>");
        assert!(ran.get());
        assert!(!doc.is_alive(old));
        assert_eq!(doc.inner_html(root), "<i></i>");
    }
}
