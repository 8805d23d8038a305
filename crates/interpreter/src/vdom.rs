//! The VDOM: the parsed tree of HVML elements the interpreter walks.
//!
//! The tokenizer and parser live outside this crate; programs arrive as
//! already-built trees, assembled through [`ElementBuilder`]. Elements
//! carry interned tag atoms so handler dispatch is an integer lookup.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use indexmap::IndexMap;
use purc_core::atom::Atom;
use purc_variant::Variant;

use crate::expr::Expr;

static NEXT_ELEMENT_ID: AtomicUsize = AtomicUsize::new(1);

/// One attribute of a VDOM element. A bare attribute (`silently`) has no
/// value expression.
#[derive(Debug, Clone)]
pub struct Attr {
    /// Lowercase attribute name
    pub name: String,
    /// The value expression, unevaluated
    pub value: Option<Expr>,
}

/// A child of a VDOM element.
#[derive(Debug, Clone)]
pub enum Node {
    /// A child element
    Element(Rc<Element>),
    /// Literal text content
    Text(String),
    /// Evaluated content (the element's caret value)
    Content(Expr),
}

/// A VDOM element.
#[derive(Debug)]
pub struct Element {
    /// Unique id within the process, used for scope maps
    pub id: usize,
    /// The lowercase tag name
    pub tag: String,
    /// The tag interned for handler dispatch
    pub tag_atom: Atom,
    /// Attributes in source order
    pub attrs: Vec<Attr>,
    /// Children in source order
    pub children: Vec<Node>,
}

impl Element {
    /// Finds an attribute by (lowercase) name.
    pub fn attr(&self, name: &str) -> Option<&Attr> {
        self.attrs.iter().find(|attr| attr.name == name)
    }

    /// True if the attribute is present, with or without a value.
    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    /// The element's `id` attribute when it is a literal string.
    pub fn literal_id(&self) -> Option<String> {
        match self.attr("id")?.value.as_ref()? {
            Expr::Literal(serde_json::Value::String(s)) => Some(s.clone()),
            _ => None,
        }
    }

    /// The child elements, in order.
    pub fn child_elements(&self) -> impl Iterator<Item = &Rc<Element>> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            _ => None,
        })
    }

    /// The element's content expression, if any.
    pub fn content_expr(&self) -> Option<&Expr> {
        self.children.iter().find_map(|node| match node {
            Node::Content(expr) => Some(expr),
            _ => None,
        })
    }

    /// The element's literal text content, if any.
    pub fn text_content(&self) -> Option<&str> {
        self.children.iter().find_map(|node| match node {
            Node::Text(text) => Some(text.as_str()),
            _ => None,
        })
    }
}

/// Builder for programmatically assembled VDOM trees.
pub struct ElementBuilder {
    tag: String,
    attrs: Vec<Attr>,
    children: Vec<Node>,
}

impl ElementBuilder {
    /// Starts an element with the given tag.
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Adds an attribute with a value expression.
    pub fn attr(mut self, name: &str, value: Expr) -> Self {
        self.attrs.push(Attr {
            name: name.to_ascii_lowercase(),
            value: Some(value),
        });
        self
    }

    /// Adds a bare attribute.
    pub fn flag(mut self, name: &str) -> Self {
        self.attrs.push(Attr {
            name: name.to_ascii_lowercase(),
            value: None,
        });
        self
    }

    /// Adds a child element.
    pub fn child(mut self, child: Rc<Element>) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    /// Adds literal text content.
    pub fn text(mut self, text: &str) -> Self {
        self.children.push(Node::Text(text.to_string()));
        self
    }

    /// Adds evaluated content.
    pub fn content(mut self, expr: Expr) -> Self {
        self.children.push(Node::Content(expr));
        self
    }

    /// Finishes the element.
    pub fn build(self) -> Rc<Element> {
        Rc::new(Element {
            id: NEXT_ELEMENT_ID.fetch_add(1, Ordering::Relaxed),
            tag_atom: Atom::from_string(purc_core::BUCKET_DEFAULT, &self.tag),
            tag: self.tag,
            attrs: self.attrs,
            children: self.children,
        })
    }
}

/// A parsed HVML document: the entry tree plus document-scope variables.
pub struct Document {
    /// The root element (conventionally `hvml`)
    pub root: Rc<Element>,
    vars: RefCell<IndexMap<String, Variant>>,
}

impl Document {
    /// Wraps a root element into a document.
    pub fn new(root: Rc<Element>) -> Rc<Document> {
        Rc::new(Document {
            root,
            vars: RefCell::new(IndexMap::new()),
        })
    }

    /// Binds a document-scope variable.
    pub fn bind_variable(&self, name: &str, value: Variant) {
        self.vars.borrow_mut().insert(name.to_string(), value);
    }

    /// Looks up a document-scope variable.
    pub fn variable(&self, name: &str) -> Option<Variant> {
        self.vars.borrow().get(name).cloned()
    }

    /// Removes a document-scope variable.
    pub fn unbind_variable(&self, name: &str) -> bool {
        self.vars.borrow_mut().shift_remove(name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_assembles_tree() {
        let inner = ElementBuilder::new("INIT")
            .attr("as", Expr::str("x"))
            .flag("uniquely")
            .build();
        let root = ElementBuilder::new("hvml").child(Rc::clone(&inner)).build();

        assert_eq!(root.tag, "hvml");
        let children: Vec<_> = root.child_elements().collect();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].tag, "init");
        assert!(children[0].has_attr("uniquely"));
        assert!(children[0].attr("as").is_some());
        assert_ne!(root.id, inner.id);
    }

    #[test]
    fn test_document_variables() {
        let doc = Document::new(ElementBuilder::new("hvml").build());
        doc.bind_variable("greeting", Variant::string("hi"));
        assert_eq!(
            doc.variable("greeting").unwrap().get_string(),
            Some("hi")
        );
        assert!(doc.unbind_variable("greeting"));
        assert!(doc.variable("greeting").is_none());
    }

    #[test]
    fn test_literal_id() {
        let el = ElementBuilder::new("div")
            .attr("id", Expr::str("anchor"))
            .build();
        assert_eq!(el.literal_id().as_deref(), Some("anchor"));
    }
}
