//! # Document Model
//!
//! A small in-memory document: an arena of element and text nodes with the
//! handful of operations the widget needs (attributes, classes, input
//! values, cloning, wrapping, selector queries, serialization).
//!
//! ## Arena Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  nodes: Vec<Node>            NodeId(n) = index into `nodes`             │
//! │                                                                         │
//! │  [0] Document ─┬─ [1] <label for="price">                               │
//! │                │      └─ [2] "Price (EUR)"                              │
//! │                └─ [3] <input id="price" type="number">                  │
//! │                                                                         │
//! │  Nodes are never freed: detached nodes simply lose their parent.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! An input keeps two values, like a browser does: the `value` attribute
//! (its default, serialized in markup) and the live value property the user
//! types into. Setting the attribute also resets the property.

use std::fmt;

use serde::Serialize;
use url::Url;

use crate::error::{WidgetError, WidgetResult};
use crate::selector::SelectorList;

// =============================================================================
// Node Types
// =============================================================================

/// Identifier of a node inside one [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
enum NodeKind {
    Document,
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

#[derive(Debug, Clone)]
struct Element {
    tag_name: String,
    attrs: Vec<(String, String)>,
    value: String,
}

impl Element {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn set_attr(&mut self, name: &str, value: &str) {
        if name == "value" {
            self.value = value.to_string();
        }
        match self.attrs.iter_mut().find(|(key, _)| key == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.attrs.push((name.to_string(), value.to_string())),
        }
    }

    fn class_tokens(&self) -> Vec<String> {
        self.attr("class")
            .map(|value| value.split_whitespace().map(ToOwned::to_owned).collect())
            .unwrap_or_default()
    }

    fn set_class_tokens(&mut self, classes: &[String]) {
        if classes.is_empty() {
            self.attrs.retain(|(key, _)| key != "class");
        } else {
            self.set_attr("class", &classes.join(" "));
        }
    }
}

// =============================================================================
// Document
// =============================================================================

/// An in-memory document tree.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    url: Option<Url>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Creates an empty document.
    pub fn new() -> Self {
        Document {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                kind: NodeKind::Document,
            }],
            root: NodeId(0),
            url: None,
        }
    }

    /// Creates an empty document loaded from `url`.
    pub fn with_url(url: Url) -> Self {
        Document {
            url: Some(url),
            ..Self::new()
        }
    }

    /// Address of the page; relative endpoints resolve against it.
    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    pub fn set_url(&mut self, url: Url) {
        self.url = Some(url);
    }

    /// The document node every page element descends from.
    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    fn node(&self, id: NodeId) -> WidgetResult<&Node> {
        self.nodes.get(id.0).ok_or(WidgetError::NodeNotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> WidgetResult<&mut Node> {
        self.nodes.get_mut(id.0).ok_or(WidgetError::NodeNotFound(id))
    }

    fn element(&self, id: NodeId) -> Option<&Element> {
        match self.nodes.get(id.0).map(|node| &node.kind) {
            Some(NodeKind::Element(element)) => Some(element),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> WidgetResult<&mut Element> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Element(element) => Ok(element),
            _ => Err(WidgetError::NotAnElement(id)),
        }
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            kind,
        });
        id
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Creates a detached element.
    pub fn create_element(&mut self, tag_name: &str) -> NodeId {
        self.push(NodeKind::Element(Element {
            tag_name: tag_name.to_ascii_lowercase(),
            attrs: Vec::new(),
            value: String::new(),
        }))
    }

    /// Creates a detached element with attributes.
    ///
    /// ## Example
    /// ```rust
    /// use pricesync_widget::Document;
    ///
    /// let mut doc = Document::new();
    /// let input = doc.create_element_with("input", &[("id", "price"), ("value", "100")]);
    /// assert_eq!(doc.value(input), "100");
    /// ```
    pub fn create_element_with(&mut self, tag_name: &str, attrs: &[(&str, &str)]) -> NodeId {
        let id = self.create_element(tag_name);
        if let Some(NodeKind::Element(element)) = self.nodes.get_mut(id.0).map(|n| &mut n.kind) {
            for (name, value) in attrs {
                element.set_attr(name, value);
            }
        }
        id
    }

    /// Creates a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Text(text.to_string()))
    }

    /// Deep-copies a node. The copy is detached.
    pub fn clone_node(&mut self, id: NodeId) -> WidgetResult<NodeId> {
        let node = self.node(id)?;
        let kind = node.kind.clone();
        let children = node.children.clone();
        if matches!(kind, NodeKind::Document) {
            return Err(WidgetError::InvalidTree("cannot clone the document".into()));
        }

        let copy = self.push(kind);
        for child in children {
            let child_copy = self.clone_node(child)?;
            self.append_child(copy, child_copy)?;
        }
        Ok(copy)
    }

    // =========================================================================
    // Tree Navigation & Mutation
    // =========================================================================

    /// Parent of a node, if attached.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|node| node.parent)
    }

    /// Children of a node, in order.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.0)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    /// Returns true when `ancestor` is `id` or contains it.
    pub fn contains(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// Returns true when the node is reachable from the document root.
    pub fn is_connected(&self, id: NodeId) -> bool {
        self.contains(self.root, id)
    }

    fn check_insertable(&self, parent: NodeId, child: NodeId) -> WidgetResult<()> {
        self.node(parent)?;
        if matches!(self.node(child)?.kind, NodeKind::Document) {
            return Err(WidgetError::InvalidTree("cannot move the document".into()));
        }
        if self.contains(child, parent) {
            return Err(WidgetError::InvalidTree(format!(
                "node {} cannot be inserted into its own subtree",
                child
            )));
        }
        Ok(())
    }

    fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.parent(id) {
            if let Some(node) = self.nodes.get_mut(parent.0) {
                node.children.retain(|child| *child != id);
            }
        }
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.parent = None;
        }
    }

    fn insert_at(&mut self, parent: NodeId, index: usize, child: NodeId) -> WidgetResult<()> {
        self.check_insertable(parent, child)?;
        self.detach(child);
        let siblings = &mut self.node_mut(parent)?.children;
        let index = index.min(siblings.len());
        siblings.insert(index, child);
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    fn index_in_parent(&self, id: NodeId) -> WidgetResult<(NodeId, usize)> {
        let parent = self
            .parent(id)
            .ok_or_else(|| WidgetError::InvalidTree(format!("node {} has no parent", id)))?;
        let index = self
            .children(parent)
            .iter()
            .position(|child| *child == id)
            .ok_or_else(|| WidgetError::InvalidTree(format!("node {} is orphaned", id)))?;
        Ok((parent, index))
    }

    /// Appends `child` as the last child of `parent`.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> WidgetResult<()> {
        let len = self.children(parent).len();
        self.insert_at(parent, len, child)
    }

    /// Inserts `new` right before `reference`.
    pub fn insert_before(&mut self, reference: NodeId, new: NodeId) -> WidgetResult<()> {
        self.check_insertable(reference, new)?;
        self.detach(new);
        let (parent, index) = self.index_in_parent(reference)?;
        self.insert_at(parent, index, new)
    }

    /// Inserts `new` right after `reference`.
    pub fn insert_after(&mut self, reference: NodeId, new: NodeId) -> WidgetResult<()> {
        self.check_insertable(reference, new)?;
        self.detach(new);
        let (parent, index) = self.index_in_parent(reference)?;
        self.insert_at(parent, index + 1, new)
    }

    /// Puts `wrapper` where `id` is and moves `id` inside it.
    pub fn wrap(&mut self, id: NodeId, wrapper: NodeId) -> WidgetResult<()> {
        self.insert_before(id, wrapper)?;
        self.append_child(wrapper, id)
    }

    // =========================================================================
    // Elements & Attributes
    // =========================================================================

    /// Lowercase tag name of an element.
    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|element| element.tag_name.as_str())
    }

    /// Value of an attribute.
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|element| element.attr(name))
    }

    /// Returns true when the attribute is present (even if empty).
    pub fn has_attribute(&self, id: NodeId, name: &str) -> bool {
        self.attribute(id, name).is_some()
    }

    /// All attributes, in insertion order.
    pub fn attributes(&self, id: NodeId) -> impl Iterator<Item = (&str, &str)> {
        self.element(id)
            .into_iter()
            .flat_map(|element| element.attrs.iter())
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Sets an attribute, replacing any previous value.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> WidgetResult<()> {
        self.element_mut(id)?.set_attr(&name.to_ascii_lowercase(), value);
        Ok(())
    }

    /// Removes an attribute; returns true when it was present.
    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> WidgetResult<bool> {
        let element = self.element_mut(id)?;
        let before = element.attrs.len();
        element.attrs.retain(|(key, _)| key != name);
        Ok(element.attrs.len() != before)
    }

    /// Returns true when the element carries the class.
    pub fn has_class(&self, id: NodeId, class_name: &str) -> bool {
        self.element(id)
            .map(|element| element.class_tokens().iter().any(|c| c == class_name))
            .unwrap_or(false)
    }

    /// Adds every whitespace-separated class in `classes`.
    pub fn add_class(&mut self, id: NodeId, classes: &str) -> WidgetResult<()> {
        let element = self.element_mut(id)?;
        let mut tokens = element.class_tokens();
        for class_name in classes.split_whitespace() {
            if !tokens.iter().any(|c| c == class_name) {
                tokens.push(class_name.to_string());
            }
        }
        element.set_class_tokens(&tokens);
        Ok(())
    }

    /// Removes every whitespace-separated class in `classes`.
    pub fn remove_class(&mut self, id: NodeId, classes: &str) -> WidgetResult<()> {
        let element = self.element_mut(id)?;
        let remove: Vec<&str> = classes.split_whitespace().collect();
        let tokens: Vec<String> = element
            .class_tokens()
            .into_iter()
            .filter(|c| !remove.contains(&c.as_str()))
            .collect();
        element.set_class_tokens(&tokens);
        Ok(())
    }

    /// Current value of a form control (empty for other nodes).
    pub fn value(&self, id: NodeId) -> &str {
        self.element(id)
            .map(|element| element.value.as_str())
            .unwrap_or("")
    }

    /// Sets the live value of a form control, leaving the attribute alone.
    pub fn set_value(&mut self, id: NodeId, value: &str) -> WidgetResult<()> {
        self.element_mut(id)?.value = value.to_string();
        Ok(())
    }

    /// `data-*` attributes of an element.
    pub fn data_attributes(&self, id: NodeId) -> Vec<(&str, &str)> {
        self.attributes(id)
            .filter(|(name, _)| name.starts_with("data-"))
            .collect()
    }

    // =========================================================================
    // Text
    // =========================================================================

    /// Concatenated text of a subtree.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match self.nodes.get(id.0).map(|node| &node.kind) {
            Some(NodeKind::Text(text)) => out.push_str(text),
            Some(_) => {
                for child in self.children(id) {
                    self.collect_text(*child, out);
                }
            }
            None => {}
        }
    }

    /// Replaces all children with a single text node.
    pub fn set_text(&mut self, id: NodeId, text: &str) -> WidgetResult<()> {
        let children = self.children(id).to_vec();
        for child in children {
            self.detach(child);
        }
        let text_node = self.create_text(text);
        self.append_child(id, text_node)
    }

    /// Replaces the first direct text child, keeping element children such
    /// as nested spans. Prepends a text node when there is none.
    pub fn replace_first_text(&mut self, id: NodeId, text: &str) -> WidgetResult<()> {
        let first_text = self
            .children(id)
            .iter()
            .copied()
            .find(|child| matches!(self.nodes.get(child.0).map(|n| &n.kind), Some(NodeKind::Text(_))));

        match first_text {
            Some(child) => {
                self.node_mut(child)?.kind = NodeKind::Text(text.to_string());
                Ok(())
            }
            None => {
                let text_node = self.create_text(text);
                self.insert_at(id, 0, text_node)
            }
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Connected elements in document order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            if self.element(node).is_some() {
                out.push(node);
            }
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    /// First connected element with the given id.
    pub fn get_element_by_id(&self, element_id: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .find(|node| self.attribute(*node, "id") == Some(element_id))
    }

    /// First connected element matching `selector`.
    pub fn query_selector(&self, selector: &str) -> WidgetResult<Option<NodeId>> {
        Ok(self.query_selector_all(selector)?.into_iter().next())
    }

    /// Every connected element matching `selector`, in document order.
    pub fn query_selector_all(&self, selector: &str) -> WidgetResult<Vec<NodeId>> {
        let list = SelectorList::parse(selector)?;
        Ok(self
            .descendants(self.root)
            .into_iter()
            .filter(|node| list.matches(self, *node))
            .collect())
    }

    /// `<label for=...>` elements pointing at `element_id`.
    pub fn labels_for(&self, element_id: &str) -> Vec<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .filter(|node| {
                self.tag_name(*node) == Some("label")
                    && self.attribute(*node, "for") == Some(element_id)
            })
            .collect()
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    /// Serializes a node and its subtree as HTML.
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_html(id, &mut out);
        out
    }

    fn write_html(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.nodes.get(id.0) else {
            return;
        };
        match &node.kind {
            NodeKind::Document => {
                for child in &node.children {
                    self.write_html(*child, out);
                }
            }
            NodeKind::Text(text) => out.push_str(&escape_html_text(text)),
            NodeKind::Element(element) => {
                out.push('<');
                out.push_str(&element.tag_name);
                for (name, value) in &element.attrs {
                    out.push(' ');
                    out.push_str(name);
                    if !value.is_empty() {
                        out.push_str("=\"");
                        out.push_str(&escape_html_attr(value));
                        out.push('"');
                    }
                }
                out.push('>');
                if is_void_element(&element.tag_name) {
                    return;
                }
                for child in &node.children {
                    self.write_html(*child, out);
                }
                out.push_str("</");
                out.push_str(&element.tag_name);
                out.push('>');
            }
        }
    }
}

fn is_void_element(tag_name: &str) -> bool {
    matches!(
        tag_name,
        "input" | "br" | "hr" | "img" | "meta" | "link" | "wbr"
    )
}

fn escape_html_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

fn escape_html_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}
