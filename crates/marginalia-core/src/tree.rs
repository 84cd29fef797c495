//! Tree abstraction for annotated content.
//!
//! The `DomTree` trait exposes the read-only slice of DOM navigation that
//! anchoring needs, so the offset math can run against the browser DOM
//! (`marginalia-browser`) or against the arena-backed [`Document`] defined
//! here for native hosts and tests.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;

use smol_str::SmolStr;

use crate::error::TreeError;
use crate::walk::utf16_len;

/// Coarse node classification; everything that is neither an element nor a
/// text node (comments, processing instructions, documents) is `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
    Other,
}

/// Read access to a DOM-shaped tree.
///
/// Node handles are cheap to clone and compare by identity.
pub trait DomTree {
    type Node: Clone + PartialEq + fmt::Debug;

    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;

    fn first_child(&self, node: &Self::Node) -> Option<Self::Node>;

    fn next_sibling(&self, node: &Self::Node) -> Option<Self::Node>;

    fn kind(&self, node: &Self::Node) -> NodeKind;

    /// Character data of a text node. `None` for every other kind.
    fn text(&self, node: &Self::Node) -> Option<Cow<'_, str>>;

    /// Lowercase tag name of an element.
    fn tag_name(&self, node: &Self::Node) -> Option<Cow<'_, str>>;

    fn attribute(&self, node: &Self::Node, name: &str) -> Option<Cow<'_, str>>;

    /// Parent, if it is an element.
    fn parent_element(&self, node: &Self::Node) -> Option<Self::Node> {
        let parent = self.parent(node)?;
        (self.kind(&parent) == NodeKind::Element).then_some(parent)
    }

    /// Inclusive descendant check: a node contains itself.
    fn contains(&self, ancestor: &Self::Node, node: &Self::Node) -> bool {
        let mut current = Some(node.clone());
        while let Some(n) = current {
            if &n == ancestor {
                return true;
            }
            current = self.parent(&n);
        }
        false
    }

    /// Length of a text node in UTF-16 code units, the unit of every offset.
    fn text_len(&self, node: &Self::Node) -> usize {
        self.text(node).map(|t| utf16_len(&t)).unwrap_or(0)
    }

    /// Topmost ancestor of `node`.
    fn root_of(&self, node: &Self::Node) -> Self::Node {
        let mut current = node.clone();
        while let Some(parent) = self.parent(&current) {
            current = parent;
        }
        current
    }

    /// Position of `node` among its parent's children.
    fn child_index(&self, node: &Self::Node) -> Option<usize> {
        let parent = self.parent(node)?;
        let mut child = self.first_child(&parent);
        let mut index = 0;
        while let Some(c) = child {
            if &c == node {
                return Some(index);
            }
            index += 1;
            child = self.next_sibling(&c);
        }
        None
    }

    fn nth_child(&self, node: &Self::Node, n: usize) -> Option<Self::Node> {
        let mut child = self.first_child(node);
        for _ in 0..n {
            child = self.next_sibling(&child?);
        }
        child
    }
}

/// Compare two nodes in document (pre-)order.
///
/// Ancestors precede their descendants. Returns `None` when the nodes live in
/// disconnected trees.
pub fn document_order<T: DomTree>(tree: &T, a: &T::Node, b: &T::Node) -> Option<Ordering> {
    if a == b {
        return Some(Ordering::Equal);
    }

    let chain = |node: &T::Node| {
        let mut chain = vec![node.clone()];
        while let Some(parent) = tree.parent(chain.last()?) {
            chain.push(parent);
        }
        chain.reverse();
        Some(chain)
    };
    let chain_a = chain(a)?;
    let chain_b = chain(b)?;

    if chain_a.first() != chain_b.first() {
        return None;
    }

    let shared = chain_a
        .iter()
        .zip(chain_b.iter())
        .take_while(|(x, y)| x == y)
        .count();

    match (chain_a.get(shared), chain_b.get(shared)) {
        // `a` is an ancestor of `b`.
        (None, Some(_)) => Some(Ordering::Less),
        (Some(_), None) => Some(Ordering::Greater),
        (Some(branch_a), Some(branch_b)) => {
            let parent = &chain_a[shared - 1];
            let mut child = tree.first_child(parent);
            while let Some(c) = child {
                if &c == branch_a {
                    return Some(Ordering::Less);
                }
                if &c == branch_b {
                    return Some(Ordering::Greater);
                }
                child = tree.next_sibling(&c);
            }
            None
        }
        (None, None) => Some(Ordering::Equal),
    }
}

/// Handle into a [`Document`] arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
enum NodeData {
    Element {
        tag: SmolStr,
        attributes: Vec<(SmolStr, String)>,
    },
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct Slot {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Arena-backed, mutable DOM.
///
/// Removed nodes leave a tombstone so stale `NodeId`s resolve to nothing
/// rather than to a recycled node.
#[derive(Debug, Clone)]
pub struct Document {
    slots: Vec<Option<Slot>>,
    root: NodeId,
}

impl Document {
    /// Create a document whose root is an empty element.
    pub fn new(root_tag: &str) -> Self {
        let mut doc = Self {
            slots: Vec::new(),
            root: NodeId(0),
        };
        doc.root = doc.create_element(root_tag);
        doc
    }

    /// Build a document from a well-formed XHTML fragment.
    ///
    /// The fragment's root element becomes the document root. Whitespace-only
    /// text between tags is kept, as a browser would.
    pub fn parse(markup: &str) -> Result<Self, TreeError> {
        let parsed = roxmltree::Document::parse(markup)?;
        let source_root = parsed.root_element();

        let mut doc = Self::new(source_root.tag_name().name());
        let root = doc.root;
        for attr in source_root.attributes() {
            doc.set_attribute(root, attr.name(), attr.value())?;
        }
        doc.import_children(root, source_root)?;
        Ok(doc)
    }

    fn import_children(
        &mut self,
        parent: NodeId,
        source: roxmltree::Node<'_, '_>,
    ) -> Result<(), TreeError> {
        for child in source.children() {
            if child.is_element() {
                let element = self.append_element(parent, child.tag_name().name())?;
                for attr in child.attributes() {
                    self.set_attribute(element, attr.name(), attr.value())?;
                }
                self.import_children(element, child)?;
            } else if child.is_text() {
                self.append_text(parent, child.text().unwrap_or_default())?;
            } else if child.is_comment() {
                let comment = self.create_comment(child.text().unwrap_or_default());
                self.append_child(parent, comment)?;
            }
        }
        Ok(())
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn slot(&self, id: NodeId) -> Result<&Slot, TreeError> {
        self.slots
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(TreeError::UnknownNode(id))
    }

    fn slot_mut(&mut self, id: NodeId) -> Result<&mut Slot, TreeError> {
        self.slots
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(TreeError::UnknownNode(id))
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.slots.len() as u32);
        self.slots.push(Some(Slot {
            data,
            parent: None,
            children: Vec::new(),
        }));
        id
    }

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeData::Element {
            tag: SmolStr::new(tag.to_ascii_lowercase()),
            attributes: Vec::new(),
        })
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeData::Text(text.to_string()))
    }

    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.push(NodeData::Comment(text.to_string()))
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` into `parent` before `reference`, or at the end.
    ///
    /// A child that is already attached is moved.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), TreeError> {
        if !matches!(self.slot(parent)?.data, NodeData::Element { .. }) {
            return Err(TreeError::NotAParent(parent));
        }
        self.slot(child)?;
        if child == self.root {
            return Err(TreeError::Hierarchy("the root cannot be moved"));
        }
        if self.contains(&child, &parent) {
            return Err(TreeError::Hierarchy("a node cannot become its own descendant"));
        }
        if let Some(reference) = reference {
            if self.slot(reference)?.parent != Some(parent) {
                return Err(TreeError::Hierarchy("reference is not a child of parent"));
            }
        }

        self.detach(child)?;

        let siblings = &mut self.slot_mut(parent)?.children;
        let position = reference
            .and_then(|r| siblings.iter().position(|c| *c == r))
            .unwrap_or(siblings.len());
        siblings.insert(position, child);
        self.slot_mut(child)?.parent = Some(parent);
        Ok(())
    }

    /// Create an element and append it to `parent`.
    pub fn append_element(&mut self, parent: NodeId, tag: &str) -> Result<NodeId, TreeError> {
        let element = self.create_element(tag);
        self.append_child(parent, element)?;
        Ok(element)
    }

    /// Create a text node and append it to `parent`.
    pub fn append_text(&mut self, parent: NodeId, text: &str) -> Result<NodeId, TreeError> {
        let node = self.create_text(text);
        self.append_child(parent, node)?;
        Ok(node)
    }

    /// Unlink a node from its parent, keeping it alive.
    pub fn detach(&mut self, node: NodeId) -> Result<(), TreeError> {
        if let Some(parent) = self.slot(node)?.parent {
            self.slot_mut(parent)?.children.retain(|c| *c != node);
            self.slot_mut(node)?.parent = None;
        }
        Ok(())
    }

    /// Remove a node and its whole subtree.
    pub fn remove(&mut self, node: NodeId) -> Result<(), TreeError> {
        if node == self.root {
            return Err(TreeError::Hierarchy("the root cannot be removed"));
        }
        self.detach(node)?;

        let mut pending = vec![node];
        while let Some(id) = pending.pop() {
            if let Some(slot) = self.slots.get_mut(id.index()).and_then(Option::take) {
                pending.extend(slot.children);
            }
        }
        Ok(())
    }

    /// Replace the data of a text or comment node.
    pub fn set_text(&mut self, node: NodeId, text: &str) -> Result<(), TreeError> {
        match &mut self.slot_mut(node)?.data {
            NodeData::Text(data) | NodeData::Comment(data) => {
                *data = text.to_string();
                Ok(())
            }
            NodeData::Element { .. } => Err(TreeError::Hierarchy("elements have no character data")),
        }
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), TreeError> {
        match &mut self.slot_mut(node)?.data {
            NodeData::Element { attributes, .. } => {
                match attributes.iter_mut().find(|(n, _)| n == name) {
                    Some((_, v)) => *v = value.to_string(),
                    None => attributes.push((SmolStr::new(name), value.to_string())),
                }
                Ok(())
            }
            _ => Err(TreeError::NotAParent(node)),
        }
    }

    pub fn add_class(&mut self, node: NodeId, class: &str) -> Result<(), TreeError> {
        let existing = self.attribute(&node, "class").map(Cow::into_owned);
        let value = match existing {
            Some(classes) if classes.split_whitespace().any(|c| c == class) => return Ok(()),
            Some(classes) if !classes.trim().is_empty() => format!("{} {}", classes.trim(), class),
            _ => class.to_string(),
        };
        self.set_attribute(node, "class", &value)
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.slot(node).map(|s| s.children.as_slice()).unwrap_or(&[])
    }

    /// First element in document order with a matching `id` attribute.
    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        let mut pending = vec![self.root];
        while let Some(node) = pending.pop() {
            if self.attribute(&node, "id").as_deref() == Some(id) {
                return Some(node);
            }
            pending.extend(self.children(node).iter().rev());
        }
        None
    }

    /// Concatenated text of every descendant text node, excluded or not.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        let mut pending = vec![node];
        while let Some(id) = pending.pop() {
            if let Ok(slot) = self.slot(id) {
                if let NodeData::Text(text) = &slot.data {
                    out.push_str(text);
                }
                pending.extend(slot.children.iter().rev());
            }
        }
        out
    }
}

impl DomTree for Document {
    type Node = NodeId;

    fn parent(&self, node: &NodeId) -> Option<NodeId> {
        self.slot(*node).ok()?.parent
    }

    fn first_child(&self, node: &NodeId) -> Option<NodeId> {
        self.slot(*node).ok()?.children.first().copied()
    }

    fn next_sibling(&self, node: &NodeId) -> Option<NodeId> {
        let parent = self.slot(*node).ok()?.parent?;
        let siblings = &self.slot(parent).ok()?.children;
        let position = siblings.iter().position(|c| c == node)?;
        siblings.get(position + 1).copied()
    }

    fn kind(&self, node: &NodeId) -> NodeKind {
        match self.slot(*node).map(|s| &s.data) {
            Ok(NodeData::Element { .. }) => NodeKind::Element,
            Ok(NodeData::Text(_)) => NodeKind::Text,
            _ => NodeKind::Other,
        }
    }

    fn text(&self, node: &NodeId) -> Option<Cow<'_, str>> {
        match &self.slot(*node).ok()?.data {
            NodeData::Text(text) => Some(Cow::Borrowed(text.as_str())),
            _ => None,
        }
    }

    fn tag_name(&self, node: &NodeId) -> Option<Cow<'_, str>> {
        match &self.slot(*node).ok()?.data {
            NodeData::Element { tag, .. } => Some(Cow::Borrowed(tag.as_str())),
            _ => None,
        }
    }

    fn attribute(&self, node: &NodeId, name: &str) -> Option<Cow<'_, str>> {
        match &self.slot(*node).ok()?.data {
            NodeData::Element { attributes, .. } => attributes
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| Cow::Borrowed(v.as_str())),
            _ => None,
        }
    }
}
