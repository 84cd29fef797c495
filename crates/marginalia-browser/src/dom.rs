//! `DomTree` over the live browser DOM.

use std::borrow::Cow;

use marginalia_core::{DomTree, NodeKind};
use wasm_bindgen::JsCast;

/// The document as a [`DomTree`]. Node handles are `web_sys::Node`s, which
/// compare by JS identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebDom;

impl DomTree for WebDom {
    type Node = web_sys::Node;

    fn parent(&self, node: &web_sys::Node) -> Option<web_sys::Node> {
        node.parent_node()
    }

    fn first_child(&self, node: &web_sys::Node) -> Option<web_sys::Node> {
        node.first_child()
    }

    fn next_sibling(&self, node: &web_sys::Node) -> Option<web_sys::Node> {
        node.next_sibling()
    }

    fn kind(&self, node: &web_sys::Node) -> NodeKind {
        match node.node_type() {
            web_sys::Node::ELEMENT_NODE => NodeKind::Element,
            web_sys::Node::TEXT_NODE | web_sys::Node::CDATA_SECTION_NODE => NodeKind::Text,
            _ => NodeKind::Other,
        }
    }

    fn text(&self, node: &web_sys::Node) -> Option<Cow<'_, str>> {
        match self.kind(node) {
            NodeKind::Text => node.node_value().map(Cow::Owned),
            _ => None,
        }
    }

    fn tag_name(&self, node: &web_sys::Node) -> Option<Cow<'_, str>> {
        // localName is already lowercase for HTML elements.
        node.dyn_ref::<web_sys::Element>()
            .map(|element| Cow::Owned(element.local_name()))
    }

    fn attribute(&self, node: &web_sys::Node, name: &str) -> Option<Cow<'_, str>> {
        node.dyn_ref::<web_sys::Element>()?
            .get_attribute(name)
            .map(Cow::Owned)
    }

    fn contains(&self, ancestor: &web_sys::Node, node: &web_sys::Node) -> bool {
        ancestor.contains(Some(node))
    }
}
