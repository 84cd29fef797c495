//! Filtered document-order traversal over annotatable text.
//!
//! Offsets are defined over the concatenation of the text nodes this iterator
//! yields, so the anchor, the creation-side offset computation and the
//! geometry extractor all walk through it.

use crate::classify::ExclusionRules;
use crate::tree::{DomTree, NodeKind};

/// Length of a string in UTF-16 code units.
pub fn utf16_len(text: &str) -> usize {
    text.chars().map(char::len_utf16).sum()
}

/// Byte index of a UTF-16 offset, if it falls on a char boundary.
pub fn utf16_to_byte(text: &str, utf16_offset: usize) -> Option<usize> {
    let mut units = 0;
    for (byte, c) in text.char_indices() {
        if units == utf16_offset {
            return Some(byte);
        }
        if units > utf16_offset {
            return None;
        }
        units += c.len_utf16();
    }
    (units == utf16_offset).then_some(text.len())
}

/// Slice a string by UTF-16 offsets.
///
/// Returns `None` when either offset is out of bounds or splits a surrogate pair.
pub fn utf16_slice(text: &str, start: usize, end: usize) -> Option<&str> {
    if start > end {
        return None;
    }
    let start = utf16_to_byte(text, start)?;
    let end = utf16_to_byte(text, end)?;
    text.get(start..end)
}

/// Lazy iterator over the annotatable text nodes under a root, in document order.
///
/// Elements matched by the exclusion rules are skipped together with their
/// whole subtree. If the root itself sits inside an excluded subtree nothing
/// is yielded. Cloning the iterator snapshots its position; [`restart`]
/// rewinds to the root.
///
/// [`restart`]: AnnotableTextNodes::restart
pub struct AnnotableTextNodes<'a, T: DomTree> {
    tree: &'a T,
    rules: &'a ExclusionRules,
    root: T::Node,
    next: Option<T::Node>,
}

impl<'a, T: DomTree> Clone for AnnotableTextNodes<'a, T> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree,
            rules: self.rules,
            root: self.root.clone(),
            next: self.next.clone(),
        }
    }
}

impl<'a, T: DomTree> AnnotableTextNodes<'a, T> {
    pub fn new(tree: &'a T, rules: &'a ExclusionRules, root: T::Node) -> Self {
        let next = (!rules.is_excluded(tree, &root)).then(|| root.clone());
        Self {
            tree,
            rules,
            root,
            next,
        }
    }

    /// Resume a walk of `root` at `node` (inclusive).
    ///
    /// A `node` inside an excluded subtree resumes after that subtree.
    pub fn starting_at(tree: &'a T, rules: &'a ExclusionRules, root: T::Node, node: T::Node) -> Self {
        let mut walk = Self {
            tree,
            rules,
            root,
            next: None,
        };
        if !tree.contains(&walk.root, &node) || rules.is_excluded(tree, &walk.root) {
            return walk;
        }
        walk.next = match walk.outermost_excluded(&node) {
            Some(excluded) => walk.step(&excluded, false),
            None => Some(node),
        };
        walk
    }

    /// Rewind to the start of the root.
    pub fn restart(&mut self) {
        self.next = (!self.rules.is_excluded(self.tree, &self.root)).then(|| self.root.clone());
    }

    pub fn root(&self) -> &T::Node {
        &self.root
    }

    /// Outermost excluded element between `node` and the root.
    fn outermost_excluded(&self, node: &T::Node) -> Option<T::Node> {
        let mut found = None;
        let mut current = Some(node.clone());
        while let Some(n) = current {
            if self.tree.kind(&n) == NodeKind::Element && self.rules.matches(self.tree, &n) {
                found = Some(n.clone());
            }
            if n == self.root {
                break;
            }
            current = self.tree.parent(&n);
        }
        found
    }

    /// Next node in pre-order after `node`, optionally skipping its children.
    fn step(&self, node: &T::Node, descend: bool) -> Option<T::Node> {
        if descend {
            if let Some(child) = self.tree.first_child(node) {
                return Some(child);
            }
        }
        let mut current = node.clone();
        loop {
            if current == self.root {
                return None;
            }
            if let Some(sibling) = self.tree.next_sibling(&current) {
                return Some(sibling);
            }
            current = self.tree.parent(&current)?;
        }
    }
}

impl<'a, T: DomTree> Iterator for AnnotableTextNodes<'a, T> {
    type Item = T::Node;

    fn next(&mut self) -> Option<T::Node> {
        while let Some(node) = self.next.take() {
            match self.tree.kind(&node) {
                NodeKind::Text => {
                    self.next = self.step(&node, false);
                    return Some(node);
                }
                NodeKind::Element => {
                    let excluded = self.rules.matches(self.tree, &node);
                    if excluded {
                        tracing::trace!(
                            target: "marginalia::walk",
                            node = ?node,
                            "skipping non-annotatable subtree"
                        );
                    }
                    self.next = self.step(&node, !excluded);
                }
                NodeKind::Other => {
                    self.next = self.step(&node, true);
                }
            }
        }
        None
    }
}
