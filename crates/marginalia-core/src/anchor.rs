//! Offset-to-range anchoring.
//!
//! A stored selector only records `start..end` over the annotatable text of a
//! scope element. [`anchor`] walks that text again and places both range
//! boundaries inside the right text nodes; [`offsets_for_range`] is the
//! inverse used when a selection is first turned into a selector.
//!
//! # Seam rules
//!
//! When an offset falls exactly between two text nodes the two boundaries
//! resolve differently:
//!
//! - the start goes to the *following* node at local offset 0
//!   (`running + len > start`);
//! - the end stays in the *preceding* node at its full length
//!   (`running + len >= end`).
//!
//! Both placements select the same text; the asymmetry is kept so ranges
//! never start at the very end of a node or end at the very start of one.

use std::cmp::Ordering;

use crate::classify::ExclusionRules;
use crate::error::{AnchorError, Boundary};
use crate::tree::{DomTree, NodeKind, document_order};
use crate::walk::{AnnotableTextNodes, utf16_slice};

/// A position in the tree: a text node and a UTF-16 offset into it, or an
/// element and a child index.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct BoundaryPoint<N> {
    pub node: N,
    pub offset: usize,
}

impl<N> BoundaryPoint<N> {
    pub fn new(node: N, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// A live range over the tree. Derived from a selector and disposable.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TextRange<N> {
    pub start: BoundaryPoint<N>,
    pub end: BoundaryPoint<N>,
}

impl<N: Clone + PartialEq> TextRange<N> {
    pub fn new(start: BoundaryPoint<N>, end: BoundaryPoint<N>) -> Self {
        Self { start, end }
    }

    /// An empty range at `point`.
    pub fn collapsed_at(point: BoundaryPoint<N>) -> Self {
        Self {
            end: point.clone(),
            start: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    /// Move the start and collapse the end onto it.
    fn start_at(&mut self, point: BoundaryPoint<N>) {
        self.end = point.clone();
        self.start = point;
    }

    fn end_at(&mut self, point: BoundaryPoint<N>) {
        self.end = point;
    }
}

/// How far anchoring got.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum AnchorStatus {
    /// Both boundaries placed.
    Complete,
    /// The scope has no annotatable text; range collapsed at the scope start.
    ContentMissing,
    /// Text ran out before `start`; range collapsed at the scope start.
    MissingStart,
    /// Text ran out before `end`; range collapsed at the start boundary.
    MissingEnd,
    /// `end < start`; range collapsed at the scope start.
    InvalidSpan,
}

/// The result of [`anchor`]: always a usable range, plus how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchoredRange<N> {
    pub range: TextRange<N>,
    pub status: AnchorStatus,
}

impl<N: Clone + PartialEq> AnchoredRange<N> {
    pub fn is_complete(&self) -> bool {
        self.status == AnchorStatus::Complete
    }

    pub fn into_range(self) -> TextRange<N> {
        self.range
    }

    /// The range if anchoring completed, otherwise the matching error.
    pub fn into_result(self, start: usize, end: usize) -> Result<TextRange<N>, AnchorError> {
        match self.status {
            AnchorStatus::Complete => Ok(self.range),
            AnchorStatus::ContentMissing => Err(AnchorError::ContentMissing),
            AnchorStatus::MissingStart => Err(AnchorError::IncompleteRange {
                start,
                end,
                missing: Boundary::Start,
            }),
            AnchorStatus::MissingEnd => Err(AnchorError::IncompleteRange {
                start,
                end,
                missing: Boundary::End,
            }),
            AnchorStatus::InvalidSpan => Err(AnchorError::InvalidSpan { start, end }),
        }
    }
}

/// Place `start..end` (UTF-16 offsets over the annotatable text of `scope`)
/// into the tree.
///
/// Never fails: when the text cannot hold the span the returned range is
/// collapsed and `status` says why. An empty scope is logged at error level.
pub fn anchor<T: DomTree>(
    tree: &T,
    rules: &ExclusionRules,
    start: usize,
    end: usize,
    scope: &T::Node,
) -> AnchoredRange<T::Node> {
    let mut range = TextRange::collapsed_at(BoundaryPoint::new(scope.clone(), 0));

    if end < start {
        tracing::warn!(target: "marginalia::anchor", start, end, "end precedes start");
        return AnchoredRange {
            range,
            status: AnchorStatus::InvalidSpan,
        };
    }

    let mut nodes = AnnotableTextNodes::new(tree, rules, scope.clone()).peekable();
    if nodes.peek().is_none() {
        tracing::error!(
            target: "marginalia::anchor",
            start,
            end,
            scope = ?scope,
            "could not revive annotation target, content missing"
        );
        return AnchoredRange {
            range,
            status: AnchorStatus::ContentMissing,
        };
    }

    // Length of the annotatable text preceding the current node.
    let mut running_offset = 0;

    let mut start_node = None;
    for node in nodes.by_ref() {
        let len = tree.text_len(&node);
        if running_offset + len > start {
            tracing::trace!(
                target: "marginalia::anchor",
                node = ?node,
                local_offset = start - running_offset,
                "placed range start"
            );
            range.start_at(BoundaryPoint::new(node.clone(), start - running_offset));
            start_node = Some(node);
            break;
        }
        running_offset += len;
    }

    let Some(start_node) = start_node else {
        tracing::warn!(
            target: "marginalia::anchor",
            start,
            end,
            text_len = running_offset,
            "annotatable text ends before range start"
        );
        return AnchoredRange {
            range,
            status: AnchorStatus::MissingStart,
        };
    };

    // The end search resumes at the start node without resetting the count.
    let mut candidate = Some(start_node);
    while let Some(node) = candidate {
        let len = tree.text_len(&node);
        if running_offset + len >= end {
            tracing::trace!(
                target: "marginalia::anchor",
                node = ?node,
                local_offset = end - running_offset,
                "placed range end"
            );
            range.end_at(BoundaryPoint::new(node, end - running_offset));
            return AnchoredRange {
                range,
                status: AnchorStatus::Complete,
            };
        }
        running_offset += len;
        candidate = nodes.next();
    }

    tracing::warn!(
        target: "marginalia::anchor",
        start,
        end,
        text_len = running_offset,
        "annotatable text ends before range end"
    );
    AnchoredRange {
        range,
        status: AnchorStatus::MissingEnd,
    }
}

/// The annotatable text of `scope`, i.e. the string offsets index into.
pub fn annotable_text<T: DomTree>(tree: &T, rules: &ExclusionRules, scope: &T::Node) -> String {
    AnnotableTextNodes::new(tree, rules, scope.clone())
        .filter_map(|node| tree.text(&node).map(|t| t.into_owned()))
        .collect()
}

/// Whether the text node `node` lies wholly before the boundary `point`.
fn precedes_point<T: DomTree>(tree: &T, node: &T::Node, point: &BoundaryPoint<T::Node>) -> bool {
    if tree.contains(&point.node, node) {
        let mut child = node.clone();
        loop {
            match tree.parent(&child) {
                Some(parent) if parent == point.node => break,
                Some(parent) => child = parent,
                None => return false,
            }
        }
        tree.child_index(&child).is_some_and(|index| index < point.offset)
    } else {
        document_order(tree, node, &point.node) == Some(Ordering::Less)
    }
}

/// Where the text node `node` sits relative to `point`: wholly before it
/// (`Less`), containing it (`Equal`) or wholly after it (`Greater`).
///
/// `None` when the two are in disconnected trees.
pub(crate) fn compare_text_node<T: DomTree>(
    tree: &T,
    node: &T::Node,
    point: &BoundaryPoint<T::Node>,
) -> Option<Ordering> {
    if tree.kind(&point.node) == NodeKind::Text {
        return document_order(tree, node, &point.node);
    }
    if precedes_point(tree, node, point) {
        return Some(Ordering::Less);
    }
    if tree.contains(&point.node, node) {
        return Some(Ordering::Greater);
    }
    match document_order(tree, node, &point.node)? {
        Ordering::Less => Some(Ordering::Less),
        _ => Some(Ordering::Greater),
    }
}

fn offset_of_point<T: DomTree>(
    tree: &T,
    rules: &ExclusionRules,
    point: &BoundaryPoint<T::Node>,
    scope: &T::Node,
) -> Option<usize> {
    if !tree.contains(scope, &point.node) || rules.is_excluded(tree, &point.node) {
        return None;
    }

    let mut running_offset = 0;
    for node in AnnotableTextNodes::new(tree, rules, scope.clone()) {
        let len = tree.text_len(&node);
        if tree.kind(&point.node) == NodeKind::Text {
            if node == point.node {
                return (point.offset <= len).then_some(running_offset + point.offset);
            }
        } else if !precedes_point(tree, &node, point) {
            return Some(running_offset);
        }
        running_offset += len;
    }

    // Element boundaries after the last text node sit at the end of the text.
    (tree.kind(&point.node) != NodeKind::Text).then_some(running_offset)
}

/// Offsets of `range` over the annotatable text of `scope`.
///
/// Uses the same walk and exclusion rules as [`anchor`], so the result
/// revives to the same text. Returns `None` when a boundary lies outside the
/// scope, inside excluded content, or past the end of its node.
pub fn offsets_for_range<T: DomTree>(
    tree: &T,
    rules: &ExclusionRules,
    range: &TextRange<T::Node>,
    scope: &T::Node,
) -> Option<(usize, usize)> {
    let start = offset_of_point(tree, rules, &range.start, scope)?;
    let end = offset_of_point(tree, rules, &range.end, scope)?;
    (start <= end).then_some((start, end))
}

/// The annotatable text covered by `range`.
pub fn range_text<T: DomTree>(
    tree: &T,
    rules: &ExclusionRules,
    range: &TextRange<T::Node>,
    scope: &T::Node,
) -> Option<String> {
    let (start, end) = offsets_for_range(tree, rules, range, scope)?;
    let text = annotable_text(tree, rules, scope);
    utf16_slice(&text, start, end).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_capture::LogCapture;
    use crate::tree::{Document, NodeId};
    use crate::walk::utf16_len;

    /// `<div>` holding one text node per entry.
    fn flat(parts: &[&str]) -> (Document, Vec<NodeId>) {
        let mut doc = Document::new("div");
        let root = doc.root();
        let nodes = parts
            .iter()
            .map(|p| doc.append_text(root, p).unwrap())
            .collect();
        (doc, nodes)
    }

    fn nested() -> Document {
        Document::parse(
            r#"<div><h1>Title</h1><p>Some <em>emphasised</em> text<span class="not-annotatable">[edit]</span> here.</p><p>Second <b>para</b>graph</p></div>"#,
        )
        .unwrap()
    }

    #[test]
    fn test_span_across_nodes() {
        let (doc, nodes) = flat(&["abc", "defg"]);
        let rules = ExclusionRules::default();
        let anchored = anchor(&doc, &rules, 2, 5, &doc.root());

        assert!(anchored.is_complete());
        assert_eq!(anchored.range.start, BoundaryPoint::new(nodes[0], 2));
        assert_eq!(anchored.range.end, BoundaryPoint::new(nodes[1], 2));
        assert_eq!(
            range_text(&doc, &rules, &anchored.range, &doc.root()).as_deref(),
            Some("cde")
        );
    }

    #[test]
    fn test_start_on_seam_moves_to_next_node() {
        let (doc, nodes) = flat(&["abc", "defg"]);
        let rules = ExclusionRules::default();
        let anchored = anchor(&doc, &rules, 3, 5, &doc.root());
        assert_eq!(anchored.range.start, BoundaryPoint::new(nodes[1], 0));
    }

    #[test]
    fn test_end_on_seam_stays_in_previous_node() {
        // The end rule is inclusive while the start rule is exclusive; both
        // are deliberate and must not be unified.
        let (doc, nodes) = flat(&["abc", "defg"]);
        let rules = ExclusionRules::default();
        let anchored = anchor(&doc, &rules, 0, 3, &doc.root());
        assert_eq!(anchored.range.start, BoundaryPoint::new(nodes[0], 0));
        assert_eq!(anchored.range.end, BoundaryPoint::new(nodes[0], 3));
    }

    #[test]
    fn test_every_span_matches_substring() {
        let doc = nested();
        let rules = ExclusionRules::default();
        let root = doc.root();
        let text = annotable_text(&doc, &rules, &root);
        assert_eq!(text, "TitleSome emphasised text here.Second paragraph");

        let total = utf16_len(&text);
        for start in 0..total {
            for end in start + 1..=total {
                let anchored = anchor(&doc, &rules, start, end, &root);
                assert!(anchored.is_complete(), "{start}..{end}");
                assert!(!anchored.range.is_collapsed(), "{start}..{end}");
                assert_eq!(
                    range_text(&doc, &rules, &anchored.range, &root).as_deref(),
                    utf16_slice(&text, start, end),
                    "{start}..{end}"
                );
            }
        }
    }

    #[test]
    fn test_creation_offsets_round_trip() {
        let doc = nested();
        let rules = ExclusionRules::default();
        let root = doc.root();
        let total = utf16_len(&annotable_text(&doc, &rules, &root));

        for start in 0..total {
            for end in start + 1..=total {
                let range = anchor(&doc, &rules, start, end, &root).into_range();
                assert_eq!(
                    offsets_for_range(&doc, &rules, &range, &root),
                    Some((start, end))
                );
            }
        }
    }

    #[test]
    fn test_excluded_child_counts_as_absent() {
        let with_chrome =
            Document::parse(r#"<p>ab<span class="not-annotatable">12345</span>cdef</p>"#).unwrap();
        let mut without = with_chrome.clone();
        let chrome = without.nth_child(&without.root(), 1).unwrap();
        without.remove(chrome).unwrap();

        let rules = ExclusionRules::default();
        for start in 0..6 {
            for end in start + 1..=6 {
                let a = anchor(&with_chrome, &rules, start, end, &with_chrome.root());
                let b = anchor(&without, &rules, start, end, &without.root());
                assert_eq!(a, b, "{start}..{end}");
            }
        }
    }

    #[test]
    fn test_excluded_ancestor_above_scope() {
        let doc = Document::parse(
            r#"<div><section class="not-annotatable"><p>hidden</p></section></div>"#,
        )
        .unwrap();
        let rules = ExclusionRules::default();
        let section = doc.first_child(&doc.root()).unwrap();
        let p = doc.first_child(&section).unwrap();

        let capture = LogCapture::default();
        let anchored = capture.run(|| anchor(&doc, &rules, 0, 3, &p));
        assert_eq!(anchored.status, AnchorStatus::ContentMissing);
    }

    #[test]
    fn test_revival_is_idempotent() {
        let doc = nested();
        let rules = ExclusionRules::default();
        let first = anchor(&doc, &rules, 7, 22, &doc.root());
        let second = anchor(&doc, &rules, 7, 22, &doc.root());
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_scope_is_logged_and_collapsed() {
        let doc = Document::parse("<div><p></p><img/></div>").unwrap();
        let rules = ExclusionRules::default();
        let capture = LogCapture::default();

        let anchored = capture.run(|| anchor(&doc, &rules, 0, 4, &doc.root()));

        assert_eq!(anchored.status, AnchorStatus::ContentMissing);
        assert!(anchored.range.is_collapsed());
        assert_eq!(anchored.range.start, BoundaryPoint::new(doc.root(), 0));
        assert!(capture.contains(tracing::Level::ERROR, "content missing"));
        assert_eq!(
            anchored.into_result(0, 4),
            Err(AnchorError::ContentMissing)
        );
    }

    #[test]
    fn test_start_past_text_is_degraded() {
        let (doc, _) = flat(&["abc", "defg"]);
        let rules = ExclusionRules::default();
        let capture = LogCapture::default();
        let anchored = capture.run(|| anchor(&doc, &rules, 7, 9, &doc.root()));

        assert_eq!(anchored.status, AnchorStatus::MissingStart);
        assert!(anchored.range.is_collapsed());
        assert!(capture.contains(tracing::Level::WARN, "before range start"));
    }

    #[test]
    fn test_end_past_text_collapses_on_start() {
        let (doc, nodes) = flat(&["abc", "defg"]);
        let rules = ExclusionRules::default();
        let anchored = anchor(&doc, &rules, 1, 12, &doc.root());

        assert_eq!(anchored.status, AnchorStatus::MissingEnd);
        assert!(anchored.range.is_collapsed());
        assert_eq!(anchored.range.start, BoundaryPoint::new(nodes[0], 1));
        assert!(matches!(
            anchored.into_result(1, 12),
            Err(AnchorError::IncompleteRange {
                missing: Boundary::End,
                ..
            })
        ));
    }

    #[test]
    fn test_inverted_span() {
        let (doc, _) = flat(&["abc"]);
        let rules = ExclusionRules::default();
        let anchored = anchor(&doc, &rules, 2, 1, &doc.root());
        assert_eq!(anchored.status, AnchorStatus::InvalidSpan);
        assert!(anchored.range.is_collapsed());
    }

    #[test]
    fn test_zero_length_span_is_collapsed_but_complete() {
        let (doc, nodes) = flat(&["abc"]);
        let rules = ExclusionRules::default();
        let anchored = anchor(&doc, &rules, 1, 1, &doc.root());
        assert!(anchored.is_complete());
        assert_eq!(anchored.range, TextRange::collapsed_at(BoundaryPoint::new(nodes[0], 1)));
    }

    #[test]
    fn test_surrogate_pairs_count_as_two() {
        let (doc, nodes) = flat(&["a😀", "bc"]);
        let rules = ExclusionRules::default();
        let anchored = anchor(&doc, &rules, 3, 4, &doc.root());
        assert_eq!(anchored.range.start, BoundaryPoint::new(nodes[1], 0));
        assert_eq!(
            range_text(&doc, &rules, &anchored.range, &doc.root()).as_deref(),
            Some("b")
        );
    }

    #[test]
    fn test_element_boundaries_resolve_to_text_offsets() {
        let doc = Document::parse("<div><p>ab</p><p>cd</p><p>ef</p></div>").unwrap();
        let rules = ExclusionRules::default();
        let root = doc.root();

        // From before the second paragraph to the end of the container.
        let range = TextRange::new(BoundaryPoint::new(root, 1), BoundaryPoint::new(root, 3));
        assert_eq!(offsets_for_range(&doc, &rules, &range, &root), Some((2, 6)));

        let second = doc.nth_child(&root, 1).unwrap();
        let inside = TextRange::new(BoundaryPoint::new(second, 0), BoundaryPoint::new(second, 1));
        assert_eq!(range_text(&doc, &rules, &inside, &root).as_deref(), Some("cd"));
    }

    #[test]
    fn test_offsets_reject_excluded_or_foreign_points() {
        let doc = Document::parse(
            r#"<div><p>ab<span class="not-annotatable">xy</span></p><p>cd</p></div>"#,
        )
        .unwrap();
        let rules = ExclusionRules::default();
        let root = doc.root();
        let first = doc.first_child(&root).unwrap();
        let span = doc.nth_child(&first, 1).unwrap();
        let hidden = doc.first_child(&span).unwrap();
        let ab = doc.first_child(&first).unwrap();

        let excluded = TextRange::new(BoundaryPoint::new(ab, 0), BoundaryPoint::new(hidden, 1));
        assert_eq!(offsets_for_range(&doc, &rules, &excluded, &root), None);

        // A scope that does not contain the range.
        let second = doc.nth_child(&root, 1).unwrap();
        let outside = TextRange::new(BoundaryPoint::new(ab, 0), BoundaryPoint::new(ab, 1));
        assert_eq!(offsets_for_range(&doc, &rules, &outside, &second), None);

        // Past the end of the node.
        let overflow = TextRange::new(BoundaryPoint::new(ab, 0), BoundaryPoint::new(ab, 3));
        assert_eq!(offsets_for_range(&doc, &rules, &overflow, &root), None);
    }

    #[test]
    fn test_anchor_within_offset_reference() {
        let doc = nested();
        let rules = ExclusionRules::default();
        let second = doc.nth_child(&doc.root(), 2).unwrap();
        let anchored = anchor(&doc, &rules, 7, 11, &second);

        #[derive(serde::Serialize)]
        struct Placement {
            start_text: String,
            start_offset: usize,
            end_text: String,
            end_offset: usize,
            status: AnchorStatus,
        }

        let placement = Placement {
            start_text: doc.text(&anchored.range.start.node).unwrap().into_owned(),
            start_offset: anchored.range.start.offset,
            end_text: doc.text(&anchored.range.end.node).unwrap().into_owned(),
            end_offset: anchored.range.end.offset,
            status: anchored.status,
        };

        insta::assert_yaml_snapshot!(placement, @r"
        start_text: para
        start_offset: 0
        end_text: para
        end_offset: 4
        status: Complete
        ");
    }
}
