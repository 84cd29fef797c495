//! Stored selectors and their revival into live ranges.

use smol_str::SmolStr;

use crate::anchor::{TextRange, anchor};
use crate::classify::ExclusionRules;
use crate::error::AnchorError;
use crate::tree::DomTree;

/// A span of annotatable text, as stored.
///
/// `start..end` index the annotatable text of `offset_reference`, or of the
/// container the annotator runs on when no reference is set. `range` is a
/// cache filled by revival and never persisted.
///
/// Hosts that cannot hold on to nodes store a `reference_key` instead (a CSS
/// selector in the browser); the renderer resolves it to `offset_reference`
/// on every revival.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSelector<N> {
    pub start: usize,
    pub end: usize,
    pub offset_reference: Option<N>,
    pub reference_key: Option<SmolStr>,
    pub range: Option<TextRange<N>>,
}

impl<N: Clone + PartialEq> TextSelector<N> {
    /// A selector over the container. Rejects empty and inverted spans.
    pub fn new(start: usize, end: usize) -> Result<Self, AnchorError> {
        if end <= start {
            return Err(AnchorError::InvalidSpan { start, end });
        }
        Ok(Self {
            start,
            end,
            offset_reference: None,
            reference_key: None,
            range: None,
        })
    }

    pub fn with_offset_reference(mut self, reference: N) -> Self {
        self.offset_reference = Some(reference);
        self
    }

    pub fn with_reference_key(mut self, key: impl Into<SmolStr>) -> Self {
        self.reference_key = Some(key.into());
        self
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether revival left a range that actually covers text.
    ///
    /// A collapsed range on a non-empty selector means anchoring failed.
    pub fn is_anchored(&self) -> bool {
        self.range
            .as_ref()
            .is_some_and(|range| self.is_empty() || !range.is_collapsed())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AnnotationBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<SmolStr>,
    pub value: String,
}

/// An annotation over one or more text spans.
#[derive(Debug, Clone, PartialEq)]
pub struct TextAnnotation<N> {
    pub id: SmolStr,
    pub targets: Vec<TextSelector<N>>,
    pub bodies: Vec<AnnotationBody>,
}

impl<N: Clone + PartialEq> TextAnnotation<N> {
    pub fn new(id: impl Into<SmolStr>, target: TextSelector<N>) -> Self {
        Self {
            id: id.into(),
            targets: vec![target],
            bodies: Vec::new(),
        }
    }

    pub fn with_body(mut self, body: AnnotationBody) -> Self {
        self.bodies.push(body);
        self
    }

    /// Live ranges of every revived target, in target order.
    pub fn ranges(&self) -> impl Iterator<Item = &TextRange<N>> {
        self.targets.iter().filter_map(|t| t.range.as_ref())
    }

    pub fn is_anchored(&self) -> bool {
        !self.targets.is_empty() && self.targets.iter().all(TextSelector::is_anchored)
    }
}

/// Revive a selector against the current tree.
///
/// Returns a copy with `range` filled in from the selector's offset reference,
/// falling back to `container`. Without either the copy is returned as-is.
/// Degraded anchors still produce a (collapsed) range; see [`try_revive`] for
/// a version that reports them as errors.
pub fn revive_selector<T: DomTree>(
    tree: &T,
    rules: &ExclusionRules,
    selector: &TextSelector<T::Node>,
    container: Option<&T::Node>,
) -> TextSelector<T::Node> {
    let Some(scope) = selector.offset_reference.as_ref().or(container) else {
        return selector.clone();
    };
    let anchored = anchor(tree, rules, selector.start, selector.end, scope);
    TextSelector {
        range: Some(anchored.range),
        ..selector.clone()
    }
}

/// Revive every target of an annotation.
pub fn revive_annotation<T: DomTree>(
    tree: &T,
    rules: &ExclusionRules,
    annotation: &TextAnnotation<T::Node>,
    container: Option<&T::Node>,
) -> TextAnnotation<T::Node> {
    TextAnnotation {
        id: annotation.id.clone(),
        targets: annotation
            .targets
            .iter()
            .map(|target| revive_selector(tree, rules, target, container))
            .collect(),
        bodies: annotation.bodies.clone(),
    }
}

/// Like [`revive_selector`], but failures come back as errors.
pub fn try_revive<T: DomTree>(
    tree: &T,
    rules: &ExclusionRules,
    selector: &TextSelector<T::Node>,
    container: Option<&T::Node>,
) -> Result<TextSelector<T::Node>, AnchorError> {
    let scope = selector
        .offset_reference
        .as_ref()
        .or(container)
        .ok_or(AnchorError::UnresolvableReference)?;
    let range = anchor(tree, rules, selector.start, selector.end, scope)
        .into_result(selector.start, selector.end)?;
    Ok(TextSelector {
        range: Some(range),
        ..selector.clone()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::{BoundaryPoint, range_text};
    use crate::error::Boundary;
    use crate::tree::{Document, NodeId};

    fn doc() -> Document {
        Document::parse(
            r#"<main><section id="one"><p>First section.</p></section><section id="two"><p>Second <i>one</i>.</p></section></main>"#,
        )
        .unwrap()
    }

    #[test]
    fn test_new_rejects_empty_span() {
        assert_eq!(
            TextSelector::<NodeId>::new(4, 4),
            Err(AnchorError::InvalidSpan { start: 4, end: 4 })
        );
        assert!(TextSelector::<NodeId>::new(5, 2).is_err());
        assert_eq!(TextSelector::<NodeId>::new(2, 5).unwrap().len(), 3);
    }

    #[test]
    fn test_revive_uses_container() {
        let doc = doc();
        let rules = ExclusionRules::default();
        let selector = TextSelector::new(6, 13).unwrap();
        let revived = revive_selector(&doc, &rules, &selector, Some(&doc.root()));

        assert!(revived.is_anchored());
        assert_eq!(revived.start, 6);
        assert_eq!(revived.end, 13);
        let range = revived.range.as_ref().unwrap();
        assert_eq!(
            range_text(&doc, &rules, range, &doc.root()).as_deref(),
            Some("section")
        );
        // Input untouched.
        assert!(selector.range.is_none());
    }

    #[test]
    fn test_offset_reference_wins_over_container() {
        let doc = doc();
        let rules = ExclusionRules::default();
        let two = doc.get_element_by_id("two").unwrap();
        let selector = TextSelector::new(7, 10).unwrap().with_offset_reference(two);
        let revived = revive_selector(&doc, &rules, &selector, Some(&doc.root()));

        let range = revived.range.unwrap();
        assert_eq!(range_text(&doc, &rules, &range, &two).as_deref(), Some("one"));
        assert_eq!(revived.offset_reference, Some(two));
    }

    #[test]
    fn test_no_reference_returns_input() {
        let doc = doc();
        let rules = ExclusionRules::default();
        let selector = TextSelector::new(0, 3).unwrap();
        let revived = revive_selector(&doc, &rules, &selector, None);
        assert_eq!(revived, selector);

        assert_eq!(
            try_revive(&doc, &rules, &selector, None),
            Err(AnchorError::UnresolvableReference)
        );
    }

    #[test]
    fn test_degraded_revival_is_collapsed() {
        let doc = doc();
        let rules = ExclusionRules::default();
        let selector = TextSelector::new(20, 80).unwrap();
        let revived = revive_selector(&doc, &rules, &selector, Some(&doc.root()));

        assert!(revived.range.as_ref().unwrap().is_collapsed());
        assert!(!revived.is_anchored());
        assert!(matches!(
            try_revive(&doc, &rules, &selector, Some(&doc.root())),
            Err(AnchorError::IncompleteRange {
                missing: Boundary::End,
                ..
            })
        ));
    }

    #[test]
    fn test_revival_survives_unrelated_mutation() {
        let mut doc = doc();
        let rules = ExclusionRules::default();
        let two = doc.get_element_by_id("two").unwrap();
        let selector = TextSelector::new(0, 6).unwrap().with_offset_reference(two);
        let before = revive_selector(&doc, &rules, &selector, None);

        // Grow the first section and add chrome inside the second.
        let one = doc.get_element_by_id("one").unwrap();
        let p = doc.append_element(one, "p").unwrap();
        doc.append_text(p, "Inserted paragraph.").unwrap();
        let chrome = doc.create_element("button");
        doc.add_class(chrome, "not-annotatable").unwrap();
        doc.append_text(chrome, "edit").unwrap();
        let first = doc.first_child(&two).unwrap();
        doc.insert_before(two, chrome, Some(first)).unwrap();

        let after = revive_selector(&doc, &rules, &selector, None);
        assert_eq!(before, after);
    }

    #[test]
    fn test_revive_annotation_targets() {
        let doc = doc();
        let rules = ExclusionRules::default();
        let one = doc.get_element_by_id("one").unwrap();
        let mut annotation = TextAnnotation::new("a1", TextSelector::new(0, 5).unwrap())
            .with_body(AnnotationBody {
                purpose: Some("commenting".into()),
                value: "nice".into(),
            });
        annotation
            .targets
            .push(TextSelector::new(0, 6).unwrap().with_offset_reference(one));

        let revived = revive_annotation(&doc, &rules, &annotation, Some(&doc.root()));
        assert!(revived.is_anchored());
        assert_eq!(revived.ranges().count(), 2);
        assert_eq!(revived.bodies, annotation.bodies);

        let first = revived.targets[0].range.as_ref().unwrap();
        let text = doc.first_child(&doc.first_child(&one).unwrap()).unwrap();
        assert_eq!(first.start, BoundaryPoint::new(text, 0));
        assert_eq!(first.end, BoundaryPoint::new(text, 5));
    }
}
