//! The repaint cycle.
//!
//! Revival is the expensive step and only has to run when content changed;
//! scrolls and resizes just re-measure the cached ranges, and selection
//! changes repaint from cached geometry. [`HighlightRenderer::repaint`] picks
//! the cheapest path for a set of [`RepaintTriggers`].

use smol_str::SmolStr;

use crate::classify::ExclusionRules;
use crate::geometry::{Rect, bounding_rect, client_rects};
use crate::painter::{HighlightPainter, PaintResult, draw_style};
use crate::platform::{DrawingSurface, TextLayout};
use crate::schedule::RepaintTriggers;
use crate::selection::SelectionState;
use crate::selector::{TextAnnotation, revive_annotation};
use crate::tree::DomTree;

/// Everything a repaint reads from the host.
pub struct PaintContext<'a, T: DomTree, L: ?Sized> {
    pub tree: &'a T,
    pub rules: &'a ExclusionRules,
    pub layout: &'a L,
    /// Fallback scope for selectors without an offset reference.
    pub container: Option<&'a T::Node>,
    /// Looks up a selector's `reference_key` in the current tree.
    pub resolve_reference: Option<&'a dyn Fn(&str) -> Option<T::Node>>,
    /// Visible area in client coordinates.
    pub viewport: Rect,
}

/// A revived annotation plus its current rectangles.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchoredAnnotation<N> {
    pub annotation: TextAnnotation<N>,
    pub rects: Vec<Rect>,
}

impl<N: Clone + PartialEq> AnchoredAnnotation<N> {
    pub fn id(&self) -> &str {
        &self.annotation.id
    }

    pub fn is_anchored(&self) -> bool {
        self.annotation.is_anchored()
    }

    pub fn is_visible(&self, viewport: &Rect) -> bool {
        self.rects.iter().any(|rect| rect.intersects(viewport))
    }
}

/// Outcome of one repaint, by annotation id.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct PaintReport {
    pub painted: Vec<SmolStr>,
    pub skipped_unanchored: Vec<SmolStr>,
    pub skipped_offscreen: Vec<SmolStr>,
}

/// Owns the annotation set and paints it onto a surface.
#[derive(Debug, Clone)]
pub struct HighlightRenderer<N> {
    annotations: Vec<TextAnnotation<N>>,
    anchored: Vec<AnchoredAnnotation<N>>,
    selection: SelectionState,
    stale: bool,
}

impl<N> Default for HighlightRenderer<N> {
    fn default() -> Self {
        Self {
            annotations: Vec::new(),
            anchored: Vec::new(),
            selection: SelectionState::default(),
            stale: true,
        }
    }
}

impl<N: Clone + PartialEq + std::fmt::Debug> HighlightRenderer<N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn annotations(&self) -> &[TextAnnotation<N>] {
        &self.annotations
    }

    pub fn set_annotations(&mut self, annotations: Vec<TextAnnotation<N>>) {
        self.annotations = annotations;
        self.stale = true;
    }

    /// Insert or replace by id.
    pub fn upsert(&mut self, annotation: TextAnnotation<N>) {
        match self.annotations.iter_mut().find(|a| a.id == annotation.id) {
            Some(existing) => *existing = annotation,
            None => self.annotations.push(annotation),
        }
        self.stale = true;
    }

    pub fn remove(&mut self, id: &str) -> Option<TextAnnotation<N>> {
        let index = self.annotations.iter().position(|a| a.id.as_str() == id)?;
        self.stale = true;
        Some(self.annotations.remove(index))
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut SelectionState {
        &mut self.selection
    }

    /// Result of the last revival or relayout.
    pub fn anchored(&self) -> &[AnchoredAnnotation<N>] {
        &self.anchored
    }

    pub fn rects_for(&self, id: &str) -> Option<&[Rect]> {
        self.anchored
            .iter()
            .find(|a| a.id() == id)
            .map(|a| a.rects.as_slice())
    }

    pub fn bounding_rect_for(&self, id: &str) -> Option<Rect> {
        bounding_rect(self.rects_for(id)?)
    }

    /// Anchor every annotation again and measure it.
    ///
    /// An annotation that cannot be measured keeps no rectangles and is
    /// skipped by [`paint`](Self::paint); the others are unaffected.
    pub fn revive_all<T, L>(&mut self, ctx: &PaintContext<'_, T, L>)
    where
        T: DomTree<Node = N>,
        L: TextLayout<T> + ?Sized,
    {
        let mut anchored = Vec::with_capacity(self.annotations.len());
        for annotation in &self.annotations {
            let annotation = resolve_references(ctx, annotation);
            let annotation = revive_annotation(ctx.tree, ctx.rules, &annotation, ctx.container);
            let rects = measure(ctx, &annotation);
            anchored.push(AnchoredAnnotation { annotation, rects });
        }
        tracing::debug!(
            target: "marginalia::render",
            count = anchored.len(),
            "revived annotations"
        );
        self.anchored = anchored;
        self.stale = false;
    }

    /// Re-measure the cached ranges without anchoring again.
    pub fn relayout<T, L>(&mut self, ctx: &PaintContext<'_, T, L>)
    where
        T: DomTree<Node = N>,
        L: TextLayout<T> + ?Sized,
    {
        for entry in &mut self.anchored {
            entry.rects = measure(ctx, &entry.annotation);
        }
    }

    /// Clear the viewport and paint every visible annotation from cached
    /// geometry. Selected annotations are painted last, on top.
    pub fn paint<S, P>(&self, viewport: &Rect, surface: &mut S, painter: &P) -> PaintReport
    where
        S: DrawingSurface + ?Sized,
        P: HighlightPainter<N, S> + ?Sized,
    {
        surface.clear(viewport);

        let mut report = PaintReport::default();
        let mut visible = Vec::new();
        for entry in &self.anchored {
            let id = entry.annotation.id.clone();
            if !entry.is_anchored() {
                report.skipped_unanchored.push(id);
            } else if !entry.is_visible(viewport) {
                report.skipped_offscreen.push(id);
            } else {
                visible.push(entry);
            }
        }
        visible.sort_by_key(|entry| self.selection.is_selected(entry.id()));

        for entry in visible {
            let is_selected = self.selection.is_selected(entry.id());
            match painter.paint(&entry.annotation, &entry.rects, surface, is_selected) {
                PaintResult::Style(style) => draw_style(surface, &entry.rects, &style),
                PaintResult::Handled => {}
            }
            report.painted.push(entry.annotation.id.clone());
        }

        if !report.skipped_unanchored.is_empty() {
            tracing::debug!(
                target: "marginalia::render",
                ids = ?report.skipped_unanchored,
                "skipped annotations that could not be anchored"
            );
        }
        report
    }

    /// Bring the cache up to date for `triggers`, then paint.
    pub fn repaint<T, L, S, P>(
        &mut self,
        ctx: &PaintContext<'_, T, L>,
        triggers: RepaintTriggers,
        surface: &mut S,
        painter: &P,
    ) -> PaintReport
    where
        T: DomTree<Node = N>,
        L: TextLayout<T> + ?Sized,
        S: DrawingSurface + ?Sized,
        P: HighlightPainter<N, S> + ?Sized,
    {
        if self.stale || triggers.needs_revival() {
            self.revive_all(ctx);
        } else if triggers.needs_layout() {
            self.relayout(ctx);
        }
        self.paint(&ctx.viewport, surface, painter)
    }
}

/// Fill in `offset_reference` from `reference_key` for this revival only.
/// A key that resolves to nothing falls back to the container.
fn resolve_references<T, L>(
    ctx: &PaintContext<'_, T, L>,
    annotation: &TextAnnotation<T::Node>,
) -> TextAnnotation<T::Node>
where
    T: DomTree,
    L: ?Sized,
{
    let mut annotation = annotation.clone();
    let Some(resolve) = ctx.resolve_reference else {
        return annotation;
    };
    for target in &mut annotation.targets {
        if let Some(key) = &target.reference_key {
            target.offset_reference = resolve(key);
            if target.offset_reference.is_none() {
                tracing::warn!(
                    target: "marginalia::render",
                    id = %annotation.id,
                    key = %key,
                    "offset reference not found, counting from the container"
                );
            }
        }
    }
    annotation
}

fn measure<T, L>(ctx: &PaintContext<'_, T, L>, annotation: &TextAnnotation<T::Node>) -> Vec<Rect>
where
    T: DomTree,
    L: TextLayout<T> + ?Sized,
{
    let mut rects = Vec::new();
    for range in annotation.ranges() {
        match client_rects(ctx.tree, ctx.rules, ctx.layout, range) {
            Ok(fragments) => rects.extend(fragments),
            Err(e) => {
                tracing::warn!(
                    target: "marginalia::render",
                    id = %annotation.id,
                    "could not measure annotation: {}",
                    e
                );
                return Vec::new();
            }
        }
    }
    rects
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::geometry::MonospaceLayout;
    use crate::log_capture::LogCapture;
    use crate::painter::{DefaultPainter, DisplayList, DrawCommand, HighlightStyle};
    use crate::selection::{SelectedAnnotation, SelectionEventKind};
    use crate::selector::TextSelector;
    use crate::tree::{Document, NodeId};
    use tracing::Level;

    const VIEWPORT: Rect = Rect {
        x: 0.0,
        y: 0.0,
        width: 800.0,
        height: 32.0,
    };

    /// Two 100-column lines, then a third line below the viewport.
    fn doc() -> Document {
        let line = "x".repeat(100);
        Document::parse(&format!("<div><p>{line}</p><p>{line}</p><p>{line}</p></div>")).unwrap()
    }

    fn annotation(id: &str, start: usize, end: usize) -> TextAnnotation<NodeId> {
        TextAnnotation::new(id, TextSelector::new(start, end).unwrap())
    }

    fn fills(surface: &DisplayList) -> Vec<(Rect, f32)> {
        surface
            .commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::FillRect { rect, opacity, .. } => Some((*rect, *opacity)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_repaint_reports_visibility() {
        let doc = doc();
        let rules = ExclusionRules::default();
        let layout = MonospaceLayout::measure(&doc, &doc.root(), 100);
        let root = doc.root();
        let ctx = PaintContext {
            tree: &doc,
            rules: &rules,
            layout: &layout,
            container: Some(&root),
            resolve_reference: None,
            viewport: VIEWPORT,
        };

        let mut renderer = HighlightRenderer::new();
        renderer.set_annotations(vec![
            annotation("visible", 10, 20),
            annotation("below", 250, 260),
            annotation("missing", 500, 510),
        ]);

        let mut surface = DisplayList::new();
        let report = renderer.repaint(
            &ctx,
            RepaintTriggers::empty(),
            &mut surface,
            &DefaultPainter::default(),
        );

        insta::assert_yaml_snapshot!(report, @r"
        painted:
          - visible
        skipped_unanchored:
          - missing
        skipped_offscreen:
          - below
        ");
        assert_eq!(fills(&surface), vec![(Rect::new(80.0, 0.0, 80.0, 16.0), 0.18)]);
        assert_eq!(surface.commands[0], DrawCommand::Clear { viewport: VIEWPORT });
    }

    #[test]
    fn test_selected_painted_last_with_selected_style() {
        let doc = doc();
        let rules = ExclusionRules::default();
        let layout = MonospaceLayout::measure(&doc, &doc.root(), 100);
        let root = doc.root();
        let ctx = PaintContext {
            tree: &doc,
            rules: &rules,
            layout: &layout,
            container: Some(&root),
            resolve_reference: None,
            viewport: VIEWPORT,
        };

        let mut renderer = HighlightRenderer::new();
        renderer.set_annotations(vec![annotation("a", 0, 5), annotation("b", 105, 110)]);
        renderer
            .selection_mut()
            .select([SelectedAnnotation::new("a")], SelectionEventKind::Pointer);

        let mut surface = DisplayList::new();
        let report = renderer.repaint(
            &ctx,
            RepaintTriggers::SELECTION,
            &mut surface,
            &DefaultPainter::default(),
        );

        assert_eq!(report.painted, vec![SmolStr::new("b"), SmolStr::new("a")]);
        let opacities: Vec<f32> = fills(&surface).into_iter().map(|(_, o)| o).collect();
        assert_eq!(opacities, vec![0.18, 0.45]);
    }

    #[test]
    fn test_handled_painter_draws_itself() {
        let doc = doc();
        let rules = ExclusionRules::default();
        let layout = MonospaceLayout::measure(&doc, &doc.root(), 100);
        let root = doc.root();
        let ctx = PaintContext {
            tree: &doc,
            rules: &rules,
            layout: &layout,
            container: Some(&root),
            resolve_reference: None,
            viewport: VIEWPORT,
        };

        let painter = |_: &TextAnnotation<NodeId>, rects: &[Rect], surface: &mut DisplayList, _: bool| {
            for rect in rects {
                surface.stroke_line(rect.bottom_left(), rect.bottom_right(), &Color::HIGHLIGHT, 1.0, 2.0);
            }
            PaintResult::Handled
        };

        let mut renderer = HighlightRenderer::new();
        renderer.set_annotations(vec![annotation("a", 95, 105)]);
        let mut surface = DisplayList::new();
        renderer.repaint(&ctx, RepaintTriggers::MUTATION, &mut surface, &painter);

        // Wraps onto two lines: two underlines and no fills.
        assert!(fills(&surface).is_empty());
        assert_eq!(surface.commands.len(), 3);
        assert_eq!(renderer.rects_for("a").map(<[Rect]>::len), Some(2));
        assert_eq!(
            renderer.bounding_rect_for("a"),
            Some(Rect::new(0.0, 0.0, 800.0, 32.0))
        );
    }

    #[test]
    fn test_mutation_revives_scroll_only_relayouts() {
        let mut doc = Document::parse("<div><p>hello world</p></div>").unwrap();
        let rules = ExclusionRules::default();
        let root = doc.root();

        let mut renderer = HighlightRenderer::new();
        renderer.set_annotations(vec![annotation("w", 6, 11)]);
        let painter = DefaultPainter {
            style: HighlightStyle::fill(Color::Named("gold".into()), 0.5),
            ..Default::default()
        };
        let mut surface = DisplayList::new();

        {
            let layout = MonospaceLayout::measure(&doc, &root, 80);
            let ctx = PaintContext {
                tree: &doc,
                rules: &rules,
                layout: &layout,
                container: Some(&root),
                resolve_reference: None,
                viewport: VIEWPORT,
            };
            renderer.repaint(&ctx, RepaintTriggers::empty(), &mut surface, &painter);
        }
        assert_eq!(renderer.rects_for("w"), Some(&[Rect::new(48.0, 0.0, 40.0, 16.0)][..]));

        // Prepend text. Until revival the cached range still covers the same cells.
        let p = doc.first_child(&root).unwrap();
        let text = doc.first_child(&p).unwrap();
        doc.set_text(text, "well, hello world").unwrap();
        let layout = MonospaceLayout::measure(&doc, &root, 80)
            .with_origin(crate::Point::new(0.0, -4.0));
        let ctx = PaintContext {
            tree: &doc,
            rules: &rules,
            layout: &layout,
            container: Some(&root),
            resolve_reference: None,
            viewport: VIEWPORT,
        };

        renderer.repaint(&ctx, RepaintTriggers::SCROLL, &mut surface, &painter);
        assert_eq!(renderer.rects_for("w"), Some(&[Rect::new(48.0, -4.0, 40.0, 16.0)][..]));

        renderer.repaint(&ctx, RepaintTriggers::MUTATION, &mut surface, &painter);
        assert_eq!(renderer.rects_for("w"), Some(&[Rect::new(48.0, -4.0, 40.0, 16.0)][..]));
        let revived = &renderer.anchored()[0].annotation;
        let range = revived.targets[0].range.as_ref().unwrap();
        assert_eq!(
            crate::range_text(&doc, &rules, range, &root).as_deref(),
            Some("hello")
        );
    }

    #[test]
    fn test_upsert_and_remove_mark_stale() {
        let doc = doc();
        let rules = ExclusionRules::default();
        let layout = MonospaceLayout::measure(&doc, &doc.root(), 100);
        let root = doc.root();
        let ctx = PaintContext {
            tree: &doc,
            rules: &rules,
            layout: &layout,
            container: Some(&root),
            resolve_reference: None,
            viewport: VIEWPORT,
        };

        let mut renderer = HighlightRenderer::new();
        renderer.upsert(annotation("a", 0, 5));
        renderer.upsert(annotation("a", 0, 10));
        assert_eq!(renderer.annotations().len(), 1);

        let mut surface = DisplayList::new();
        renderer.repaint(
            &ctx,
            RepaintTriggers::SELECTION,
            &mut surface,
            &DefaultPainter::default(),
        );
        assert_eq!(renderer.rects_for("a"), Some(&[Rect::new(0.0, 0.0, 80.0, 16.0)][..]));

        assert!(renderer.remove("a").is_some());
        let report = renderer.repaint(
            &ctx,
            RepaintTriggers::SELECTION,
            &mut surface,
            &DefaultPainter::default(),
        );
        assert!(report.painted.is_empty());
        assert_eq!(renderer.rects_for("a"), None);
    }

    #[test]
    fn test_unmeasurable_annotation_is_skipped_alone() {
        let doc = Document::parse("<div><p>hello world</p><p>second</p></div>").unwrap();
        let rules = ExclusionRules::default();
        let root = doc.root();
        let first = doc.first_child(&root).unwrap();
        let second = doc.next_sibling(&first).unwrap();
        // Only the first paragraph has been laid out.
        let layout = MonospaceLayout::measure(&doc, &first, 80);
        let ctx = PaintContext {
            tree: &doc,
            rules: &rules,
            layout: &layout,
            container: Some(&root),
            resolve_reference: None,
            viewport: VIEWPORT,
        };

        let mut renderer = HighlightRenderer::new();
        renderer.set_annotations(vec![
            annotation("good", 0, 5),
            TextAnnotation::new(
                "bad",
                TextSelector::new(0, 3).unwrap().with_offset_reference(second),
            ),
        ]);

        let capture = LogCapture::default();
        let mut surface = DisplayList::new();
        let report = capture.run(|| {
            renderer.repaint(
                &ctx,
                RepaintTriggers::MUTATION,
                &mut surface,
                &DefaultPainter::default(),
            )
        });

        assert_eq!(report.painted, vec![SmolStr::new("good")]);
        assert_eq!(report.skipped_offscreen, vec![SmolStr::new("bad")]);
        assert_eq!(fills(&surface), vec![(Rect::new(0.0, 0.0, 40.0, 16.0), 0.18)]);
        assert_eq!(renderer.rects_for("bad"), Some(&[][..]));
        assert!(capture.contains(Level::WARN, "could not measure annotation"));
    }

    #[test]
    fn test_reference_key_resolved_on_every_revival() {
        let mut doc =
            Document::parse(r#"<div><p>intro</p><section id="notes"><p>old text</p></section></div>"#)
                .unwrap();
        let rules = ExclusionRules::default();
        let root = doc.root();

        let mut renderer = HighlightRenderer::new();
        renderer.set_annotations(vec![TextAnnotation::new(
            "a",
            TextSelector::new(0, 3).unwrap().with_reference_key("notes"),
        )]);
        let painter = DefaultPainter::default();

        let revive = |doc: &Document, renderer: &mut HighlightRenderer<NodeId>| {
            let layout = MonospaceLayout::measure(doc, &root, 80);
            let resolve = |key: &str| doc.get_element_by_id(key);
            let ctx = PaintContext {
                tree: doc,
                rules: &rules,
                layout: &layout,
                container: Some(&root),
                resolve_reference: Some(&resolve),
                viewport: VIEWPORT,
            };
            let mut surface = DisplayList::new();
            renderer.repaint(&ctx, RepaintTriggers::MUTATION, &mut surface, &painter);
            let range = renderer.anchored()[0].annotation.targets[0].range.clone();
            range.and_then(|range| crate::range_text(doc, &rules, &range, &root))
        };
        assert_eq!(revive(&doc, &mut renderer).as_deref(), Some("old"));

        // The host re-renders the section; the key finds the new element.
        let old = doc.get_element_by_id("notes").unwrap();
        doc.remove(old).unwrap();
        let section = doc.append_element(root, "section").unwrap();
        doc.set_attribute(section, "id", "notes").unwrap();
        let p = doc.append_element(section, "p").unwrap();
        doc.append_text(p, "new text").unwrap();
        assert_eq!(revive(&doc, &mut renderer).as_deref(), Some("new"));

        // Without a match, offsets count from the container.
        doc.set_attribute(section, "id", "moved").unwrap();
        let capture = LogCapture::default();
        let text = capture.run(|| revive(&doc, &mut renderer));
        assert_eq!(text.as_deref(), Some("int"));
        assert!(capture.contains(Level::WARN, "offset reference not found"));
    }
}
