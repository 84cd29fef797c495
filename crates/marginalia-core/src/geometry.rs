//! Highlight geometry.
//!
//! A live range becomes one rectangle per line fragment. Only annotatable
//! text contributes: chrome that happens to sit inside a range is never
//! highlighted. Rectangles are recomputed on every layout change and never
//! cached.

use std::cmp::Ordering;

use crate::anchor::{TextRange, compare_text_node};
use crate::classify::ExclusionRules;
use crate::platform::{PlatformError, TextLayout};
use crate::tree::DomTree;
use crate::walk::AnnotableTextNodes;

#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle in client coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn left(&self) -> f64 {
        self.x
    }

    pub fn top(&self) -> f64 {
        self.y
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn bottom_left(&self) -> Point {
        Point::new(self.left(), self.bottom())
    }

    pub fn bottom_right(&self) -> Point {
        Point::new(self.right(), self.bottom())
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Whether the two rectangles share any area. Touching edges do not count.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.left() < other.right()
            && other.left() < self.right()
            && self.top() < other.bottom()
            && other.top() < self.bottom()
    }

    /// Smallest rectangle containing both.
    pub fn union(&self, other: &Rect) -> Rect {
        let left = self.left().min(other.left());
        let top = self.top().min(other.top());
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(left, top, right - left, bottom - top)
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }
}

/// Client rectangles of the annotatable text covered by `range`.
///
/// Fragments with no width (e.g. a boundary sitting at a line end) are
/// dropped. A collapsed range has no rectangles.
pub fn client_rects<T: DomTree, L: TextLayout<T> + ?Sized>(
    tree: &T,
    rules: &ExclusionRules,
    layout: &L,
    range: &TextRange<T::Node>,
) -> Result<Vec<Rect>, PlatformError> {
    if range.is_collapsed() {
        return Ok(Vec::new());
    }

    let root = tree.root_of(&range.start.node);
    let mut rects = Vec::new();
    for node in AnnotableTextNodes::new(tree, rules, root) {
        let len = tree.text_len(&node);
        let from = match compare_text_node(tree, &node, &range.start) {
            Some(Ordering::Less) | None => continue,
            Some(Ordering::Equal) => range.start.offset.min(len),
            Some(Ordering::Greater) => 0,
        };
        let to = match compare_text_node(tree, &node, &range.end) {
            Some(Ordering::Greater) | None => break,
            Some(Ordering::Equal) => range.end.offset.min(len),
            Some(Ordering::Less) => len,
        };
        if from >= to {
            continue;
        }
        rects.extend(
            layout
                .text_rects(tree, &node, from, to)?
                .into_iter()
                .filter(|rect| rect.width > 0.0),
        );
    }
    Ok(rects)
}

/// Bounding box of a set of rectangles, the popup anchor.
pub fn bounding_rect(rects: &[Rect]) -> Option<Rect> {
    rects
        .iter()
        .copied()
        .reduce(|acc, rect| acc.union(&rect))
}

/// Merge neighbouring fragments on the same line that touch or overlap.
pub fn coalesce_rects(rects: &[Rect]) -> Vec<Rect> {
    let mut merged: Vec<Rect> = Vec::with_capacity(rects.len());
    for rect in rects {
        match merged.last_mut() {
            Some(last)
                if last.top() == rect.top()
                    && last.height == rect.height
                    && rect.left() <= last.right()
                    && last.left() <= rect.right() =>
            {
                *last = last.union(rect);
            }
            _ => merged.push(*rect),
        }
    }
    merged
}

/// Translate client rectangles into coordinates relative to `origin`.
pub fn to_local(rects: &[Rect], origin: Point) -> Vec<Rect> {
    rects
        .iter()
        .map(|rect| rect.translate(-origin.x, -origin.y))
        .collect()
}

/// Fixed-pitch layout for headless hosts and tests.
///
/// Every text node under the measured root (annotatable or not) flows into
/// one continuous run of cells, `columns` cells per line. Each UTF-16 unit
/// takes one cell; markup never breaks lines.
#[derive(Debug, Clone)]
pub struct MonospaceLayout<N> {
    origin: Point,
    char_width: f64,
    line_height: f64,
    columns: usize,
    positions: Vec<(N, usize)>,
}

impl<N: Clone + PartialEq> MonospaceLayout<N> {
    pub fn measure<T: DomTree<Node = N>>(tree: &T, root: &N, columns: usize) -> Self {
        let rules = ExclusionRules::none();
        let mut positions = Vec::new();
        let mut cursor = 0;
        for node in AnnotableTextNodes::new(tree, &rules, root.clone()) {
            positions.push((node.clone(), cursor));
            cursor += tree.text_len(&node);
        }
        Self {
            origin: Point::default(),
            char_width: 8.0,
            line_height: 16.0,
            columns: columns.max(1),
            positions,
        }
    }

    pub fn with_origin(mut self, origin: Point) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_metrics(mut self, char_width: f64, line_height: f64) -> Self {
        self.char_width = char_width;
        self.line_height = line_height;
        self
    }

    fn cell_rect(&self, line: usize, column: usize, cells: usize) -> Rect {
        Rect::new(
            self.origin.x + column as f64 * self.char_width,
            self.origin.y + line as f64 * self.line_height,
            cells as f64 * self.char_width,
            self.line_height,
        )
    }
}

impl<T: DomTree> TextLayout<T> for MonospaceLayout<T::Node> {
    fn text_rects(
        &self,
        tree: &T,
        node: &T::Node,
        start: usize,
        end: usize,
    ) -> Result<Vec<Rect>, PlatformError> {
        let Some((_, base)) = self.positions.iter().find(|(n, _)| n == node) else {
            return Err(PlatformError::from(format!("text node {node:?} was not laid out")));
        };
        let end = end.min(tree.text_len(node));
        let mut rects = Vec::new();
        let mut cell = base + start;
        let last = base + end;
        while cell < last {
            let line = cell / self.columns;
            let column = cell % self.columns;
            let cells = (self.columns - column).min(last - cell);
            rects.push(self.cell_rect(line, column, cells));
            cell += cells;
        }
        Ok(rects)
    }
}
