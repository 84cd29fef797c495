//! The highlight painter contract.
//!
//! A painter is called once per visible annotation per repaint, with every
//! rectangle of that annotation. It either returns a [`HighlightStyle`] for
//! the renderer to draw, or draws on the surface itself and returns
//! [`PaintResult::Handled`]. Painters must give the same result for the same
//! inputs; the renderer may call them on every frame.

use crate::color::Color;
use crate::geometry::{Point, Rect};
use crate::platform::DrawingSurface;
use crate::selector::TextAnnotation;

/// How to draw one annotation. Every field is optional and independent.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_opacity: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub underline: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub underline_opacity: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub underline_width: Option<f32>,
}

impl HighlightStyle {
    /// Stock style for annotations that are not selected.
    pub fn baseline() -> Self {
        Self::fill(Color::HIGHLIGHT, 0.18)
    }

    /// Stock style for selected annotations.
    pub fn selected() -> Self {
        Self::fill(Color::HIGHLIGHT, 0.45)
    }

    pub fn fill(color: Color, opacity: f32) -> Self {
        Self {
            fill: Some(color),
            fill_opacity: Some(opacity),
            ..Default::default()
        }
    }

    pub fn with_underline(mut self, color: Color, opacity: f32, width: f32) -> Self {
        self.underline = Some(color);
        self.underline_opacity = Some(opacity);
        self.underline_width = Some(width);
        self
    }

    /// Fill unset fields from `fallback`.
    pub fn or(self, fallback: &HighlightStyle) -> Self {
        Self {
            fill: self.fill.or_else(|| fallback.fill.clone()),
            fill_opacity: self.fill_opacity.or(fallback.fill_opacity),
            underline: self.underline.or_else(|| fallback.underline.clone()),
            underline_opacity: self.underline_opacity.or(fallback.underline_opacity),
            underline_width: self.underline_width.or(fallback.underline_width),
        }
    }

    /// A style with nothing set draws nothing.
    pub fn is_empty(&self) -> bool {
        self.fill.is_none() && self.underline.is_none()
    }
}

/// What a painter decided.
#[derive(Debug, Clone, PartialEq)]
pub enum PaintResult {
    /// Draw this style over every rectangle.
    Style(HighlightStyle),
    /// The painter drew directly, or wants nothing drawn.
    Handled,
}

impl From<HighlightStyle> for PaintResult {
    fn from(style: HighlightStyle) -> Self {
        PaintResult::Style(style)
    }
}

impl From<Option<HighlightStyle>> for PaintResult {
    fn from(style: Option<HighlightStyle>) -> Self {
        style.map_or(PaintResult::Handled, PaintResult::Style)
    }
}

/// Maps an annotation and its rectangles to a visual.
///
/// Closures with the matching signature are painters.
pub trait HighlightPainter<N, S: DrawingSurface + ?Sized> {
    fn paint(
        &self,
        annotation: &TextAnnotation<N>,
        rects: &[Rect],
        surface: &mut S,
        is_selected: bool,
    ) -> PaintResult;
}

impl<N, S, F> HighlightPainter<N, S> for F
where
    S: DrawingSurface + ?Sized,
    F: Fn(&TextAnnotation<N>, &[Rect], &mut S, bool) -> PaintResult,
{
    fn paint(
        &self,
        annotation: &TextAnnotation<N>,
        rects: &[Rect],
        surface: &mut S,
        is_selected: bool,
    ) -> PaintResult {
        self(annotation, rects, surface, is_selected)
    }
}

/// The painter used when the host does not register one.
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultPainter {
    pub style: HighlightStyle,
    pub selected_style: HighlightStyle,
}

impl Default for DefaultPainter {
    fn default() -> Self {
        Self {
            style: HighlightStyle::baseline(),
            selected_style: HighlightStyle::selected(),
        }
    }
}

impl<N, S: DrawingSurface + ?Sized> HighlightPainter<N, S> for DefaultPainter {
    fn paint(
        &self,
        _annotation: &TextAnnotation<N>,
        _rects: &[Rect],
        _surface: &mut S,
        is_selected: bool,
    ) -> PaintResult {
        if is_selected {
            PaintResult::Style(self.selected_style.clone())
        } else {
            PaintResult::Style(self.style.clone())
        }
    }
}

/// Render a style: fill each rectangle, then underline its bottom edge.
///
/// Missing opacities default to 1 and a missing underline width to 1.
pub fn draw_style<S: DrawingSurface + ?Sized>(surface: &mut S, rects: &[Rect], style: &HighlightStyle) {
    for rect in rects {
        if let Some(fill) = &style.fill {
            let opacity = style.fill_opacity.unwrap_or(1.0).clamp(0.0, 1.0);
            surface.fill_rect(rect, fill, opacity);
        }
        if let Some(underline) = &style.underline {
            let opacity = style.underline_opacity.unwrap_or(1.0).clamp(0.0, 1.0);
            let width = style.underline_width.unwrap_or(1.0);
            surface.stroke_line(rect.bottom_left(), rect.bottom_right(), underline, opacity, width);
        }
    }
}

/// One recorded drawing operation.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawCommand {
    Clear {
        viewport: Rect,
    },
    FillRect {
        rect: Rect,
        color: Color,
        opacity: f32,
    },
    Line {
        from: Point,
        to: Point,
        color: Color,
        opacity: f32,
        width: f32,
    },
}

/// A surface that records what would be drawn.
///
/// Used by headless hosts and to inspect a frame in tests. `clear` starts a
/// new frame.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct DisplayList {
    pub commands: Vec<DrawCommand>,
}

impl DisplayList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rectangles filled since the last clear.
    pub fn filled(&self) -> impl Iterator<Item = &Rect> {
        self.commands.iter().filter_map(|command| match command {
            DrawCommand::FillRect { rect, .. } => Some(rect),
            _ => None,
        })
    }
}

impl DrawingSurface for DisplayList {
    fn fill_rect(&mut self, rect: &Rect, color: &Color, opacity: f32) {
        self.commands.push(DrawCommand::FillRect {
            rect: *rect,
            color: color.clone(),
            opacity,
        });
    }

    fn stroke_line(&mut self, from: Point, to: Point, color: &Color, opacity: f32, width: f32) {
        self.commands.push(DrawCommand::Line {
            from,
            to,
            color: color.clone(),
            opacity,
            width,
        });
    }

    fn clear(&mut self, viewport: &Rect) {
        self.commands.clear();
        self.commands.push(DrawCommand::Clear {
            viewport: *viewport,
        });
    }
}
