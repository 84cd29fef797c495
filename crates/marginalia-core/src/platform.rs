//! Platform abstraction traits for layout and drawing.
//!
//! Anchoring only needs tree access, but turning a range into pixels needs
//! the host's layout engine and somewhere to draw. The browser crate backs
//! these with `Range.getClientRects()` and a 2D canvas; the core ships a
//! monospace layout and a recording surface for headless use.

use crate::color::Color;
use crate::geometry::{Point, Rect};
use crate::tree::DomTree;

/// Error type for platform operations.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformError(pub String);

impl std::fmt::Display for PlatformError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for PlatformError {}

impl From<&str> for PlatformError {
    fn from(s: &str) -> Self {
        PlatformError(s.to_string())
    }
}

impl From<String> for PlatformError {
    fn from(s: String) -> Self {
        PlatformError(s)
    }
}

/// Layout queries against rendered text.
pub trait TextLayout<T: DomTree> {
    /// Client-space rectangles covering UTF-16 units `start..end` of a text
    /// node, one per line fragment, in visual order.
    fn text_rects(
        &self,
        tree: &T,
        node: &T::Node,
        start: usize,
        end: usize,
    ) -> Result<Vec<Rect>, PlatformError>;
}

/// Somewhere highlights can be drawn.
///
/// Opacity is in `[0, 1]` and multiplies the color's own alpha.
pub trait DrawingSurface {
    fn fill_rect(&mut self, rect: &Rect, color: &Color, opacity: f32);

    fn stroke_line(&mut self, from: Point, to: Point, color: &Color, opacity: f32, width: f32);

    /// Wipe everything inside `viewport`.
    fn clear(&mut self, viewport: &Rect);
}
