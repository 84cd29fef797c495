//! marginalia-core: Pure Rust annotation anchoring without browser dependencies.
//!
//! This crate provides:
//! - `DomTree` trait for tree access, with the arena-backed `Document`
//! - `ExclusionRules` - the classifier deciding what text counts toward offsets
//! - `anchor` / `revive_selector` - stored offsets back to live ranges
//! - `client_rects` - ranges to per-line rectangles through a `TextLayout`
//! - `HighlightPainter` - the pluggable styling contract, plus `HighlightRenderer`
//!
//! Browser bindings live in `marginalia-browser`, which implements the
//! platform traits over `web-sys`.

pub mod anchor;
pub mod classify;
pub mod color;
pub mod config;
pub mod error;
pub mod geometry;
pub mod painter;
pub mod platform;
pub mod render;
pub mod schedule;
pub mod selection;
pub mod selector;
pub mod tree;
pub mod walk;

#[cfg(test)]
mod log_capture;

pub use anchor::{
    AnchorStatus, AnchoredRange, BoundaryPoint, TextRange, anchor, annotable_text,
    offsets_for_range, range_text,
};
pub use classify::{ExclusionRules, NOT_ANNOTATABLE_CLASS, NOT_ANNOTATABLE_SELECTOR};
pub use color::Color;
pub use config::AnnotatorConfig;
pub use error::{AnchorError, ConfigError, TreeError};
pub use geometry::{
    MonospaceLayout, Point, Rect, bounding_rect, client_rects, coalesce_rects, to_local,
};
pub use painter::{
    DefaultPainter, DisplayList, DrawCommand, HighlightPainter, HighlightStyle, PaintResult,
    draw_style,
};
pub use platform::{DrawingSurface, PlatformError, TextLayout};
pub use render::{AnchoredAnnotation, HighlightRenderer, PaintContext, PaintReport};
pub use schedule::{RepaintScheduler, RepaintTriggers};
pub use selection::{SelectedAnnotation, SelectionEventKind, SelectionState};
pub use selector::{
    AnnotationBody, TextAnnotation, TextSelector, revive_annotation, revive_selector, try_revive,
};
pub use smol_str::SmolStr;
pub use tree::{Document, DomTree, NodeId, NodeKind, document_order};
pub use walk::{AnnotableTextNodes, utf16_len, utf16_slice};
