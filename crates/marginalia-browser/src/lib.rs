//! Browser DOM layer for marginalia.
//!
//! This crate implements the core's tree, layout and drawing traits over
//! `web-sys`, and wires DOM observation to frame-aligned repaints. It assumes
//! a `wasm32-unknown-unknown` target environment.
//!
//! # Architecture
//!
//! - `dom`: `DomTree` over live `web_sys::Node`s
//! - `range`: anchored ranges to and from DOM `Range`s
//! - `geometry`: client rectangles via `Range.getClientRects()`
//! - `canvas`: a 2D canvas `DrawingSurface`
//! - `layer`: the highlight overlay, its observers and repaint loop
//! - `logging`: console logging setup
//!
//! # Re-exports
//!
//! This crate re-exports `marginalia-core` for convenience, so consumers
//! only need to depend on `marginalia-browser`.

// Re-export core crate
pub use marginalia_core;
pub use marginalia_core::*;

pub mod canvas;
pub mod dom;
pub mod geometry;
pub mod layer;
pub mod logging;
pub mod range;

pub use canvas::CanvasSurface;
pub use dom::WebDom;
pub use geometry::{BrowserLayout, dom_rect_to_rect, element_rect, viewport_rect};
pub use layer::{HighlightLayer, LayerOptions};
pub use logging::init_logging;
pub use range::{
    from_dom_range, offsets_for_dom_range, resolve_reference, revive_dom_range, to_dom_range,
};
