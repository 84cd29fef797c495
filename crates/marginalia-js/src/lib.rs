//! WASM bindings for marginalia.
//!
//! Exposes a `JsAnnotator` that paints highlights for a container element,
//! plus the selector revival used by popup and host code.

mod annotator;
mod painter;
mod types;

pub use annotator::*;
pub use types::*;

use wasm_bindgen::prelude::*;

/// Initialize panic hook and console logging.
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();

    let level = if cfg!(debug_assertions) {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    marginalia_browser::init_logging(level);
}
