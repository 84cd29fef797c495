//! Painters written in JavaScript.

use marginalia_browser::{CanvasSurface, HighlightPainter, HighlightStyle, PaintResult, Rect};
use wasm_bindgen::prelude::*;

use crate::types::{JsAnnotation, JsRect};

/// Calls `painter(annotation, rects, context, isSelected)`.
///
/// A returned style object is drawn by the layer. `undefined` or `null`
/// means the function drew on the context itself.
pub(crate) struct JsPainter {
    function: js_sys::Function,
}

impl JsPainter {
    pub(crate) fn new(function: js_sys::Function) -> Self {
        Self { function }
    }
}

impl HighlightPainter<web_sys::Node, CanvasSurface> for JsPainter {
    fn paint(
        &self,
        annotation: &marginalia_browser::TextAnnotation<web_sys::Node>,
        rects: &[Rect],
        surface: &mut CanvasSurface,
        is_selected: bool,
    ) -> PaintResult {
        let args = match painter_args(annotation, rects, surface, is_selected) {
            Ok(args) => args,
            Err(e) => {
                tracing::warn!(target: "marginalia::js", "painter arguments failed: {}", e);
                return PaintResult::Handled;
            }
        };

        let returned = match self.function.apply(&JsValue::NULL, &args) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(target: "marginalia::js", id = %annotation.id, "painter threw: {:?}", e);
                return PaintResult::Handled;
            }
        };
        if returned.is_undefined() || returned.is_null() {
            return PaintResult::Handled;
        }

        match serde_wasm_bindgen::from_value::<HighlightStyle>(returned) {
            Ok(style) => PaintResult::Style(style),
            Err(e) => {
                tracing::warn!(target: "marginalia::js", id = %annotation.id, "invalid highlight style: {}", e);
                PaintResult::Handled
            }
        }
    }
}

fn painter_args(
    annotation: &marginalia_browser::TextAnnotation<web_sys::Node>,
    rects: &[Rect],
    surface: &CanvasSurface,
    is_selected: bool,
) -> Result<js_sys::Array, serde_wasm_bindgen::Error> {
    let annotation = serde_wasm_bindgen::to_value(&JsAnnotation::from_annotation(annotation))?;
    let rects: Vec<JsRect> = rects.iter().copied().map(JsRect::from).collect();
    let rects = serde_wasm_bindgen::to_value(&rects)?;
    let context: &JsValue = surface.context().as_ref();
    Ok(js_sys::Array::of4(
        &annotation,
        &rects,
        context,
        &JsValue::from_bool(is_selected),
    ))
}
