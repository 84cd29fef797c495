//! Client rectangles from the browser's layout engine.

use marginalia_core::{PlatformError, Point, Rect, TextLayout};

use crate::dom::WebDom;

pub fn dom_rect_to_rect(rect: &web_sys::DomRect) -> Rect {
    Rect::new(rect.x(), rect.y(), rect.width(), rect.height())
}

/// Bounding client rectangle of an element.
pub fn element_rect(element: &web_sys::Element) -> Rect {
    dom_rect_to_rect(&element.get_bounding_client_rect())
}

/// The visible area of the window in client coordinates.
pub fn viewport_rect() -> Result<Rect, PlatformError> {
    let window = web_sys::window().ok_or("no window")?;
    let width = window
        .inner_width()
        .map_err(|e| format!("inner_width failed: {:?}", e))?
        .as_f64()
        .ok_or("inner_width is not a number")?;
    let height = window
        .inner_height()
        .map_err(|e| format!("inner_height failed: {:?}", e))?
        .as_f64()
        .ok_or("inner_height is not a number")?;
    Ok(Rect::new(0.0, 0.0, width, height))
}

/// [`TextLayout`] backed by `Range.getClientRects()`.
#[derive(Debug, Clone)]
pub struct BrowserLayout {
    document: web_sys::Document,
}

impl BrowserLayout {
    pub fn new() -> Result<Self, PlatformError> {
        let document = web_sys::window()
            .ok_or("no window")?
            .document()
            .ok_or("no document")?;
        Ok(Self { document })
    }

    /// Top-left of `element` in client space, for [`marginalia_core::to_local`].
    pub fn origin_of(element: &web_sys::Element) -> Point {
        let rect = element.get_bounding_client_rect();
        Point::new(rect.x(), rect.y())
    }
}

impl TextLayout<WebDom> for BrowserLayout {
    fn text_rects(
        &self,
        _tree: &WebDom,
        node: &web_sys::Node,
        start: usize,
        end: usize,
    ) -> Result<Vec<Rect>, PlatformError> {
        let range = self
            .document
            .create_range()
            .map_err(|e| format!("create_range failed: {:?}", e))?;
        range
            .set_start(node, start as u32)
            .map_err(|e| format!("set_start failed: {:?}", e))?;
        range
            .set_end(node, end as u32)
            .map_err(|e| format!("set_end failed: {:?}", e))?;

        let Some(rects) = range.get_client_rects() else {
            return Ok(Vec::new());
        };
        let mut result = Vec::with_capacity(rects.length() as usize);
        for i in 0..rects.length() {
            if let Some(rect) = rects.get(i) {
                result.push(dom_rect_to_rect(&rect));
            }
        }
        Ok(result)
    }
}
