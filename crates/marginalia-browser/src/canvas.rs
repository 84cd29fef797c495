//! 2D canvas drawing surface.

use marginalia_core::{Color, DrawingSurface, PlatformError, Point, Rect};
use wasm_bindgen::JsCast;

/// Draws highlights onto a `<canvas>` in CSS pixels.
///
/// The backing store is scaled by `devicePixelRatio` so highlights stay
/// crisp; callers always work in client coordinates.
#[derive(Debug, Clone)]
pub struct CanvasSurface {
    canvas: web_sys::HtmlCanvasElement,
    context: web_sys::CanvasRenderingContext2d,
    pixel_ratio: f64,
}

impl CanvasSurface {
    pub fn new(canvas: web_sys::HtmlCanvasElement) -> Result<Self, PlatformError> {
        let context = canvas
            .get_context("2d")
            .map_err(|e| format!("get_context failed: {:?}", e))?
            .ok_or("canvas has no 2d context")?
            .dyn_into::<web_sys::CanvasRenderingContext2d>()
            .map_err(|_| "context is not CanvasRenderingContext2d")?;
        let pixel_ratio = web_sys::window()
            .map(|w| w.device_pixel_ratio())
            .unwrap_or(1.0);
        Ok(Self {
            canvas,
            context,
            pixel_ratio,
        })
    }

    pub fn canvas(&self) -> &web_sys::HtmlCanvasElement {
        &self.canvas
    }

    /// The raw context, handed to painters that draw for themselves.
    pub fn context(&self) -> &web_sys::CanvasRenderingContext2d {
        &self.context
    }

    /// Size the canvas to `width` x `height` CSS pixels.
    pub fn resize(&mut self, width: f64, height: f64) -> Result<(), PlatformError> {
        if let Some(window) = web_sys::window() {
            self.pixel_ratio = window.device_pixel_ratio();
        }
        let style = self.canvas.style();
        style
            .set_property("width", &format!("{width}px"))
            .map_err(|e| format!("set width failed: {:?}", e))?;
        style
            .set_property("height", &format!("{height}px"))
            .map_err(|e| format!("set height failed: {:?}", e))?;
        self.canvas
            .set_width((width * self.pixel_ratio).round() as u32);
        self.canvas
            .set_height((height * self.pixel_ratio).round() as u32);
        self.context
            .set_transform(self.pixel_ratio, 0.0, 0.0, self.pixel_ratio, 0.0, 0.0)
            .map_err(|e| format!("set_transform failed: {:?}", e))?;
        Ok(())
    }
}

impl DrawingSurface for CanvasSurface {
    fn fill_rect(&mut self, rect: &Rect, color: &Color, opacity: f32) {
        // globalAlpha multiplies with the color's own alpha.
        self.context.set_global_alpha(opacity as f64);
        self.context.set_fill_style_str(&color.to_css());
        self.context
            .fill_rect(rect.x, rect.y, rect.width, rect.height);
        self.context.set_global_alpha(1.0);
    }

    fn stroke_line(&mut self, from: Point, to: Point, color: &Color, opacity: f32, width: f32) {
        self.context.set_global_alpha(opacity as f64);
        self.context.set_stroke_style_str(&color.to_css());
        self.context.set_line_width(width as f64);
        self.context.begin_path();
        self.context.move_to(from.x, from.y);
        self.context.line_to(to.x, to.y);
        self.context.stroke();
        self.context.set_global_alpha(1.0);
    }

    fn clear(&mut self, viewport: &Rect) {
        self.context
            .clear_rect(viewport.x, viewport.y, viewport.width, viewport.height);
    }
}
