//! The highlight overlay.
//!
//! A fixed, click-through canvas covers the viewport. Content mutations under
//! the container, scrolls and resizes feed a [`RepaintScheduler`], which
//! collapses everything that happens between two animation frames into one
//! repaint.

use std::cell::{Ref, RefCell, RefMut};
use std::rc::{Rc, Weak};

use gloo_events::{EventListener, EventListenerOptions};
use marginalia_core::{
    AnnotatorConfig, ConfigError, DefaultPainter, ExclusionRules, HighlightPainter,
    HighlightRenderer, PaintContext, PaintReport, PlatformError, Rect, RepaintScheduler,
    RepaintTriggers, SelectedAnnotation, SelectionEventKind, SelectionState, TextAnnotation,
};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

use crate::canvas::CanvasSurface;
use crate::dom::WebDom;
use crate::geometry::{BrowserLayout, viewport_rect};
use crate::range::resolve_reference;

pub type BoxedPainter = Box<dyn HighlightPainter<web_sys::Node, CanvasSurface>>;

/// Layer settings, usually derived from an [`AnnotatorConfig`].
#[derive(Debug, Clone, Default)]
pub struct LayerOptions {
    pub rules: ExclusionRules,
    pub painter: DefaultPainter,
}

impl LayerOptions {
    pub fn from_config(config: &AnnotatorConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            rules: config.exclusion_rules()?,
            painter: config.default_painter(),
        })
    }
}

struct LayerState {
    renderer: HighlightRenderer<web_sys::Node>,
    scheduler: RepaintScheduler,
    rules: ExclusionRules,
    container: web_sys::Element,
    surface: CanvasSurface,
    painter: BoxedPainter,
    destroyed: bool,
}

impl LayerState {
    fn repaint(&mut self, triggers: RepaintTriggers) -> Result<PaintReport, PlatformError> {
        let viewport = viewport_rect()?;
        if triggers.contains(RepaintTriggers::RESIZE) {
            self.surface.resize(viewport.width, viewport.height)?;
        }
        let layout = BrowserLayout::new()?;
        let container: &web_sys::Node = self.container.as_ref();
        let scope = &self.container;
        let resolve = |key: &str| -> Option<web_sys::Node> {
            match resolve_reference(scope, key) {
                Ok(element) => element.map(Into::into),
                Err(e) => {
                    tracing::warn!(target: "marginalia::layer", "{}", e);
                    None
                }
            }
        };
        let ctx = PaintContext {
            tree: &WebDom,
            rules: &self.rules,
            layout: &layout,
            container: Some(container),
            resolve_reference: Some(&resolve),
            viewport,
        };
        Ok(self
            .renderer
            .repaint(&ctx, triggers, &mut self.surface, self.painter.as_ref()))
    }
}

/// Highlights for the annotations of one container element.
///
/// Dropping the layer disconnects its observers and removes the canvas.
pub struct HighlightLayer {
    state: Rc<RefCell<LayerState>>,
    canvas: web_sys::HtmlCanvasElement,
    observer: web_sys::MutationObserver,
    _on_mutation: Closure<dyn FnMut(js_sys::Array, web_sys::MutationObserver)>,
    _on_scroll: EventListener,
    _on_resize: EventListener,
}

impl HighlightLayer {
    /// Create the overlay canvas and start observing `container`.
    pub fn mount(container: &web_sys::Element, options: LayerOptions) -> Result<Self, PlatformError> {
        let window = web_sys::window().ok_or("no window")?;
        let document = window.document().ok_or("no document")?;
        let body = document.body().ok_or("no body")?;

        let canvas = document
            .create_element("canvas")
            .map_err(|e| format!("create_element failed: {:?}", e))?
            .dyn_into::<web_sys::HtmlCanvasElement>()
            .map_err(|_| "element is not a canvas")?;
        canvas.set_class_name("marginalia-highlight-layer");
        let style = canvas.style();
        for (property, value) in [
            ("position", "fixed"),
            ("top", "0"),
            ("left", "0"),
            ("pointer-events", "none"),
        ] {
            style
                .set_property(property, value)
                .map_err(|e| format!("set {} failed: {:?}", property, e))?;
        }
        body.append_child(&canvas)
            .map_err(|e| format!("append canvas failed: {:?}", e))?;

        let mut surface = CanvasSurface::new(canvas.clone())?;
        let viewport = viewport_rect()?;
        surface.resize(viewport.width, viewport.height)?;

        let state = Rc::new(RefCell::new(LayerState {
            renderer: HighlightRenderer::new(),
            scheduler: RepaintScheduler::new(),
            rules: options.rules,
            container: container.clone(),
            surface,
            painter: Box::new(options.painter),
            destroyed: false,
        }));

        let weak = Rc::downgrade(&state);
        let on_mutation = Closure::<dyn FnMut(js_sys::Array, web_sys::MutationObserver)>::new(
            move |_records, _observer| schedule(&weak, RepaintTriggers::MUTATION),
        );
        let observer = web_sys::MutationObserver::new(on_mutation.as_ref().unchecked_ref())
            .map_err(|e| format!("MutationObserver failed: {:?}", e))?;
        let init = web_sys::MutationObserverInit::new();
        init.set_child_list(true);
        init.set_character_data(true);
        init.set_subtree(true);
        // Class changes can move content in or out of the annotatable set.
        init.set_attributes(true);
        init.set_attribute_filter(&js_sys::Array::of1(&JsValue::from_str("class")));
        observer
            .observe_with_options(container, &init)
            .map_err(|e| format!("observe failed: {:?}", e))?;

        let weak = Rc::downgrade(&state);
        let on_scroll = EventListener::new_with_options(
            &document,
            "scroll",
            EventListenerOptions::run_in_capture_phase(),
            move |_| schedule(&weak, RepaintTriggers::SCROLL),
        );
        let weak = Rc::downgrade(&state);
        let on_resize = EventListener::new(&window, "resize", move |_| {
            schedule(&weak, RepaintTriggers::RESIZE)
        });

        tracing::debug!(target: "marginalia::layer", "mounted highlight layer");

        Ok(Self {
            state,
            canvas,
            observer,
            _on_mutation: on_mutation,
            _on_scroll: on_scroll,
            _on_resize: on_resize,
        })
    }

    pub fn set_annotations(
        &self,
        annotations: Vec<TextAnnotation<web_sys::Node>>,
    ) -> Result<(), PlatformError> {
        self.state_mut()?.renderer.set_annotations(annotations);
        self.schedule(RepaintTriggers::MUTATION);
        Ok(())
    }

    pub fn upsert(&self, annotation: TextAnnotation<web_sys::Node>) -> Result<(), PlatformError> {
        self.state_mut()?.renderer.upsert(annotation);
        self.schedule(RepaintTriggers::MUTATION);
        Ok(())
    }

    pub fn remove(&self, id: &str) -> Result<Option<TextAnnotation<web_sys::Node>>, PlatformError> {
        let removed = self.state_mut()?.renderer.remove(id);
        if removed.is_some() {
            self.schedule(RepaintTriggers::MUTATION);
        }
        Ok(removed)
    }

    /// Replace the selection; repaints only if the selected ids changed.
    pub fn set_selection(
        &self,
        selected: Vec<SelectedAnnotation>,
        event: SelectionEventKind,
    ) -> Result<bool, PlatformError> {
        let changed = self
            .state_mut()?
            .renderer
            .selection_mut()
            .select(selected, event);
        if changed {
            self.schedule(RepaintTriggers::SELECTION);
        }
        Ok(changed)
    }

    pub fn selection(&self) -> Result<SelectionState, PlatformError> {
        Ok(self.state()?.renderer.selection().clone())
    }

    pub fn set_painter(
        &self,
        painter: impl HighlightPainter<web_sys::Node, CanvasSurface> + 'static,
    ) -> Result<(), PlatformError> {
        self.state_mut()?.painter = Box::new(painter);
        self.schedule(RepaintTriggers::SELECTION);
        Ok(())
    }

    /// Client rectangles of an annotation as of the last repaint.
    pub fn rects_for(&self, id: &str) -> Result<Option<Vec<Rect>>, PlatformError> {
        Ok(self.state()?.renderer.rects_for(id).map(<[Rect]>::to_vec))
    }

    pub fn bounding_rect_for(&self, id: &str) -> Result<Option<Rect>, PlatformError> {
        Ok(self.state()?.renderer.bounding_rect_for(id))
    }

    /// Repaint immediately with whatever is pending, plus `triggers`.
    pub fn repaint_now(&self, triggers: RepaintTriggers) -> Result<PaintReport, PlatformError> {
        let mut state = self.state_mut()?;
        let pending = state.scheduler.take();
        state.repaint(pending | triggers)
    }

    /// Tear the layer down. Equivalent to dropping it.
    pub fn destroy(self) {
        drop(self);
    }

    // Painters run while the state is mutably borrowed.
    fn state(&self) -> Result<Ref<'_, LayerState>, PlatformError> {
        self.state
            .try_borrow()
            .map_err(|_| PlatformError::from("highlight layer is busy repainting"))
    }

    fn state_mut(&self) -> Result<RefMut<'_, LayerState>, PlatformError> {
        self.state
            .try_borrow_mut()
            .map_err(|_| PlatformError::from("highlight layer is busy repainting"))
    }

    fn schedule(&self, trigger: RepaintTriggers) {
        schedule(&Rc::downgrade(&self.state), trigger);
    }
}

impl Drop for HighlightLayer {
    fn drop(&mut self) {
        self.observer.disconnect();
        if let Ok(mut state) = self.state.try_borrow_mut() {
            state.destroyed = true;
            state.scheduler.cancel();
        }
        self.canvas.remove();
        tracing::debug!(target: "marginalia::layer", "destroyed highlight layer");
    }
}

fn schedule(state: &Weak<RefCell<LayerState>>, trigger: RepaintTriggers) {
    let Some(state) = state.upgrade() else {
        return;
    };
    let needs_frame = {
        let Ok(mut state) = state.try_borrow_mut() else {
            return;
        };
        !state.destroyed && state.scheduler.notify(trigger)
    };
    if needs_frame {
        request_frame(&state);
    }
}

fn request_frame(state: &Rc<RefCell<LayerState>>) {
    let Some(window) = web_sys::window() else {
        return;
    };
    let weak = Rc::downgrade(state);
    let closure = Closure::once(move || {
        if let Some(state) = weak.upgrade() {
            run_frame(&state);
        }
    });
    if let Err(e) = window.request_animation_frame(closure.as_ref().unchecked_ref()) {
        tracing::warn!(target: "marginalia::layer", "requestAnimationFrame failed: {:?}", e);
        if let Ok(mut state) = state.try_borrow_mut() {
            state.scheduler.cancel();
        }
    }
    closure.forget();
}

fn run_frame(state: &Rc<RefCell<LayerState>>) {
    let Ok(mut state) = state.try_borrow_mut() else {
        return;
    };
    if state.destroyed {
        return;
    }
    let triggers = state.scheduler.take();
    match state.repaint(triggers) {
        Ok(report) => tracing::trace!(
            target: "marginalia::layer",
            painted = report.painted.len(),
            ?triggers,
            "repainted"
        ),
        Err(e) => tracing::warn!(target: "marginalia::layer", "repaint failed: {}", e),
    }
}
