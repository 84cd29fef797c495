//! JsAnnotator - highlight layer wrapper for JavaScript.

use marginalia_browser::{
    AnnotatorConfig, ExclusionRules, HighlightLayer, LayerOptions, RepaintTriggers,
    SelectedAnnotation, SelectionEventKind, TextAnnotation, TextSelector, WebDom, annotable_text,
    offsets_for_dom_range, resolve_reference, revive_dom_range,
};
use wasm_bindgen::prelude::*;

use crate::painter::JsPainter;
use crate::types::{JsAnnotation, JsPaintReport, JsRect, JsSelected, JsSelector};

/// Paints annotation highlights over one container element.
#[wasm_bindgen]
pub struct JsAnnotator {
    container: web_sys::Element,
    config: AnnotatorConfig,
    rules: ExclusionRules,
    layer: Option<HighlightLayer>,
}

#[wasm_bindgen]
impl JsAnnotator {
    /// Mount on `container`. `config` is an optional plain object with the
    /// `AnnotatorConfig` keys.
    #[wasm_bindgen(constructor)]
    pub fn new(container: web_sys::Element, config: JsValue) -> Result<JsAnnotator, JsError> {
        let config = if config.is_undefined() || config.is_null() {
            AnnotatorConfig::default()
        } else {
            serde_wasm_bindgen::from_value::<AnnotatorConfig>(config)
                .map_err(|e| JsError::new(&format!("Invalid config: {}", e)))?
        };
        let options =
            LayerOptions::from_config(&config).map_err(|e| JsError::new(&e.to_string()))?;
        let rules = options.rules.clone();
        let layer =
            HighlightLayer::mount(&container, options).map_err(|e| JsError::new(&e.to_string()))?;

        Ok(Self {
            container,
            config,
            rules,
            layer: Some(layer),
        })
    }

    // === Annotations ===

    /// Replace every annotation. Takes an array of `JsAnnotation`.
    #[wasm_bindgen(js_name = setAnnotations)]
    pub fn set_annotations(&self, annotations: JsValue) -> Result<(), JsError> {
        let annotations: Vec<JsAnnotation> = serde_wasm_bindgen::from_value(annotations)
            .map_err(|e| JsError::new(&format!("Invalid annotations: {}", e)))?;
        let annotations = annotations
            .iter()
            .map(|a| self.to_annotation(a))
            .collect::<Result<Vec<_>, _>>()?;
        self.layer()?.set_annotations(annotations).map_err(js_error)
    }

    /// Insert or replace one annotation by id.
    #[wasm_bindgen(js_name = upsertAnnotation)]
    pub fn upsert_annotation(&self, annotation: JsAnnotation) -> Result<(), JsError> {
        let annotation = self.to_annotation(&annotation)?;
        self.layer()?.upsert(annotation).map_err(js_error)
    }

    #[wasm_bindgen(js_name = removeAnnotation)]
    pub fn remove_annotation(&self, id: &str) -> Result<bool, JsError> {
        let removed = self.layer()?.remove(id).map_err(js_error)?;
        Ok(removed.is_some())
    }

    // === Selection ===

    /// Replace the selection. `pointer` marks changes made with the mouse,
    /// which the popup treats differently from programmatic ones.
    #[wasm_bindgen(js_name = setSelected)]
    pub fn set_selected(&self, selected: JsValue, pointer: bool) -> Result<bool, JsError> {
        let selected: Vec<JsSelected> = serde_wasm_bindgen::from_value(selected)
            .map_err(|e| JsError::new(&format!("Invalid selection: {}", e)))?;
        let event = if pointer {
            SelectionEventKind::Pointer
        } else {
            SelectionEventKind::Programmatic
        };
        let selected = selected.into_iter().map(SelectedAnnotation::from).collect();
        self.layer()?.set_selection(selected, event).map_err(js_error)
    }

    #[wasm_bindgen(js_name = getSelected)]
    pub fn get_selected(&self) -> Result<JsValue, JsError> {
        let selection = self.layer()?.selection().map_err(js_error)?;
        let selected: Vec<JsSelected> = selection.selected().iter().map(JsSelected::from).collect();
        serde_wasm_bindgen::to_value(&selected)
            .map_err(|e| JsError::new(&format!("Serialization error: {}", e)))
    }

    /// Ids of the selection joined with `-`, stable while the selection is.
    #[wasm_bindgen(js_name = getSelectionKey)]
    pub fn get_selection_key(&self) -> Result<String, JsError> {
        Ok(self.layer()?.selection().map_err(js_error)?.key())
    }

    // === Painting ===

    /// Use `painter(annotation, rects, context, isSelected)` for every
    /// highlight, or the configured default painter when `undefined`.
    #[wasm_bindgen(js_name = setPainter)]
    pub fn set_painter(&self, painter: Option<js_sys::Function>) -> Result<(), JsError> {
        let layer = self.layer()?;
        let result = match painter {
            Some(function) => layer.set_painter(JsPainter::new(function)),
            None => layer.set_painter(self.config.default_painter()),
        };
        result.map_err(js_error)
    }

    /// Repaint now instead of on the next frame.
    pub fn repaint(&self) -> Result<JsPaintReport, JsError> {
        let report = self
            .layer()?
            .repaint_now(RepaintTriggers::empty())
            .map_err(js_error)?;
        Ok(report.into())
    }

    // === Geometry ===

    /// Client rectangles of an annotation, one per line fragment.
    #[wasm_bindgen(js_name = getAnnotationRects)]
    pub fn get_annotation_rects(&self, id: &str) -> Result<JsValue, JsError> {
        let rects: Vec<JsRect> = self
            .layer()?
            .rects_for(id)
            .map_err(js_error)?
            .unwrap_or_default()
            .into_iter()
            .map(JsRect::from)
            .collect();
        serde_wasm_bindgen::to_value(&rects)
            .map_err(|e| JsError::new(&format!("Serialization error: {}", e)))
    }

    /// Bounding rectangle of an annotation, or `undefined` when it has none.
    #[wasm_bindgen(js_name = getBoundingRect)]
    pub fn get_bounding_rect(&self, id: &str) -> Result<JsValue, JsError> {
        let rect = self
            .layer()?
            .bounding_rect_for(id)
            .map_err(js_error)?
            .map(JsRect::from);
        serde_wasm_bindgen::to_value(&rect)
            .map_err(|e| JsError::new(&format!("Serialization error: {}", e)))
    }

    // === Anchoring ===

    /// Anchor `start..end` to a DOM `Range`, counting from `offsetReference`
    /// or the container.
    #[wasm_bindgen(js_name = reviveSelector)]
    pub fn revive_selector(
        &self,
        start: u32,
        end: u32,
        offset_reference: Option<web_sys::Element>,
    ) -> Result<web_sys::Range, JsError> {
        let scope = offset_reference.unwrap_or_else(|| self.container.clone());
        let (range, _) = revive_dom_range(&self.rules, start as usize, end as usize, &scope)
            .map_err(|e| JsError::new(&e.to_string()))?;
        Ok(range)
    }

    /// Offsets of a DOM `Range` (e.g. the user's selection) relative to the
    /// container, or `undefined` when it touches non-annotatable content.
    #[wasm_bindgen(js_name = offsetsForRange)]
    pub fn offsets_for_range(&self, range: &web_sys::Range) -> Result<JsValue, JsError> {
        let offsets = offsets_for_dom_range(&self.rules, range, &self.container)
            .map_err(|e| JsError::new(&e.to_string()))?
            .map(|(start, end)| JsSelector {
                start: start as u32,
                end: end as u32,
                offset_reference: None,
            });
        serde_wasm_bindgen::to_value(&offsets)
            .map_err(|e| JsError::new(&format!("Serialization error: {}", e)))
    }

    /// The text offsets count over.
    #[wasm_bindgen(js_name = getAnnotatableText)]
    pub fn get_annotatable_text(&self) -> String {
        let container: &web_sys::Node = &self.container;
        annotable_text(&WebDom, &self.rules, container)
    }

    // === Lifecycle ===

    /// Remove the highlight canvas and stop observing. Other calls fail
    /// afterwards.
    pub fn destroy(&mut self) {
        if let Some(layer) = self.layer.take() {
            layer.destroy();
        }
    }
}

impl JsAnnotator {
    fn layer(&self) -> Result<&HighlightLayer, JsError> {
        self.layer
            .as_ref()
            .ok_or_else(|| JsError::new("Annotator was destroyed"))
    }

    fn to_annotation(
        &self,
        annotation: &JsAnnotation,
    ) -> Result<TextAnnotation<web_sys::Node>, JsError> {
        if annotation.targets.is_empty() {
            return Err(JsError::new(&format!(
                "Annotation {} has no targets",
                annotation.id
            )));
        }
        let targets = annotation
            .targets
            .iter()
            .map(|target| self.to_selector(target))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TextAnnotation {
            id: annotation.id.as_str().into(),
            targets,
            bodies: annotation.bodies(),
        })
    }

    /// The reference key is kept as CSS and looked up again on every
    /// revival, so re-rendered reference elements are picked up.
    fn to_selector(&self, selector: &JsSelector) -> Result<TextSelector<web_sys::Node>, JsError> {
        let mut target = TextSelector::new(selector.start as usize, selector.end as usize)
            .map_err(js_error)?;
        if let Some(css) = &selector.offset_reference {
            if resolve_reference(&self.container, css).map_err(js_error)?.is_none() {
                tracing::debug!(target: "marginalia::js", selector = %css, "offset reference not mounted yet");
            }
            target = target.with_reference_key(css.as_str());
        }
        Ok(target)
    }
}

fn js_error(e: impl std::fmt::Display) -> JsError {
    JsError::new(&e.to_string())
}
