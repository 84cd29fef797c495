//! Types exposed to JavaScript via wasm-bindgen.

use marginalia_browser::{
    AnnotationBody, PaintReport, Rect, SelectedAnnotation, TextAnnotation, TextSelector,
};
use serde::{Deserialize, Serialize};
use tsify_next::Tsify;
use wasm_bindgen::prelude::*;

/// A stored text span.
#[derive(Debug, Clone, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct JsSelector {
    pub start: u32,
    pub end: u32,
    /// CSS selector for the offset reference element, looked up inside the
    /// annotator's container on every repaint. Offsets count from the
    /// container when unset or unmatched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset_reference: Option<String>,
}

/// Annotation body as the host stores it.
#[derive(Debug, Clone, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct JsBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct JsAnnotation {
    pub id: String,
    pub targets: Vec<JsSelector>,
    #[serde(default)]
    pub bodies: Vec<JsBody>,
}

impl JsAnnotation {
    /// Only keyed offset references survive; a bare node has no CSS form.
    pub fn from_annotation(annotation: &TextAnnotation<web_sys::Node>) -> Self {
        Self {
            id: annotation.id.to_string(),
            targets: annotation.targets.iter().map(JsSelector::from_selector).collect(),
            bodies: annotation
                .bodies
                .iter()
                .map(|body| JsBody {
                    purpose: body.purpose.as_ref().map(|p| p.to_string()),
                    value: body.value.clone(),
                })
                .collect(),
        }
    }

    pub fn bodies(&self) -> Vec<AnnotationBody> {
        self.bodies
            .iter()
            .map(|body| AnnotationBody {
                purpose: body.purpose.as_deref().map(Into::into),
                value: body.value.clone(),
            })
            .collect()
    }
}

impl JsSelector {
    pub(crate) fn from_selector(selector: &TextSelector<web_sys::Node>) -> Self {
        Self {
            start: selector.start as u32,
            end: selector.end as u32,
            offset_reference: selector.reference_key.as_ref().map(|key| key.to_string()),
        }
    }
}

/// Client-space rectangle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct JsRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl From<Rect> for JsRect {
    fn from(rect: Rect) -> Self {
        Self {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
        }
    }
}

/// One entry of the current selection.
#[derive(Debug, Clone, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct JsSelected {
    pub id: String,
    #[serde(default)]
    pub editable: bool,
}

impl From<JsSelected> for SelectedAnnotation {
    fn from(selected: JsSelected) -> Self {
        SelectedAnnotation {
            id: selected.id.into(),
            editable: selected.editable,
        }
    }
}

impl From<&SelectedAnnotation> for JsSelected {
    fn from(selected: &SelectedAnnotation) -> Self {
        Self {
            id: selected.id.to_string(),
            editable: selected.editable,
        }
    }
}

/// Outcome of a repaint, by annotation id.
#[derive(Debug, Clone, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct JsPaintReport {
    pub painted: Vec<String>,
    pub skipped_unanchored: Vec<String>,
    pub skipped_offscreen: Vec<String>,
}

impl From<PaintReport> for JsPaintReport {
    fn from(report: PaintReport) -> Self {
        let strings = |ids: Vec<smol_str::SmolStr>| -> Vec<String> {
            ids.into_iter().map(|id| id.to_string()).collect()
        };
        Self {
            painted: strings(report.painted),
            skipped_unanchored: strings(report.skipped_unanchored),
            skipped_offscreen: strings(report.skipped_offscreen),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_key_carried_to_painters() {
        let annotation = TextAnnotation::<web_sys::Node>::new(
            "note",
            TextSelector::new(2, 9).unwrap().with_reference_key("#chapter-2"),
        );
        let js = JsAnnotation::from_annotation(&annotation);
        assert_eq!(js.targets.len(), 1);
        assert_eq!((js.targets[0].start, js.targets[0].end), (2, 9));
        assert_eq!(js.targets[0].offset_reference.as_deref(), Some("#chapter-2"));

        let plain = TextAnnotation::<web_sys::Node>::new("plain", TextSelector::new(0, 1).unwrap());
        assert_eq!(JsAnnotation::from_annotation(&plain).targets[0].offset_reference, None);
    }
}
