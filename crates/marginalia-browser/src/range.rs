//! Conversions between anchored ranges and DOM `Range` objects.

use marginalia_core::{
    AnchorStatus, BoundaryPoint, ExclusionRules, PlatformError, TextRange, anchor,
    offsets_for_range,
};

use crate::dom::WebDom;

/// Build a DOM `Range` with the same boundaries.
pub fn to_dom_range(range: &TextRange<web_sys::Node>) -> Result<web_sys::Range, PlatformError> {
    let document = web_sys::window()
        .ok_or("no window")?
        .document()
        .ok_or("no document")?;
    let dom_range = document
        .create_range()
        .map_err(|e| format!("create_range failed: {:?}", e))?;
    dom_range
        .set_start(&range.start.node, range.start.offset as u32)
        .map_err(|e| format!("set_start failed: {:?}", e))?;
    dom_range
        .set_end(&range.end.node, range.end.offset as u32)
        .map_err(|e| format!("set_end failed: {:?}", e))?;
    Ok(dom_range)
}

/// Read the boundaries of a DOM `Range`, e.g. the user's selection.
pub fn from_dom_range(range: &web_sys::Range) -> Result<TextRange<web_sys::Node>, PlatformError> {
    let start = range
        .start_container()
        .map_err(|e| format!("start_container failed: {:?}", e))?;
    let start_offset = range
        .start_offset()
        .map_err(|e| format!("start_offset failed: {:?}", e))?;
    let end = range
        .end_container()
        .map_err(|e| format!("end_container failed: {:?}", e))?;
    let end_offset = range
        .end_offset()
        .map_err(|e| format!("end_offset failed: {:?}", e))?;
    Ok(TextRange::new(
        BoundaryPoint::new(start, start_offset as usize),
        BoundaryPoint::new(end, end_offset as usize),
    ))
}

/// Anchor `start..end` within `scope` and return it as a DOM `Range`.
///
/// Degraded anchors still produce a (collapsed) range; the status says why.
pub fn revive_dom_range(
    rules: &ExclusionRules,
    start: usize,
    end: usize,
    scope: &web_sys::Node,
) -> Result<(web_sys::Range, AnchorStatus), PlatformError> {
    let anchored = anchor(&WebDom, rules, start, end, scope);
    let dom_range = to_dom_range(&anchored.range)?;
    Ok((dom_range, anchored.status))
}

/// Offsets of a DOM `Range` over the annotatable text of `scope`, the
/// creation-side counterpart of [`revive_dom_range`].
pub fn offsets_for_dom_range(
    rules: &ExclusionRules,
    range: &web_sys::Range,
    scope: &web_sys::Node,
) -> Result<Option<(usize, usize)>, PlatformError> {
    let range = from_dom_range(range)?;
    Ok(offsets_for_range(&WebDom, rules, &range, scope))
}

/// Find the offset reference for a CSS selector: the container itself when
/// it matches, otherwise its first matching descendant.
pub fn resolve_reference(
    container: &web_sys::Element,
    css: &str,
) -> Result<Option<web_sys::Element>, PlatformError> {
    let matches_container = container
        .matches(css)
        .map_err(|e| format!("invalid offset reference {}: {:?}", css, e))?;
    if matches_container {
        return Ok(Some(container.clone()));
    }
    container
        .query_selector(css)
        .map_err(|e| format!("invalid offset reference {}: {:?}", css, e).into())
}
