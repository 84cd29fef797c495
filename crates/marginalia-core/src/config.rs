//! Annotator configuration.
//!
//! JSON with camelCase keys, so JS hosts can pass the same object they would
//! hand to the annotator constructor. Every key is optional.
//!
//! ```json
//! {
//!   "notAnnotatable": ".not-annotatable, aside",
//!   "style": { "fill": "#ffd700", "fillOpacity": 0.3 },
//!   "selectedStyle": { "underline": "rgb(0, 128, 255)", "underlineWidth": 2 },
//!   "openOnAnnotation": true,
//!   "openClick": false
//! }
//! ```

use std::path::Path;

use crate::classify::{ExclusionRules, NOT_ANNOTATABLE_SELECTOR};
use crate::error::ConfigError;
use crate::painter::{DefaultPainter, HighlightStyle};

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnnotatorConfig {
    /// Exclusion rules for content that does not count toward offsets.
    pub not_annotatable: String,
    /// Overrides for the unselected default style. Unset fields keep the
    /// stock values.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<HighlightStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_style: Option<HighlightStyle>,
    /// Open the popup as soon as an annotation is created or selected.
    pub open_on_annotation: bool,
    /// Open the popup only on an explicit click on a highlight.
    pub open_click: bool,
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            not_annotatable: NOT_ANNOTATABLE_SELECTOR.to_string(),
            style: None,
            selected_style: None,
            open_on_annotation: true,
            open_click: false,
        }
    }
}

impl AnnotatorConfig {
    /// Parse and validate a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a `.json` config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if !is_json {
            return Err(ConfigError::UnsupportedFormat(path.to_path_buf()));
        }
        let contents = std::fs::read_to_string(path)?;
        tracing::debug!(target: "marginalia::config", path = %path.display(), "loaded config");
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.exclusion_rules().map(|_| ())
    }

    pub fn exclusion_rules(&self) -> Result<ExclusionRules, ConfigError> {
        ExclusionRules::parse(&self.not_annotatable)
    }

    /// The stock painter with this config's style overrides applied.
    pub fn default_painter(&self) -> DefaultPainter {
        let stock = DefaultPainter::default();
        DefaultPainter {
            style: match &self.style {
                Some(style) => style.clone().or(&stock.style),
                None => stock.style,
            },
            selected_style: match &self.selected_style {
                Some(style) => style.clone().or(&stock.selected_style),
                None => stock.selected_style,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;

    #[test]
    fn test_empty_object_is_default() {
        let config = AnnotatorConfig::from_json_str("{}").unwrap();
        assert_eq!(config, AnnotatorConfig::default());
        assert_eq!(config.exclusion_rules().unwrap(), ExclusionRules::default());
        assert_eq!(config.default_painter(), DefaultPainter::default());
    }

    #[test]
    fn test_style_overrides_merge_with_stock() {
        let config = AnnotatorConfig::from_json_str(
            r##"{
                "notAnnotatable": ".chrome, aside",
                "style": { "fill": "#ffd700" },
                "selectedStyle": { "underline": "red", "underlineWidth": 2 },
                "openClick": true
            }"##,
        )
        .unwrap();

        assert!(config.open_click);
        assert!(config.open_on_annotation);

        let painter = config.default_painter();
        assert_eq!(painter.style.fill, Some(Color::Rgba(0xFFD700FF)));
        assert_eq!(painter.style.fill_opacity, Some(0.18));
        assert_eq!(painter.selected_style.fill, Some(Color::HIGHLIGHT));
        assert_eq!(painter.selected_style.underline, Some(Color::Named("red".into())));
        assert_eq!(painter.selected_style.underline_width, Some(2.0));
    }

    #[test]
    fn test_bad_rule_is_rejected() {
        let err = AnnotatorConfig::from_json_str(r#"{"notAnnotatable": "div p"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRule { .. }));
    }

    #[test]
    fn test_bad_color_is_a_json_error() {
        let err = AnnotatorConfig::from_json_str(r##"{"style": {"fill": "#12"}}"##).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn test_from_file_requires_json() {
        let err = AnnotatorConfig::from_file("annotator.toml").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_from_file_reads_json() {
        let path = std::env::temp_dir().join(format!("marginalia-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"openOnAnnotation": false}"#).unwrap();
        let config = AnnotatorConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(!config.open_on_annotation);

        let missing = AnnotatorConfig::from_file(std::env::temp_dir().join("marginalia-missing.json"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }
}
