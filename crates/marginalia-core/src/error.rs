//! Error types for marginalia.
//!
//! Anchoring problems are normally reported through logging and a degraded
//! range (see [`crate::anchor`]); these types exist for callers that want the
//! failure as a value, and for the configuration and tree-building layers.

use std::path::PathBuf;

use miette::Diagnostic;

use crate::tree::NodeId;

/// Which end of a range could not be placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    Start,
    End,
}

impl std::fmt::Display for Boundary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Boundary::Start => f.write_str("start"),
            Boundary::End => f.write_str("end"),
        }
    }
}

/// Reasons a stored selector could not be turned into a usable range.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum AnchorError {
    /// The scope has no annotatable text at all.
    #[error("could not revive annotation target: content missing")]
    #[diagnostic(
        code(marginalia::anchor::content_missing),
        help("the scope element contains no annotatable text nodes")
    )]
    ContentMissing,

    /// Neither the selector nor the caller supplied a scope element.
    #[error("no offset reference or container to anchor against")]
    #[diagnostic(code(marginalia::anchor::unresolvable_reference))]
    UnresolvableReference,

    /// The text ran out before a boundary could be placed.
    #[error("span {start}..{end} exceeds the annotatable text: {missing} not found")]
    #[diagnostic(
        code(marginalia::anchor::incomplete),
        help("the annotated content was probably removed or shortened")
    )]
    IncompleteRange {
        start: usize,
        end: usize,
        missing: Boundary,
    },

    /// `end` precedes `start`.
    #[error("invalid span: end {end} precedes start {start}")]
    #[diagnostic(code(marginalia::anchor::invalid_span))]
    InvalidSpan { start: usize, end: usize },
}

/// Configuration loading and parsing errors.
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum ConfigError {
    /// An exclusion rule string that the classifier cannot match with.
    #[error("invalid exclusion rule `{rule}`: {reason}")]
    #[diagnostic(
        code(marginalia::config::rule),
        help("supported forms: tag, .class, #id, [attr], [attr=value] and compounds, comma separated")
    )]
    InvalidRule { rule: String, reason: &'static str },

    /// A color string that is empty or malformed.
    #[error("invalid color `{0}`")]
    #[diagnostic(code(marginalia::config::color))]
    InvalidColor(String),

    /// The config file extension is not one we read.
    #[error("unsupported config format: {}", .0.display())]
    #[diagnostic(code(marginalia::config::format), help("use a .json file"))]
    UnsupportedFormat(PathBuf),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors from building or mutating the in-memory [`crate::Document`].
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum TreeError {
    #[error("unknown node {0:?}")]
    #[diagnostic(code(marginalia::tree::unknown_node))]
    UnknownNode(NodeId),

    #[error("node {0:?} cannot have children")]
    #[diagnostic(code(marginalia::tree::not_a_parent))]
    NotAParent(NodeId),

    /// Inserting would make a node its own ancestor, or detach the root.
    #[error("hierarchy request error: {0}")]
    #[diagnostic(code(marginalia::tree::hierarchy))]
    Hierarchy(&'static str),

    #[error("markup parse error: {0}")]
    #[diagnostic(code(marginalia::tree::parse))]
    Parse(#[from] roxmltree::Error),
}
