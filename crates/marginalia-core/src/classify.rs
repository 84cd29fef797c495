//! Annotatable-region classification.
//!
//! Content can opt out of annotation by carrying a structural marker, by
//! default the `not-annotatable` class. Anything inside a marked element is
//! invisible to offset counting, both when offsets are computed for a new
//! selection and when they are revived, so both sides must go through
//! [`ExclusionRules::is_excluded`].
//!
//! Rules are a small CSS-selector subset: `tag`, `*`, `.class`, `#id`,
//! `[attr]`, `[attr=value]` and compounds of these (`aside.note[data-x]`),
//! separated by commas. Combinators are not supported.

use std::fmt;
use std::str::FromStr;

use smol_str::SmolStr;

use crate::error::ConfigError;
use crate::tree::{DomTree, NodeKind};

pub const NOT_ANNOTATABLE_CLASS: &str = "not-annotatable";

pub const NOT_ANNOTATABLE_SELECTOR: &str = ".not-annotatable";

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttributeMatch {
    name: SmolStr,
    value: Option<String>,
}

/// One compound selector, e.g. `aside.note[data-x]`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct Compound {
    tag: Option<SmolStr>,
    id: Option<SmolStr>,
    classes: Vec<SmolStr>,
    attributes: Vec<AttributeMatch>,
}

impl Compound {
    fn matches<T: DomTree>(&self, tree: &T, element: &T::Node) -> bool {
        if let Some(tag) = &self.tag {
            match tree.tag_name(element) {
                Some(name) if name.eq_ignore_ascii_case(tag) => {}
                _ => return false,
            }
        }
        if let Some(id) = &self.id {
            if tree.attribute(element, "id").as_deref() != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let Some(class_attr) = tree.attribute(element, "class") else {
                return false;
            };
            let has_all = self
                .classes
                .iter()
                .all(|wanted| class_attr.split_whitespace().any(|c| c == wanted.as_str()));
            if !has_all {
                return false;
            }
        }
        self.attributes.iter().all(|attr| {
            match (tree.attribute(element, &attr.name), &attr.value) {
                (Some(_), None) => true,
                (Some(actual), Some(expected)) => actual == expected.as_str(),
                (None, _) => false,
            }
        })
    }
}

/// The predicate deciding which subtrees do not count toward offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionRules {
    source: String,
    compounds: Vec<Compound>,
}

impl Default for ExclusionRules {
    fn default() -> Self {
        Self {
            source: NOT_ANNOTATABLE_SELECTOR.to_string(),
            compounds: vec![Compound {
                classes: vec![SmolStr::new_static(NOT_ANNOTATABLE_CLASS)],
                ..Default::default()
            }],
        }
    }
}

impl fmt::Display for ExclusionRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for ExclusionRules {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl ExclusionRules {
    /// Rules that exclude nothing.
    pub fn none() -> Self {
        Self {
            source: String::new(),
            compounds: Vec::new(),
        }
    }

    /// Parse a comma-separated rule list.
    pub fn parse(source: &str) -> Result<Self, ConfigError> {
        let compounds = source
            .split(',')
            .map(|part| parse_compound(part.trim()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            source: source.trim().to_string(),
            compounds,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether `element` itself matches any rule. Non-elements never match.
    pub fn matches<T: DomTree>(&self, tree: &T, element: &T::Node) -> bool {
        tree.kind(element) == NodeKind::Element
            && self.compounds.iter().any(|c| c.matches(tree, element))
    }

    /// Nearest inclusive ancestor element matching a rule.
    ///
    /// Text and other non-element nodes start the lookup at their parent
    /// element. The lookup runs up to the top of the tree, not just the
    /// annotation scope.
    pub fn closest<T: DomTree>(&self, tree: &T, node: &T::Node) -> Option<T::Node> {
        if self.compounds.is_empty() {
            return None;
        }
        let mut current = match tree.kind(node) {
            NodeKind::Element => Some(node.clone()),
            _ => tree.parent_element(node),
        };
        while let Some(element) = current {
            if self.matches(tree, &element) {
                return Some(element);
            }
            current = tree.parent_element(&element);
        }
        None
    }

    /// Whether `node` lies in a non-annotatable subtree.
    pub fn is_excluded<T: DomTree>(&self, tree: &T, node: &T::Node) -> bool {
        self.closest(tree, node).is_some()
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

fn invalid(rule: &str, reason: &'static str) -> ConfigError {
    ConfigError::InvalidRule {
        rule: rule.to_string(),
        reason,
    }
}

fn take_ident<'s>(rule: &str, rest: &mut &'s str) -> Result<&'s str, ConfigError> {
    let end = rest.find(|c: char| !is_ident_char(c)).unwrap_or(rest.len());
    if end == 0 {
        return Err(invalid(rule, "expected an identifier"));
    }
    let (ident, tail) = rest.split_at(end);
    *rest = tail;
    Ok(ident)
}

fn parse_compound(rule: &str) -> Result<Compound, ConfigError> {
    if rule.is_empty() {
        return Err(invalid(rule, "empty rule"));
    }

    let mut compound = Compound::default();
    let mut rest = rule;

    if let Some(tail) = rest.strip_prefix('*') {
        rest = tail;
    } else if rest.starts_with(is_ident_char) {
        compound.tag = Some(SmolStr::new(take_ident(rule, &mut rest)?.to_ascii_lowercase()));
    }

    while let Some(marker) = rest.chars().next() {
        rest = &rest[marker.len_utf8()..];
        match marker {
            '.' => compound.classes.push(SmolStr::new(take_ident(rule, &mut rest)?)),
            '#' => {
                if compound.id.is_some() {
                    return Err(invalid(rule, "more than one id"));
                }
                compound.id = Some(SmolStr::new(take_ident(rule, &mut rest)?));
            }
            '[' => {
                let close = rest
                    .find(']')
                    .ok_or_else(|| invalid(rule, "unterminated attribute selector"))?;
                let body = &rest[..close];
                rest = &rest[close + 1..];
                compound.attributes.push(parse_attribute(rule, body)?);
            }
            c if c.is_whitespace() => {
                return Err(invalid(rule, "combinators are not supported"));
            }
            _ => return Err(invalid(rule, "unexpected character")),
        }
    }

    Ok(compound)
}

fn parse_attribute(rule: &str, body: &str) -> Result<AttributeMatch, ConfigError> {
    let (name, value) = match body.split_once('=') {
        Some((name, value)) => {
            let value = value.trim();
            let unquoted = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                .unwrap_or(value);
            (name.trim(), Some(unquoted.to_string()))
        }
        None => (body.trim(), None),
    };
    if name.is_empty() || !name.chars().all(is_ident_char) {
        return Err(invalid(rule, "bad attribute name"));
    }
    Ok(AttributeMatch {
        name: SmolStr::new(name),
        value,
    })
}
