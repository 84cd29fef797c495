//! Which annotations are selected, and how they got that way.
//!
//! The selection is owned by the host's store; the annotator keeps a copy to
//! pick painter styles, and the popup layer uses [`SelectionState::key`] and
//! [`SelectionState::same_ids`] to decide when to reopen or reset position.

use smol_str::SmolStr;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SelectedAnnotation {
    pub id: SmolStr,
    #[serde(default)]
    pub editable: bool,
}

impl SelectedAnnotation {
    pub fn new(id: impl Into<SmolStr>) -> Self {
        Self {
            id: id.into(),
            editable: false,
        }
    }

    pub fn editable(id: impl Into<SmolStr>) -> Self {
        Self {
            id: id.into(),
            editable: true,
        }
    }
}

/// What produced a selection change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionEventKind {
    Pointer,
    Keyboard,
    Programmatic,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionState {
    selected: Vec<SelectedAnnotation>,
    event: Option<SelectionEventKind>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the selection. Repeated ids keep their first entry.
    ///
    /// Returns whether the set of selected ids changed.
    pub fn select(
        &mut self,
        selected: impl IntoIterator<Item = SelectedAnnotation>,
        event: SelectionEventKind,
    ) -> bool {
        let mut next: Vec<SelectedAnnotation> = Vec::new();
        for entry in selected {
            if !next.iter().any(|s| s.id == entry.id) {
                next.push(entry);
            }
        }
        let previous = std::mem::replace(&mut self.selected, next);
        self.event = Some(event);
        !same_id_set(&previous, &self.selected)
    }

    /// Drop the selection, the "cancel" transition.
    pub fn clear(&mut self, event: SelectionEventKind) -> bool {
        self.select(std::iter::empty(), event)
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.iter().any(|s| s.id.as_str() == id)
    }

    pub fn is_editable(&self, id: &str) -> bool {
        self.selected.iter().any(|s| s.id.as_str() == id && s.editable)
    }

    pub fn selected(&self) -> &[SelectedAnnotation] {
        &self.selected
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.selected.iter().map(|s| s.id.as_str())
    }

    pub fn event(&self) -> Option<SelectionEventKind> {
        self.event
    }

    /// Ids joined with `-`, identifying one popup instance.
    pub fn key(&self) -> String {
        self.ids().collect::<Vec<_>>().join("-")
    }

    /// Same ids regardless of order or editability.
    pub fn same_ids(&self, other: &SelectionState) -> bool {
        same_id_set(&self.selected, &other.selected)
    }
}

fn same_id_set(a: &[SelectedAnnotation], b: &[SelectedAnnotation]) -> bool {
    a.len() == b.len() && a.iter().all(|x| b.iter().any(|y| x.id == y.id))
}
