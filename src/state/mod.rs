pub(crate) mod doc_autosave;

use crate::models::{Document, NodeId};
use crate::outline::html::parse_document;
use crate::storage::load_document;
use crate::toolbar::ToolbarRegistry;
use leptos::prelude::*;

/// Where the caret last landed on the shared surface.
///
/// Updated on focus and deliberately kept across blurs: a toolbar button
/// press blurs the surface before its own handler runs, so "is the caret
/// inside an outline node" has to be answered from the last known location.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum EditLocation {
    Title(NodeId),
    BodyText(NodeId),
    TextBlock(NodeId),
}

impl EditLocation {
    pub fn inside_outline(&self) -> Option<NodeId> {
        match self {
            EditLocation::Title(id) | EditLocation::BodyText(id) => Some(*id),
            EditLocation::TextBlock(_) => None,
        }
    }
}

#[derive(Clone)]
pub(crate) struct AppState {
    /// The surface content. The component tree is a projection of this.
    pub document: RwSignal<Document>,
    pub doc_title: RwSignal<String>,
    pub editing: RwSignal<Option<EditLocation>>,

    /// Toolbar mounting points. Starts empty; the Toolbar component creates
    /// the slots on mount, and feature modules poll until then.
    pub toolbar: RwSignal<ToolbarRegistry>,
}

impl AppState {
    pub fn new() -> Self {
        let (document, doc_title) = match load_document() {
            Some(snap) => (parse_document(&snap.html), snap.title.unwrap_or_default()),
            None => (Document::seed(), String::new()),
        };
        // A corrupted snapshot may parse down to nothing; the surface always
        // needs at least one block to focus.
        let document = if document.blocks.is_empty() {
            Document::seed()
        } else {
            document
        };

        Self {
            document: RwSignal::new(document),
            doc_title: RwSignal::new(doc_title),
            editing: RwSignal::new(None),
            toolbar: RwSignal::new(ToolbarRegistry::default()),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub(crate) struct AppContext(pub AppState);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_location_outline_membership() {
        assert_eq!(EditLocation::Title(7).inside_outline(), Some(7));
        assert_eq!(EditLocation::BodyText(7).inside_outline(), Some(7));
        assert_eq!(EditLocation::TextBlock(7).inside_outline(), None);
    }
}
