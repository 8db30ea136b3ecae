pub(crate) mod html;

use crate::models::{Block, Body, Document, NodeId, OutlineNode, TextBlock};

/// Where the caret should land inside the focused element.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Caret {
    Start,
    End,
}

/// Focus request produced by an operation. The component layer resolves it
/// to a real element one tick after the re-render and re-checks the element
/// still exists before focusing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FocusTarget {
    Title(NodeId, Caret),
    BodyText(NodeId, Caret),
    TextBlock(NodeId, Caret),
}

/// The only user-visible rejection in the editor. Surfaced as a transient
/// shake animation, never as an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Rejection {
    MultilineBody,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct EditOutcome {
    pub changed: bool,
    pub focus: Option<FocusTarget>,
    pub rejected: Option<Rejection>,
}

impl EditOutcome {
    pub fn unchanged() -> Self {
        Self::default()
    }

    pub fn focus_only(focus: FocusTarget) -> Self {
        Self {
            changed: false,
            focus: Some(focus),
            rejected: None,
        }
    }

    pub fn changed(focus: Option<FocusTarget>) -> Self {
        Self {
            changed: true,
            focus,
            rejected: None,
        }
    }

    pub fn rejected(rejection: Rejection) -> Self {
        Self {
            changed: false,
            focus: None,
            rejected: Some(rejection),
        }
    }
}

/// Position of a node relative to its owning sibling list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Location {
    /// Index into `Document::blocks`.
    Top(usize),
    /// Index into the child list of `parent`.
    Child { parent: NodeId, index: usize },
}

pub(crate) fn find_node<'a>(doc: &'a Document, id: NodeId) -> Option<&'a OutlineNode> {
    for block in &doc.blocks {
        if let Block::Outline(node) = block {
            if let Some(found) = find_in(node, id) {
                return Some(found);
            }
        }
    }
    None
}

fn find_in<'a>(node: &'a OutlineNode, id: NodeId) -> Option<&'a OutlineNode> {
    if node.id == id {
        return Some(node);
    }
    node.children()?.iter().find_map(|kid| find_in(kid, id))
}

pub(crate) fn find_node_mut<'a>(doc: &'a mut Document, id: NodeId) -> Option<&'a mut OutlineNode> {
    for block in &mut doc.blocks {
        if let Block::Outline(node) = block {
            if let Some(found) = find_in_mut(node, id) {
                return Some(found);
            }
        }
    }
    None
}

fn find_in_mut<'a>(node: &'a mut OutlineNode, id: NodeId) -> Option<&'a mut OutlineNode> {
    if node.id == id {
        return Some(node);
    }
    match &mut node.body {
        Body::Children(kids) => kids.iter_mut().find_map(|kid| find_in_mut(kid, id)),
        Body::Text(_) => None,
    }
}

fn subtree_contains(node: &OutlineNode, id: NodeId) -> bool {
    find_in(node, id).is_some()
}

fn locate(doc: &Document, id: NodeId) -> Option<Location> {
    for (i, block) in doc.blocks.iter().enumerate() {
        if let Block::Outline(node) = block {
            if node.id == id {
                return Some(Location::Top(i));
            }
            if let Some(loc) = locate_in(node, id) {
                return Some(loc);
            }
        }
    }
    None
}

fn locate_in(node: &OutlineNode, id: NodeId) -> Option<Location> {
    let kids = node.children()?;
    for (i, kid) in kids.iter().enumerate() {
        if kid.id == id {
            return Some(Location::Child {
                parent: node.id,
                index: i,
            });
        }
        if let Some(loc) = locate_in(kid, id) {
            return Some(loc);
        }
    }
    None
}

/// Detach a node from its owning list. A child list emptied by the removal
/// collapses back to a blank free-text body.
fn remove_at(doc: &mut Document, loc: Location) -> Option<OutlineNode> {
    match loc {
        Location::Top(i) => {
            if !matches!(doc.blocks.get(i), Some(Block::Outline(_))) {
                return None;
            }
            match doc.blocks.remove(i) {
                Block::Outline(node) => Some(node),
                Block::Text(_) => None,
            }
        }
        Location::Child { parent, index } => {
            let parent = find_node_mut(doc, parent)?;
            let Body::Children(kids) = &mut parent.body else {
                return None;
            };
            if index >= kids.len() {
                return None;
            }
            let node = kids.remove(index);
            if kids.is_empty() {
                parent.body = Body::Text(String::new());
            }
            Some(node)
        }
    }
}

fn set_subtree_level(node: &mut OutlineNode, level: u8) {
    node.level = level;
    if let Body::Children(kids) = &mut node.body {
        for kid in kids {
            set_subtree_level(kid, level + 1);
        }
    }
}

fn block_id(block: &Block) -> NodeId {
    match block {
        Block::Text(t) => t.id,
        Block::Outline(n) => n.id,
    }
}

/// Toolbar activation with the caret outside any outline node: insert a new
/// empty level-0 toggle after the given block (or at the end of the surface)
/// and focus its title.
pub(crate) fn insert_toggle(doc: &mut Document, after: Option<NodeId>) -> EditOutcome {
    let node = OutlineNode::new(0);
    let node_id = node.id;

    let index = after
        .and_then(|id| doc.blocks.iter().position(|b| block_id(b) == id))
        .map(|i| i + 1)
        .unwrap_or(doc.blocks.len());

    doc.blocks.insert(index, Block::Outline(node));
    EditOutcome::changed(Some(FocusTarget::Title(node_id, Caret::Start)))
}

/// Toolbar activation with the caret inside an outline node (also Enter in
/// an empty body): leave the outline. Focus the plain-text block following
/// the outermost ancestor, creating one when the next block is not text.
pub(crate) fn exit_outline(doc: &mut Document, inner: NodeId) -> EditOutcome {
    let Some(outer) = doc
        .blocks
        .iter()
        .position(|b| matches!(b, Block::Outline(n) if subtree_contains(n, inner)))
    else {
        return EditOutcome::unchanged();
    };

    if let Some(Block::Text(next)) = doc.blocks.get(outer + 1) {
        return EditOutcome::focus_only(FocusTarget::TextBlock(next.id, Caret::End));
    }

    let text = TextBlock::empty();
    let text_id = text.id;
    doc.blocks.insert(outer + 1, Block::Text(text));
    EditOutcome::changed(Some(FocusTarget::TextBlock(text_id, Caret::Start)))
}

/// Expand/collapse affordance: flips the visibility flag on this node's body
/// container only, children untouched.
pub(crate) fn toggle_expanded(doc: &mut Document, id: NodeId) -> EditOutcome {
    let Some(node) = find_node_mut(doc, id) else {
        return EditOutcome::unchanged();
    };
    node.expanded = !node.expanded;
    EditOutcome::changed(None)
}

/// Add-child control: capture the node's free-text body (capitalized) as the
/// title of a new nested child, replacing the body atomically.
///
/// A node at MAX_LEVEL renders the control disabled, so the op is a plain
/// no-op there. A body containing a line break is rejected (shake), and a
/// body that already holds a child list is left alone so rapid repeated
/// clicks cannot stack children.
pub(crate) fn add_child(doc: &mut Document, id: NodeId) -> EditOutcome {
    let Some(node) = find_node_mut(doc, id) else {
        return EditOutcome::unchanged();
    };
    if !node.can_add_child() {
        return EditOutcome::unchanged();
    }

    let Body::Text(text) = &node.body else {
        return EditOutcome::unchanged();
    };
    if text.contains('\n') {
        return EditOutcome::rejected(Rejection::MultilineBody);
    }

    let child = OutlineNode::with_title(node.level + 1, capitalize_first(text));
    let child_id = child.id;
    node.body = Body::Children(vec![child]);
    node.expanded = true;
    EditOutcome::changed(Some(FocusTarget::Title(child_id, Caret::End)))
}

/// Backspace in an empty free-text body: hop the caret back to the title.
pub(crate) fn body_backspace_empty(doc: &mut Document, id: NodeId) -> EditOutcome {
    let Some(node) = find_node(doc, id) else {
        return EditOutcome::unchanged();
    };
    match node.body_text() {
        Some(text) if text.is_empty() => {
            EditOutcome::focus_only(FocusTarget::Title(id, Caret::End))
        }
        _ => EditOutcome::unchanged(),
    }
}

/// Enter in an empty free-text body: leave the outline, same as the toolbar
/// exit scoped to this node.
pub(crate) fn body_enter_empty(doc: &mut Document, id: NodeId) -> EditOutcome {
    let body_is_empty = matches!(find_node(doc, id).and_then(|n| n.body_text()), Some(""));
    if !body_is_empty {
        return EditOutcome::unchanged();
    }
    exit_outline(doc, id)
}

/// Backspace in an empty title.
///
/// - nested sole sibling: collapse the parent's body back to blank free text
///   and focus it
/// - nested with siblings: remove this node, no explicit refocus
/// - top level: remove the block and focus the previous sibling, seeding a
///   fresh paragraph when nothing precedes it
pub(crate) fn title_backspace_empty(doc: &mut Document, id: NodeId) -> EditOutcome {
    let Some(node) = find_node(doc, id) else {
        return EditOutcome::unchanged();
    };
    if !node.title.is_empty() {
        return EditOutcome::unchanged();
    }

    let Some(loc) = locate(doc, id) else {
        return EditOutcome::unchanged();
    };

    match loc {
        Location::Top(i) => {
            doc.blocks.remove(i);
            if i > 0 {
                let focus = match &doc.blocks[i - 1] {
                    Block::Outline(prev) => FocusTarget::Title(prev.id, Caret::End),
                    Block::Text(prev) => FocusTarget::TextBlock(prev.id, Caret::End),
                };
                EditOutcome::changed(Some(focus))
            } else {
                let text = TextBlock::empty();
                let text_id = text.id;
                doc.blocks.insert(0, Block::Text(text));
                EditOutcome::changed(Some(FocusTarget::TextBlock(text_id, Caret::Start)))
            }
        }
        Location::Child { parent, index } => {
            let Some(parent_node) = find_node_mut(doc, parent) else {
                return EditOutcome::unchanged();
            };
            let Body::Children(kids) = &mut parent_node.body else {
                return EditOutcome::unchanged();
            };
            if kids.len() == 1 {
                parent_node.body = Body::Text(String::new());
                EditOutcome::changed(Some(FocusTarget::BodyText(parent, Caret::Start)))
            } else {
                kids.remove(index);
                EditOutcome::changed(None)
            }
        }
    }
}

/// Enter in a title.
///
/// - non-empty title: open an empty sibling right after this node
/// - empty title, nested: promote one level (re-parent next to the current
///   parent, subtree levels shifted down)
/// - empty title, top level: the node degrades to a plain paragraph in place
pub(crate) fn title_enter(doc: &mut Document, id: NodeId) -> EditOutcome {
    let Some(node) = find_node(doc, id) else {
        return EditOutcome::unchanged();
    };

    if !node.title.is_empty() {
        return insert_sibling_after(doc, id);
    }

    let Some(loc) = locate(doc, id) else {
        return EditOutcome::unchanged();
    };

    match loc {
        Location::Top(i) => {
            // Level 0: convert to a paragraph at the same position. A node
            // with an empty title but a populated child list stays put.
            let Some(Block::Outline(node)) = doc.blocks.get(i) else {
                return EditOutcome::unchanged();
            };
            let Some(text) = node.body_text() else {
                leptos::logging::warn!("title_enter: refusing to drop a child list");
                return EditOutcome::unchanged();
            };
            let block = TextBlock::with_html(html::escape_text(text));
            let block_id = block.id;
            doc.blocks[i] = Block::Text(block);
            EditOutcome::changed(Some(FocusTarget::TextBlock(block_id, Caret::Start)))
        }
        Location::Child { parent, .. } => promote(doc, id, parent, loc),
    }
}

fn insert_sibling_after(doc: &mut Document, id: NodeId) -> EditOutcome {
    let Some(loc) = locate(doc, id) else {
        return EditOutcome::unchanged();
    };
    match loc {
        Location::Top(i) => {
            let sibling = OutlineNode::new(0);
            let sibling_id = sibling.id;
            doc.blocks.insert(i + 1, Block::Outline(sibling));
            EditOutcome::changed(Some(FocusTarget::Title(sibling_id, Caret::Start)))
        }
        Location::Child { parent, index } => {
            let Some(parent_node) = find_node_mut(doc, parent) else {
                return EditOutcome::unchanged();
            };
            let level = parent_node.level + 1;
            let Body::Children(kids) = &mut parent_node.body else {
                return EditOutcome::unchanged();
            };
            let sibling = OutlineNode::new(level);
            let sibling_id = sibling.id;
            kids.insert(index + 1, sibling);
            EditOutcome::changed(Some(FocusTarget::Title(sibling_id, Caret::Start)))
        }
    }
}

fn promote(doc: &mut Document, id: NodeId, parent: NodeId, loc: Location) -> EditOutcome {
    // Where the parent itself lives; computed before the removal so the
    // insertion index is still valid afterwards.
    let Some(parent_loc) = locate(doc, parent) else {
        return EditOutcome::unchanged();
    };
    let Some(parent_level) = find_node(doc, parent).map(|p| p.level) else {
        return EditOutcome::unchanged();
    };

    let Some(mut node) = remove_at(doc, loc) else {
        return EditOutcome::unchanged();
    };
    set_subtree_level(&mut node, parent_level);

    match parent_loc {
        Location::Top(i) => {
            doc.blocks.insert(i + 1, Block::Outline(node));
        }
        Location::Child {
            parent: grandparent,
            index,
        } => {
            let Some(gp) = find_node_mut(doc, grandparent) else {
                return EditOutcome::unchanged();
            };
            let Body::Children(kids) = &mut gp.body else {
                return EditOutcome::unchanged();
            };
            kids.insert(index + 1, node);
        }
    }

    EditOutcome::changed(Some(FocusTarget::Title(id, Caret::End)))
}

/// Input normalization for a title: whitespace-only content (including
/// zero-width markers) clears to truly empty; a single lowercase letter is
/// uppercased, with the caret restored after the surface re-renders.
pub(crate) fn apply_title_input(doc: &mut Document, id: NodeId, raw: &str) -> EditOutcome {
    let Some(node) = find_node_mut(doc, id) else {
        return EditOutcome::unchanged();
    };

    let mut next = raw.to_string();
    let mut focus = None;

    if !next.is_empty() && is_blank(&next) {
        next.clear();
    } else if let Some(upper) = uppercase_single_letter(&next) {
        next = upper;
        focus = Some(FocusTarget::Title(id, Caret::End));
    }

    if node.title == next && focus.is_none() {
        return EditOutcome::unchanged();
    }
    node.title = next;
    EditOutcome::changed(focus)
}

/// Input normalization for a free-text body: whitespace-only clears to empty.
pub(crate) fn apply_body_input(doc: &mut Document, id: NodeId, raw: &str) -> EditOutcome {
    let Some(node) = find_node_mut(doc, id) else {
        return EditOutcome::unchanged();
    };
    let Body::Text(text) = &mut node.body else {
        leptos::logging::warn!("body input for node {} with a child list", id);
        return EditOutcome::unchanged();
    };

    let mut next = raw.to_string();
    if !next.is_empty() && is_blank(&next) {
        next.clear();
    }

    if *text == next {
        return EditOutcome::unchanged();
    }
    *text = next;
    EditOutcome::changed(None)
}

/// Keep a paragraph's rich content in sync with its contenteditable element.
pub(crate) fn set_text_block_html(doc: &mut Document, id: NodeId, html: &str) -> EditOutcome {
    for block in &mut doc.blocks {
        if let Block::Text(text) = block {
            if text.id == id {
                if text.html == html {
                    return EditOutcome::unchanged();
                }
                text.html = html.to_string();
                return EditOutcome::changed(None);
            }
        }
    }
    EditOutcome::unchanged()
}

/// Whitespace-only, counting the zero-width characters contenteditable
/// surfaces tend to leave behind.
pub(crate) fn is_blank(s: &str) -> bool {
    s.chars()
        .all(|c| c.is_whitespace() || matches!(c, '\u{200B}' | '\u{FEFF}'))
}

pub(crate) fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn uppercase_single_letter(s: &str) -> Option<String> {
    let mut chars = s.chars();
    let first = chars.next()?;
    if chars.next().is_none() && first.is_ascii_lowercase() {
        Some(first.to_ascii_uppercase().to_string())
    } else {
        None
    }
}
