use std::sync::atomic::{AtomicU64, Ordering};

/// Maximum nesting depth of toggle blocks. A node at this level renders its
/// add-child control disabled.
pub(crate) const MAX_LEVEL: u8 = 3;

/// Transient node handle, valid for the lifetime of the page.
///
/// Ids exist only so events and deferred focus can address nodes; they are
/// never persisted. Serialization carries structure only, and parsing
/// allocates fresh ids.
pub(crate) type NodeId = u64;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn alloc_node_id() -> NodeId {
    NEXT_NODE_ID.fetch_add(1, Ordering::SeqCst)
}

/// The editable surface: an ordered list of top-level blocks.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Document {
    pub blocks: Vec<Block>,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Block {
    Text(TextBlock),
    Outline(OutlineNode),
}

/// A plain paragraph. `html` is rich inline content produced either by our
/// own serializer or by the native formatting commands, never by foreign
/// input, so it is safe to project via inner_html.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct TextBlock {
    pub id: NodeId,
    pub html: String,
}

impl TextBlock {
    pub fn empty() -> Self {
        Self {
            id: alloc_node_id(),
            html: String::new(),
        }
    }

    pub fn with_html(html: String) -> Self {
        Self {
            id: alloc_node_id(),
            html,
        }
    }
}

/// One collapsible toggle block: a single-line title plus a body that holds
/// either free text or a nested sibling list, never both.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct OutlineNode {
    pub id: NodeId,
    pub level: u8,
    pub title: String,
    pub expanded: bool,
    pub body: Body,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Body {
    Text(String),
    /// Non-empty by invariant; an emptied list collapses back to `Text("")`.
    Children(Vec<OutlineNode>),
}

impl OutlineNode {
    pub fn new(level: u8) -> Self {
        Self {
            id: alloc_node_id(),
            level,
            title: String::new(),
            expanded: true,
            body: Body::Text(String::new()),
        }
    }

    pub fn with_title(level: u8, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::new(level)
        }
    }

    pub fn can_add_child(&self) -> bool {
        self.level < MAX_LEVEL
    }

    pub fn body_text(&self) -> Option<&str> {
        match &self.body {
            Body::Text(t) => Some(t.as_str()),
            Body::Children(_) => None,
        }
    }

    pub fn children(&self) -> Option<&[OutlineNode]> {
        match &self.body {
            Body::Children(kids) => Some(kids.as_slice()),
            Body::Text(_) => None,
        }
    }
}

impl Document {
    /// A document that a freshly opened page starts from: one empty paragraph.
    pub fn seed() -> Self {
        Self {
            blocks: vec![Block::Text(TextBlock::empty())],
        }
    }

    /// Verify the structural invariants every operation must preserve:
    /// - a `Children` body is never empty,
    /// - a child's level is exactly its parent's plus one,
    /// - top-level outline blocks are level 0,
    /// - no node exceeds `MAX_LEVEL`.
    pub fn check_invariants(&self) -> Result<(), String> {
        for block in &self.blocks {
            if let Block::Outline(node) = block {
                if node.level != 0 {
                    return Err(format!("top-level node {} has level {}", node.id, node.level));
                }
                check_node(node)?;
            }
        }
        Ok(())
    }

    /// Clone with all ids zeroed, for structural comparison across a
    /// serialize/parse round trip.
    pub fn without_ids(&self) -> Document {
        let mut doc = self.clone();
        for block in &mut doc.blocks {
            match block {
                Block::Text(t) => t.id = 0,
                Block::Outline(n) => strip_ids(n),
            }
        }
        doc
    }
}

fn check_node(node: &OutlineNode) -> Result<(), String> {
    if node.level > MAX_LEVEL {
        return Err(format!("node {} exceeds MAX_LEVEL: {}", node.id, node.level));
    }
    if let Body::Children(kids) = &node.body {
        if kids.is_empty() {
            return Err(format!("node {} has an empty child list", node.id));
        }
        for kid in kids {
            if kid.level != node.level + 1 {
                return Err(format!(
                    "node {} at level {} has child {} at level {}",
                    node.id, node.level, kid.id, kid.level
                ));
            }
            check_node(kid)?;
        }
    }
    Ok(())
}

fn strip_ids(node: &mut OutlineNode) {
    node.id = 0;
    if let Body::Children(kids) = &mut node.body {
        for kid in kids {
            strip_ids(kid);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_ids_are_unique() {
        let a = OutlineNode::new(0);
        let b = OutlineNode::new(0);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_can_add_child_respects_max_level() {
        assert!(OutlineNode::new(0).can_add_child());
        assert!(OutlineNode::new(MAX_LEVEL - 1).can_add_child());
        assert!(!OutlineNode::new(MAX_LEVEL).can_add_child());
    }

    #[test]
    fn test_invariants_reject_empty_child_list() {
        let mut node = OutlineNode::new(0);
        node.body = Body::Children(vec![]);
        let doc = Document {
            blocks: vec![Block::Outline(node)],
        };
        assert!(doc.check_invariants().is_err());
    }

    #[test]
    fn test_invariants_reject_level_gap() {
        let mut parent = OutlineNode::new(0);
        parent.body = Body::Children(vec![OutlineNode::new(2)]);
        let doc = Document {
            blocks: vec![Block::Outline(parent)],
        };
        assert!(doc.check_invariants().is_err());
    }

    #[test]
    fn test_without_ids_compares_structure() {
        let mut a = OutlineNode::with_title(0, "Root");
        a.body = Body::Children(vec![OutlineNode::with_title(1, "Kid")]);
        let mut b = OutlineNode::with_title(0, "Root");
        b.body = Body::Children(vec![OutlineNode::with_title(1, "Kid")]);

        let da = Document {
            blocks: vec![Block::Outline(a)],
        };
        let db = Document {
            blocks: vec![Block::Outline(b)],
        };
        assert_ne!(da, db);
        assert_eq!(da.without_ids(), db.without_ids());
    }
}
