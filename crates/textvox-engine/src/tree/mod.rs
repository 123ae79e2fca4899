//! # Host tree abstraction
//!
//! The accessibility tree is owned and mutated by the host. This crate only
//! reads it, and it never holds on to node references: everything is
//! addressed by [`NodeId`] and re-resolved through [`AccessibilityTree`] on
//! every use. A node that no longer resolves surfaces as
//! [`EditError::StalePosition`].
//!
//! Nodes are a closed tagged union ([`NodeKind`]) carrying an eagerly
//! populated [`AttributeSnapshot`] and the line-start offsets the host's
//! layout already computed. [`memory::MemoryTree`] is an in-process host used
//! by tests and by embedders without a live accessibility layer.

pub mod attributes;
pub mod memory;

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;

use crate::editing::Selection;
use crate::error::EditError;
use crate::text::utf16_len;

pub use attributes::{AttributeSnapshot, Color, Marker, MarkerKind};
pub use memory::{ContainerBuilder, LeafBuilder, MemoryTree, Wrap};

/// Placeholder character contributed by embedded objects such as images.
pub const OBJECT_REPLACEMENT: char = '\u{FFFC}';

/// Stable identifier of a node in the host tree
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Single-line editable field
    TextField,
    /// Multi-line plain text editable
    TextArea,
    /// Rich editable region
    ContentEditable,
    Paragraph,
    Heading(u8),
    List,
    ListItem,
    Link,
    /// Generic inline wrapper (`<b>`, `<span>`...)
    Inline,
    Image,
}

impl Role {
    /// Block roles start a new line for their first leaf.
    pub fn is_block(&self) -> bool {
        matches!(
            self,
            Role::TextField
                | Role::TextArea
                | Role::ContentEditable
                | Role::Paragraph
                | Role::Heading(_)
                | Role::List
                | Role::ListItem
        )
    }

    pub fn is_editable_root(&self) -> bool {
        matches!(self, Role::TextField | Role::TextArea | Role::ContentEditable)
    }

    /// Spoken description of the role, if it has one worth announcing.
    pub fn label(&self) -> Option<Cow<'static, str>> {
        match self {
            Role::TextField => Some("Edit text".into()),
            Role::TextArea => Some("Text area".into()),
            Role::Heading(level) => Some(format!("Heading {level}").into()),
            Role::ListItem => Some("List item".into()),
            Role::Link => Some("Link".into()),
            Role::Image => Some("Image".into()),
            Role::ContentEditable | Role::Paragraph | Role::List | Role::Inline => None,
        }
    }

    /// Short braille tag appended after line text.
    pub fn braille_tag(&self) -> Option<Cow<'static, str>> {
        match self {
            Role::TextField => Some("ed".into()),
            Role::TextArea | Role::ContentEditable => Some("mled".into()),
            Role::Heading(level) => Some(format!("h{level}").into()),
            Role::ListItem => Some("lstitm".into()),
            Role::Link => Some("lnk".into()),
            Role::Image => Some("img".into()),
            Role::Paragraph | Role::List | Role::Inline => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Container(Role),
    Text(String),
    /// Contributes a single [`OBJECT_REPLACEMENT`] character to line text
    EmbeddedObject { name: String, role: Role },
    /// Hard break, contributes `"\n"`
    LineBreak,
}

/// One node as read from the host.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub attributes: AttributeSnapshot,
    /// Node-local offsets at which a visual line begins, ascending
    pub line_starts: Vec<usize>,
}

impl Node {
    pub fn is_leaf(&self) -> bool {
        !matches!(self.kind, NodeKind::Container(_))
    }

    /// Text this node contributes to a line.
    pub fn text(&self) -> Cow<'_, str> {
        match &self.kind {
            NodeKind::Container(_) => Cow::Borrowed(""),
            NodeKind::Text(text) => Cow::Borrowed(text),
            NodeKind::EmbeddedObject { .. } => Cow::Owned(OBJECT_REPLACEMENT.to_string()),
            NodeKind::LineBreak => Cow::Borrowed("\n"),
        }
    }

    /// Length in UTF-16 code units.
    pub fn text_len(&self) -> usize {
        match &self.kind {
            NodeKind::Container(_) => 0,
            NodeKind::Text(text) => utf16_len(text),
            NodeKind::EmbeddedObject { .. } | NodeKind::LineBreak => 1,
        }
    }

    pub fn role(&self) -> Option<Role> {
        match &self.kind {
            NodeKind::Container(role) | NodeKind::EmbeddedObject { role, .. } => Some(*role),
            NodeKind::Text(_) | NodeKind::LineBreak => None,
        }
    }

    pub fn is_line_break(&self) -> bool {
        matches!(self.kind, NodeKind::LineBreak)
    }
}

/// Read-only view of the host's accessibility tree, scoped to one editable root.
///
/// Implementors provide node lookup and the current selection; navigation is
/// derived from parent/child links. Leaves outside [`root`](Self::root) are
/// never visited.
pub trait AccessibilityTree {
    /// The editable root every position is scoped to.
    fn root(&self) -> NodeId;

    fn node(&self, id: NodeId) -> Option<&Node>;

    /// The host's authoritative selection, if it has one.
    fn selection(&self) -> Option<Selection>;

    fn resolve(&self, id: NodeId) -> Result<&Node, EditError> {
        self.node(id).ok_or(EditError::StalePosition(id))
    }

    fn first_leaf(&self, id: NodeId) -> Option<NodeId> {
        let node = self.node(id)?;
        if node.is_leaf() {
            return Some(id);
        }
        node.children.iter().find_map(|&child| self.first_leaf(child))
    }

    fn last_leaf(&self, id: NodeId) -> Option<NodeId> {
        let node = self.node(id)?;
        if node.is_leaf() {
            return Some(id);
        }
        node.children
            .iter()
            .rev()
            .find_map(|&child| self.last_leaf(child))
    }

    /// The leaf following `id` in tree order.
    fn next_leaf(&self, id: NodeId) -> Option<NodeId> {
        let root = self.root();
        let mut current = id;
        while current != root {
            let parent_id = self.node(current)?.parent?;
            let parent = self.node(parent_id)?;
            let index = parent.children.iter().position(|&c| c == current)?;
            if let Some(leaf) = parent.children[index + 1..]
                .iter()
                .find_map(|&sibling| self.first_leaf(sibling))
            {
                return Some(leaf);
            }
            current = parent_id;
        }
        None
    }

    /// The leaf preceding `id` in tree order.
    fn previous_leaf(&self, id: NodeId) -> Option<NodeId> {
        let root = self.root();
        let mut current = id;
        while current != root {
            let parent_id = self.node(current)?.parent?;
            let parent = self.node(parent_id)?;
            let index = parent.children.iter().position(|&c| c == current)?;
            if let Some(leaf) = parent.children[..index]
                .iter()
                .rev()
                .find_map(|&sibling| self.last_leaf(sibling))
            {
                return Some(leaf);
            }
            current = parent_id;
        }
        None
    }

    /// All leaves under the root in tree order.
    fn leaves(&self) -> Vec<NodeId> {
        let mut leaves = Vec::new();
        let mut current = self.first_leaf(self.root());
        while let Some(id) = current {
            leaves.push(id);
            current = self.next_leaf(id);
        }
        leaves
    }

    /// Nearest block-level container enclosing `id` (the root counts).
    fn block_of(&self, id: NodeId) -> Option<NodeId> {
        let root = self.root();
        let mut current = self.node(id)?.parent;
        while let Some(candidate) = current {
            let node = self.node(candidate)?;
            if candidate == root || node.role().is_some_and(|role| role.is_block()) {
                return Some(candidate);
            }
            current = node.parent;
        }
        None
    }

    /// Child indices leading from the root down to `id`.
    fn path_to(&self, id: NodeId) -> Result<Vec<usize>, EditError> {
        let root = self.root();
        let mut path = Vec::new();
        let mut current = id;
        while current != root {
            let parent_id = self
                .resolve(current)?
                .parent
                .ok_or(EditError::StalePosition(id))?;
            let index = self
                .resolve(parent_id)?
                .children
                .iter()
                .position(|&c| c == current)
                .ok_or(EditError::StalePosition(id))?;
            path.push(index);
            current = parent_id;
        }
        path.reverse();
        Ok(path)
    }

    /// Tree (document) order of two nodes; ancestors sort before descendants.
    fn compare_nodes(&self, a: NodeId, b: NodeId) -> Result<Ordering, EditError> {
        if a == b {
            return Ok(Ordering::Equal);
        }
        Ok(self.path_to(a)?.cmp(&self.path_to(b)?))
    }
}
