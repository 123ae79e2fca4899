//! In-memory host tree.
//!
//! Stands in for a live accessibility layer: it owns the nodes, lays out line
//! starts the way a host would expose them, and applies edits so the engine
//! can be driven end to end.

use std::collections::HashMap;

use log::{debug, trace};
use unicode_segmentation::UnicodeSegmentation;

use crate::editing::{CommandOutcome, PositionRef, Selection};
use crate::error::EditError;
use crate::text::{self, DocumentText};
use crate::tree::{AccessibilityTree, AttributeSnapshot, Color, Marker, MarkerKind, Node, NodeId, NodeKind, Role};

/// Soft-wrap policy for one leaf.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Wrap {
    #[default]
    None,
    /// Every word starts a new visual line
    EachWord,
    /// Wrap at explicit node-local offsets
    At(Vec<usize>),
}

#[derive(Debug, Clone)]
pub struct MemoryTree {
    /// Indexed by `NodeId`; removed nodes leave a hole so ids are never reused
    nodes: Vec<Option<Node>>,
    wraps: HashMap<NodeId, Wrap>,
    root: NodeId,
    selection: Option<Selection>,
}

impl AccessibilityTree for MemoryTree {
    fn root(&self) -> NodeId {
        self.root
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(usize::try_from(id.0).ok()?)?.as_ref()
    }

    fn selection(&self) -> Option<Selection> {
        self.selection.clone()
    }
}

impl MemoryTree {
    /// Build a tree under an editable root of the given role.
    pub fn build(role: Role, f: impl FnOnce(&mut ContainerBuilder<'_>)) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            wraps: HashMap::new(),
            root: NodeId(0),
            selection: None,
        };
        let style = AttributeSnapshot::default();
        let root = tree.push(None, NodeKind::Container(role), style.clone());
        tree.root = root;
        let mut builder = ContainerBuilder {
            tree: &mut tree,
            id: root,
            style,
        };
        f(&mut builder);
        tree.relayout();
        tree
    }

    fn push(&mut self, parent: Option<NodeId>, kind: NodeKind, attributes: AttributeSnapshot) -> NodeId {
        let id = NodeId(self.nodes.len() as u64);
        self.nodes.push(Some(Node {
            kind,
            parent,
            children: Vec::new(),
            attributes,
            line_starts: Vec::new(),
        }));
        if let Some(parent) = parent.and_then(|p| self.node_mut(p)) {
            parent.children.push(id);
        }
        id
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(usize::try_from(id.0).ok()?)?.as_mut()
    }

    fn resolve_mut(&mut self, id: NodeId) -> Result<&mut Node, EditError> {
        self.node_mut(id).ok_or(EditError::StalePosition(id))
    }

    /// Change a node's attributes in place.
    pub fn update_attributes(
        &mut self,
        id: NodeId,
        f: impl FnOnce(&mut AttributeSnapshot),
    ) -> Result<(), EditError> {
        f(&mut self.resolve_mut(id)?.attributes);
        Ok(())
    }

    pub fn set_wrap(&mut self, id: NodeId, wrap: Wrap) -> Result<(), EditError> {
        self.resolve(id)?;
        self.wraps.insert(id, wrap);
        self.relayout();
        Ok(())
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = Some(selection);
    }

    /// Replace the text of a text leaf. A selection inside it is clamped.
    pub fn set_text(&mut self, id: NodeId, text: &str) -> Result<(), EditError> {
        match &mut self.resolve_mut(id)?.kind {
            NodeKind::Text(existing) => *existing = text.to_string(),
            _ => return Err(EditError::NoTextLeaf(id)),
        }
        let len = text::utf16_len(text);
        if let Some(selection) = &mut self.selection {
            for position in [&mut selection.anchor, &mut selection.focus] {
                if position.node == id {
                    position.offset = position.offset.min(len);
                }
            }
        }
        self.relayout();
        Ok(())
    }

    /// Type `text` at `at`, leaving the caret after it.
    pub fn insert_text(&mut self, at: &PositionRef, text: &str) -> Result<PositionRef, EditError> {
        let at = at.normalize(&*self)?;
        match &mut self.resolve_mut(at.node)?.kind {
            NodeKind::Text(existing) => {
                let byte = text::byte_index(existing, at.offset);
                existing.insert_str(byte, text);
            }
            _ => return Err(EditError::NoTextLeaf(at.node)),
        }
        self.relayout();
        let caret = PositionRef::new(at.node, at.offset + text::utf16_len(text));
        self.selection = Some(Selection::collapsed(caret.clone()));
        Ok(caret)
    }

    /// Delete everything between two positions, merging blocks when the range
    /// crosses a block boundary. Returns the collapsed caret.
    pub fn delete_range(&mut self, start: &PositionRef, end: &PositionRef) -> Result<PositionRef, EditError> {
        let (start, end) = {
            let a = start.normalize(&*self)?;
            let b = end.normalize(&*self)?;
            if PositionRef::compare(&*self, &a, &b)?.is_gt() {
                (b, a)
            } else {
                (a, b)
            }
        };
        let caret_offset = DocumentText::new(&*self).offset_of(&start)?;

        let mut leaves = vec![start.node];
        let mut current = start.node;
        while current != end.node {
            current = self.next_leaf(current).ok_or(EditError::StalePosition(end.node))?;
            leaves.push(current);
        }

        let start_block = self.block_of(start.node);
        let end_block = self.block_of(end.node);
        if let (Some(into), Some(from)) = (start_block, end_block)
            && into != from
            && !self.is_ancestor(into, from)
            && !self.is_ancestor(from, into)
        {
            self.merge_blocks(into, from)?;
        }

        let mut emptied = Vec::new();
        for &leaf in &leaves {
            let len = self.resolve(leaf)?.text_len();
            let from = if leaf == start.node { start.offset } else { 0 };
            let to = if leaf == end.node { end.offset } else { len };
            let inner = leaf != start.node && leaf != end.node;
            if !inner && from >= to {
                continue;
            }
            match &mut self.resolve_mut(leaf)?.kind {
                NodeKind::Text(existing) if !inner => {
                    let range = text::byte_index(existing, from)..text::byte_index(existing, to);
                    existing.replace_range(range, "");
                    if existing.is_empty() {
                        emptied.push(leaf);
                    }
                    continue;
                }
                _ => {}
            }
            self.detach(leaf)?;
        }
        for leaf in emptied {
            let Some(block) = self.block_of(leaf) else { continue };
            if self.leaves_under(block).len() > 1 {
                self.detach(leaf)?;
            }
        }
        self.prune_empty_containers();
        self.relayout();

        let caret = DocumentText::new(&*self).position_at(caret_offset)?;
        debug!("deleted range, caret now at {caret:?}");
        self.selection = Some(Selection::collapsed(caret.clone()));
        Ok(caret)
    }

    /// Remove a node and its subtree. The host selection is left untouched.
    pub fn remove(&mut self, id: NodeId) -> Result<(), EditError> {
        self.detach(id)?;
        self.prune_empty_containers();
        self.relayout();
        Ok(())
    }

    /// Apply a translated command the way a host editor would.
    pub fn apply(&mut self, outcome: &CommandOutcome) -> Result<Selection, EditError> {
        match outcome {
            CommandOutcome::Select(selection) => self.set_selection(selection.clone()),
            CommandOutcome::Delete { start, end, .. } => {
                self.delete_range(start, end)?;
            }
            CommandOutcome::Unchanged => {}
        }
        self.selection.clone().ok_or(EditError::NoSelection)
    }

    /// First occurrence of `needle` inside a single text leaf.
    pub fn find_text(&self, needle: &str) -> Option<PositionRef> {
        self.leaves().into_iter().find_map(|id| match &self.node(id)?.kind {
            NodeKind::Text(text) => text
                .find(needle)
                .map(|byte| PositionRef::new(id, text::utf16_index(text, byte))),
            _ => None,
        })
    }

    fn leaves_under(&self, id: NodeId) -> Vec<NodeId> {
        let Some(node) = self.node(id) else {
            return Vec::new();
        };
        if node.is_leaf() {
            return vec![id];
        }
        node.children
            .iter()
            .flat_map(|&child| self.leaves_under(child))
            .collect()
    }

    fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = self.node(id).and_then(|n| n.parent);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.node(parent).and_then(|n| n.parent);
        }
        false
    }

    fn merge_blocks(&mut self, into: NodeId, from: NodeId) -> Result<(), EditError> {
        let children = std::mem::take(&mut self.resolve_mut(from)?.children);
        for &child in &children {
            self.resolve_mut(child)?.parent = Some(into);
        }
        self.resolve_mut(into)?.children.extend(children);
        trace!("merged block {from} into {into}");
        self.detach(from)
    }

    /// Unlink `id` from its parent and drop its subtree.
    fn detach(&mut self, id: NodeId) -> Result<(), EditError> {
        if let Some(parent) = self.resolve(id)?.parent {
            self.resolve_mut(parent)?.children.retain(|&c| c != id);
        }
        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            if let Some(slot) = usize::try_from(next.0).ok().and_then(|i| self.nodes.get_mut(i))
                && let Some(node) = slot.take()
            {
                pending.extend(node.children);
            }
            self.wraps.remove(&next);
        }
        Ok(())
    }

    fn prune_empty_containers(&mut self) {
        loop {
            let root = self.root;
            let empty = self.nodes.iter().enumerate().find_map(|(index, slot)| {
                let node = slot.as_ref()?;
                let id = NodeId(index as u64);
                (id != root && !node.is_leaf() && node.children.is_empty()).then_some(id)
            });
            match empty {
                Some(id) => {
                    if self.detach(id).is_err() {
                        break;
                    }
                }
                None => break,
            }
        }
    }

    /// Recompute every leaf's line starts.
    ///
    /// Offset 0 starts a line for the first leaf of a block and for a leaf
    /// following a hard break; soft wraps come from each leaf's [`Wrap`].
    fn relayout(&mut self) {
        let mut previous: Option<NodeId> = None;
        for id in self.leaves() {
            let starts_line = match previous {
                None => true,
                Some(prev) => {
                    self.block_of(prev) != self.block_of(id)
                        || self.node(prev).is_some_and(Node::is_line_break)
                }
            };
            let mut starts = Vec::new();
            if starts_line {
                starts.push(0);
            }
            if let Some(node) = self.node(id) {
                let len = node.text_len();
                match (self.wraps.get(&id), &node.kind) {
                    (Some(Wrap::EachWord), NodeKind::Text(text)) => starts.extend(word_starts(text)),
                    (Some(Wrap::At(offsets)), _) => {
                        starts.extend(offsets.iter().copied().filter(|&s| s > 0 && s < len));
                    }
                    _ => {}
                }
            }
            starts.sort_unstable();
            starts.dedup();
            if let Some(node) = self.node_mut(id) {
                node.line_starts = starts;
            }
            previous = Some(id);
        }
    }
}

/// UTF-16 offsets of every word that follows whitespace.
fn word_starts(text: &str) -> Vec<usize> {
    let mut starts = Vec::new();
    let mut after_space = false;
    for (byte, segment) in text.split_word_bound_indices() {
        let blank = segment.chars().all(char::is_whitespace);
        if after_space && !blank {
            starts.push(text::utf16_index(text, byte));
        }
        after_space = blank;
    }
    starts
}

/// Appends children to one container, inheriting its formatting.
pub struct ContainerBuilder<'a> {
    tree: &'a mut MemoryTree,
    id: NodeId,
    style: AttributeSnapshot,
}

impl ContainerBuilder<'_> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn container(&mut self, role: Role, f: impl FnOnce(&mut ContainerBuilder<'_>)) -> NodeId {
        let mut style = self.style.clone();
        match role {
            Role::Link => {
                style.link = true;
                style.underline = true;
                style.color = Color::BLUE;
            }
            Role::Heading(level) => style.heading_level = Some(level),
            _ => {}
        }
        let id = self.tree.push(Some(self.id), NodeKind::Container(role), style.clone());
        let mut child = ContainerBuilder {
            tree: &mut *self.tree,
            id,
            style,
        };
        f(&mut child);
        id
    }

    pub fn paragraph(&mut self, f: impl FnOnce(&mut ContainerBuilder<'_>)) -> NodeId {
        self.container(Role::Paragraph, f)
    }

    pub fn text(&mut self, text: &str) -> LeafBuilder<'_> {
        let id = self
            .tree
            .push(Some(self.id), NodeKind::Text(text.to_string()), self.style.clone());
        LeafBuilder { tree: &mut *self.tree, id }
    }

    pub fn image(&mut self, name: &str) -> LeafBuilder<'_> {
        let style = AttributeSnapshot {
            embedded: true,
            ..self.style.clone()
        };
        let kind = NodeKind::EmbeddedObject {
            name: name.to_string(),
            role: Role::Image,
        };
        let id = self.tree.push(Some(self.id), kind, style);
        LeafBuilder { tree: &mut *self.tree, id }
    }

    pub fn line_break(&mut self) -> NodeId {
        self.tree
            .push(Some(self.id), NodeKind::LineBreak, self.style.clone())
    }
}

/// Per-leaf formatting, chained after [`ContainerBuilder::text`].
pub struct LeafBuilder<'a> {
    tree: &'a mut MemoryTree,
    id: NodeId,
}

impl LeafBuilder<'_> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    fn with(self, f: impl FnOnce(&mut AttributeSnapshot)) -> Self {
        if let Some(node) = self.tree.node_mut(self.id) {
            f(&mut node.attributes);
        }
        self
    }

    pub fn bold(self) -> Self {
        self.with(|a| a.bold = true)
    }

    pub fn italic(self) -> Self {
        self.with(|a| a.italic = true)
    }

    pub fn underline(self) -> Self {
        self.with(|a| a.underline = true)
    }

    pub fn strikethrough(self) -> Self {
        self.with(|a| a.strikethrough = true)
    }

    pub fn color(self, color: Color) -> Self {
        self.with(|a| a.color = color)
    }

    pub fn font_family(self, family: &str) -> Self {
        self.with(|a| a.font_family = family.to_string())
    }

    pub fn font_size(self, size: u32) -> Self {
        self.with(|a| a.font_size = size)
    }

    pub fn link(self) -> Self {
        self.with(|a| a.link = true)
    }

    pub fn marker(self, kind: MarkerKind, range: std::ops::Range<usize>) -> Self {
        self.with(|a| a.markers.push(Marker::new(kind, range)))
    }

    pub fn wrap(self, wrap: Wrap) -> Self {
        self.tree.wraps.insert(self.id, wrap);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{init_logging, paragraphs};
    use pretty_assertions::assert_eq;

    fn starts(tree: &MemoryTree, needle: &str) -> Vec<usize> {
        let at = tree.find_text(needle).unwrap();
        tree.node(at.node).unwrap().line_starts.clone()
    }

    #[test]
    fn each_word_wrap_starts_a_line_per_word() {
        let tree = MemoryTree::build(Role::TextArea, |root| {
            root.text("this is a test").wrap(Wrap::EachWord);
        });
        assert_eq!(starts(&tree, "this"), vec![0, 5, 8, 10]);
    }

    #[test]
    fn inline_siblings_continue_the_line() {
        let tree = MemoryTree::build(Role::ContentEditable, |root| {
            root.paragraph(|p| {
                p.text("hello ");
                p.text("world").bold();
            });
        });
        assert_eq!(starts(&tree, "hello"), vec![0]);
        assert_eq!(starts(&tree, "world"), Vec::<usize>::new());
    }

    #[test]
    fn line_break_starts_next_leaf() {
        let tree = MemoryTree::build(Role::TextArea, |root| {
            root.text("one");
            root.line_break();
            root.text("two");
        });
        assert_eq!(starts(&tree, "two"), vec![0]);
    }

    #[test]
    fn explicit_wrap_offsets_are_clamped_inside_the_node() {
        let tree = MemoryTree::build(Role::TextArea, |root| {
            root.text("abcdef").wrap(Wrap::At(vec![0, 3, 6, 9]));
        });
        assert_eq!(starts(&tree, "abc"), vec![0, 3]);
    }

    #[test]
    fn insert_text_moves_the_caret() {
        let mut tree = MemoryTree::build(Role::TextField, |root| {
            root.text("helo");
        });
        let at = tree.find_text("lo").unwrap();
        let caret = tree.insert_text(&at, "l").unwrap();

        assert_eq!(tree.find_text("hello"), Some(PositionRef::new(at.node, 0)));
        assert_eq!(caret, PositionRef::new(at.node, 3));
        assert_eq!(tree.selection(), Some(Selection::collapsed(caret)));
    }

    #[test]
    fn delete_within_one_node() {
        let mut tree = MemoryTree::build(Role::TextField, |root| {
            root.text("this is a test");
        });
        let node = tree.find_text("this").unwrap().node;
        let caret = tree
            .delete_range(&PositionRef::new(node, 10), &PositionRef::new(node, 14))
            .unwrap();

        assert_eq!(tree.node(node).unwrap().text(), "this is a ");
        assert_eq!(caret, PositionRef::new(node, 10));
    }

    #[test]
    fn delete_across_blocks_merges_them() {
        init_logging();
        let mut tree = paragraphs(&["first line", "second line"]);
        let first = tree.find_text("first").unwrap().node;
        let second = tree.find_text("second").unwrap().node;

        let caret = tree
            .delete_range(&PositionRef::new(first, 10), &PositionRef::new(second, 0))
            .unwrap();

        assert_eq!(caret, PositionRef::new(second, 0));
        assert_eq!(tree.block_of(first), tree.block_of(second));
        assert_eq!(starts(&tree, "second"), Vec::<usize>::new());
        assert_eq!(DocumentText::new(&tree).text(), "first linesecond line");
    }

    #[test]
    fn emptied_leaf_is_removed_when_block_has_others() {
        let mut hello = None;
        let mut world = None;
        let mut tree = MemoryTree::build(Role::ContentEditable, |root| {
            root.paragraph(|p| {
                hello = Some(p.text("hello ").id());
                world = Some(p.text("world").bold().id());
            });
        });
        let (hello, world) = (hello.unwrap(), world.unwrap());

        tree.delete_range(&PositionRef::new(world, 0), &PositionRef::new(world, 5))
            .unwrap();

        assert_eq!(tree.node(world), None);
        assert_eq!(tree.leaves(), vec![hello]);
        assert_eq!(tree.selection(), Some(Selection::collapsed(PositionRef::new(hello, 6))));
    }

    #[test]
    fn remove_drops_subtree_and_keeps_selection() {
        let mut tree = paragraphs(&["one", "two"]);
        let two = tree.find_text("two").unwrap();
        tree.set_selection(Selection::collapsed(two.clone()));

        tree.remove(two.node).unwrap();

        assert_eq!(tree.node(two.node), None);
        assert_eq!(tree.leaves().len(), 1);
        assert_eq!(tree.selection(), Some(Selection::collapsed(two)));
    }

    #[test]
    fn set_text_clamps_selection() {
        let mut tree = MemoryTree::build(Role::TextField, |root| {
            root.text("text1 long");
        });
        let node = tree.find_text("text1").unwrap().node;
        tree.set_selection(Selection::collapsed(PositionRef::new(node, 10)));

        tree.set_text(node, "text2").unwrap();

        assert_eq!(
            tree.selection(),
            Some(Selection::collapsed(PositionRef::new(node, 5)))
        );
        assert_eq!(tree.set_text(NodeId(0), "x"), Err(EditError::NoTextLeaf(NodeId(0))));
    }

    #[test]
    fn link_containers_style_their_leaves() {
        let tree = MemoryTree::build(Role::ContentEditable, |root| {
            root.container(Role::Link, |a| {
                a.text("test");
            });
        });
        let node = tree.node(tree.find_text("test").unwrap().node).unwrap();
        assert!(node.attributes.link);
        assert!(node.attributes.underline);
        assert_eq!(node.attributes.color, Color::BLUE);
    }
}
