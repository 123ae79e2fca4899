use std::cmp::Ordering;

use crate::error::EditError;
use crate::tree::AccessibilityTree;
use crate::tree::NodeId;

/// A (node, offset) pair into the host tree.
///
/// Holds only an id; every use re-resolves the node, so a position outliving
/// its node fails with [`EditError::StalePosition`] instead of dangling.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PositionRef {
    pub node: NodeId,
    /// UTF-16 offset into the node's text, or a child index for containers
    pub offset: usize,
}

impl PositionRef {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }

    /// Resolve to a position on a leaf.
    ///
    /// Container positions address a child index and move to the first leaf
    /// at or after it (or the end of the last leaf before it). The position
    /// just past a hard break moves to the start of the next leaf.
    pub fn normalize<T: AccessibilityTree + ?Sized>(&self, tree: &T) -> Result<Self, EditError> {
        let node = tree.resolve(self.node)?;

        if !node.is_leaf() {
            let split = self.offset.min(node.children.len());
            if let Some(leaf) = node.children[split..]
                .iter()
                .find_map(|&child| tree.first_leaf(child))
            {
                return Ok(Self::new(leaf, 0));
            }
            let leaf = node.children[..split]
                .iter()
                .rev()
                .find_map(|&child| tree.last_leaf(child))
                .ok_or(EditError::NoTextLeaf(self.node))?;
            return Ok(Self::new(leaf, tree.resolve(leaf)?.text_len()));
        }

        let len = node.text_len();
        if self.offset > len {
            return Err(EditError::OffsetOutOfRange {
                node: self.node,
                offset: self.offset,
                len,
            });
        }
        if node.is_line_break()
            && self.offset == len
            && let Some(next) = tree.next_leaf(self.node)
        {
            return Ok(Self::new(next, 0));
        }
        Ok(self.clone())
    }

    /// Tree order, then offset.
    pub fn compare<T: AccessibilityTree + ?Sized>(
        tree: &T,
        a: &PositionRef,
        b: &PositionRef,
    ) -> Result<Ordering, EditError> {
        Ok(tree
            .compare_nodes(a.node, b.node)?
            .then(a.offset.cmp(&b.offset)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Anchor stays put, focus moves with the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub anchor: PositionRef,
    pub focus: PositionRef,
}

impl Selection {
    pub fn new(anchor: PositionRef, focus: PositionRef) -> Self {
        Self { anchor, focus }
    }

    pub fn collapsed(position: PositionRef) -> Self {
        Self {
            anchor: position.clone(),
            focus: position,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    pub fn normalize<T: AccessibilityTree + ?Sized>(&self, tree: &T) -> Result<Self, EditError> {
        Ok(Self::new(self.anchor.normalize(tree)?, self.focus.normalize(tree)?))
    }

    pub fn direction<T: AccessibilityTree + ?Sized>(&self, tree: &T) -> Result<Direction, EditError> {
        Ok(match PositionRef::compare(tree, &self.anchor, &self.focus)? {
            Ordering::Greater => Direction::Backward,
            Ordering::Less | Ordering::Equal => Direction::Forward,
        })
    }

    /// `(start, end)` in tree order.
    pub fn ordered<T: AccessibilityTree + ?Sized>(
        &self,
        tree: &T,
    ) -> Result<(PositionRef, PositionRef), EditError> {
        Ok(match self.direction(tree)? {
            Direction::Forward => (self.anchor.clone(), self.focus.clone()),
            Direction::Backward => (self.focus.clone(), self.anchor.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{MemoryTree, Role};

    fn tree() -> MemoryTree {
        MemoryTree::build(Role::TextArea, |root| {
            root.text("1234");
            root.line_break();
            root.text("5678");
        })
    }

    #[test]
    fn container_offsets_address_children() {
        let tree = tree();
        let root = tree.root();
        let first = tree.find_text("1234").unwrap().node;
        let last = tree.find_text("5678").unwrap().node;

        assert_eq!(
            PositionRef::new(root, 0).normalize(&tree),
            Ok(PositionRef::new(first, 0))
        );
        assert_eq!(
            PositionRef::new(root, 2).normalize(&tree),
            Ok(PositionRef::new(last, 0))
        );
        assert_eq!(
            PositionRef::new(root, 3).normalize(&tree),
            Ok(PositionRef::new(last, 4))
        );
    }

    #[test]
    fn position_after_break_moves_to_next_leaf() {
        let tree = tree();
        let br = tree.leaves()[1];
        let last = tree.find_text("5678").unwrap().node;

        assert_eq!(
            PositionRef::new(br, 1).normalize(&tree),
            Ok(PositionRef::new(last, 0))
        );
        assert_eq!(
            PositionRef::new(br, 0).normalize(&tree),
            Ok(PositionRef::new(br, 0))
        );
    }

    #[test]
    fn rejects_stale_and_out_of_range_positions() {
        let tree = tree();
        let first = tree.find_text("1234").unwrap().node;

        assert_eq!(
            PositionRef::new(first, 5).normalize(&tree),
            Err(EditError::OffsetOutOfRange {
                node: first,
                offset: 5,
                len: 4
            })
        );
        assert_eq!(
            PositionRef::new(NodeId(42), 0).normalize(&tree),
            Err(EditError::StalePosition(NodeId(42)))
        );
    }

    #[test]
    fn selection_direction_follows_tree_order() {
        let tree = tree();
        let first = tree.find_text("1234").unwrap().node;
        let last = tree.find_text("5678").unwrap().node;

        let forward = Selection::new(PositionRef::new(first, 3), PositionRef::new(last, 1));
        let backward = Selection::new(PositionRef::new(last, 1), PositionRef::new(first, 3));

        assert_eq!(forward.direction(&tree), Ok(Direction::Forward));
        assert_eq!(backward.direction(&tree), Ok(Direction::Backward));
        assert_eq!(backward.ordered(&tree).unwrap(), forward.ordered(&tree).unwrap());
        assert!(Selection::collapsed(PositionRef::new(first, 1)).is_collapsed());
        assert!(!forward.is_collapsed());
    }
}
