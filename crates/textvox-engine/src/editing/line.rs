//! Visual line reconstruction.
//!
//! No single node knows where its visual line begins or ends, so a line is
//! assembled by walking leaves outwards from the owning position until the
//! host-reported line starts bound it on both sides.

use log::{trace, warn};

use crate::editing::PositionRef;
use crate::error::EditError;
use crate::text;
use crate::tree::{AccessibilityTree, NodeId};

/// Upper bound on lines walked by [`LineBuilder::text_between`].
pub const MAX_LINES: usize = 10_000;

/// A stretch of one leaf's text inside a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRun {
    pub node: NodeId,
    /// Offset into the node where the run begins
    pub node_start: usize,
    /// Offset into the line text where the run begins
    pub line_start: usize,
    pub len: usize,
}

impl LineRun {
    pub fn line_end(&self) -> usize {
        self.line_start + self.len
    }

    fn contains_node_offset(&self, offset: usize) -> bool {
        self.node_start <= offset && offset <= self.node_start + self.len
    }
}

/// One visual line plus the selection endpoints mapped into it.
#[derive(Debug, Clone, PartialEq)]
pub struct LineSpan {
    pub text: String,
    /// Position that produced `start_offset`
    pub start_container: PositionRef,
    /// Position that produced `end_offset`
    pub end_container: PositionRef,
    pub start_offset: usize,
    pub end_offset: usize,
    pub local_start_offset: usize,
    pub local_end_offset: usize,
    /// First index of the owning node's run within `text`
    pub container_start_offset: usize,
    /// Last index (inclusive) of the owning node's run within `text`
    pub container_end_offset: usize,
    pub base_on_anchor: bool,
    pub runs: Vec<LineRun>,
    pub(crate) line_start: PositionRef,
    pub(crate) line_end_container: PositionRef,
    pub(crate) line_end: PositionRef,
    pub(crate) first_line: bool,
    pub(crate) last_line: bool,
}

impl LineSpan {
    /// Where the line begins in the tree.
    pub fn line_start(&self) -> &PositionRef {
        &self.line_start
    }

    /// Position of the line's last character.
    pub fn line_end_container(&self) -> &PositionRef {
        &self.line_end_container
    }

    /// Exclusive end of the line.
    pub fn line_end(&self) -> &PositionRef {
        &self.line_end
    }

    pub fn is_first_line(&self) -> bool {
        self.first_line
    }

    pub fn is_last_line(&self) -> bool {
        self.last_line
    }

    /// Length of `text` in UTF-16 units.
    pub fn len(&self) -> usize {
        text::utf16_len(&self.text)
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Run covering line offset `offset`, preferring the run that starts there.
    pub fn run_at(&self, offset: usize) -> Option<&LineRun> {
        self.runs
            .iter()
            .filter(|run| run.len > 0)
            .find(|run| run.line_start <= offset && offset < run.line_end())
    }

    /// Line offset of `position`, if it falls inside this line.
    pub fn offset_in_line(&self, position: &PositionRef) -> Option<usize> {
        self.runs
            .iter()
            .find(|run| run.node == position.node && run.contains_node_offset(position.offset))
            .map(|run| run.line_start + position.offset - run.node_start)
    }
}

/// Builds [`LineSpan`]s against one tree.
pub struct LineBuilder<'a, T: AccessibilityTree + ?Sized> {
    tree: &'a T,
}

impl<'a, T: AccessibilityTree + ?Sized> LineBuilder<'a, T> {
    pub fn new(tree: &'a T) -> Self {
        Self { tree }
    }

    /// The line containing a caret.
    pub fn at(&self, position: &PositionRef) -> Result<LineSpan, EditError> {
        self.build(position, position, false)
    }

    /// The line owned by `focus` (or `anchor` when `base_on_anchor`), with
    /// the other endpoint clamped into it.
    pub fn build(
        &self,
        anchor: &PositionRef,
        focus: &PositionRef,
        base_on_anchor: bool,
    ) -> Result<LineSpan, EditError> {
        let anchor = anchor.normalize(self.tree)?;
        let focus = focus.normalize(self.tree)?;
        let owner = if base_on_anchor { &anchor } else { &focus };

        let line_start = self.line_start_of(owner)?;
        let line_end = self.line_end_of(owner)?;
        let (text, runs) = self.collect_runs(&line_start, &line_end)?;
        let text_len = text::utf16_len(&text);

        let anchor_offset = self.offset_in_line(&anchor, &runs, &line_start, text_len)?;
        let focus_offset = self.offset_in_line(&focus, &runs, &line_start, text_len)?;
        let (start_container, start_offset, end_container, end_offset) = if focus_offset < anchor_offset {
            (focus.clone(), focus_offset, anchor.clone(), anchor_offset)
        } else {
            (anchor.clone(), anchor_offset, focus.clone(), focus_offset)
        };

        let owner_run = runs.iter().find(|run| run.node == owner.node);
        let container_start_offset = owner_run.map_or(0, |run| run.line_start);
        let container_end_offset =
            owner_run.map_or(0, |run| run.line_start + run.len.saturating_sub(1));

        let line_end_container = runs
            .iter()
            .rev()
            .find(|run| run.len > 0)
            .map(|run| PositionRef::new(run.node, run.node_start + run.len - 1))
            .unwrap_or_else(|| line_start.clone());

        let first_line = line_start.offset == 0 && self.tree.previous_leaf(line_start.node).is_none();
        let last_line = self.tree.next_leaf(line_end.node).is_none()
            && line_end.offset == self.tree.resolve(line_end.node)?.text_len();

        trace!("built line {text:?} from {line_start:?} to {line_end:?}");

        Ok(LineSpan {
            text,
            local_start_offset: start_container.offset,
            local_end_offset: end_container.offset,
            start_container,
            end_container,
            start_offset,
            end_offset,
            container_start_offset,
            container_end_offset,
            base_on_anchor,
            runs,
            line_start,
            line_end_container,
            line_end,
            first_line,
            last_line,
        })
    }

    /// Nearest line start at or before `position`.
    pub(crate) fn line_start_of(&self, position: &PositionRef) -> Result<PositionRef, EditError> {
        let node = self.tree.resolve(position.node)?;
        if let Some(&start) = node.line_starts.iter().rev().find(|&&s| s <= position.offset) {
            return Ok(PositionRef::new(position.node, start));
        }
        let mut current = self.tree.previous_leaf(position.node);
        while let Some(id) = current {
            if let Some(&start) = self.tree.resolve(id)?.line_starts.last() {
                return Ok(PositionRef::new(id, start));
            }
            current = self.tree.previous_leaf(id);
        }
        let root = self.tree.root();
        let first = self
            .tree
            .first_leaf(root)
            .ok_or(EditError::NoTextLeaf(root))?;
        Ok(PositionRef::new(first, 0))
    }

    /// Exclusive end of the line containing `position`.
    fn line_end_of(&self, position: &PositionRef) -> Result<PositionRef, EditError> {
        let node = self.tree.resolve(position.node)?;
        if let Some(&start) = node.line_starts.iter().find(|&&s| s > position.offset) {
            return Ok(PositionRef::new(position.node, start));
        }
        let mut last = position.node;
        let mut current = self.tree.next_leaf(position.node);
        while let Some(id) = current {
            if let Some(&start) = self.tree.resolve(id)?.line_starts.first() {
                return Ok(PositionRef::new(id, start));
            }
            last = id;
            current = self.tree.next_leaf(id);
        }
        Ok(PositionRef::new(last, self.tree.resolve(last)?.text_len()))
    }

    fn collect_runs(
        &self,
        start: &PositionRef,
        end: &PositionRef,
    ) -> Result<(String, Vec<LineRun>), EditError> {
        let mut text = String::new();
        let mut runs = Vec::new();
        let mut line_offset = 0;
        let mut from = start.offset;
        let mut current = Some(start.node);

        while let Some(id) = current {
            let node = self.tree.resolve(id)?;
            let is_end = id == end.node;
            if is_end && id != start.node && end.offset == 0 {
                break;
            }
            let to = if is_end { end.offset } else { node.text_len() };
            let len = to.saturating_sub(from);
            text.push_str(text::slice(&node.text(), from, to));
            runs.push(LineRun {
                node: id,
                node_start: from,
                line_start: line_offset,
                len,
            });
            line_offset += len;
            if is_end {
                break;
            }
            from = 0;
            current = self.tree.next_leaf(id);
        }
        Ok((text, runs))
    }

    /// Map a position into line coordinates, clamping positions that fall
    /// outside the line to its edges.
    fn offset_in_line(
        &self,
        position: &PositionRef,
        runs: &[LineRun],
        line_start: &PositionRef,
        text_len: usize,
    ) -> Result<usize, EditError> {
        if let Some(run) = runs
            .iter()
            .find(|run| run.node == position.node && run.contains_node_offset(position.offset))
        {
            return Ok(run.line_start + position.offset - run.node_start);
        }
        Ok(if PositionRef::compare(self.tree, position, line_start)?.is_lt() {
            0
        } else {
            text_len
        })
    }

    /// Text between two positions, one piece per visual line joined by `"\n"`.
    pub fn text_between(&self, from: &PositionRef, to: &PositionRef) -> Result<String, EditError> {
        let from = from.normalize(self.tree)?;
        let to = to.normalize(self.tree)?;
        let (mut cursor, to) = if PositionRef::compare(self.tree, &from, &to)?.is_gt() {
            (to, from)
        } else {
            (from, to)
        };

        let mut pieces = Vec::new();
        for _ in 0..MAX_LINES {
            let line = self.build(&cursor, &to, true)?;
            let piece = text::slice(&line.text, line.start_offset, line.end_offset);
            pieces.push(piece.strip_suffix('\n').unwrap_or(piece).to_string());

            if line.last_line || PositionRef::compare(self.tree, &to, &line.line_end)?.is_le() {
                return Ok(pieces.join("\n"));
            }
            let next = line.line_end.normalize(self.tree)?;
            if next == cursor {
                warn!("line walk stalled at {cursor:?}");
                return Ok(pieces.join("\n"));
            }
            cursor = next;
        }
        warn!("gave up collecting text after {MAX_LINES} lines");
        Ok(pieces.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{init_logging, paragraphs, wrapped};
    use crate::tree::{MemoryTree, Role};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn first_soft_line() {
        let tree = wrapped("this is a test");
        let node = tree.find_text("this").unwrap().node;

        let line = LineBuilder::new(&tree).at(&PositionRef::new(node, 0)).unwrap();

        assert_eq!(line.text, "this ");
        assert_eq!((line.start_offset, line.end_offset), (0, 0));
        assert_eq!(line.container_start_offset, 0);
        assert_eq!(line.container_end_offset, 4);
        assert!(line.is_first_line());
        assert!(!line.is_last_line());
    }

    #[test]
    fn second_soft_line_keeps_local_offset() {
        let tree = wrapped("this is a test");
        let node = tree.find_text("this").unwrap().node;

        let line = LineBuilder::new(&tree).at(&PositionRef::new(node, 5)).unwrap();

        assert_eq!(line.text, "is ");
        assert_eq!((line.start_offset, line.end_offset), (0, 0));
        assert_eq!(line.local_start_offset, 5);
        assert_eq!(line.line_start(), &PositionRef::new(node, 5));
        assert_eq!(line.line_end(), &PositionRef::new(node, 8));
    }

    #[test]
    fn line_spans_several_nodes() {
        let mut bold = None;
        let tree = MemoryTree::build(Role::ContentEditable, |root| {
            root.paragraph(|p| {
                p.text("hello ");
                bold = Some(p.text("world").bold().id());
            });
        });
        let bold = bold.unwrap();

        let line = LineBuilder::new(&tree).at(&PositionRef::new(bold, 0)).unwrap();

        assert_eq!(line.text, "hello world");
        assert_eq!((line.start_offset, line.end_offset), (6, 6));
        assert_eq!(line.local_start_offset, 0);
        assert_eq!(line.container_start_offset, 6);
        assert_eq!(line.container_end_offset, 10);
        assert_eq!(line.runs.len(), 2);
        assert!(line.is_last_line());
    }

    #[test]
    fn focus_owns_the_line_by_default() {
        let tree = wrapped("this is a test");
        let node = tree.find_text("this").unwrap().node;
        let anchor = PositionRef::new(node, 0);
        let focus = PositionRef::new(node, 6);
        let builder = LineBuilder::new(&tree);

        let line = builder.build(&anchor, &focus, false).unwrap();
        assert_eq!(line.text, "is ");
        assert_eq!((line.start_offset, line.end_offset), (0, 1));
        assert_eq!(line.end_container, focus);

        let line = builder.build(&anchor, &focus, true).unwrap();
        assert_eq!(line.text, "this ");
        assert_eq!((line.start_offset, line.end_offset), (0, 5));
        assert_eq!(line.local_end_offset, 6);
    }

    #[test]
    fn anchor_across_paragraphs_is_clamped() {
        let tree = paragraphs(&["hello world", "is a test"]);
        let hello = tree.find_text("hello").unwrap().node;
        let is = tree.find_text("is a").unwrap().node;
        let anchor = PositionRef::new(hello, 2);
        let focus = PositionRef::new(is, 3);
        let builder = LineBuilder::new(&tree);

        let line = builder.build(&anchor, &focus, true).unwrap();
        assert_eq!(line.text, "hello world");
        assert_eq!((line.start_offset, line.end_offset), (2, 11));

        let line = builder.build(&anchor, &focus, false).unwrap();
        assert_eq!(line.text, "is a test");
        assert_eq!((line.start_offset, line.end_offset), (0, 3));
    }

    #[test]
    fn hard_break_ends_the_line() {
        let tree = MemoryTree::build(Role::TextArea, |root| {
            root.text("1234");
            root.line_break();
            root.text("5678");
        });
        let first = tree.find_text("1234").unwrap().node;
        let last = tree.find_text("5678").unwrap().node;
        let builder = LineBuilder::new(&tree);

        let line = builder.at(&PositionRef::new(first, 4)).unwrap();
        assert_eq!(line.text, "1234\n");
        assert_eq!(line.line_end(), &PositionRef::new(last, 0));

        let line = builder.at(&PositionRef::new(last, 0)).unwrap();
        assert_eq!(line.text, "5678");
        assert!(line.is_last_line());
    }

    #[test]
    fn stale_node_fails() {
        let tree = wrapped("abc");
        let result = LineBuilder::new(&tree).at(&PositionRef::new(NodeId(77), 0));
        assert_eq!(result, Err(EditError::StalePosition(NodeId(77))));
    }

    #[rstest]
    fn every_offset_lands_inside_its_line(#[values(0, 1, 4, 5, 7, 8, 9, 10, 13, 14)] offset: usize) {
        let tree = wrapped("this is a test");
        let node = tree.find_text("this").unwrap().node;

        let line = LineBuilder::new(&tree)
            .at(&PositionRef::new(node, offset))
            .unwrap();

        assert!(line.start_offset <= line.end_offset);
        assert!(line.end_offset <= line.len());
        assert!(line.container_start_offset <= line.container_end_offset);
        assert_eq!(line.offset_in_line(&PositionRef::new(node, offset)), Some(line.start_offset));
    }

    #[test]
    fn text_between_joins_lines() {
        init_logging();
        let tree = paragraphs(&["first line", "second line", "third line"]);
        let first = tree.find_text("first").unwrap().node;
        let third = tree.find_text("third").unwrap().node;
        let builder = LineBuilder::new(&tree);

        let text = builder
            .text_between(&PositionRef::new(third, 5), &PositionRef::new(first, 2))
            .unwrap();
        assert_eq!(text, "rst line\nsecond line\nthird");

        let text = builder
            .text_between(&PositionRef::new(first, 2), &PositionRef::new(first, 5))
            .unwrap();
        assert_eq!(text, "rst");
    }

    #[test]
    fn text_between_strips_hard_breaks() {
        let tree = MemoryTree::build(Role::TextArea, |root| {
            root.text("111 line");
            root.line_break();
            root.text("222 line");
        });
        let first = tree.find_text("111").unwrap().node;
        let second = tree.find_text("222").unwrap().node;

        let text = LineBuilder::new(&tree)
            .text_between(&PositionRef::new(first, 2), &PositionRef::new(second, 2))
            .unwrap();
        assert_eq!(text, "1 line\n22");
    }
}
