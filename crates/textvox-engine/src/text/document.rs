//! Flattened text of an editable root.
//!
//! Key commands are easier to reason about over one string: blocks are
//! joined with a virtual `"\n"` (unless a hard break already separates them)
//! and offsets map back to [`PositionRef`]s.

use std::ops::Range;

use unicode_segmentation::UnicodeSegmentation;

use crate::editing::PositionRef;
use crate::error::EditError;
use crate::text::{self, utf16_index};
use crate::tree::{AccessibilityTree, NodeId};

/// One stretch of the flattened text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// `None` for the virtual newline between blocks
    pub node: Option<NodeId>,
    pub start: usize,
    pub len: usize,
}

impl Segment {
    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

#[derive(Debug, Clone)]
pub struct DocumentText {
    root: NodeId,
    text: String,
    segments: Vec<Segment>,
    line_starts: Vec<usize>,
}

impl DocumentText {
    pub fn new<T: AccessibilityTree + ?Sized>(tree: &T) -> Self {
        let mut text = String::new();
        let mut segments = Vec::new();
        let mut line_starts = Vec::new();
        let mut offset = 0;
        let mut previous: Option<(Option<NodeId>, bool)> = None;

        for id in tree.leaves() {
            let Some(node) = tree.node(id) else { continue };
            let block = tree.block_of(id);
            if let Some((previous_block, after_break)) = previous
                && previous_block != block
                && !after_break
            {
                segments.push(Segment {
                    node: None,
                    start: offset,
                    len: 1,
                });
                text.push('\n');
                offset += 1;
            }
            line_starts.extend(node.line_starts.iter().map(|s| offset + s));
            let len = node.text_len();
            text.push_str(&node.text());
            segments.push(Segment {
                node: Some(id),
                start: offset,
                len,
            });
            offset += len;
            previous = Some((block, node.is_line_break()));
        }

        if line_starts.first() != Some(&0) {
            line_starts.insert(0, 0);
        }
        line_starts.dedup();

        Self {
            root: tree.root(),
            text,
            segments,
            line_starts,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Length in UTF-16 units.
    pub fn len(&self) -> usize {
        self.segments.last().map_or(0, Segment::end)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn slice(&self, range: Range<usize>) -> &str {
        text::slice(&self.text, range.start, range.end)
    }

    /// Document offset of a normalized position.
    pub fn offset_of(&self, position: &PositionRef) -> Result<usize, EditError> {
        let segment = self
            .segments
            .iter()
            .find(|s| s.node == Some(position.node))
            .ok_or(EditError::StalePosition(position.node))?;
        if position.offset > segment.len {
            return Err(EditError::OffsetOutOfRange {
                node: position.node,
                offset: position.offset,
                len: segment.len,
            });
        }
        Ok(segment.start + position.offset)
    }

    /// Position at a document offset.
    ///
    /// At a boundary between two leaves the later leaf wins; an offset on a
    /// virtual newline maps to the end of the leaf before it.
    pub fn position_at(&self, offset: usize) -> Result<PositionRef, EditError> {
        let nodes = || {
            self.segments
                .iter()
                .filter_map(|s| s.node.map(|node| (node, s)))
        };
        if let Some((node, segment)) = nodes().find(|(_, s)| s.start <= offset && offset < s.end()) {
            return Ok(PositionRef::new(node, offset - segment.start));
        }
        nodes()
            .filter(|(_, s)| s.start <= offset)
            .last()
            .or_else(|| nodes().next())
            .map(|(node, s)| PositionRef::new(node, offset.saturating_sub(s.start).min(s.len)))
            .ok_or(EditError::NoTextLeaf(self.root))
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Index of the visual line containing `offset`.
    pub fn line_index(&self, offset: usize) -> usize {
        self.line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1)
    }

    /// `[start, end)` of a line, the end including its trailing break or wrap.
    pub fn line_range(&self, index: usize) -> Range<usize> {
        let start = self.line_starts.get(index).copied().unwrap_or(self.len());
        let end = self
            .line_starts
            .get(index + 1)
            .copied()
            .unwrap_or(self.len());
        start..end
    }

    /// Furthest caret offset that still renders on the line.
    pub fn line_last_caret(&self, index: usize) -> usize {
        let range = self.line_range(index);
        if index + 1 >= self.line_count() {
            range.end
        } else {
            range.end.saturating_sub(1).max(range.start)
        }
    }

    /// Start of the paragraph containing `offset`: just past the nearest
    /// preceding newline, virtual or hard.
    pub fn paragraph_start(&self, offset: usize) -> usize {
        let before = self.slice(0..offset);
        before
            .rfind('\n')
            .map_or(0, |byte| utf16_index(before, byte) + 1)
    }

    /// Start of the word before `offset`, or 0.
    pub fn previous_word_start(&self, offset: usize) -> usize {
        self.words()
            .map(|word| word.start)
            .filter(|&start| start < offset)
            .last()
            .unwrap_or(0)
    }

    /// End of the word after `offset`, or the document end.
    pub fn next_word_end(&self, offset: usize) -> usize {
        self.words()
            .map(|word| word.end)
            .find(|&end| end > offset)
            .unwrap_or(self.len())
    }

    fn words(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        self.text
            .split_word_bound_indices()
            .filter(|(_, segment)| !segment.chars().all(char::is_whitespace))
            .map(|(byte, segment)| {
                let start = utf16_index(&self.text, byte);
                start..start + text::utf16_len(segment)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::paragraphs;
    use crate::tree::{MemoryTree, Role, Wrap};
    use pretty_assertions::assert_eq;

    #[test]
    fn joins_blocks_with_virtual_newlines() {
        let tree = paragraphs(&["first line", "second line", "third line"]);
        let doc = DocumentText::new(&tree);

        assert_eq!(doc.text(), "first line\nsecond line\nthird line");
        assert_eq!(doc.line_count(), 3);
        assert_eq!(doc.line_range(1), 11..23);
        assert_eq!(doc.paragraph_start(15), 11);
        assert_eq!(doc.segments()[1].node, None);
    }

    #[test]
    fn hard_breaks_are_not_doubled() {
        let tree = MemoryTree::build(Role::TextArea, |root| {
            root.text("1234");
            root.line_break();
            root.text("5678");
        });
        let doc = DocumentText::new(&tree);

        assert_eq!(doc.text(), "1234\n5678");
        assert_eq!(doc.line_index(5), 1);
        assert_eq!(doc.line_last_caret(0), 4);
        assert_eq!(doc.paragraph_start(7), 5);
        assert_eq!(doc.paragraph_start(3), 0);
    }

    #[test]
    fn maps_offsets_to_positions_downstream() {
        let tree = MemoryTree::build(Role::ContentEditable, |root| {
            root.paragraph(|p| {
                p.text("hello ");
                p.text("world").bold();
            });
            root.paragraph(|p| {
                p.text("end");
            });
        });
        let doc = DocumentText::new(&tree);
        let hello = tree.find_text("hello").unwrap().node;
        let world = tree.find_text("world").unwrap().node;
        let end = tree.find_text("end").unwrap().node;

        assert_eq!(doc.position_at(6).unwrap(), PositionRef::new(world, 0));
        assert_eq!(doc.position_at(11).unwrap(), PositionRef::new(world, 5));
        assert_eq!(doc.position_at(12).unwrap(), PositionRef::new(end, 0));
        assert_eq!(doc.position_at(99).unwrap(), PositionRef::new(end, 3));
        assert_eq!(doc.offset_of(&PositionRef::new(hello, 6)).unwrap(), 6);
        assert_eq!(
            doc.offset_of(&PositionRef::new(hello, 7)),
            Err(EditError::OffsetOutOfRange {
                node: hello,
                offset: 7,
                len: 6
            })
        );
    }

    #[test]
    fn soft_wraps_become_lines() {
        let tree = MemoryTree::build(Role::TextArea, |root| {
            root.text("this is a test").wrap(Wrap::EachWord);
        });
        let doc = DocumentText::new(&tree);

        assert_eq!(doc.line_count(), 4);
        assert_eq!(doc.line_range(2), 8..10);
        assert_eq!(doc.line_index(9), 2);
    }

    #[test]
    fn finds_word_boundaries() {
        let tree = paragraphs(&["this is a test"]);
        let doc = DocumentText::new(&tree);

        assert_eq!(doc.previous_word_start(14), 10);
        assert_eq!(doc.previous_word_start(10), 8);
        assert_eq!(doc.previous_word_start(5), 0);
        assert_eq!(doc.next_word_end(0), 4);
        assert_eq!(doc.next_word_end(4), 7);
        assert_eq!(doc.next_word_end(14), 14);
    }
}
