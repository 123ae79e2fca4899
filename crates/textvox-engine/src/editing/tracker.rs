use log::warn;

use crate::editing::{LineBuilder, LineSpan, Selection};
use crate::error::EditError;
use crate::tree::AccessibilityTree;

/// A line together with the selection it was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct NarrationState {
    pub line: LineSpan,
    pub selection: Selection,
}

impl NarrationState {
    pub fn new(line: LineSpan, selection: Selection) -> Self {
        Self { line, selection }
    }
}

/// Caches the most recently narrated state and answers line comparisons.
#[derive(Debug, Default)]
pub struct SelectionTracker {
    previous: Option<NarrationState>,
}

impl SelectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn previous(&self) -> Option<&NarrationState> {
        self.previous.as_ref()
    }

    /// Swap in the newly narrated state, returning the old one.
    pub fn replace(&mut self, state: NarrationState) -> Option<NarrationState> {
        self.previous.replace(state)
    }

    pub fn clear(&mut self) {
        self.previous = None;
    }

    /// Both spans start at the same place in the tree.
    pub fn is_same_line(a: &LineSpan, b: &LineSpan) -> bool {
        a.line_start == b.line_start
    }

    pub fn is_same_line_and_selection(a: &LineSpan, b: &LineSpan) -> bool {
        Self::is_same_line(a, b) && a.start_offset == b.start_offset && a.end_offset == b.end_offset
    }

    /// Whether the span's cached boundaries still describe a line of `tree`.
    pub fn is_valid_line<T: AccessibilityTree + ?Sized>(tree: &T, span: &LineSpan) -> bool {
        match Self::check_line(tree, span) {
            Ok(valid) => valid,
            Err(err) => {
                warn!("cached line no longer resolves: {err}");
                false
            }
        }
    }

    pub fn ensure_valid<T: AccessibilityTree + ?Sized>(tree: &T, span: &LineSpan) -> Result<(), EditError> {
        if Self::is_valid_line(tree, span) {
            Ok(())
        } else {
            Err(EditError::InvalidLine)
        }
    }

    fn check_line<T: AccessibilityTree + ?Sized>(tree: &T, span: &LineSpan) -> Result<bool, EditError> {
        let builder = LineBuilder::new(tree);
        let start = span.line_start.normalize(tree)?;
        if builder.line_start_of(&start)? != span.line_start {
            return Ok(false);
        }
        let current = builder.at(&start)?;
        let cached_end = &span.line_end_container;
        let actual_end = &current.line_end_container;
        Ok(cached_end.node == actual_end.node && cached_end.offset <= actual_end.offset)
    }
}
