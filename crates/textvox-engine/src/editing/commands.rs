//! Key commands translated into selections and deletions.

use log::debug;

use crate::editing::{Direction, PositionRef, Selection};
use crate::error::EditError;
use crate::text::DocumentText;
use crate::tree::AccessibilityTree;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Character,
    Word,
    Line,
    /// Home / End
    LineBoundary,
    /// Ctrl+Home / Ctrl+End
    DocumentBoundary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Move {
        granularity: Granularity,
        direction: Direction,
        /// Keep the anchor and move only the focus
        extend: bool,
    },
    SelectAll,
    DeleteWordBackward,
}

impl Command {
    pub fn step(granularity: Granularity, direction: Direction) -> Self {
        Self::Move {
            granularity,
            direction,
            extend: false,
        }
    }

    pub fn extend(granularity: Granularity, direction: Direction) -> Self {
        Self::Move {
            granularity,
            direction,
            extend: true,
        }
    }
}

/// What the host should do in response to a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Select(Selection),
    Delete {
        start: PositionRef,
        end: PositionRef,
        /// Text that will be removed
        text: String,
    },
    Unchanged,
}

/// Translate `command` against the current selection.
pub fn translate<T: AccessibilityTree + ?Sized>(
    tree: &T,
    selection: &Selection,
    command: &Command,
) -> Result<CommandOutcome, EditError> {
    let selection = selection.normalize(tree)?;
    let doc = DocumentText::new(tree);
    let anchor = doc.offset_of(&selection.anchor)?;
    let focus = doc.offset_of(&selection.focus)?;

    let outcome = match command {
        Command::SelectAll => CommandOutcome::Select(Selection::new(
            doc.position_at(0)?,
            doc.position_at(doc.len())?,
        )),
        Command::Move {
            granularity,
            direction,
            extend,
        } => {
            let target = if !extend && anchor != focus && *granularity == Granularity::Character {
                match direction {
                    Direction::Forward => anchor.max(focus),
                    Direction::Backward => anchor.min(focus),
                }
            } else {
                move_offset(&doc, focus, *granularity, *direction)
            };
            let focus = doc.position_at(target)?;
            let moved = if *extend {
                Selection::new(selection.anchor.clone(), focus)
            } else {
                Selection::collapsed(focus)
            };
            if moved == selection {
                CommandOutcome::Unchanged
            } else {
                CommandOutcome::Select(moved)
            }
        }
        Command::DeleteWordBackward => delete_word_backward(&doc, anchor, focus)?,
    };

    debug!("translated {command:?} into {outcome:?}");
    Ok(outcome)
}

fn move_offset(doc: &DocumentText, offset: usize, granularity: Granularity, direction: Direction) -> usize {
    let forward = direction == Direction::Forward;
    match granularity {
        Granularity::Character if forward => (offset + 1).min(doc.len()),
        Granularity::Character => offset.saturating_sub(1),
        Granularity::Word if forward => doc.next_word_end(offset),
        Granularity::Word => doc.previous_word_start(offset),
        Granularity::Line => {
            let line = doc.line_index(offset);
            let column = offset - doc.line_range(line).start;
            let target = if forward {
                if line + 1 >= doc.line_count() {
                    return doc.len();
                }
                line + 1
            } else {
                match line.checked_sub(1) {
                    Some(previous) => previous,
                    None => return 0,
                }
            };
            (doc.line_range(target).start + column).min(doc.line_last_caret(target))
        }
        Granularity::LineBoundary if forward => doc.line_last_caret(doc.line_index(offset)),
        Granularity::LineBoundary => doc.line_range(doc.line_index(offset)).start,
        Granularity::DocumentBoundary if forward => doc.len(),
        Granularity::DocumentBoundary => 0,
    }
}

/// Back to the previous word start, but never past a paragraph start. At the
/// very start of a paragraph only the separating newline goes.
fn delete_word_backward(doc: &DocumentText, anchor: usize, focus: usize) -> Result<CommandOutcome, EditError> {
    let (start, end) = if anchor != focus {
        (anchor.min(focus), anchor.max(focus))
    } else if focus == 0 {
        return Ok(CommandOutcome::Unchanged);
    } else {
        let floor = doc.paragraph_start(focus);
        let start = if floor == focus {
            focus - 1
        } else {
            doc.previous_word_start(focus).max(floor)
        };
        (start, focus)
    };
    Ok(CommandOutcome::Delete {
        start: doc.position_at(start)?,
        end: doc.position_at(end)?,
        text: doc.slice(start..end).to_string(),
    })
}
