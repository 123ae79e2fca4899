use crate::editing::LineSpan;
use crate::error::EditError;
use crate::tree::{AccessibilityTree, Role};

/// Flattened line for a braille display with the selection range in it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BrailleLine {
    pub text: String,
    pub start_index: usize,
    pub end_index: usize,
}

impl BrailleLine {
    /// Append a state token after the line text.
    fn push_token(&mut self, token: &str) {
        if !self.text.is_empty() && !self.text.ends_with('\n') {
            self.text.push(' ');
        }
        self.text.push_str(token);
    }
}

/// Heading level shared by every non-empty run, if the line is all heading.
pub(crate) fn heading_level<T: AccessibilityTree + ?Sized>(
    tree: &T,
    line: &LineSpan,
) -> Result<Option<u8>, EditError> {
    let mut level = None;
    for run in line.runs.iter().filter(|run| run.len > 0) {
        match (tree.resolve(run.node)?.attributes.heading_level, level) {
            (None, _) => return Ok(None),
            (Some(run_level), Some(seen)) if run_level != seen => return Ok(None),
            (Some(run_level), _) => level = Some(run_level),
        }
    }
    Ok(level)
}

/// Render `line`, optionally followed by state suffix tokens.
pub fn render<T: AccessibilityTree + ?Sized>(
    tree: &T,
    line: &LineSpan,
    suffixes: bool,
) -> Result<BrailleLine, EditError> {
    let mut braille = BrailleLine {
        text: line.text.clone(),
        start_index: line.start_offset,
        end_index: line.end_offset,
    };
    if !suffixes {
        return Ok(braille);
    }
    if let Some(tag) = heading_level(tree, line)?.and_then(|level| Role::Heading(level).braille_tag()) {
        braille.push_token(&tag);
    }
    if line.is_first_line()
        && let Some(tag) = tree
            .resolve(tree.root())?
            .role()
            .and_then(|role| role.braille_tag())
    {
        braille.push_token(&tag);
    }
    Ok(braille)
}
