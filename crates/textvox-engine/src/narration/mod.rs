//! # Narration deltas
//!
//! [`NarrationDiffEngine`] compares the previously narrated state with the
//! current one and decides what to say. The checks run in a fixed order and
//! the first that applies wins:
//!
//! 1. a backward word delete speaks the deleted text
//! 2. a changed, non-collapsed selection speaks what was added or removed
//! 3. a new (or no longer valid) line speaks the whole line
//! 4. changed text on the same line speaks the inserted or removed text
//! 5. caret movement speaks the character or the traversed text, followed by
//!    formatting and marker transitions
//!
//! Every narration carries a [`BrailleLine`] for the current line.

pub mod attributes;
pub mod braille;

use std::collections::HashSet;
use std::time::Duration;

use log::debug;
use textvox_config::Config;

use crate::editing::{LineBuilder, LineSpan, NarrationState, PositionRef, SelectionTracker};
use crate::error::EditError;
use crate::text;
use crate::tree::{AccessibilityTree, AttributeSnapshot, Marker, NodeId, NodeKind, OBJECT_REPLACEMENT};

pub use braille::BrailleLine;

/// Spoken at the caret once it sits past the last character of the document.
pub const END_OF_TEXT: &str = "End of text";

/// Default interval between host polls for hosts that miss change events.
pub const DEFAULT_POLL_INTERVAL: Duration =
    Duration::from_millis(textvox_config::DEFAULT_POLL_INTERVAL_MS);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrationOptions {
    /// Speak formatting changes while stepping through characters
    pub announce_rich_text_attributes: bool,
    /// Append heading and widget tags to braille lines
    pub braille_suffixes: bool,
    pub poll_interval: Duration,
}

impl Default for NarrationOptions {
    fn default() -> Self {
        Self {
            announce_rich_text_attributes: true,
            braille_suffixes: true,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl From<&Config> for NarrationOptions {
    fn from(config: &Config) -> Self {
        Self {
            announce_rich_text_attributes: config.narration.announce_rich_text_attributes,
            braille_suffixes: config.braille.state_suffixes,
            poll_interval: config.poll_interval(),
        }
    }
}

/// What the user asked for, when known, ahead of the resulting change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Moved by one character
    Character,
    /// Deleted a word backwards; carries the removed text
    WordDelete { text: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Narration {
    pub speech: Vec<String>,
    pub braille: BrailleLine,
}

impl Narration {
    pub fn is_silent(&self) -> bool {
        self.speech.is_empty()
    }
}

pub struct NarrationDiffEngine<'a, T: AccessibilityTree + ?Sized> {
    tree: &'a T,
    options: &'a NarrationOptions,
}

impl<'a, T: AccessibilityTree + ?Sized> NarrationDiffEngine<'a, T> {
    pub fn new(tree: &'a T, options: &'a NarrationOptions) -> Self {
        Self { tree, options }
    }

    pub fn diff(&self, prev: Option<&NarrationState>, curr: &NarrationState) -> Result<Narration, EditError> {
        self.diff_with_intent(prev, curr, None)
    }

    pub fn diff_with_intent(
        &self,
        prev: Option<&NarrationState>,
        curr: &NarrationState,
        intent: Option<&Intent>,
    ) -> Result<Narration, EditError> {
        let speech = self.speech(prev, curr, intent)?;
        let braille = braille::render(self.tree, &curr.line, self.options.braille_suffixes)?;
        Ok(Narration { speech, braille })
    }

    fn speech(
        &self,
        prev: Option<&NarrationState>,
        curr: &NarrationState,
        intent: Option<&Intent>,
    ) -> Result<Vec<String>, EditError> {
        if let Some(Intent::WordDelete { text }) = intent {
            let deleted = text.trim_start().trim_end_matches('\n');
            if !deleted.trim().is_empty() {
                debug!("narrating word delete");
                return Ok(vec![format!("{deleted}, deleted")]);
            }
        }

        if !curr.selection.is_collapsed() && prev.is_none_or(|p| p.selection != curr.selection) {
            debug!("narrating selection change");
            return self.selection_change(prev, curr);
        }

        let Some(prev) = prev else {
            debug!("narrating fresh line");
            let mut speech = self.line_or_character(curr, intent)?;
            if let Some(label) = self.tree.resolve(self.tree.root())?.role().and_then(|r| r.label()) {
                speech.push(label.into_owned());
            }
            return Ok(speech);
        };

        let valid = SelectionTracker::is_valid_line(self.tree, &prev.line);
        let collapsing = !prev.selection.is_collapsed() && curr.selection.is_collapsed();
        if !valid || collapsing || !SelectionTracker::is_same_line(&prev.line, &curr.line) {
            debug!("narrating line change (valid: {valid}, collapsing: {collapsing})");
            return self.line_or_character(curr, intent);
        }

        if prev.line.text != curr.line.text {
            debug!("narrating text change");
            return Ok(text_change(&prev.line.text, &curr.line.text));
        }

        if curr.selection.is_collapsed() {
            return self.caret_movement(&prev.line, &curr.line);
        }
        Ok(Vec::new())
    }

    fn line_or_character(&self, curr: &NarrationState, intent: Option<&Intent>) -> Result<Vec<String>, EditError> {
        if intent == Some(&Intent::Character) && curr.selection.is_collapsed() {
            self.character(&curr.line, curr.line.start_offset)
        } else {
            self.line(&curr.line)
        }
    }

    /// Whole-line speech, split around links and embedded objects.
    fn line(&self, line: &LineSpan) -> Result<Vec<String>, EditError> {
        if line.text.is_empty() {
            return Ok(Vec::new());
        }
        // A trailing hard break is shown in braille but not spoken; a line
        // that is only a break still speaks it.
        let spoken = match line.text.strip_suffix('\n') {
            Some(rest) if !rest.is_empty() => rest,
            _ => line.text.as_str(),
        };
        if let Some(level) = braille::heading_level(self.tree, line)? {
            return Ok(vec![spoken.to_string(), format!("Heading {level}")]);
        }

        let mut pieces: Vec<(String, Option<String>)> = Vec::new();
        for run in line.runs.iter().filter(|run| run.len > 0) {
            let node = self.tree.resolve(run.node)?;
            let run_text = text::slice(&line.text, run.line_start, run.line_end());
            let (fragment, label) = match &node.kind {
                NodeKind::EmbeddedObject { name, role } => {
                    (name.clone(), role.label().map(|l| l.into_owned()))
                }
                _ if node.attributes.link => (run_text.to_string(), Some("Link".to_string())),
                _ => (run_text.to_string(), None),
            };
            match pieces.last_mut() {
                Some((text, last)) if *last == label && !node.attributes.embedded => text.push_str(&fragment),
                _ => pieces.push((fragment, label)),
            }
        }

        if pieces.iter().all(|(_, label)| label.is_none()) {
            return Ok(vec![spoken.to_string()]);
        }
        if let Some((text, _)) = pieces.last_mut()
            && text.ends_with('\n')
        {
            text.pop();
        }
        Ok(pieces
            .into_iter()
            .flat_map(|(text, label)| std::iter::once(text).chain(label))
            .filter(|fragment| !fragment.is_empty())
            .collect())
    }

    /// What sits under the caret at line offset `offset`.
    fn character(&self, line: &LineSpan, offset: usize) -> Result<Vec<String>, EditError> {
        let Some(run) = line.run_at(offset) else {
            return Ok(vec![if line.is_last_line() {
                END_OF_TEXT.to_string()
            } else {
                "\n".to_string()
            }]);
        };
        if let NodeKind::EmbeddedObject { name, role } = &self.tree.resolve(run.node)?.kind {
            return Ok(std::iter::once(name.clone())
                .chain(role.label().map(|l| l.into_owned()))
                .collect());
        }
        Ok(text::char_at(&line.text, offset)
            .filter(|&c| c != OBJECT_REPLACEMENT)
            .map(|c| vec![c.to_string()])
            .unwrap_or_default())
    }

    fn attributes_at(&self, line: &LineSpan, offset: usize) -> Result<Option<&'a AttributeSnapshot>, EditError> {
        match line.run_at(offset) {
            Some(run) => Ok(Some(&self.tree.resolve(run.node)?.attributes)),
            None => Ok(None),
        }
    }

    /// Markers covering the character at line offset `offset`.
    fn markers_at(&self, line: &LineSpan, offset: usize) -> Result<HashSet<(NodeId, Marker)>, EditError> {
        let Some(run) = line.run_at(offset) else {
            return Ok(HashSet::new());
        };
        let local = run.node_start + offset - run.line_start;
        Ok(self
            .tree
            .resolve(run.node)?
            .attributes
            .markers_in(local..local + 1)
            .map(|marker| (run.node, marker.clone()))
            .collect())
    }

    fn caret_movement(&self, prev: &LineSpan, curr: &LineSpan) -> Result<Vec<String>, EditError> {
        let from = prev.start_offset;
        let to = curr.start_offset;
        if from == to {
            return Ok(Vec::new());
        }

        let mut speech = if from.abs_diff(to) == 1 {
            let mut speech = self.character(curr, to)?;
            if self.options.announce_rich_text_attributes
                && let (Some(before), Some(after)) = (self.attributes_at(curr, from)?, self.attributes_at(curr, to)?)
            {
                speech.extend(attributes::describe_changes(before, after));
            }
            speech
        } else {
            let traversed = text::slice(&curr.text, from.min(to), from.max(to)).trim();
            if traversed.is_empty() {
                self.character(curr, to)?
            } else {
                vec![traversed.to_string()]
            }
        };

        let left = self.markers_at(curr, from)?;
        let entered = self.markers_at(curr, to)?;
        let mut leaving: Vec<_> = left.difference(&entered).map(|(_, m)| m).collect();
        let mut entering: Vec<_> = entered.difference(&left).map(|(_, m)| m).collect();
        leaving.sort_by_key(|m| m.start);
        entering.sort_by_key(|m| m.start);
        speech.extend(leaving.into_iter().map(|m| attributes::leaving_marker(m.kind)));
        speech.extend(entering.into_iter().map(|m| attributes::entering_marker(m.kind)));

        debug!("narrating caret move {from} -> {to}");
        Ok(speech)
    }

    /// Speak the symmetric difference between the old and new selections.
    fn selection_change(&self, prev: Option<&NarrationState>, curr: &NarrationState) -> Result<Vec<String>, EditError> {
        let builder = LineBuilder::new(self.tree);
        let current = curr.selection.ordered(self.tree)?;
        let previous = prev
            .filter(|p| !p.selection.is_collapsed())
            .and_then(|p| p.selection.ordered(self.tree).ok());

        let Some(previous) = previous else {
            let selected = builder.text_between(&current.0, &current.1)?;
            return Ok(labelled(&selected, "selected"));
        };

        let mut speech = Vec::new();
        for (start, end) in self.difference(&previous, &current)? {
            speech.extend(labelled(&builder.text_between(&start, &end)?, "unselected"));
        }
        for (start, end) in self.difference(&current, &previous)? {
            speech.extend(labelled(&builder.text_between(&start, &end)?, "added to selection"));
        }
        Ok(speech)
    }

    /// Parts of range `a` not covered by range `b`, both in tree order.
    fn difference(
        &self,
        a: &(PositionRef, PositionRef),
        b: &(PositionRef, PositionRef),
    ) -> Result<Vec<(PositionRef, PositionRef)>, EditError> {
        let lt = |x: &PositionRef, y: &PositionRef| -> Result<bool, EditError> {
            Ok(PositionRef::compare(self.tree, x, y)?.is_lt())
        };
        if !lt(&b.0, &a.1)? || !lt(&a.0, &b.1)? {
            return Ok(vec![a.clone()]);
        }
        let mut parts = Vec::new();
        if lt(&a.0, &b.0)? {
            parts.push((a.0.clone(), b.0.clone()));
        }
        if lt(&b.1, &a.1)? {
            parts.push((b.1.clone(), a.1.clone()));
        }
        Ok(parts)
    }
}

/// Text followed by its label; whitespace-only text is left unspoken.
fn labelled(text: &str, label: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let mut speech = Vec::new();
    if !text.trim().is_empty() {
        speech.push(text.to_string());
    }
    speech.push(label.to_string());
    speech
}

/// Inserted text if any, else the removed text. Whitespace shifted in to pad
/// a fixed-width value does not count as an insertion.
fn text_change(before: &str, after: &str) -> Vec<String> {
    let prefix = before
        .chars()
        .zip(after.chars())
        .take_while(|(a, b)| a == b)
        .map(|(c, _)| c.len_utf8())
        .sum::<usize>();
    let suffix = before[prefix..]
        .chars()
        .rev()
        .zip(after[prefix..].chars().rev())
        .take_while(|(a, b)| a == b)
        .map(|(c, _)| c.len_utf8())
        .sum::<usize>();
    let inserted = &after[prefix..after.len() - suffix];
    let removed = &before[prefix..before.len() - suffix];
    let padding = inserted.trim().is_empty() && !removed.trim().is_empty();
    let spoken = if inserted.is_empty() || padding { removed } else { inserted };
    if spoken.is_empty() {
        Vec::new()
    } else {
        vec![spoken.to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("text1", "text2", "2")]
    #[case("6    ", "60   ", "0")]
    #[case("hello world", "hello  world", " ")]
    #[case("hello world", "hello", " world")]
    #[case("same", "same", "")]
    #[case("601             ", "60              ", "1")]
    #[case("hello world", "hello orld", "w")]
    #[case("abc", "abc ", " ")]
    fn text_change_prefers_inserted_text(#[case] before: &str, #[case] after: &str, #[case] expected: &str) {
        let spoken = text_change(before, after);
        assert_eq!(spoken.first().map(String::as_str).unwrap_or(""), expected);
    }

    #[test]
    fn whitespace_selection_speaks_only_the_label() {
        assert_eq!(labelled(" ", "selected"), vec!["selected"]);
        assert_eq!(labelled("ab", "selected"), vec!["ab", "selected"]);
        assert!(labelled("", "selected").is_empty());
    }

    #[test]
    fn options_follow_config() {
        let mut config = Config::default();
        config.narration.announce_rich_text_attributes = false;
        config.narration.poll_interval_ms = 50;
        config.braille.state_suffixes = false;

        let options = NarrationOptions::from(&config);

        assert!(!options.announce_rich_text_attributes);
        assert!(!options.braille_suffixes);
        assert_eq!(options.poll_interval, Duration::from_millis(50));
        assert_eq!(NarrationOptions::from(&Config::default()), NarrationOptions::default());
    }
}
