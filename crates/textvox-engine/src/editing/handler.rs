use std::time::{Duration, Instant};

use log::{debug, warn};
use textvox_config::Config;

use crate::editing::commands::{self, Command, CommandOutcome, Granularity};
use crate::editing::{LineBuilder, NarrationState, Selection, SelectionTracker};
use crate::error::EditError;
use crate::narration::{Intent, Narration, NarrationDiffEngine, NarrationOptions};
use crate::tree::AccessibilityTree;

pub use crate::narration::DEFAULT_POLL_INTERVAL;

/// Rate limit for re-reading a host that does not report every change.
#[derive(Debug, Clone)]
pub struct PollTimer {
    interval: Duration,
    last: Option<Instant>,
}

impl PollTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// True at most once per interval; a due check restarts the interval.
    pub fn is_due(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

/// Drives narration for one focused editable.
///
/// Host events come in through the `on_*` methods and [`poll`](Self::poll);
/// each returns what to speak and show. The previously narrated state is
/// cached between calls.
#[derive(Debug)]
pub struct TextEditHandler {
    tracker: SelectionTracker,
    options: NarrationOptions,
    pending: Option<Intent>,
    poll: PollTimer,
}

impl Default for TextEditHandler {
    fn default() -> Self {
        Self::new(NarrationOptions::default())
    }
}

impl TextEditHandler {
    pub fn new(options: NarrationOptions) -> Self {
        Self {
            tracker: SelectionTracker::new(),
            poll: PollTimer::new(options.poll_interval),
            options,
            pending: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(NarrationOptions::from(config))
    }

    pub fn options(&self) -> &NarrationOptions {
        &self.options
    }

    pub fn tracker(&self) -> &SelectionTracker {
        &self.tracker
    }

    /// The editable gained focus: forget everything and read the current line.
    pub fn on_focus<T: AccessibilityTree + ?Sized>(&mut self, tree: &T) -> Result<Narration, EditError> {
        self.tracker.clear();
        self.pending = None;
        let selection = tree.selection().ok_or(EditError::NoSelection)?;
        let state = self.state_for(tree, &selection)?;
        self.emit(tree, state, None)
    }

    pub fn on_selection_changed<T: AccessibilityTree + ?Sized>(
        &mut self,
        tree: &T,
        selection: Selection,
    ) -> Result<Narration, EditError> {
        let intent = self.pending.take();
        let state = self.state_for(tree, &selection)?;
        self.emit(tree, state, intent)
    }

    /// Translate a key command from the host's current selection, or the
    /// last narrated one if the host reports none. The intent is kept for the
    /// selection change the host reports once it has applied the outcome.
    pub fn on_command<T: AccessibilityTree + ?Sized>(
        &mut self,
        tree: &T,
        command: &Command,
    ) -> Result<CommandOutcome, EditError> {
        let selection = tree
            .selection()
            .or_else(|| self.tracker.previous().map(|state| state.selection.clone()))
            .ok_or(EditError::NoSelection)?;
        let outcome = commands::translate(tree, &selection, command)?;

        self.pending = match (command, &outcome) {
            (_, CommandOutcome::Unchanged) => None,
            (
                Command::Move {
                    granularity: Granularity::Character,
                    extend: false,
                    ..
                },
                _,
            ) => Some(Intent::Character),
            (Command::DeleteWordBackward, CommandOutcome::Delete { text, .. }) => {
                Some(Intent::WordDelete { text: text.clone() })
            }
            _ => None,
        };
        Ok(outcome)
    }

    /// Re-read the host if the poll interval has elapsed, narrating anything
    /// that changed without an event.
    pub fn poll<T: AccessibilityTree + ?Sized>(
        &mut self,
        tree: &T,
        now: Instant,
    ) -> Result<Option<Narration>, EditError> {
        if !self.poll.is_due(now) {
            return Ok(None);
        }
        let Some(selection) = tree.selection() else {
            return Ok(None);
        };
        let state = self.state_for(tree, &selection)?;
        let changed = match self.tracker.previous() {
            None => true,
            Some(prev) => {
                prev.selection != state.selection
                    || prev.line.text != state.line.text
                    || !SelectionTracker::is_valid_line(tree, &prev.line)
            }
        };
        if !changed {
            return Ok(None);
        }
        debug!("poll found an unreported change");
        let intent = self.pending.take();
        self.emit(tree, state, intent).map(Some)
    }

    fn state_for<T: AccessibilityTree + ?Sized>(
        &mut self,
        tree: &T,
        selection: &Selection,
    ) -> Result<NarrationState, EditError> {
        let built = selection.normalize(tree).and_then(|selection| {
            let line = LineBuilder::new(tree).build(&selection.anchor, &selection.focus, false)?;
            Ok(NarrationState::new(line, selection))
        });
        if let Err(EditError::StalePosition(node)) = &built {
            warn!("selection refers to removed node {node}, dropping cached line");
            self.tracker.clear();
        }
        built
    }

    fn emit<T: AccessibilityTree + ?Sized>(
        &mut self,
        tree: &T,
        state: NarrationState,
        intent: Option<Intent>,
    ) -> Result<Narration, EditError> {
        let narration = NarrationDiffEngine::new(tree, &self.options).diff_with_intent(
            self.tracker.previous(),
            &state,
            intent.as_ref(),
        )?;
        self.tracker.replace(state);
        Ok(narration)
    }
}
