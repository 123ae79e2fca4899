/*!
 * # Editing Module
 *
 * Everything between a host's accessibility tree and the words spoken.
 *
 * ## Architecture Overview
 *
 * ### 1. Positions are tree references
 * - A **`PositionRef`** is a `(node, offset)` pair with offsets in UTF-16 units
 * - Container offsets are child indices and are normalized onto text leaves
 * - Positions go stale when their node is removed; every lookup reports it
 *
 * ### 2. Lines are rebuilt from the tree
 * - **`LineBuilder`** walks leaves outward from a position to the nearest line
 *   starts, honoring soft wraps, hard breaks and block boundaries
 * - The resulting **`LineSpan`** is a flat string plus the runs that produced it
 *
 * ### 3. The last narrated line is cached
 * - **`SelectionTracker`** keeps one `NarrationState` (line + selection)
 * - A cached line is only trusted while its start and end still re-derive
 *
 * ### 4. Commands and host events
 * - **`Command`**s translate into selections or deletions for the host to apply
 * - **`TextEditHandler`** ties it together and produces a `Narration` per event
 *
 * ## Module Structure
 *
 * - **`position`**: `PositionRef`, `Selection` and ordering
 * - **`line`**: `LineBuilder`, `LineSpan` and text between positions
 * - **`tracker`**: previous-state cache and line validity
 * - **`commands`**: key commands over the flattened document
 * - **`handler`**: event entry points and polling
 */

pub mod commands;
pub mod handler;
pub mod line;
pub mod position;
pub mod tracker;

pub use commands::{Command, CommandOutcome, Granularity, translate};
pub use handler::{DEFAULT_POLL_INTERVAL, PollTimer, TextEditHandler};
pub use line::{LineBuilder, LineRun, LineSpan, MAX_LINES};
pub use position::{Direction, PositionRef, Selection};
pub use tracker::{NarrationState, SelectionTracker};
