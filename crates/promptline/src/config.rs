//! Session configuration. Immutable during a `read_line` call; every
//! field has a public setter on the editor.

use std::time::Duration;

use line_text::WordBreaks;

pub const DEFAULT_KILL_RING_CAPACITY: usize = 60;
pub const DEFAULT_COMPLETION_CUTOFF: usize = 100;
pub const DEFAULT_MAX_HINT_ROWS: usize = 3;

#[derive(Debug, Clone)]
pub struct EditorConfig {
    /// Characters that delimit words for motion, kill and completion.
    pub word_breaks: WordBreaks,
    /// Candidate count above which the listing asks `Display all N
    /// possibilities? (y or n)` first.
    pub completion_cutoff: usize,
    /// Ring the bell when completion is ambiguous.
    pub beep_on_ambiguous: bool,
    /// Require a second unproductive Tab before listing candidates.
    pub double_tab_completion: bool,
    /// Suppress all SGR output (cursor movement is kept).
    pub no_color: bool,
    /// Indent soft-wrapped rows to the prompt width.
    pub indent_multiline: bool,
    /// Idle time before hints are requested; zero means immediately.
    pub hint_delay: Duration,
    /// Hint rows drawn below the cursor row.
    pub max_hint_rows: usize,
    /// Switch the terminal into bracketed-paste mode for the session.
    pub bracketed_paste: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            word_breaks: WordBreaks::default(),
            completion_cutoff: DEFAULT_COMPLETION_CUTOFF,
            beep_on_ambiguous: false,
            double_tab_completion: false,
            no_color: false,
            indent_multiline: false,
            hint_delay: Duration::ZERO,
            max_hint_rows: DEFAULT_MAX_HINT_ROWS,
            bracketed_paste: false,
        }
    }
}
