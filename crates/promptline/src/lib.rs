//! promptline: an interactive single-line editor for terminal programs.
//!
//! A readline-style prompt with syntax coloring, inline hints, bracket
//! matching, prefix-matching tab completion with a pager, bounded command
//! history with incremental and prefix search, and a kill-ring, all
//! driven by a single-threaded edit loop over a narrow terminal trait.
//!
//! ```no_run
//! use promptline::{Editor, ReadResult};
//!
//! let mut editor = Editor::new().unwrap();
//! editor.set_completion_callback(|text, _start| {
//!     ["open", "offset"]
//!         .iter()
//!         .filter(|w| w.starts_with(&text[..]))
//!         .map(|w| w.to_string())
//!         .collect()
//! });
//! match editor.read_line("repl> ").unwrap() {
//!     ReadResult::Accepted(line) => println!("{line}"),
//!     ReadResult::Canceled => {}
//!     ReadResult::Eof => {}
//! }
//! ```

mod brackets;
mod callbacks;
mod completion;
mod config;
mod engine;
mod error;
mod hints;
mod killring;
mod printer;

use std::path::Path;
use std::time::Duration;

use crossbeam_channel::Receiver;
use line_history::History;
use line_keymap::Bindings;
use line_terminal::{RawModeGuard, Tty};
use line_text::WordBreaks;
use tracing::debug;

use crate::callbacks::Callbacks;
use crate::engine::{Session, normalize_preload, plain_read_line};
use crate::killring::KillRing;

pub use crate::config::EditorConfig;
pub use crate::error::{ReadResult, ReadlineError};
pub use crate::printer::Printer;
pub use line_keymap::{Action, BindError};
pub use line_render::Color;
pub use line_terminal::UnixTty;

/// The line editor. One instance owns the terminal for the duration of
/// each [`Editor::read_line`] call; history and the kill-ring persist
/// across calls.
pub struct Editor {
    tty: Box<dyn Tty>,
    config: EditorConfig,
    bindings: Bindings,
    history: History,
    killring: KillRing,
    callbacks: Callbacks,
    printer: Printer,
    print_rx: Receiver<String>,
    preload: Option<String>,
}

impl Editor {
    /// Editor on the process terminal.
    pub fn new() -> Result<Self, ReadlineError> {
        Ok(Self::with_tty(Box::new(UnixTty::new()?)))
    }

    /// Editor over a caller-supplied terminal endpoint (embedding,
    /// testing).
    pub fn with_tty(tty: Box<dyn Tty>) -> Self {
        let (printer, print_rx) = printer::print_channel(tty.waker());
        Self {
            tty,
            config: EditorConfig::default(),
            bindings: Bindings::default(),
            history: History::new(),
            killring: KillRing::default(),
            callbacks: Callbacks::default(),
            printer,
            print_rx,
            preload: None,
        }
    }

    /// Read one line. Blocks until the user accepts, cancels or ends
    /// input; the terminal mode is restored on every return path.
    pub fn read_line(&mut self, prompt: &str) -> Result<ReadResult, ReadlineError> {
        let preload = self.preload.take();
        if !self.tty.is_tty() || line_terminal::is_unsupported_term() {
            debug!(target: "engine", "unsupported terminal, plain-echo path");
            return plain_read_line(self.tty.as_mut(), prompt);
        }
        let guard = RawModeGuard::enter(self.tty.as_mut())?;
        let session = Session::new(
            guard,
            &self.config,
            &self.bindings,
            &mut self.history,
            &mut self.killring,
            &mut self.callbacks,
            &self.print_rx,
            prompt,
            preload,
        );
        session.run()
    }

    // ---- history ---------------------------------------------------------

    /// Append a record; rejected for embedded newlines and adjacent
    /// duplicates under the unique policy.
    pub fn history_add(&mut self, text: &str) -> bool {
        self.history.add(text)
    }

    pub fn history_load(&mut self, path: &Path) -> std::io::Result<()> {
        self.history.load(path)
    }

    pub fn history_save(&self, path: &Path) -> std::io::Result<()> {
        self.history.save(path)
    }

    pub fn history_size(&self) -> usize {
        self.history.len()
    }

    pub fn history_get(&self, index: usize) -> Option<&str> {
        self.history.get(index)
    }

    // ---- callbacks -------------------------------------------------------

    pub fn set_completion_callback(
        &mut self,
        cb: impl FnMut(&str, usize) -> Vec<String> + 'static,
    ) {
        self.callbacks.completion = Some(Box::new(cb));
    }

    pub fn set_hint_callback(
        &mut self,
        cb: impl FnMut(&str, usize) -> (Vec<String>, Color) + 'static,
    ) {
        self.callbacks.hint = Some(Box::new(cb));
    }

    pub fn set_highlight_callback(&mut self, cb: impl FnMut(&str) -> Vec<Color> + 'static) {
        self.callbacks.highlight = Some(Box::new(cb));
    }

    pub fn set_modify_callback(
        &mut self,
        cb: impl FnMut(&str, usize) -> (String, usize) + 'static,
    ) {
        self.callbacks.modify = Some(Box::new(cb));
    }

    /// Receives one line per recovered callback failure.
    pub fn set_error_sink(&mut self, cb: impl FnMut(&str) + 'static) {
        self.callbacks.error_sink = Some(Box::new(cb));
    }

    // ---- settings --------------------------------------------------------

    pub fn set_max_history_size(&mut self, max: usize) {
        self.history.set_max_size(max);
    }

    pub fn set_unique_history(&mut self, unique: bool) {
        self.history.set_unique(unique);
    }

    pub fn set_word_break_characters(&mut self, set: &str) {
        self.config.word_breaks = WordBreaks::new(set);
    }

    pub fn set_completion_count_cutoff(&mut self, cutoff: usize) {
        self.config.completion_cutoff = cutoff;
    }

    pub fn set_beep_on_ambiguous(&mut self, beep: bool) {
        self.config.beep_on_ambiguous = beep;
    }

    pub fn set_double_tab_to_complete(&mut self, double_tab: bool) {
        self.config.double_tab_completion = double_tab;
    }

    pub fn set_no_color(&mut self, no_color: bool) {
        self.config.no_color = no_color;
    }

    pub fn set_indent_multiline(&mut self, indent: bool) {
        self.config.indent_multiline = indent;
    }

    pub fn set_hint_delay(&mut self, millis: u64) {
        self.config.hint_delay = Duration::from_millis(millis);
    }

    pub fn set_max_hint_rows(&mut self, rows: usize) {
        self.config.max_hint_rows = rows;
    }

    pub fn set_bracketed_paste(&mut self, enabled: bool) {
        self.config.bracketed_paste = enabled;
    }

    /// Replace a binding before the next `read_line`.
    pub fn bind_key(&mut self, keyspec: &str, action_name: &str) -> Result<(), BindError> {
        self.bindings.bind_spec(keyspec, action_name)
    }

    /// Seed the next `read_line` buffer. Tab runs collapse to two
    /// spaces, line-break runs to one, other control characters drop.
    pub fn preload_buffer(&mut self, text: &str) {
        self.preload = Some(normalize_preload(text));
    }

    // ---- async -----------------------------------------------------------

    /// Thread-safe handle that prints above the active prompt.
    pub fn printer(&self) -> Printer {
        self.printer.clone()
    }
}
