//! The edit loop: dispatches decoded key events to editing actions,
//! owns all mutable session state, and drives the renderer.
//!
//! Strictly single-threaded cooperative; the only cross-thread input is
//! the async-print channel drained at the top of every iteration.

use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use line_events::{InputEvent, Key, KeyPress};
use line_input::{Decoded, KeyDecoder};
use line_keymap::{Action, Bindings};
use line_render::{self as render, Color, FrameCache, FrameTarget, HintRow, Layout, Prompt, vt};
use line_terminal::{RawModeGuard, Tty};
use line_text::{LineBuffer, WordBreaks, cell_width};
use tracing::{debug, trace};

use crate::brackets::{self, MateScan};
use crate::callbacks::Callbacks;
use crate::completion::{MenuLayout, longest_common_prefix};
use crate::config::EditorConfig;
use crate::error::{ReadResult, ReadlineError};
use crate::hints::HintState;
use crate::killring::{KillDirection, KillRing};

const SEARCH_PROMPT: &str = "(reverse-i-search)`";
const MORE_PROMPT: &str = "--More--";
const MORE_ERASE: &str = "\r        \r";
const BRACKET_MATE_COLOR: Color = Color::BrightRed;
const BRACKETED_PASTE_ON: &[u8] = b"\x1b[?2004h";
const BRACKETED_PASTE_OFF: &[u8] = b"\x1b[?2004l";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LastAction {
    Other,
    Kill(KillDirection),
    Yank,
    PrefixSearch,
}

/// What the dispatched action asks the loop to do next.
enum Flow {
    Continue,
    Accept,
    Cancel,
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CaseMode {
    Capitalize,
    Upper,
    Lower,
}

pub(crate) struct Session<'a> {
    pub guard: RawModeGuard<'a>,
    pub cfg: &'a EditorConfig,
    pub bindings: &'a Bindings,
    pub history: &'a mut line_history::History,
    pub killring: &'a mut KillRing,
    pub callbacks: &'a mut Callbacks,
    pub print_rx: &'a Receiver<String>,
    pub decoder: KeyDecoder,
    pub prompt: Prompt,
    pub width: usize,
    pub height: usize,
    pub buf: LineBuffer,
    pub cursor: usize,
    pub frame: FrameCache,
    pub hist_index: usize,
    pub draft: String,
    pub prefix_filter: Option<String>,
    pub hint: HintState,
    pub hint_due: Option<Instant>,
    last_action: LastAction,
    yank_region: Option<(usize, usize)>,
    unproductive_tabs: u32,
    dirty: bool,
    mutated: bool,
}

impl<'a> Session<'a> {
    pub fn new(
        guard: RawModeGuard<'a>,
        cfg: &'a EditorConfig,
        bindings: &'a Bindings,
        history: &'a mut line_history::History,
        killring: &'a mut KillRing,
        callbacks: &'a mut Callbacks,
        print_rx: &'a Receiver<String>,
        prompt: &str,
        preload: Option<String>,
    ) -> Self {
        let hist_index = history.len();
        let buf = match &preload {
            Some(text) => LineBuffer::from_str(text),
            None => LineBuffer::new(),
        };
        let cursor = buf.len();
        Self {
            guard,
            cfg,
            bindings,
            history,
            killring,
            callbacks,
            print_rx,
            decoder: KeyDecoder::new(),
            prompt: Prompt::new(prompt),
            width: 80,
            height: 25,
            buf,
            cursor,
            frame: FrameCache::default(),
            hist_index,
            draft: String::new(),
            prefix_filter: None,
            hint: HintState::default(),
            hint_due: None,
            last_action: LastAction::Other,
            yank_region: None,
            unproductive_tabs: 0,
            dirty: false,
            mutated: false,
        }
    }

    pub fn run(mut self) -> Result<ReadResult, ReadlineError> {
        let (w, h) = self.guard.tty().size();
        self.width = w as usize;
        self.height = h as usize;
        if self.cfg.bracketed_paste {
            self.guard.tty().write(BRACKETED_PASTE_ON)?;
        }
        let prompt_bytes = self.prompt.raw_text().into_bytes();
        self.guard.tty().write(&prompt_bytes)?;
        self.guard.tty().flush()?;
        if !self.buf.is_empty() {
            self.schedule_hints();
            self.render()?;
        }
        let result = self.main_loop();
        if self.cfg.bracketed_paste {
            let tty = self.guard.tty();
            let _ = tty.write(BRACKETED_PASTE_OFF);
            let _ = tty.flush();
        }
        result
    }

    fn main_loop(&mut self) -> Result<ReadResult, ReadlineError> {
        loop {
            self.drain_async_prints()?;
            let timeout = self
                .hint_due
                .map(|due| due.saturating_duration_since(Instant::now()));
            match self.decoder.read_event(self.guard.tty(), timeout)? {
                Decoded::TimedOut => {
                    if self.hint_due.take().is_some() {
                        self.refresh_hints();
                        self.render()?;
                    }
                }
                Decoded::Wake => {} // drained at the top of the loop
                Decoded::Resized => self.on_resize()?,
                Decoded::Eof => return Ok(ReadResult::Eof),
                Decoded::Event(InputEvent::PasteBegin) => self.handle_paste()?,
                Decoded::Event(InputEvent::PasteChunk(_) | InputEvent::PasteEnd) => {}
                Decoded::Event(InputEvent::Key(press)) => match self.dispatch(press)? {
                    Flow::Continue => {}
                    Flow::Accept => return self.finish_accept(),
                    Flow::Cancel => return self.finish_cancel(),
                    Flow::Eof => return Ok(ReadResult::Eof),
                },
            }
        }
    }

    // ---- dispatch --------------------------------------------------------

    fn dispatch(&mut self, press: KeyPress) -> Result<Flow, ReadlineError> {
        let action = self.bindings.lookup(&press).or_else(|| {
            press
                .is_plain_char()
                .then_some(Action::InsertCharacter)
        });
        let Some(action) = action else {
            trace!(target: "engine", key = %press, "unbound key ignored");
            return Ok(Flow::Continue);
        };
        trace!(target: "engine", key = %press, action = action.name(), "dispatch");
        self.apply(action, press)
    }

    fn apply(&mut self, action: Action, press: KeyPress) -> Result<Flow, ReadlineError> {
        use Action::*;
        self.dirty = false;
        self.mutated = false;
        if action != Complete {
            self.unproductive_tabs = 0;
        }
        let next_last = match action {
            KillToEndOfLine | KillNextWord => LastAction::Kill(KillDirection::Forward),
            KillToBeginningOfLine | KillPrevWord | KillPrevWordToWhitespace => {
                LastAction::Kill(KillDirection::Backward)
            }
            Yank | YankCycle => LastAction::Yank,
            HistoryPrefixSearchBackward | HistoryPrefixSearchForward => LastAction::PrefixSearch,
            _ => LastAction::Other,
        };

        match action {
            InsertCharacter => {
                if let Key::Char(c) = press.key {
                    self.insert_char(c);
                }
            }
            Backspace => self.backspace(),
            Delete => {
                if self.buf.is_empty() && press == KeyPress::ctrl(Key::Char('d')) {
                    return Ok(Flow::Eof);
                }
                self.delete_at_cursor();
            }
            MoveLeft => self.move_to(self.buf.prev_pos(self.cursor)),
            MoveRight => self.move_to(self.buf.next_pos(self.cursor)),
            MoveWordLeft => self.move_to(self.buf.word_left(self.cursor, &self.cfg.word_breaks)),
            MoveWordRight => self.move_to(self.buf.word_right(self.cursor, &self.cfg.word_breaks)),
            BeginningOfLine => self.move_to(0),
            EndOfLine => self.move_to(self.buf.len()),
            KillToEndOfLine => self.kill_region(self.cursor, self.buf.len(), KillDirection::Forward),
            KillToBeginningOfLine => self.kill_region(0, self.cursor, KillDirection::Backward),
            KillNextWord => self.kill_region(
                self.cursor,
                self.buf.word_right(self.cursor, &self.cfg.word_breaks),
                KillDirection::Forward,
            ),
            KillPrevWord => self.kill_region(
                self.buf.word_left(self.cursor, &self.cfg.word_breaks),
                self.cursor,
                KillDirection::Backward,
            ),
            KillPrevWordToWhitespace => self.kill_region(
                self.buf.word_left(self.cursor, &WordBreaks::whitespace()),
                self.cursor,
                KillDirection::Backward,
            ),
            Yank => self.yank(),
            YankCycle => self.yank_cycle(),
            TransposeChars => self.transpose(),
            CapitalizeWord => self.case_word(CaseMode::Capitalize),
            UpcaseWord => self.case_word(CaseMode::Upper),
            DowncaseWord => self.case_word(CaseMode::Lower),
            HistoryPrev => self.history_prev(),
            HistoryNext => self.history_next(),
            HistoryFirst => self.history_jump(0),
            HistoryLast => self.history_jump(self.history.len()),
            HistorySearchBackward => {
                self.last_action = LastAction::Other;
                self.killring.seal();
                self.yank_region = None;
                return self.reverse_search();
            }
            HistoryPrefixSearchBackward => self.prefix_search(true),
            HistoryPrefixSearchForward => self.prefix_search(false),
            Complete => {
                self.last_action = LastAction::Other;
                self.killring.seal();
                self.yank_region = None;
                return self.complete().map(|_| Flow::Continue);
            }
            HintNext => {
                if !self.hint.is_empty() {
                    self.hint.scroll_down();
                    self.dirty = true;
                }
            }
            HintPrevious => {
                if !self.hint.is_empty() {
                    self.hint.scroll_up();
                    self.dirty = true;
                }
            }
            ClearScreen => self.clear_screen()?,
            AcceptLine => return Ok(Flow::Accept),
            Cancel => return Ok(Flow::Cancel),
            SendEof => {
                if self.buf.is_empty() {
                    return Ok(Flow::Eof);
                }
            }
            Abort => {} // no sub-mode is active here
            Suspend => self.suspend()?,
            Redraw => self.render()?,
        }

        self.last_action = next_last;
        if !matches!(next_last, LastAction::Kill(_)) {
            self.killring.seal();
        }
        if !matches!(next_last, LastAction::Yank) {
            self.yank_region = None;
        }
        self.after_action()?;
        Ok(Flow::Continue)
    }

    fn after_action(&mut self) -> Result<(), ReadlineError> {
        if self.mutated {
            if let Some((text, cursor)) = self.callbacks.modify(&self.buf.text(), self.cursor) {
                let len = self.buf.assign(&text);
                self.cursor = cursor.min(len);
            }
            self.hint.clear();
            self.schedule_hints();
        }
        if self.dirty {
            self.render()?;
        }
        Ok(())
    }

    fn schedule_hints(&mut self) {
        if self.cfg.hint_delay.is_zero() {
            self.refresh_hints();
        } else {
            self.hint_due = Some(Instant::now() + self.cfg.hint_delay);
        }
    }

    fn refresh_hints(&mut self) {
        self.hint.clear();
        if self.cursor != self.buf.len() || self.buf.is_empty() {
            return;
        }
        let start = self.word_start();
        let (hints, color) = self.callbacks.hints(&self.buf.text(), start);
        self.hint.hints = hints;
        self.hint.color = color;
    }

    // ---- primitive edits -------------------------------------------------

    fn mark_edit(&mut self) {
        self.dirty = true;
        self.mutated = true;
    }

    fn insert_char(&mut self, c: char) {
        self.buf.insert(self.cursor, c);
        self.cursor += 1;
        self.mark_edit();
    }

    fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let prev = self.buf.prev_pos(self.cursor);
        self.buf.erase(prev, self.cursor - prev);
        self.cursor = prev;
        self.mark_edit();
    }

    fn delete_at_cursor(&mut self) {
        let next = self.buf.next_pos(self.cursor);
        if next == self.cursor {
            return;
        }
        self.buf.erase(self.cursor, next - self.cursor);
        self.mark_edit();
    }

    fn move_to(&mut self, pos: usize) {
        if pos != self.cursor {
            self.cursor = pos;
            self.dirty = true;
        }
    }

    fn kill_region(&mut self, lo: usize, hi: usize, direction: KillDirection) {
        if lo >= hi {
            return;
        }
        let coalesce = self.last_action == LastAction::Kill(direction);
        let text = self.buf.erase(lo, hi - lo);
        self.killring.kill(&text, direction, coalesce);
        self.cursor = lo;
        self.mark_edit();
    }

    fn yank(&mut self) {
        let Some(text) = self.killring.yank().map(str::to_string) else {
            return;
        };
        let added = self.buf.insert_str(self.cursor, &text);
        self.yank_region = Some((self.cursor, added));
        self.cursor += added;
        self.mark_edit();
    }

    /// Legal only immediately after yank or yank-cycle; otherwise a no-op
    /// that leaves all state unchanged.
    fn yank_cycle(&mut self) {
        if self.last_action != LastAction::Yank {
            return;
        }
        let Some((start, len)) = self.yank_region else {
            return;
        };
        let Some(next) = self.killring.cycle().map(str::to_string) else {
            return;
        };
        self.buf.erase(start, len);
        let added = self.buf.insert_str(start, &next);
        self.yank_region = Some((start, added));
        self.cursor = start + added;
        self.mark_edit();
    }

    fn transpose(&mut self) {
        let len = self.buf.len();
        if self.cursor == 0 || len < 2 {
            return;
        }
        if self.cursor == len {
            self.buf.swap(len - 2, len - 1);
        } else {
            self.buf.swap(self.cursor - 1, self.cursor);
            self.cursor += 1;
        }
        self.mark_edit();
    }

    fn case_word(&mut self, mode: CaseMode) {
        let mut p = self.cursor;
        while let Some(ch) = self.buf.char_at(p) {
            if !self.cfg.word_breaks.is_break(ch) {
                break;
            }
            p += 1;
        }
        let mut first = true;
        while let Some(ch) = self.buf.char_at(p) {
            if self.cfg.word_breaks.is_break(ch) {
                break;
            }
            let new = match mode {
                CaseMode::Capitalize if first => upcase(ch),
                CaseMode::Capitalize => downcase(ch),
                CaseMode::Upper => upcase(ch),
                CaseMode::Lower => downcase(ch),
            };
            self.buf.replace(p, new);
            first = false;
            p += 1;
        }
        if p != self.cursor {
            self.cursor = p;
            self.mark_edit();
        }
    }

    // ---- history ---------------------------------------------------------

    fn load_history_slot(&mut self) {
        let text = if self.hist_index == self.history.len() {
            self.draft.clone()
        } else {
            self.history.get(self.hist_index).unwrap_or_default().to_string()
        };
        self.buf.assign(&text);
        self.cursor = self.buf.len();
        self.dirty = true;
        self.hint.clear();
        self.schedule_hints();
    }

    fn save_draft_if_live(&mut self) {
        if self.hist_index == self.history.len() {
            self.draft = self.buf.text();
        }
    }

    fn history_prev(&mut self) {
        if self.hist_index == 0 || self.history.is_empty() {
            return;
        }
        self.save_draft_if_live();
        self.hist_index -= 1;
        self.load_history_slot();
    }

    fn history_next(&mut self) {
        if self.hist_index >= self.history.len() {
            return;
        }
        self.hist_index += 1;
        self.load_history_slot();
    }

    fn history_jump(&mut self, index: usize) {
        if self.history.is_empty() || self.hist_index == index {
            return;
        }
        self.save_draft_if_live();
        self.hist_index = index;
        self.load_history_slot();
    }

    /// The text before the cursor at the first trigger is the filter;
    /// consecutive triggers keep it.
    fn prefix_search(&mut self, backward: bool) {
        let filter = if self.last_action == LastAction::PrefixSearch {
            self.prefix_filter.clone().unwrap_or_default()
        } else {
            let f = self.buf.slice(0, self.cursor);
            self.prefix_filter = Some(f.clone());
            f
        };
        if backward {
            self.save_draft_if_live();
            if let Some(i) = self.history.prefix_search_backward(&filter, self.hist_index) {
                self.hist_index = i;
                self.load_history_slot();
            }
        } else if let Some(i) = self.history.prefix_search_forward(&filter, self.hist_index) {
            self.hist_index = i;
            self.load_history_slot();
        } else if self.hist_index != self.history.len() {
            self.hist_index = self.history.len();
            self.load_history_slot();
        }
    }

    // ---- reverse incremental search -------------------------------------

    fn reverse_search(&mut self) -> Result<Flow, ReadlineError> {
        let saved_text = self.buf.text();
        let saved_cursor = self.cursor;
        let mut query = String::new();
        let mut hit_text = saved_text.clone();
        let mut hit_cursor = saved_cursor;
        let mut hist_pos: Option<usize> = None;
        self.render_search(&query, &hit_text, hit_cursor)?;

        loop {
            let event = self.decoder.read_event(self.guard.tty(), None)?;
            let press = match event {
                Decoded::Event(InputEvent::Key(press)) => press,
                Decoded::Eof => return Ok(Flow::Eof),
                Decoded::Resized => {
                    let (w, h) = self.guard.tty().size();
                    self.width = w as usize;
                    self.height = h as usize;
                    self.render_search(&query, &hit_text, hit_cursor)?;
                    continue;
                }
                _ => continue,
            };

            let ctrl_c = press == KeyPress::ctrl(Key::Char('c'));
            let ctrl_g = press == KeyPress::ctrl(Key::Char('g'));
            let ctrl_l = press == KeyPress::ctrl(Key::Char('l'));
            let ctrl_r = press == KeyPress::ctrl(Key::Char('r'));

            if ctrl_c || ctrl_g {
                self.buf.assign(&saved_text);
                self.cursor = saved_cursor;
                self.exit_search_frame()?;
                return Ok(Flow::Continue);
            }
            if ctrl_l {
                // Clear the screen without leaving the sub-mode.
                let mut out = Vec::new();
                render::clear_screen(&mut out);
                self.write_flush(&out)?;
                self.frame = FrameCache::default();
                self.render_search(&query, &hit_text, hit_cursor)?;
                continue;
            }
            if ctrl_r {
                let from = match hist_pos {
                    Some(0) => continue,
                    Some(p) => p - 1,
                    None => self.history.len().saturating_sub(1),
                };
                if let Some(hit) = self.history.search_backward(&query, from) {
                    hist_pos = Some(hit.index);
                    hit_text = self.history.get(hit.index).unwrap_or_default().to_string();
                    hit_cursor = hit.start;
                    self.render_search(&query, &hit_text, hit_cursor)?;
                }
                continue;
            }
            if press.is_plain_char() {
                if let Key::Char(c) = press.key {
                    query.push(c);
                    let from = hist_pos.unwrap_or_else(|| self.history.len().saturating_sub(1));
                    if let Some(hit) = self.history.search_backward(&query, from) {
                        hist_pos = Some(hit.index);
                        hit_text = self.history.get(hit.index).unwrap_or_default().to_string();
                        hit_cursor = hit.start;
                    }
                    self.render_search(&query, &hit_text, hit_cursor)?;
                    continue;
                }
            }
            if press.key == Key::Backspace && press.mods.is_empty() {
                query.pop();
                if query.is_empty() {
                    hist_pos = None;
                    hit_text = saved_text.clone();
                    hit_cursor = saved_cursor;
                } else if let Some(hit) = self
                    .history
                    .search_backward(&query, self.history.len().saturating_sub(1))
                {
                    hist_pos = Some(hit.index);
                    hit_text = self.history.get(hit.index).unwrap_or_default().to_string();
                    hit_cursor = hit.start;
                }
                self.render_search(&query, &hit_text, hit_cursor)?;
                continue;
            }

            // Any other key commits the hit and is dispatched normally.
            self.buf.assign(&hit_text);
            self.cursor = hit_cursor;
            self.hist_index = hist_pos.unwrap_or(self.history.len());
            self.exit_search_frame()?;
            return self.dispatch(press);
        }
    }

    fn render_search(&mut self, query: &str, hit: &str, hit_cursor: usize) -> Result<(), ReadlineError> {
        let mut out = Vec::new();
        vt::cursor_up(&mut out, self.frame.cursor_row);
        vt::cursor_col(&mut out, 1);
        vt::push(&mut out, vt::ERASE_TO_END);
        vt::push(&mut out, SEARCH_PROMPT);
        vt::push(&mut out, query);
        vt::push(&mut out, "': ");
        vt::push(&mut out, hit);
        let prefix = SEARCH_PROMPT.chars().count()
            + query.chars().map(|c| cell_width(c) as usize).sum::<usize>()
            + 3;
        let into_hit: usize = hit
            .chars()
            .take(hit_cursor)
            .map(|c| cell_width(c) as usize)
            .sum();
        vt::cursor_col(&mut out, prefix + into_hit + 1);
        self.frame = FrameCache { cursor_row: 0, rows: 1 };
        self.write_flush(&out)
    }

    /// Leave the search sub-mode: the search row is replaced by the
    /// prompt and a full repaint of the edit frame.
    fn exit_search_frame(&mut self) -> Result<(), ReadlineError> {
        let mut out = Vec::new();
        vt::cursor_col(&mut out, 1);
        vt::push(&mut out, vt::ERASE_TO_END);
        render::write_prompt(&mut out, &self.prompt);
        self.write_flush(&out)?;
        self.frame = FrameCache::default();
        self.hint.clear();
        self.schedule_hints();
        self.render()
    }

    // ---- completion ------------------------------------------------------

    fn word_start(&self) -> usize {
        let chars = self.buf.chars();
        let mut p = self.cursor;
        while p > 0 && !self.cfg.word_breaks.is_break(chars[p - 1]) {
            p -= 1;
        }
        p
    }

    fn replace_word(&mut self, start: usize, word: &str) {
        self.buf.erase(start, self.cursor - start);
        let added = self.buf.insert_str(start, word);
        self.cursor = start + added;
        self.mark_edit();
    }

    fn complete(&mut self) -> Result<(), ReadlineError> {
        let start = self.word_start();
        let candidates = self.callbacks.completions(&self.buf.text(), start);
        if candidates.is_empty() {
            self.unproductive_tabs = 0;
            return self.beep();
        }
        if candidates.len() == 1 {
            self.unproductive_tabs = 0;
            self.replace_word(start, &candidates[0]);
            return self.after_action();
        }
        if self.cfg.beep_on_ambiguous {
            self.beep()?;
        }
        let prefix_len = self.cursor - start;
        let lcp = longest_common_prefix(&candidates);
        if lcp.chars().count() > prefix_len {
            self.unproductive_tabs = 0;
            self.replace_word(start, &lcp);
            return self.after_action();
        }
        self.unproductive_tabs += 1;
        let threshold = if self.cfg.double_tab_completion { 2 } else { 1 };
        if self.unproductive_tabs < threshold {
            return Ok(());
        }
        self.unproductive_tabs = 0;
        self.show_candidates(&candidates, prefix_len)
    }

    /// Candidate listing below the frame, gated by the count cutoff and
    /// paged with `--More--` when taller than the window.
    fn show_candidates(&mut self, candidates: &[String], prefix_len: usize) -> Result<(), ReadlineError> {
        debug!(target: "engine", count = candidates.len(), "listing completions");
        self.render_for_listing()?;

        if candidates.len() > self.cfg.completion_cutoff {
            let mut out = Vec::new();
            vt::push(&mut out, vt::CRLF);
            vt::push(
                &mut out,
                &format!("Display all {} possibilities? (y or n)", candidates.len()),
            );
            self.write_flush(&out)?;
            loop {
                match self.read_key_blocking()? {
                    None => return Ok(()),
                    Some(press) if press == KeyPress::ctrl(Key::Char('c')) => {
                        self.write_flush(b"^C\r\n")?;
                        return self.reprint_after_listing();
                    }
                    Some(press) if press == KeyPress::ctrl(Key::Char('g')) => {
                        self.write_flush(vt::CRLF.as_bytes())?;
                        return self.reprint_after_listing();
                    }
                    Some(KeyPress { key: Key::Char('y' | 'Y'), .. }) => {
                        self.write_flush(vt::ERASE_TO_END.as_bytes())?;
                        break;
                    }
                    Some(KeyPress { key: Key::Char('n' | 'N'), .. }) => {
                        self.write_flush(vt::CRLF.as_bytes())?;
                        return self.reprint_after_listing();
                    }
                    Some(_) => self.beep()?,
                }
            }
        }

        let layout = MenuLayout::compute(candidates, self.width);
        let page = self.height.saturating_sub(1).max(1);
        let mut allowance = page;
        self.write_flush(vt::CRLF.as_bytes())?;
        for row in 0..layout.rows {
            if allowance == 0 {
                self.write_flush(MORE_PROMPT.as_bytes())?;
                loop {
                    match self.read_key_blocking()? {
                        None => return Ok(()),
                        Some(press) if press == KeyPress::ctrl(Key::Char('c')) => {
                            self.write_flush(b"^C\r\n")?;
                            return self.reprint_after_listing();
                        }
                        Some(press) if press == KeyPress::ctrl(Key::Char('g')) => {
                            self.write_flush(MORE_ERASE.as_bytes())?;
                            return self.reprint_after_listing();
                        }
                        Some(KeyPress { key: Key::Enter, .. }) => {
                            allowance = 1;
                            break;
                        }
                        Some(KeyPress { key: Key::Char(' ' | 'y'), .. }) => {
                            allowance = page;
                            break;
                        }
                        Some(KeyPress { key: Key::Char('q' | 'Q' | 'n' | 'N'), .. }) => {
                            self.write_flush(MORE_ERASE.as_bytes())?;
                            return self.reprint_after_listing();
                        }
                        Some(_) => self.beep()?,
                    }
                }
                self.write_flush(MORE_ERASE.as_bytes())?;
            }
            let mut out = Vec::new();
            for col in 0..layout.columns {
                let idx = layout.item_at(row, col);
                let Some(item) = candidates.get(idx) else {
                    break;
                };
                let chars: Vec<char> = item.chars().collect();
                let split = prefix_len.min(chars.len());
                let head: String = chars[..split].iter().collect();
                let tail: String = chars[split..].iter().collect();
                if !self.cfg.no_color && !head.is_empty() {
                    vt::push(&mut out, Color::BrightMagenta.sgr());
                    vt::push(&mut out, &head);
                    vt::push(&mut out, vt::SGR_RESET);
                } else {
                    vt::push(&mut out, &head);
                }
                vt::push(&mut out, &tail);
                let is_last_col =
                    col + 1 == layout.columns || layout.item_at(row, col + 1) >= candidates.len();
                if !is_last_col {
                    let pad = layout.col_width.saturating_sub(line_render::visible_width(item));
                    vt::push(&mut out, &" ".repeat(pad));
                }
            }
            vt::push(&mut out, vt::CRLF);
            self.write_flush(&out)?;
            allowance -= 1;
        }
        self.reprint_after_listing()
    }

    /// Pre-listing frame: hints suppressed, cursor parked at the end of
    /// the buffer so the listing starts below the last frame row.
    fn render_for_listing(&mut self) -> Result<(), ReadlineError> {
        self.render_frame(self.buf.len(), false)
    }

    fn reprint_after_listing(&mut self) -> Result<(), ReadlineError> {
        let mut out = Vec::new();
        render::write_prompt(&mut out, &self.prompt);
        self.write_flush(&out)?;
        self.frame = FrameCache::default();
        self.render()
    }

    /// Blocking key read for the pager and cutoff prompts. `None` means
    /// the input stream ended.
    fn read_key_blocking(&mut self) -> Result<Option<KeyPress>, ReadlineError> {
        loop {
            match self.decoder.read_event(self.guard.tty(), None)? {
                Decoded::Event(InputEvent::Key(press)) => return Ok(Some(press)),
                Decoded::Eof => return Ok(None),
                _ => continue,
            }
        }
    }

    // ---- paste -----------------------------------------------------------

    fn handle_paste(&mut self) -> Result<(), ReadlineError> {
        loop {
            match self
                .decoder
                .read_event(self.guard.tty(), Some(Duration::from_millis(500)))?
            {
                Decoded::Event(InputEvent::PasteChunk(text)) => {
                    // One logical line: line breaks in pasted text are
                    // dropped.
                    for ch in text.chars().filter(|c| *c != '\n' && *c != '\r') {
                        self.buf.insert(self.cursor, ch);
                        self.cursor += 1;
                    }
                    self.mark_edit();
                }
                Decoded::Event(InputEvent::PasteEnd) | Decoded::TimedOut | Decoded::Eof => break,
                _ => continue,
            }
        }
        self.last_action = LastAction::Other;
        self.killring.seal();
        self.yank_region = None;
        self.after_action()
    }

    // ---- async prints, resize, suspend, clear ---------------------------

    fn drain_async_prints(&mut self) -> Result<(), ReadlineError> {
        let mut messages = Vec::new();
        while let Ok(msg) = self.print_rx.try_recv() {
            messages.push(msg);
        }
        if messages.is_empty() {
            return Ok(());
        }
        let mut out = Vec::new();
        vt::cursor_up(&mut out, self.frame.cursor_row);
        vt::cursor_col(&mut out, 1);
        vt::push(&mut out, vt::ERASE_TO_END);
        for msg in &messages {
            let normalized = msg.replace('\n', "\r\n");
            vt::push(&mut out, &normalized);
            if !normalized.ends_with('\n') {
                vt::push(&mut out, vt::CRLF);
            }
        }
        render::write_prompt(&mut out, &self.prompt);
        // Reserve the frame's rows so repainting at the bottom of the
        // screen scrolls first instead of overflowing.
        let rows = self.frame.rows;
        if rows > 1 {
            for _ in 1..rows {
                vt::push(&mut out, vt::CRLF);
            }
            vt::cursor_up(&mut out, rows - 1);
        }
        self.write_flush(&out)?;
        self.frame = FrameCache::default();
        self.render()
    }

    fn on_resize(&mut self) -> Result<(), ReadlineError> {
        let (w, h) = self.guard.tty().size();
        self.width = w as usize;
        self.height = h as usize;
        debug!(target: "engine", width = w, height = h, "window resized");
        self.frame = FrameCache::default();
        self.render()
    }

    fn suspend(&mut self) -> Result<(), ReadlineError> {
        self.guard.tty().suspend()?;
        let mut out = Vec::new();
        render::write_prompt(&mut out, &self.prompt);
        self.write_flush(&out)?;
        self.frame = FrameCache::default();
        self.render()
    }

    fn clear_screen(&mut self) -> Result<(), ReadlineError> {
        let mut out = Vec::new();
        render::clear_screen(&mut out);
        render::write_prompt(&mut out, &self.prompt);
        self.write_flush(&out)?;
        self.frame = FrameCache::default();
        self.render()
    }

    // ---- rendering -------------------------------------------------------

    fn render(&mut self) -> Result<(), ReadlineError> {
        self.render_frame(self.cursor, true)
    }

    fn render_frame(&mut self, cursor_idx: usize, with_hints: bool) -> Result<(), ReadlineError> {
        let text = self.buf.text();
        let mut colors = self.callbacks.highlight(&text, self.buf.len());
        self.apply_bracket_overlay(&mut colors);

        let mut display_chars: Vec<char> = self.buf.chars().to_vec();
        let mut display_colors = colors;
        let mut hint_rows: Vec<HintRow> = Vec::new();
        if with_hints && self.cursor == self.buf.len() && !self.hint.is_empty() {
            let start = self.word_start();
            let prefix_chars = self.cursor - start;
            if let Some(inline) = self.hint.inline() {
                for ch in inline.chars().skip(prefix_chars) {
                    display_chars.push(ch);
                    display_colors.push(self.hint.color);
                }
            }
            let indent = self.prompt.last_row_width();
            let max_cells = self.width.saturating_sub(indent + 1);
            for slot in self.hint.row_slots(self.cfg.max_hint_rows) {
                let row_text = if slot == 0 {
                    self.buf.slice(start, self.cursor)
                } else {
                    self.hint.hints[slot - 1].clone()
                };
                hint_rows.push(HintRow {
                    indent,
                    color: self.hint.color,
                    text: truncate_cells(&row_text, max_cells),
                });
            }
        }

        let layout = Layout::compute(
            &display_chars,
            &display_colors,
            cursor_idx,
            self.prompt.last_row_width(),
            self.width,
            self.cfg.indent_multiline,
        );
        let target = FrameTarget {
            first_col: self.prompt.last_row_width(),
            layout: &layout,
            hints: &hint_rows,
            no_color: self.cfg.no_color,
        };
        let mut out = Vec::new();
        self.frame = render::refresh(&mut out, &self.frame, &target);
        self.write_flush(&out)
    }

    /// Paint the mate of the bracket at (or just before) the cursor.
    fn apply_bracket_overlay(&mut self, colors: &mut [Color]) {
        let chars = self.buf.chars();
        let origin = if self.cursor < chars.len() && brackets::is_bracket(chars[self.cursor]) {
            Some(self.cursor)
        } else if self.cursor > 0 && brackets::is_bracket(chars[self.cursor - 1]) {
            Some(self.cursor - 1)
        } else {
            None
        };
        let Some(origin) = origin else { return };
        match brackets::find_mate(chars, origin) {
            MateScan::Matched(mate) => colors[mate] = BRACKET_MATE_COLOR,
            MateScan::Mismatched(mate) => colors[mate] = Color::Error,
            MateScan::None => {}
        }
    }

    // ---- endings ---------------------------------------------------------

    fn finish_accept(&mut self) -> Result<ReadResult, ReadlineError> {
        self.hint.clear();
        self.cursor = self.buf.len();
        self.render_frame(self.cursor, false)?;
        self.write_flush(vt::CRLF.as_bytes())?;
        Ok(ReadResult::Accepted(self.buf.text()))
    }

    fn finish_cancel(&mut self) -> Result<ReadResult, ReadlineError> {
        self.hint.clear();
        self.cursor = self.buf.len();
        self.render_frame(self.cursor, false)?;
        self.write_flush(b"^C\r\n")?;
        Ok(ReadResult::Canceled)
    }

    // ---- plumbing --------------------------------------------------------

    fn write_flush(&mut self, bytes: &[u8]) -> Result<(), ReadlineError> {
        let tty = self.guard.tty();
        tty.write(bytes)?;
        tty.flush()?;
        Ok(())
    }

    fn beep(&mut self) -> Result<(), ReadlineError> {
        self.write_flush(vt::BELL.as_bytes())
    }
}

fn upcase(ch: char) -> char {
    ch.to_uppercase().next().unwrap_or(ch)
}

fn downcase(ch: char) -> char {
    ch.to_lowercase().next().unwrap_or(ch)
}

/// Cut a string down to at most `max` display cells.
fn truncate_cells(s: &str, max: usize) -> String {
    let mut out = String::new();
    let mut used = 0;
    for ch in s.chars() {
        let w = cell_width(ch) as usize;
        if used + w > max {
            break;
        }
        used += w;
        out.push(ch);
    }
    out
}

/// Normalize preloaded text: tab runs become two spaces, line-break runs
/// one space, other control characters are dropped.
pub(crate) fn normalize_preload(text: &str) -> String {
    let mut out = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\t' => {
                while matches!(chars.peek(), Some('\t')) {
                    chars.next();
                }
                out.push_str("  ");
            }
            '\n' | '\r' => {
                while matches!(chars.peek(), Some('\n' | '\r')) {
                    chars.next();
                }
                out.push(' ');
            }
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}

pub(crate) fn plain_read_line(tty: &mut dyn Tty, prompt: &str) -> Result<ReadResult, ReadlineError> {
    if tty.is_tty() {
        tty.write(prompt.as_bytes())?;
        tty.flush()?;
    }
    match tty.read_line_cooked()? {
        Some(line) => Ok(ReadResult::Accepted(line)),
        None => Ok(ReadResult::Eof),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preload_normalization() {
        assert_eq!(normalize_preload("Alice has a cat."), "Alice has a cat.");
        assert_eq!(normalize_preload("Cat\teats\tmice.\r\n"), "Cat  eats  mice. ");
        assert_eq!(
            normalize_preload("M\t\t\t\tAlice has a cat."),
            "M  Alice has a cat."
        );
        assert_eq!(normalize_preload("M\nAlice"), "M Alice");
        assert_eq!(normalize_preload("a\r\n\r\n\n\nb"), "a b");
    }

    #[test]
    fn truncate_by_cells_counts_wide_chars() {
        assert_eq!(truncate_cells("abcdef", 3), "abc");
        assert_eq!(truncate_cells("界界界", 5), "界界");
        assert_eq!(truncate_cells("ab", 10), "ab");
    }

    #[test]
    fn io_error_maps_into_readline_error() {
        let err = ReadlineError::from(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone"));
        assert!(matches!(err, ReadlineError::Io(_)));
    }
}
