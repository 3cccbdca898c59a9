//! Frame painter: turns a target layout into the minimal byte stream that
//! moves the terminal from the previously painted frame to the new one.

use crate::color::Color;
use crate::layout::Layout;
use crate::prompt::Prompt;
use crate::vt;
use tracing::trace;

/// What the last paint left on screen; all a repaint needs to know.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameCache {
    /// Frame row the physical cursor was parked on.
    pub cursor_row: usize,
    /// Total rows the frame occupied (buffer rows + hint rows).
    pub rows: usize,
}

/// One hint row below the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HintRow {
    pub indent: usize,
    pub color: Color,
    pub text: String,
}

/// A fully computed repaint request.
#[derive(Debug)]
pub struct FrameTarget<'a> {
    /// Cells occupied by the last prompt row (frame row 0 starts after it).
    pub first_col: usize,
    pub layout: &'a Layout,
    pub hints: &'a [HintRow],
    pub no_color: bool,
}

/// Repaint the frame in place and return the new cache.
///
/// Emits: cursor-up to frame row 0, absolute column after the prompt,
/// erase-to-end-of-screen, the styled rows (auto-wrapped), optional hint
/// rows, then relative-up plus absolute-column to the target cursor cell.
pub fn refresh(out: &mut Vec<u8>, prev: &FrameCache, target: &FrameTarget<'_>) -> FrameCache {
    vt::cursor_up(out, prev.cursor_row);
    vt::cursor_col(out, target.first_col + 1);
    vt::push(out, vt::ERASE_TO_END);

    let mut current = Color::Default;
    for span in &target.layout.spans {
        if !target.no_color && span.color != current {
            vt::push(out, span.color.sgr());
            current = span.color;
        }
        vt::push(out, &span.text);
    }
    if !target.no_color {
        vt::push(out, vt::SGR_RESET);
    }
    if target.layout.needs_wrap_fill {
        vt::push(out, vt::CRLF);
    }

    for hint in target.hints {
        vt::push(out, vt::CRLF);
        vt::push(out, &" ".repeat(hint.indent));
        if !target.no_color {
            vt::push(out, hint.color.sgr());
        }
        vt::push(out, &hint.text);
        if !target.no_color {
            vt::push(out, vt::SGR_RESET);
        }
    }

    let bottom_row = target.layout.end.0 + target.hints.len();
    let (cursor_row, cursor_col) = target.layout.cursor;
    vt::cursor_up(out, bottom_row.saturating_sub(cursor_row));
    vt::cursor_col(out, cursor_col + 1);

    let cache = FrameCache {
        cursor_row,
        rows: target.layout.rows() + target.hints.len(),
    };
    trace!(
        target: "render",
        rows = cache.rows,
        cursor_row = cache.cursor_row,
        cursor_col,
        bytes = out.len(),
        "frame repaint"
    );
    cache
}

/// Hard clear: reset, home, erase, neutral attributes. The caller
/// rewrites the prompt and repaints from a fresh cache.
pub fn clear_screen(out: &mut Vec<u8>) {
    vt::push(out, vt::RESET_TERMINAL);
    vt::push(out, vt::CURSOR_HOME);
    vt::push(out, vt::CLEAR_SCREEN);
    vt::push(out, vt::SGR_RESET);
}

/// Write the prompt verbatim (LF expanded for raw mode).
pub fn write_prompt(out: &mut Vec<u8>, prompt: &Prompt) {
    vt::push(out, &prompt.raw_text());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Layout;

    fn render(chars: &str, colors: &[Color], cursor: usize, prev: FrameCache) -> (String, FrameCache) {
        let chars: Vec<char> = chars.chars().collect();
        let layout = Layout::compute(&chars, colors, cursor, 8, 80, false);
        let target = FrameTarget {
            first_col: 8,
            layout: &layout,
            hints: &[],
            no_color: false,
        };
        let mut out = Vec::new();
        let cache = refresh(&mut out, &prev, &target);
        (String::from_utf8(out).unwrap(), cache)
    }

    #[test]
    fn plain_insert_frame_bytes() {
        let (bytes, cache) = render("a", &[], 1, FrameCache::default());
        assert_eq!(bytes, "\x1b[9G\x1b[Ja\x1b[0m\x1b[10G");
        assert_eq!(cache, FrameCache { cursor_row: 0, rows: 1 });
    }

    #[test]
    fn cursor_at_home_repaints_whole_row() {
        let (bytes, _) = render("abc", &[], 0, FrameCache::default());
        assert_eq!(bytes, "\x1b[9G\x1b[Jabc\x1b[0m\x1b[9G");
    }

    #[test]
    fn colored_spans_reset_between_runs() {
        let colors = vec![
            Color::Default,
            Color::Default,
            Color::BrightMagenta,
            Color::Default,
        ];
        let (bytes, _) = render("ab(c", &colors, 4, FrameCache::default());
        assert_eq!(
            bytes,
            "\x1b[9G\x1b[Jab\x1b[0;1;35m(\x1b[0mc\x1b[0m\x1b[13G"
        );
    }

    #[test]
    fn repaint_from_wrapped_row_moves_up_first() {
        let prev = FrameCache { cursor_row: 2, rows: 3 };
        let (bytes, _) = render("ab", &[], 2, prev);
        assert!(bytes.starts_with("\x1b[2A\x1b[9G\x1b[J"));
    }

    #[test]
    fn hint_rows_are_written_below_and_cursor_returns() {
        let chars: Vec<char> = "co".chars().collect();
        let layout = Layout::compute(&chars, &[], 2, 8, 80, false);
        let hints = vec![
            HintRow {
                indent: 8,
                color: Color::Gray,
                text: "color_black".into(),
            },
            HintRow {
                indent: 8,
                color: Color::Gray,
                text: "color_red".into(),
            },
        ];
        let target = FrameTarget {
            first_col: 8,
            layout: &layout,
            hints: &hints,
            no_color: false,
        };
        let mut out = Vec::new();
        let cache = refresh(&mut out, &FrameCache::default(), &target);
        let s = String::from_utf8(out).unwrap();
        assert_eq!(
            s,
            "\x1b[9G\x1b[Jco\x1b[0m\
             \r\n        \x1b[0;1;30mcolor_black\x1b[0m\
             \r\n        \x1b[0;1;30mcolor_red\x1b[0m\
             \x1b[2A\x1b[11G"
        );
        assert_eq!(cache, FrameCache { cursor_row: 0, rows: 3 });
    }

    #[test]
    fn no_color_suppresses_all_sgr() {
        let colors = vec![Color::Red, Color::Red, Color::Red];
        let chars: Vec<char> = "abc".chars().collect();
        let layout = Layout::compute(&chars, &colors, 3, 8, 80, false);
        let target = FrameTarget {
            first_col: 8,
            layout: &layout,
            hints: &[],
            no_color: true,
        };
        let mut out = Vec::new();
        refresh(&mut out, &FrameCache::default(), &target);
        let s = String::from_utf8(out).unwrap();
        assert_eq!(s, "\x1b[9G\x1b[Jabc\x1b[12G");
    }

    #[test]
    fn clear_screen_sequence() {
        let mut out = Vec::new();
        clear_screen(&mut out);
        assert_eq!(out, b"\x1bc\x1b[H\x1b[2J\x1b[0m");
    }
}
