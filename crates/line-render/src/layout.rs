//! Virtual render: breaks the styled buffer into terminal rows, expanding
//! tabs and control legends, and computes the cursor cell.
//!
//! Row 0 starts after the last prompt row (`first_col` cells in); later
//! rows start at column 0, or at `first_col` again when multiline
//! indenting is on. Soft wrap relies on the terminal's own auto-wrap, so
//! the span stream carries no explicit breaks unless indenting is active.

use crate::color::Color;
use line_text::cell_width;

/// A run of same-colored output text, post expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub color: Color,
    pub text: String,
}

/// Result of laying the buffer out against a window width.
#[derive(Debug, Clone, Default)]
pub struct Layout {
    pub spans: Vec<Span>,
    /// Cursor cell, 0-based (row within the frame, column).
    pub cursor: (usize, usize),
    /// Cell just past the written text, 0-based, wrap-normalized.
    pub end: (usize, usize),
    /// Text ended exactly on a row boundary; the painter must force the
    /// deferred wrap with a CRLF before adding rows below.
    pub needs_wrap_fill: bool,
}

impl Layout {
    /// Rows the buffer text occupies (including the row the end cell
    /// normalized onto).
    pub fn rows(&self) -> usize {
        self.end.0 + 1
    }

    /// Lay out `chars` with per-char `colors` (empty slice = all default).
    pub fn compute(
        chars: &[char],
        colors: &[Color],
        cursor_idx: usize,
        first_col: usize,
        width: usize,
        indent_wrapped: bool,
    ) -> Self {
        let width = width.max(first_col + 1).max(2);
        let indent = if indent_wrapped { first_col } else { 0 };
        let mut spans: Vec<Span> = Vec::new();
        let mut pending_break = String::new();
        let mut row = 0usize;
        let mut col = first_col;
        let mut cursor = None;
        let mut needs_wrap_fill = false;

        let push = |spans: &mut Vec<Span>, pending: &mut String, color: Color, text: &str| {
            if !pending.is_empty() {
                // Explicit row break travels with the next run.
                let mut t = std::mem::take(pending);
                t.push_str(text);
                spans.push(Span { color, text: t });
                return;
            }
            match spans.last_mut() {
                Some(last) if last.color == color => last.text.push_str(text),
                _ => spans.push(Span {
                    color,
                    text: text.to_string(),
                }),
            }
        };

        for (i, &ch) in chars.iter().enumerate() {
            if i == cursor_idx {
                cursor = Some(normalize(row, col, width));
            }
            let color = colors.get(i).copied().unwrap_or_default();
            let (text, w) = expand(ch, col);
            if w > 0 && col + w > width {
                row += 1;
                col = indent;
                if indent_wrapped {
                    pending_break = format!("\r\n{}", " ".repeat(indent));
                }
            }
            // Tab width depends on the final column.
            let (text, w) = if ch == '\t' { expand(ch, col) } else { (text, w) };
            push(&mut spans, &mut pending_break, color, &text);
            col += w;
        }
        if cursor_idx >= chars.len() {
            cursor = Some(normalize(row, col, width));
        }
        let end = normalize(row, col, width);
        if end.0 > row {
            needs_wrap_fill = true;
        }
        Self {
            spans,
            cursor: cursor.unwrap_or(end),
            end,
            needs_wrap_fill,
        }
    }
}

fn normalize(row: usize, col: usize, width: usize) -> (usize, usize) {
    if col >= width {
        (row + 1, 0)
    } else {
        (row, col)
    }
}

/// Expansion of one code point at a given column: the written text and
/// its cell width.
fn expand(ch: char, col: usize) -> (String, usize) {
    match ch {
        '\t' => {
            let spaces = 8 - (col % 8);
            (" ".repeat(spaces), spaces)
        }
        c if (c as u32) < 0x20 => {
            let legend = char::from_u32(c as u32 + 0x40).unwrap_or('?');
            (format!("^{legend}"), 2)
        }
        '\u{7f}' => ("^?".to_string(), 2),
        c => (c.to_string(), cell_width(c) as usize),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(chars: &str, cursor: usize, first_col: usize, width: usize) -> Layout {
        let chars: Vec<char> = chars.chars().collect();
        Layout::compute(&chars, &[], cursor, first_col, width, false)
    }

    #[test]
    fn single_row_cursor_math() {
        let l = plain("abc", 3, 8, 80);
        assert_eq!(l.cursor, (0, 11));
        assert_eq!(l.end, (0, 11));
        assert_eq!(l.rows(), 1);
        assert_eq!(l.spans.len(), 1);
        assert_eq!(l.spans[0].text, "abc");
    }

    #[test]
    fn wraps_after_prompt_offset() {
        // width 10, prompt 8: two cells on row 0, the rest wraps.
        let l = plain("abcdef", 6, 8, 10);
        assert_eq!(l.cursor, (1, 4));
        assert_eq!(l.end, (1, 4));
        assert_eq!(l.rows(), 2);
    }

    #[test]
    fn cursor_mid_text_on_wrapped_row() {
        let l = plain("abcdefghij", 3, 8, 10);
        assert_eq!(l.cursor, (1, 1));
    }

    #[test]
    fn exact_boundary_normalizes_to_next_row() {
        let l = plain("ab", 2, 8, 10);
        assert_eq!(l.end, (1, 0));
        assert_eq!(l.cursor, (1, 0));
        assert!(l.needs_wrap_fill);
    }

    #[test]
    fn wide_char_does_not_straddle_rows() {
        // Row 0 has one free cell (width 10, offset 9): the wide char
        // moves wholly to row 1.
        let l = plain("界", 1, 9, 10);
        assert_eq!(l.end, (1, 2));
    }

    #[test]
    fn control_chars_render_as_legend() {
        let chars: Vec<char> = vec!['\u{1}', 'x'];
        let l = Layout::compute(&chars, &[], 2, 0, 80, false);
        assert_eq!(l.spans[0].text, "^Ax");
        assert_eq!(l.end, (0, 3));
    }

    #[test]
    fn tab_advances_to_next_stop() {
        let chars: Vec<char> = "a\tb".chars().collect();
        let l = Layout::compute(&chars, &[], 3, 0, 80, false);
        // Column 1 -> next stop at 8.
        assert_eq!(l.spans[0].text, "a       b");
        assert_eq!(l.end, (0, 9));
    }

    #[test]
    fn colors_split_spans() {
        let chars: Vec<char> = "ab(".chars().collect();
        let colors = vec![Color::Default, Color::Default, Color::BrightMagenta];
        let l = Layout::compute(&chars, &colors, 3, 8, 80, false);
        assert_eq!(
            l.spans,
            vec![
                Span {
                    color: Color::Default,
                    text: "ab".into()
                },
                Span {
                    color: Color::BrightMagenta,
                    text: "(".into()
                },
            ]
        );
    }

    #[test]
    fn indent_mode_adds_explicit_breaks() {
        let chars: Vec<char> = "abcdef".chars().collect();
        let l = Layout::compute(&chars, &[], 0, 4, 8, true);
        // Row 0 fits 4 cells after the prompt, wrapped rows re-indent.
        let all: String = l.spans.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(all, "abcd\r\n    ef");
        assert_eq!(l.end, (1, 6));
    }

    #[test]
    fn rendered_cursor_column_matches_width_sum() {
        // Invariant: rendered column == sum of widths before the cursor,
        // wrapped at the window width, offset by the prompt row.
        let text = "aó界 xyz界界";
        let chars: Vec<char> = text.chars().collect();
        let width = 10usize;
        let first_col = 3usize;
        for cursor in 0..=chars.len() {
            let l = Layout::compute(&chars, &[], cursor, first_col, width, false);
            // Re-derive the wrapped cell from the width sums alone.
            let mut row = 0;
            let mut col = first_col;
            for &c in &chars[..cursor] {
                let w = cell_width(c) as usize;
                if w > 0 && col + w > width {
                    row += 1;
                    col = 0;
                }
                col += w;
            }
            let expect = if col >= width { (row + 1, 0) } else { (row, col) };
            assert_eq!(l.cursor, expect, "cursor index {cursor}");
        }
    }
}
