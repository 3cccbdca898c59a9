//! Hint window state: the fetched hint list, the scroll selection and
//! the slot arithmetic behind the rows drawn below the cursor.
//!
//! Conceptually there are `len + 1` slots: slot 0 is the bare typed
//! word, slot `j` is `hints[j - 1]`. The selection cycles through them
//! with Ctrl-Down / Ctrl-Up; rows always show the slots following the
//! current one, wrapping around.

use line_render::Color;

#[derive(Debug, Default)]
pub struct HintState {
    pub hints: Vec<String>,
    pub color: Color,
    /// Index into `hints`; `None` is the bare-text slot.
    pub selection: Option<usize>,
}

impl HintState {
    pub fn clear(&mut self) {
        self.hints.clear();
        self.selection = None;
    }

    pub fn is_empty(&self) -> bool {
        self.hints.is_empty()
    }

    /// Hint whose remainder is drawn inline after the cursor, if any.
    pub fn inline(&self) -> Option<&str> {
        if let Some(i) = self.selection {
            return self.hints.get(i).map(|s| s.as_str());
        }
        if self.hints.len() == 1 {
            return self.hints.first().map(|s| s.as_str());
        }
        None
    }

    /// Slots for the rows below the cursor; 0 means the bare typed word.
    pub fn row_slots(&self, max_rows: usize) -> Vec<usize> {
        if self.hints.len() < 2 && self.selection.is_none() {
            return Vec::new();
        }
        let total = self.hints.len() + 1;
        let current = self.selection.map_or(0, |i| i + 1);
        let count = max_rows.min(self.hints.len());
        (1..=count).map(|k| (current + k) % total).collect()
    }

    pub fn scroll_down(&mut self) {
        self.selection = match self.selection {
            None => {
                if self.hints.is_empty() {
                    None
                } else {
                    Some(0)
                }
            }
            Some(i) if i + 1 < self.hints.len() => Some(i + 1),
            Some(_) => None,
        };
    }

    pub fn scroll_up(&mut self) {
        self.selection = match self.selection {
            None => self.hints.len().checked_sub(1),
            Some(0) => None,
            Some(i) => Some(i - 1),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(n: usize) -> HintState {
        HintState {
            hints: (0..n).map(|i| format!("hint{i}")).collect(),
            color: Color::Gray,
            selection: None,
        }
    }

    #[test]
    fn single_hint_is_inline_with_no_rows() {
        let h = filled(1);
        assert_eq!(h.inline(), Some("hint0"));
        assert!(h.row_slots(3).is_empty());
    }

    #[test]
    fn multiple_hints_show_rows_without_inline() {
        let h = filled(5);
        assert_eq!(h.inline(), None);
        assert_eq!(h.row_slots(3), vec![1, 2, 3]);
    }

    #[test]
    fn two_hints_fill_only_two_rows() {
        let h = filled(2);
        assert_eq!(h.row_slots(3), vec![1, 2]);
    }

    #[test]
    fn selection_scrolls_and_wraps() {
        let mut h = filled(3);
        h.scroll_down();
        assert_eq!(h.selection, Some(0));
        assert_eq!(h.inline(), Some("hint0"));
        // Rows after the selection wrap through the bare-text slot.
        assert_eq!(h.row_slots(3), vec![2, 3, 0]);
        h.scroll_down();
        h.scroll_down();
        assert_eq!(h.selection, Some(2));
        h.scroll_down();
        assert_eq!(h.selection, None);

        h.scroll_up();
        assert_eq!(h.selection, Some(2));
        h.scroll_up();
        h.scroll_up();
        assert_eq!(h.selection, Some(0));
        h.scroll_up();
        assert_eq!(h.selection, None);
    }

    #[test]
    fn rows_after_last_selection_wrap_to_front() {
        let mut h = filled(17);
        h.scroll_up(); // selection = 16 (last)
        assert_eq!(h.row_slots(3), vec![0, 1, 2]);
    }
}
