//! Pure completion helpers: common-prefix arithmetic and the
//! column-major listing geometry.

use line_render::visible_width;

/// Longest common prefix of the candidate set, in code points.
pub fn longest_common_prefix(items: &[String]) -> String {
    let Some(first) = items.first() else {
        return String::new();
    };
    let mut prefix: Vec<char> = first.chars().collect();
    for item in &items[1..] {
        let mut keep = 0;
        for (a, b) in prefix.iter().zip(item.chars()) {
            if *a != b {
                break;
            }
            keep += 1;
        }
        prefix.truncate(keep);
        if prefix.is_empty() {
            break;
        }
    }
    prefix.into_iter().collect()
}

/// Geometry of the candidate listing: columns sized to the longest
/// candidate plus two cells of gutter, filled column-major.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuLayout {
    pub columns: usize,
    pub rows: usize,
    pub col_width: usize,
}

impl MenuLayout {
    pub fn compute(items: &[String], screen_width: usize) -> Self {
        let longest = items.iter().map(|s| visible_width(s)).max().unwrap_or(0);
        let col_width = longest + 2;
        let columns = (screen_width / col_width.max(1)).max(1);
        let rows = items.len().div_ceil(columns);
        Self {
            columns,
            rows,
            col_width,
        }
    }

    /// Item index shown at a display cell, column-major.
    pub fn item_at(&self, row: usize, column: usize) -> usize {
        column * self.rows + row
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn common_prefix_basics() {
        assert_eq!(
            longest_common_prefix(&strings(&["color_red", "color_green", "color_rust"])),
            "color_"
        );
        assert_eq!(longest_common_prefix(&strings(&["only"])), "only");
        assert_eq!(longest_common_prefix(&strings(&["ab", "cd"])), "");
        assert_eq!(longest_common_prefix(&[]), "");
    }

    #[test]
    fn common_prefix_is_codepoint_aware() {
        assert_eq!(
            longest_common_prefix(&strings(&["πalpha", "πbeta"])),
            "π"
        );
    }

    #[test]
    fn menu_geometry_column_major() {
        // 17 items, longest 19 cells, screen 80 -> 3 columns of 21, 6 rows.
        let items: Vec<String> = (0..17)
            .map(|i| format!("color_brightmagent{i:01}"))
            .collect();
        let layout = MenuLayout::compute(&items, 80);
        assert_eq!(layout.col_width, 21);
        assert_eq!(layout.columns, 3);
        assert_eq!(layout.rows, 6);
        assert_eq!(layout.item_at(0, 0), 0);
        assert_eq!(layout.item_at(0, 1), 6);
        assert_eq!(layout.item_at(5, 2), 17); // out of range -> skipped by caller
    }

    #[test]
    fn narrow_screen_gets_single_column() {
        let items = strings(&["averylongcandidate"]);
        let layout = MenuLayout::compute(&items, 10);
        assert_eq!(layout.columns, 1);
        assert_eq!(layout.rows, 1);
    }
}
