//! Bounded command history with scan, incremental search and atomic
//! persistence.
//!
//! Entries are ordered oldest to newest. The file format is one UTF-8
//! record per line, newline-terminated; records may not contain embedded
//! newlines (rejected at `add` time).

use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;

use tracing::debug;

pub const DEFAULT_MAX_SIZE: usize = 1000;

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub text: String,
    pub stamp: SystemTime,
}

/// Location of an incremental-search hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchHit {
    /// Entry index (0 = oldest).
    pub index: usize,
    /// Code-point offset of the match start within the entry.
    pub start: usize,
}

#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
    max_size: usize,
    unique: bool,
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl History {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
            max_size: DEFAULT_MAX_SIZE,
            unique: true,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|e| e.text.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn set_max_size(&mut self, max: usize) {
        self.max_size = max;
        while self.entries.len() > self.max_size {
            self.entries.pop_front();
        }
    }

    pub fn set_unique(&mut self, unique: bool) {
        self.unique = unique;
    }

    /// Append a record. Returns false when the record is rejected: it
    /// contains an embedded newline, is empty, or duplicates the newest
    /// entry under the unique policy.
    pub fn add(&mut self, text: &str) -> bool {
        if text.is_empty() || text.contains('\n') || text.contains('\r') {
            return false;
        }
        if self.unique && self.entries.back().is_some_and(|e| e.text == text) {
            return false;
        }
        if self.max_size == 0 {
            return false;
        }
        while self.entries.len() >= self.max_size {
            self.entries.pop_front();
        }
        self.entries.push_back(HistoryEntry {
            text: text.to_string(),
            stamp: SystemTime::now(),
        });
        true
    }

    /// Newest hit at or before `from` containing `query` as a
    /// case-insensitive substring.
    pub fn search_backward(&self, query: &str, from: usize) -> Option<SearchHit> {
        if self.entries.is_empty() {
            return None;
        }
        let from = from.min(self.entries.len() - 1);
        for index in (0..=from).rev() {
            if let Some(start) = substring_ci(&self.entries[index].text, query) {
                return Some(SearchHit { index, start });
            }
        }
        None
    }

    /// Newest entry strictly before `before` whose text starts with
    /// `prefix` (code-point prefix, case-sensitive).
    pub fn prefix_search_backward(&self, prefix: &str, before: usize) -> Option<usize> {
        (0..before.min(self.entries.len()))
            .rev()
            .find(|&i| self.entries[i].text.starts_with(prefix))
    }

    /// Oldest entry strictly after `after` whose text starts with `prefix`.
    pub fn prefix_search_forward(&self, prefix: &str, after: usize) -> Option<usize> {
        ((after + 1)..self.entries.len()).find(|&i| self.entries[i].text.starts_with(prefix))
    }

    /// Replace the contents from a history file; missing files load as
    /// empty. Never fatal to an in-progress edit: the caller decides.
    pub fn load(&mut self, path: &Path) -> io::Result<()> {
        self.entries.clear();
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };
        for line in content.lines() {
            if line.is_empty() {
                continue;
            }
            while self.entries.len() >= self.max_size.max(1) {
                self.entries.pop_front();
            }
            if self.max_size > 0 {
                self.entries.push_back(HistoryEntry {
                    text: line.to_string(),
                    stamp: SystemTime::now(),
                });
            }
        }
        debug!(target: "history", records = self.entries.len(), "loaded");
        Ok(())
    }

    /// Write all records, atomically: a sibling temp file is renamed over
    /// the destination so readers never observe a partial file.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let mut data = String::new();
        for entry in &self.entries {
            data.push_str(&entry.text);
            data.push('\n');
        }
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = std::path::PathBuf::from(tmp);
        fs::write(&tmp, data.as_bytes())?;
        fs::rename(&tmp, path)?;
        debug!(target: "history", records = self.entries.len(), "saved");
        Ok(())
    }
}

/// Code-point offset of the first case-insensitive occurrence of
/// `needle` in `haystack`. An empty needle matches at offset 0.
fn substring_ci(haystack: &str, needle: &str) -> Option<usize> {
    let hay: Vec<char> = haystack.chars().flat_map(fold_char).collect();
    let needle: Vec<char> = needle.chars().flat_map(fold_char).collect();
    if needle.is_empty() {
        return Some(0);
    }
    if needle.len() > hay.len() {
        return None;
    }
    (0..=hay.len() - needle.len()).find(|&at| hay[at..at + needle.len()] == needle[..])
}

/// One-to-one case fold so match offsets stay aligned with the original
/// code points.
fn fold_char(c: char) -> std::iter::Take<std::char::ToLowercase> {
    c.to_lowercase().take(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(items: &[&str]) -> History {
        let mut h = History::new();
        for item in items {
            h.add(item);
        }
        h
    }

    #[test]
    fn add_rejects_embedded_newline() {
        let mut h = History::new();
        assert!(!h.add("two\nlines"));
        assert!(!h.add(""));
        assert!(h.add("one line"));
        assert_eq!(h.len(), 1);
    }

    #[test]
    fn unique_adjacent_dedup() {
        let mut h = History::new();
        assert!(h.add("same"));
        assert!(!h.add("same"));
        assert!(h.add("other"));
        assert!(h.add("same"));
        assert_eq!(h.len(), 3);

        h.set_unique(false);
        assert!(h.add("same"));
        assert_eq!(h.len(), 4);
    }

    #[test]
    fn capacity_drops_oldest() {
        let mut h = History::new();
        h.set_max_size(3);
        for item in ["one", "two", "three", "four", "five"] {
            h.add(item);
        }
        assert_eq!(h.len(), 3);
        assert_eq!(h.get(0), Some("three"));
        assert_eq!(h.get(2), Some("five"));
    }

    #[test]
    fn shrinking_max_size_truncates() {
        let mut h = filled(&["a", "b", "c", "d"]);
        h.set_max_size(2);
        assert_eq!(h.len(), 2);
        assert_eq!(h.get(0), Some("c"));
    }

    #[test]
    fn search_backward_finds_newest_first() {
        let h = filled(&[
            "some command",
            "alfa repl bravo",
            "other request",
            "charlie repl delta",
            "misc input",
            "echo repl golf",
            "final thoughts",
        ]);
        let hit = h.search_backward("repl", h.len() - 1).unwrap();
        assert_eq!(h.get(hit.index), Some("echo repl golf"));
        assert_eq!(hit.start, 5);
        // Stepping strictly older from the previous hit.
        let older = h.search_backward("repl", hit.index - 1).unwrap();
        assert_eq!(h.get(older.index), Some("charlie repl delta"));
        assert_eq!(older.start, 8);
    }

    #[test]
    fn search_is_case_insensitive() {
        let h = filled(&["Echo REPL Golf"]);
        let hit = h.search_backward("repl", 0).unwrap();
        assert_eq!(hit.start, 5);
        assert!(h.search_backward("absent", 0).is_none());
    }

    #[test]
    fn search_hit_contains_query_property() {
        let h = filled(&["alpha", "beta", "alphabet", "gamma"]);
        let mut from = h.len() - 1;
        let mut seen = Vec::new();
        while let Some(hit) = h.search_backward("alpha", from) {
            assert!(h.get(hit.index).unwrap().to_lowercase().contains("alpha"));
            seen.push(hit.index);
            if hit.index == 0 {
                break;
            }
            from = hit.index - 1;
        }
        assert_eq!(seen, vec![2, 0]);
    }

    #[test]
    fn prefix_search_both_directions() {
        let h = filled(&[
            "some command",
            "repl_alfa bravo",
            "other request",
            "repl_charlie delta",
            "misc input",
            "repl_echo golf",
            "final thoughts",
        ]);
        let newest = h.prefix_search_backward("repl", h.len()).unwrap();
        assert_eq!(h.get(newest), Some("repl_echo golf"));
        let older = h.prefix_search_backward("repl", newest).unwrap();
        assert_eq!(h.get(older), Some("repl_charlie delta"));
        let back = h.prefix_search_forward("repl", older).unwrap();
        assert_eq!(h.get(back), Some("repl_echo golf"));
        assert!(h.prefix_search_forward("repl", back).is_none());
    }

    #[test]
    fn save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.txt");
        let h = filled(&["one", "two", "three"]);
        h.save(&path).unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw, "one\ntwo\nthree\n");

        let mut loaded = History::new();
        loaded.load(&path).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.get(1), Some("two"));
    }

    #[test]
    fn load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = History::new();
        h.load(&dir.path().join("absent.txt")).unwrap();
        assert!(h.is_empty());
    }

    #[test]
    fn load_honors_max_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.txt");
        filled(&["a", "b", "c", "d", "e"]).save(&path).unwrap();
        let mut h = History::new();
        h.set_max_size(2);
        h.load(&path).unwrap();
        assert_eq!(h.len(), 2);
        assert_eq!(h.get(0), Some("d"));
    }
}
