//! Host-supplied callbacks: narrow value-in/value-out capability
//! interfaces with no shared-state assumptions.
//!
//! A panic inside a callback never unwinds through the edit loop: it is
//! caught at the invocation boundary, reported through the optional error
//! sink and the log, and an empty result is substituted.

use std::panic::{AssertUnwindSafe, catch_unwind};

use line_render::Color;
use tracing::error;

/// `(buffer_text, prefix_start)` → candidate replacement words.
pub type CompletionFn = dyn FnMut(&str, usize) -> Vec<String>;

/// `(buffer_text, prefix_start)` → full-word hints plus their color.
pub type HintFn = dyn FnMut(&str, usize) -> (Vec<String>, Color);

/// `buffer_text` → one color per code point.
pub type HighlightFn = dyn FnMut(&str) -> Vec<Color>;

/// `(buffer_text, cursor)` → possibly rewritten buffer and cursor.
pub type ModifyFn = dyn FnMut(&str, usize) -> (String, usize);

/// Receives one line per recovered callback failure.
pub type ErrorSinkFn = dyn FnMut(&str);

#[derive(Default)]
pub struct Callbacks {
    pub completion: Option<Box<CompletionFn>>,
    pub hint: Option<Box<HintFn>>,
    pub highlight: Option<Box<HighlightFn>>,
    pub modify: Option<Box<ModifyFn>>,
    pub error_sink: Option<Box<ErrorSinkFn>>,
}

impl Callbacks {
    fn report(&mut self, what: &str) {
        error!(target: "engine", callback = what, "host callback panicked");
        if let Some(sink) = self.error_sink.as_mut() {
            sink(&format!("{what} callback panicked"));
        }
    }

    pub fn completions(&mut self, text: &str, start: usize) -> Vec<String> {
        let Some(cb) = self.completion.as_mut() else {
            return Vec::new();
        };
        match catch_unwind(AssertUnwindSafe(|| cb(text, start))) {
            Ok(list) => list,
            Err(_) => {
                self.report("completion");
                Vec::new()
            }
        }
    }

    pub fn hints(&mut self, text: &str, start: usize) -> (Vec<String>, Color) {
        let Some(cb) = self.hint.as_mut() else {
            return (Vec::new(), Color::Gray);
        };
        match catch_unwind(AssertUnwindSafe(|| cb(text, start))) {
            Ok(result) => result,
            Err(_) => {
                self.report("hint");
                (Vec::new(), Color::Gray)
            }
        }
    }

    /// Per-code-point colors, sized to `len` (truncated or padded with
    /// the default color).
    pub fn highlight(&mut self, text: &str, len: usize) -> Vec<Color> {
        let mut colors = match self.highlight.as_mut() {
            Some(cb) => match catch_unwind(AssertUnwindSafe(|| cb(text))) {
                Ok(colors) => colors,
                Err(_) => {
                    self.report("highlight");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        colors.resize(len, Color::Default);
        colors
    }

    /// Apply the modify callback; a panic leaves the buffer untouched.
    pub fn modify(&mut self, text: &str, cursor: usize) -> Option<(String, usize)> {
        let cb = self.modify.as_mut()?;
        match catch_unwind(AssertUnwindSafe(|| cb(text, cursor))) {
            Ok(result) => Some(result),
            Err(_) => {
                self.report("modify");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_callbacks_yield_empty_results() {
        let mut cb = Callbacks::default();
        assert!(cb.completions("x", 0).is_empty());
        assert!(cb.hints("x", 0).0.is_empty());
        assert_eq!(cb.highlight("ab", 2), vec![Color::Default; 2]);
        assert!(cb.modify("ab", 1).is_none());
    }

    #[test]
    fn panicking_callback_is_contained_and_reported() {
        let mut cb = Callbacks::default();
        let reports = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = reports.clone();
        cb.error_sink = Some(Box::new(move |msg| {
            sink.lock().unwrap().push(msg.to_string());
        }));
        cb.completion = Some(Box::new(|_, _| panic!("host bug")));
        assert!(cb.completions("x", 0).is_empty());
        assert_eq!(reports.lock().unwrap().len(), 1);
    }

    #[test]
    fn highlight_is_resized_to_buffer_length() {
        let mut cb = Callbacks::default();
        cb.highlight = Some(Box::new(|_| vec![Color::Red]));
        assert_eq!(
            cb.highlight("abc", 3),
            vec![Color::Red, Color::Default, Color::Default]
        );
    }
}
