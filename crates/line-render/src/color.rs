//! The 16-color palette and its SGR encodings.
//!
//! Every color change re-emits from a reset (the `0;` prefix) so prior
//! attributes never leak between runs.

/// Foreground colors available to highlight, hint and bracket painting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Color {
    /// Terminal default foreground.
    #[default]
    Default,
    Black,
    Red,
    Green,
    Brown,
    Blue,
    Magenta,
    Cyan,
    LightGray,
    Gray,
    BrightRed,
    BrightGreen,
    Yellow,
    BrightBlue,
    BrightMagenta,
    BrightCyan,
    White,
    /// Inverse yellow-on-red cell used for unmatched brackets.
    Error,
}

impl Color {
    /// The SGR sequence selecting this color.
    pub fn sgr(self) -> &'static str {
        match self {
            Color::Default => "\x1b[0m",
            Color::Black => "\x1b[0;22;30m",
            Color::Red => "\x1b[0;22;31m",
            Color::Green => "\x1b[0;22;32m",
            Color::Brown => "\x1b[0;22;33m",
            Color::Blue => "\x1b[0;22;34m",
            Color::Magenta => "\x1b[0;22;35m",
            Color::Cyan => "\x1b[0;22;36m",
            Color::LightGray => "\x1b[0;22;37m",
            Color::Gray => "\x1b[0;1;30m",
            Color::BrightRed => "\x1b[0;1;31m",
            Color::BrightGreen => "\x1b[0;1;32m",
            Color::Yellow => "\x1b[0;1;33m",
            Color::BrightBlue => "\x1b[0;1;34m",
            Color::BrightMagenta => "\x1b[0;1;35m",
            Color::BrightCyan => "\x1b[0;1;36m",
            Color::White => "\x1b[0;1;37m",
            Color::Error => "\x1b[101;1;33m",
        }
    }
}
