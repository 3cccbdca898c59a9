//! Logical key and input event types shared by the decoder, the command
//! table and the edit loop.

use std::fmt;

bitflags::bitflags! {
    /// Modifier mask attached to a key press.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Mods: u8 {
        const CTRL  = 0b0000_0001;
        const META  = 0b0000_0010;
        const SHIFT = 0b0000_0100;
    }
}

/// A logical key: either a printable code point or a named key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Char(char),
    Enter,
    Tab,
    Backspace,
    Esc,
    Home,
    End,
    Insert,
    Delete,
    PageUp,
    PageDown,
    Up,
    Down,
    Left,
    Right,
    F(u8),
}

/// A key with its modifier mask; what the decoder hands to the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyPress {
    pub key: Key,
    pub mods: Mods,
}

impl KeyPress {
    pub fn plain(key: Key) -> Self {
        Self {
            key,
            mods: Mods::empty(),
        }
    }

    pub fn ctrl(key: Key) -> Self {
        Self {
            key,
            mods: Mods::CTRL,
        }
    }

    pub fn meta(key: Key) -> Self {
        Self {
            key,
            mods: Mods::META,
        }
    }

    /// True for an unmodified printable character (the insert fallback).
    pub fn is_plain_char(&self) -> bool {
        matches!(self.key, Key::Char(_)) && !self.mods.intersects(Mods::CTRL | Mods::META)
    }
}

impl fmt::Display for KeyPress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.mods.contains(Mods::CTRL) {
            write!(f, "C-")?;
        }
        if self.mods.contains(Mods::META) {
            write!(f, "M-")?;
        }
        if self.mods.contains(Mods::SHIFT) {
            write!(f, "S-")?;
        }
        match self.key {
            Key::Char(c) => write!(f, "{c}"),
            Key::F(n) => write!(f, "F{n}"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Decoded input events consumed by the edit loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Key(KeyPress),
    /// Start of a bracketed paste (`ESC [ 200 ~`).
    PasteBegin,
    /// Verbatim text inside a bracketed paste.
    PasteChunk(String),
    /// End of a bracketed paste (`ESC [ 201 ~`).
    PasteEnd,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyspec_display_forms() {
        let k = KeyPress {
            key: Key::Char('r'),
            mods: Mods::CTRL,
        };
        assert_eq!(k.to_string(), "C-r");
        let k = KeyPress {
            key: Key::Up,
            mods: Mods::CTRL | Mods::META,
        };
        assert_eq!(k.to_string(), "C-M-Up");
        assert_eq!(KeyPress::plain(Key::F(2)).to_string(), "F2");
    }

    #[test]
    fn plain_char_classification() {
        assert!(KeyPress::plain(Key::Char('a')).is_plain_char());
        assert!(!KeyPress::ctrl(Key::Char('a')).is_plain_char());
        assert!(!KeyPress::plain(Key::Enter).is_plain_char());
        // Shift alone still inserts (upper-case letters arrive shifted).
        let shifted = KeyPress {
            key: Key::Char('A'),
            mods: Mods::SHIFT,
        };
        assert!(shifted.is_plain_char());
    }
}
