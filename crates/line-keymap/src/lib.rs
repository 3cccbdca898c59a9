//! Command table: binds logical key events to named editing actions.
//!
//! Bindings are per-session and may be replaced by the host between
//! `read_line` calls via textual keyspecs (`"C-x"`, `"M-p"`, `"C-Up"`).

use std::collections::HashMap;
use std::str::FromStr;

use line_events::{Key, KeyPress, Mods};
use thiserror::Error;
use tracing::debug;

/// Named editing actions.
///
/// `Delete` on an empty buffer yields end-of-input (the classic Ctrl-D
/// dual role); `SendEof` exists for hosts that want the unconditional
/// form on a key of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    InsertCharacter,
    Backspace,
    Delete,
    MoveLeft,
    MoveRight,
    MoveWordLeft,
    MoveWordRight,
    BeginningOfLine,
    EndOfLine,
    KillToEndOfLine,
    KillToBeginningOfLine,
    KillNextWord,
    KillPrevWord,
    KillPrevWordToWhitespace,
    Yank,
    YankCycle,
    TransposeChars,
    CapitalizeWord,
    UpcaseWord,
    DowncaseWord,
    HistoryPrev,
    HistoryNext,
    HistoryFirst,
    HistoryLast,
    HistorySearchBackward,
    HistoryPrefixSearchBackward,
    HistoryPrefixSearchForward,
    Complete,
    HintNext,
    HintPrevious,
    ClearScreen,
    AcceptLine,
    Cancel,
    SendEof,
    Abort,
    Suspend,
    Redraw,
}

impl Action {
    pub const fn name(self) -> &'static str {
        match self {
            Action::InsertCharacter => "insert-character",
            Action::Backspace => "backspace",
            Action::Delete => "delete",
            Action::MoveLeft => "move-left",
            Action::MoveRight => "move-right",
            Action::MoveWordLeft => "move-word-left",
            Action::MoveWordRight => "move-word-right",
            Action::BeginningOfLine => "beginning-of-line",
            Action::EndOfLine => "end-of-line",
            Action::KillToEndOfLine => "kill-to-end-of-line",
            Action::KillToBeginningOfLine => "kill-to-beginning-of-line",
            Action::KillNextWord => "kill-next-word",
            Action::KillPrevWord => "kill-prev-word",
            Action::KillPrevWordToWhitespace => "kill-prev-word-to-whitespace",
            Action::Yank => "yank",
            Action::YankCycle => "yank-cycle",
            Action::TransposeChars => "transpose-chars",
            Action::CapitalizeWord => "capitalize-word",
            Action::UpcaseWord => "upcase-word",
            Action::DowncaseWord => "downcase-word",
            Action::HistoryPrev => "history-prev",
            Action::HistoryNext => "history-next",
            Action::HistoryFirst => "history-first",
            Action::HistoryLast => "history-last",
            Action::HistorySearchBackward => "history-search-backward",
            Action::HistoryPrefixSearchBackward => "history-prefix-search-backward",
            Action::HistoryPrefixSearchForward => "history-prefix-search-forward",
            Action::Complete => "complete",
            Action::HintNext => "hint-next",
            Action::HintPrevious => "hint-previous",
            Action::ClearScreen => "clear-screen",
            Action::AcceptLine => "accept-line",
            Action::Cancel => "cancel",
            Action::SendEof => "send-eof",
            Action::Abort => "abort",
            Action::Suspend => "suspend",
            Action::Redraw => "redraw",
        }
    }

    const ALL: &'static [Action] = &[
        Action::InsertCharacter,
        Action::Backspace,
        Action::Delete,
        Action::MoveLeft,
        Action::MoveRight,
        Action::MoveWordLeft,
        Action::MoveWordRight,
        Action::BeginningOfLine,
        Action::EndOfLine,
        Action::KillToEndOfLine,
        Action::KillToBeginningOfLine,
        Action::KillNextWord,
        Action::KillPrevWord,
        Action::KillPrevWordToWhitespace,
        Action::Yank,
        Action::YankCycle,
        Action::TransposeChars,
        Action::CapitalizeWord,
        Action::UpcaseWord,
        Action::DowncaseWord,
        Action::HistoryPrev,
        Action::HistoryNext,
        Action::HistoryFirst,
        Action::HistoryLast,
        Action::HistorySearchBackward,
        Action::HistoryPrefixSearchBackward,
        Action::HistoryPrefixSearchForward,
        Action::Complete,
        Action::HintNext,
        Action::HintPrevious,
        Action::ClearScreen,
        Action::AcceptLine,
        Action::Cancel,
        Action::SendEof,
        Action::Abort,
        Action::Suspend,
        Action::Redraw,
    ];
}

impl FromStr for Action {
    type Err = BindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .iter()
            .copied()
            .find(|a| a.name() == s)
            .ok_or_else(|| BindError::UnknownAction(s.to_string()))
    }
}

#[derive(Debug, Error)]
pub enum BindError {
    #[error("unknown key spec `{0}`")]
    UnknownKey(String),
    #[error("unknown action `{0}`")]
    UnknownAction(String),
}

/// Parse a textual key spec: optional `C-`/`M-`/`S-` prefixes followed by
/// a key name (`Up`, `Home`, `F2`, `Tab`, …) or a single character.
pub fn parse_keyspec(spec: &str) -> Result<KeyPress, BindError> {
    let mut rest = spec;
    let mut mods = Mods::empty();
    loop {
        if rest.len() > 2 && rest.starts_with("C-") {
            mods |= Mods::CTRL;
            rest = &rest[2..];
        } else if rest.len() > 2 && rest.starts_with("M-") {
            mods |= Mods::META;
            rest = &rest[2..];
        } else if rest.len() > 2 && rest.starts_with("S-") {
            mods |= Mods::SHIFT;
            rest = &rest[2..];
        } else {
            break;
        }
    }
    let key = match rest {
        "Enter" | "Return" | "CR" => Key::Enter,
        "Tab" => Key::Tab,
        "Backspace" | "BS" => Key::Backspace,
        "Esc" | "Escape" => Key::Esc,
        "Home" => Key::Home,
        "End" => Key::End,
        "Insert" | "Ins" => Key::Insert,
        "Delete" | "Del" => Key::Delete,
        "PageUp" | "PgUp" => Key::PageUp,
        "PageDown" | "PgDn" => Key::PageDown,
        "Up" => Key::Up,
        "Down" => Key::Down,
        "Left" => Key::Left,
        "Right" => Key::Right,
        "Space" => Key::Char(' '),
        _ => {
            let mut chars = rest.chars();
            match (chars.next(), chars.next()) {
                (Some('F'), Some(d)) if d.is_ascii_digit() && rest.len() <= 3 => {
                    let n: u8 = rest[1..]
                        .parse()
                        .map_err(|_| BindError::UnknownKey(spec.to_string()))?;
                    Key::F(n)
                }
                (Some(c), None) => Key::Char(c),
                _ => return Err(BindError::UnknownKey(spec.to_string())),
            }
        }
    };
    Ok(KeyPress { key, mods })
}

/// The session key→action table.
#[derive(Debug, Clone)]
pub struct Bindings {
    map: HashMap<KeyPress, Action>,
}

impl Default for Bindings {
    fn default() -> Self {
        Self::emacs()
    }
}

impl Bindings {
    /// The long-established emacs-style defaults.
    pub fn emacs() -> Self {
        use Action::*;
        let mut map = HashMap::new();
        let mut bind = |spec: &str, action: Action| {
            let press = parse_keyspec(spec).expect("default keyspec");
            map.insert(press, action);
        };
        bind("C-a", BeginningOfLine);
        bind("Home", BeginningOfLine);
        bind("C-e", EndOfLine);
        bind("End", EndOfLine);
        bind("C-b", MoveLeft);
        bind("Left", MoveLeft);
        bind("C-f", MoveRight);
        bind("Right", MoveRight);
        bind("C-Left", MoveWordLeft);
        bind("M-Left", MoveWordLeft);
        bind("M-b", MoveWordLeft);
        bind("C-Right", MoveWordRight);
        bind("M-Right", MoveWordRight);
        bind("M-f", MoveWordRight);
        bind("Backspace", Backspace);
        bind("Delete", Delete);
        bind("C-d", Delete);
        bind("C-k", KillToEndOfLine);
        bind("C-u", KillToBeginningOfLine);
        bind("M-d", KillNextWord);
        bind("M-Backspace", KillPrevWord);
        bind("C-w", KillPrevWordToWhitespace);
        bind("C-y", Yank);
        bind("M-y", YankCycle);
        bind("C-t", TransposeChars);
        bind("M-c", CapitalizeWord);
        bind("M-u", UpcaseWord);
        bind("M-l", DowncaseWord);
        bind("Up", HistoryPrev);
        bind("C-p", HistoryPrev);
        bind("Down", HistoryNext);
        bind("C-n", HistoryNext);
        bind("PageUp", HistoryFirst);
        bind("PageDown", HistoryLast);
        bind("C-r", HistorySearchBackward);
        bind("M-p", HistoryPrefixSearchBackward);
        bind("M-n", HistoryPrefixSearchForward);
        bind("Tab", Complete);
        bind("C-Down", HintNext);
        bind("C-Up", HintPrevious);
        bind("C-l", ClearScreen);
        bind("Enter", AcceptLine);
        bind("C-c", Cancel);
        bind("C-g", Abort);
        bind("C-z", Suspend);
        Self { map }
    }

    pub fn lookup(&self, press: &KeyPress) -> Option<Action> {
        self.map.get(press).copied()
    }

    pub fn bind(&mut self, press: KeyPress, action: Action) {
        debug!(target: "keymap", key = %press, action = action.name(), "rebind");
        self.map.insert(press, action);
    }

    /// Textual form used by the public `bind_key` API.
    pub fn bind_spec(&mut self, keyspec: &str, action_name: &str) -> Result<(), BindError> {
        let press = parse_keyspec(keyspec)?;
        let action = action_name.parse()?;
        self.bind(press, action);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bindings_spot_checks() {
        let b = Bindings::default();
        assert_eq!(
            b.lookup(&KeyPress::ctrl(Key::Char('r'))),
            Some(Action::HistorySearchBackward)
        );
        assert_eq!(
            b.lookup(&KeyPress::meta(Key::Char('y'))),
            Some(Action::YankCycle)
        );
        assert_eq!(b.lookup(&KeyPress::plain(Key::Tab)), Some(Action::Complete));
        assert_eq!(
            b.lookup(&KeyPress::ctrl(Key::Down)),
            Some(Action::HintNext)
        );
        assert_eq!(
            b.lookup(&KeyPress::plain(Key::PageUp)),
            Some(Action::HistoryFirst)
        );
        assert_eq!(b.lookup(&KeyPress::plain(Key::Char('a'))), None);
    }

    #[test]
    fn keyspec_parsing() {
        assert_eq!(
            parse_keyspec("C-x").unwrap(),
            KeyPress::ctrl(Key::Char('x'))
        );
        assert_eq!(
            parse_keyspec("C-M-Left").unwrap(),
            KeyPress {
                key: Key::Left,
                mods: Mods::CTRL | Mods::META
            }
        );
        assert_eq!(parse_keyspec("F2").unwrap(), KeyPress::plain(Key::F(2)));
        assert_eq!(
            parse_keyspec("Space").unwrap(),
            KeyPress::plain(Key::Char(' '))
        );
        assert!(parse_keyspec("C-").is_err());
        assert!(parse_keyspec("NoSuchKey").is_err());
    }

    #[test]
    fn action_names_round_trip() {
        for action in Action::ALL {
            assert_eq!(action.name().parse::<Action>().unwrap(), *action);
        }
    }

    #[test]
    fn rebinding_replaces_default() {
        let mut b = Bindings::default();
        b.bind_spec("C-t", "kill-to-end-of-line").unwrap();
        assert_eq!(
            b.lookup(&KeyPress::ctrl(Key::Char('t'))),
            Some(Action::KillToEndOfLine)
        );
        assert!(b.bind_spec("C-t", "no-such-action").is_err());
        assert!(b.bind_spec("Q-t", "yank").is_err());
    }
}
