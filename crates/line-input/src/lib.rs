//! Key decoder: converts the raw terminal byte stream into logical input
//! events.
//!
//! Covers UTF-8 (shortest form, U+FFFD substitution with resync), the CSI
//! numeric-tilde family, CSI-with-modifier arrows, `ESC O` alternates,
//! meta-prefixed characters, bracketed paste, and standalone ESC
//! disambiguated by a short bounded wait.

use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use line_events::{InputEvent, Key, KeyPress, Mods};
use line_terminal::{Tty, TtyRead};
use tracing::trace;

/// How long a lone ESC may wait for a follow-up byte before it is
/// reported as the Esc key.
pub const ESC_TIMEOUT: Duration = Duration::from_millis(50);

/// Result of one decode poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Event(InputEvent),
    /// The caller-supplied timeout elapsed.
    TimedOut,
    /// The async waker fired.
    Wake,
    /// The window size changed.
    Resized,
    /// Input stream closed.
    Eof,
}

#[derive(Debug, Default)]
pub struct KeyDecoder {
    /// Bytes read ahead of the current sequence (UTF-8 resync).
    pushback: VecDeque<u8>,
    /// Fully decoded events not yet handed out (paste bursts).
    pending: VecDeque<InputEvent>,
}

impl KeyDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait up to `timeout` for the next logical event.
    pub fn read_event(&mut self, tty: &mut dyn Tty, timeout: Option<Duration>) -> io::Result<Decoded> {
        if let Some(ev) = self.pending.pop_front() {
            return Ok(Decoded::Event(ev));
        }
        let byte = match self.next_byte(tty, timeout)? {
            Fetched::Byte(b) => b,
            Fetched::Other(other) => return Ok(other),
        };
        self.decode_byte(byte, tty)
    }

    fn next_byte(&mut self, tty: &mut dyn Tty, timeout: Option<Duration>) -> io::Result<Fetched> {
        if let Some(b) = self.pushback.pop_front() {
            return Ok(Fetched::Byte(b));
        }
        Ok(match tty.read(timeout)? {
            TtyRead::Byte(b) => Fetched::Byte(b),
            TtyRead::TimedOut => Fetched::Other(Decoded::TimedOut),
            TtyRead::Wake => Fetched::Other(Decoded::Wake),
            TtyRead::Resize => Fetched::Other(Decoded::Resized),
            TtyRead::Eof => Fetched::Other(Decoded::Eof),
        })
    }

    fn decode_byte(&mut self, byte: u8, tty: &mut dyn Tty) -> io::Result<Decoded> {
        let press = match byte {
            0x1b => return self.decode_escape(tty),
            b'\r' | b'\n' => KeyPress::plain(Key::Enter),
            b'\t' => KeyPress::plain(Key::Tab),
            0x08 | 0x7f => KeyPress::plain(Key::Backspace),
            0x00 => return Ok(Decoded::TimedOut), // NUL: nothing to report
            b @ 0x01..=0x1a => KeyPress::ctrl(Key::Char((b - 1 + b'a') as char)),
            // FS..US arrive as Ctrl-\ Ctrl-] Ctrl-^ Ctrl-_.
            b @ 0x1c..=0x1f => KeyPress::ctrl(Key::Char((b + 0x40) as char)),
            b if b < 0x80 => KeyPress::plain(Key::Char(b as char)),
            b => {
                let ch = self.decode_utf8(b, tty)?;
                KeyPress::plain(Key::Char(ch))
            }
        };
        trace!(target: "input.decode", key = %press, "key");
        Ok(Decoded::Event(InputEvent::Key(press)))
    }

    /// Assemble a multi-byte UTF-8 scalar; malformed input becomes U+FFFD
    /// and decoding resynchronizes at the next lead byte.
    fn decode_utf8(&mut self, lead: u8, tty: &mut dyn Tty) -> io::Result<char> {
        let (len, mut value) = match lead {
            0xc2..=0xdf => (2, (lead & 0x1f) as u32),
            0xe0..=0xef => (3, (lead & 0x0f) as u32),
            0xf0..=0xf4 => (4, (lead & 0x07) as u32),
            // 0x80..=0xc1 (stray continuation / overlong lead) and 0xf5+.
            _ => return Ok('\u{fffd}'),
        };
        for _ in 1..len {
            match self.next_byte(tty, Some(ESC_TIMEOUT))? {
                Fetched::Byte(b) if b & 0xc0 == 0x80 => {
                    value = (value << 6) | (b & 0x3f) as u32;
                }
                Fetched::Byte(b) => {
                    // Not a continuation: resync from this byte.
                    self.pushback.push_front(b);
                    return Ok('\u{fffd}');
                }
                Fetched::Other(_) => return Ok('\u{fffd}'),
            }
        }
        let min = match len {
            2 => 0x80,
            3 => 0x800,
            _ => 0x10000,
        };
        if value < min {
            // Overlong encoding rejected by the shortest-form rule.
            return Ok('\u{fffd}');
        }
        Ok(char::from_u32(value).unwrap_or('\u{fffd}'))
    }

    fn decode_escape(&mut self, tty: &mut dyn Tty) -> io::Result<Decoded> {
        let byte = match self.next_byte(tty, Some(ESC_TIMEOUT))? {
            Fetched::Byte(b) => b,
            // Nothing followed: the user pressed ESC itself.
            Fetched::Other(Decoded::TimedOut) => {
                return Ok(Decoded::Event(InputEvent::Key(KeyPress::plain(Key::Esc))));
            }
            Fetched::Other(other) => return Ok(other),
        };
        match byte {
            b'[' => self.decode_csi(tty),
            b'O' => self.decode_ss3(tty),
            0x7f => Ok(Decoded::Event(InputEvent::Key(KeyPress::meta(
                Key::Backspace,
            )))),
            0x1b => {
                // ESC ESC: report the first, keep the second pending.
                self.pushback.push_front(0x1b);
                Ok(Decoded::Event(InputEvent::Key(KeyPress::plain(Key::Esc))))
            }
            b if (b as char).is_ascii_graphic() => Ok(Decoded::Event(InputEvent::Key(
                KeyPress::meta(Key::Char(b as char)),
            ))),
            _ => {
                trace!(target: "input.decode", byte, "unrecognized escape follower dropped");
                Ok(Decoded::TimedOut)
            }
        }
    }

    fn decode_csi(&mut self, tty: &mut dyn Tty) -> io::Result<Decoded> {
        let mut params: Vec<u32> = Vec::new();
        let mut current: Option<u32> = None;
        loop {
            let byte = match self.next_byte(tty, Some(ESC_TIMEOUT))? {
                Fetched::Byte(b) => b,
                Fetched::Other(Decoded::TimedOut) => return Ok(Decoded::TimedOut),
                Fetched::Other(other) => return Ok(other),
            };
            match byte {
                b'0'..=b'9' => {
                    current = Some(current.unwrap_or(0) * 10 + (byte - b'0') as u32);
                }
                b';' => {
                    params.push(current.take().unwrap_or(0));
                }
                final_byte @ 0x40..=0x7e => {
                    if let Some(v) = current.take() {
                        params.push(v);
                    }
                    return Ok(self.finish_csi(&params, final_byte, tty)?);
                }
                _ => {
                    trace!(target: "input.decode", byte, "malformed CSI dropped");
                    return Ok(Decoded::TimedOut);
                }
            }
        }
    }

    fn finish_csi(&mut self, params: &[u32], final_byte: u8, tty: &mut dyn Tty) -> io::Result<Decoded> {
        let mods = params.get(1).map_or(Mods::empty(), |m| csi_mods(*m));
        let event = match final_byte {
            b'A' => key_event(Key::Up, mods),
            b'B' => key_event(Key::Down, mods),
            b'C' => key_event(Key::Right, mods),
            b'D' => key_event(Key::Left, mods),
            b'~' => match params.first().copied().unwrap_or(0) {
                1 => key_event(Key::Home, mods),
                2 => key_event(Key::Insert, mods),
                3 => key_event(Key::Delete, mods),
                4 => key_event(Key::End, mods),
                5 => key_event(Key::PageUp, mods),
                6 => key_event(Key::PageDown, mods),
                200 => return self.collect_paste(tty),
                n => {
                    trace!(target: "input.decode", n, "unknown tilde code dropped");
                    return Ok(Decoded::TimedOut);
                }
            },
            b => {
                trace!(target: "input.decode", final_byte = b, "unknown CSI final dropped");
                return Ok(Decoded::TimedOut);
            }
        };
        Ok(event)
    }

    fn decode_ss3(&mut self, tty: &mut dyn Tty) -> io::Result<Decoded> {
        let byte = match self.next_byte(tty, Some(ESC_TIMEOUT))? {
            Fetched::Byte(b) => b,
            Fetched::Other(Decoded::TimedOut) => return Ok(Decoded::TimedOut),
            Fetched::Other(other) => return Ok(other),
        };
        let event = match byte {
            b'A' => key_event(Key::Up, Mods::empty()),
            b'B' => key_event(Key::Down, Mods::empty()),
            b'C' => key_event(Key::Right, Mods::empty()),
            b'D' => key_event(Key::Left, Mods::empty()),
            b'P' => key_event(Key::F(1), Mods::empty()),
            b'Q' => key_event(Key::F(2), Mods::empty()),
            _ => {
                trace!(target: "input.decode", byte, "unknown SS3 follower dropped");
                return Ok(Decoded::TimedOut);
            }
        };
        Ok(event)
    }

    /// Gather everything up to `ESC [ 201 ~` into one paste burst.
    fn collect_paste(&mut self, tty: &mut dyn Tty) -> io::Result<Decoded> {
        const TERMINATOR: &[u8] = b"\x1b[201~";
        let mut raw: Vec<u8> = Vec::new();
        loop {
            match self.next_byte(tty, Some(Duration::from_millis(500)))? {
                Fetched::Byte(b) => {
                    raw.push(b);
                    if raw.ends_with(TERMINATOR) {
                        raw.truncate(raw.len() - TERMINATOR.len());
                        break;
                    }
                }
                // Stream hiccup: treat what we have as the whole paste.
                Fetched::Other(_) => break,
            }
        }
        let text = String::from_utf8_lossy(&raw).into_owned();
        trace!(target: "input.decode", bytes = raw.len(), "paste burst");
        self.pending.push_back(InputEvent::PasteChunk(text));
        self.pending.push_back(InputEvent::PasteEnd);
        Ok(Decoded::Event(InputEvent::PasteBegin))
    }
}

enum Fetched {
    Byte(u8),
    Other(Decoded),
}

fn key_event(key: Key, mods: Mods) -> Decoded {
    Decoded::Event(InputEvent::Key(KeyPress { key, mods }))
}

/// xterm modifier parameter: 1 + bitmap(shift=1, meta=2, ctrl=4).
fn csi_mods(param: u32) -> Mods {
    let bits = param.saturating_sub(1);
    let mut mods = Mods::empty();
    if bits & 1 != 0 {
        mods |= Mods::SHIFT;
    }
    if bits & 2 != 0 {
        mods |= Mods::META;
    }
    if bits & 4 != 0 {
        mods |= Mods::CTRL;
    }
    mods
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Scripted byte source standing in for a terminal.
    struct Script {
        bytes: VecDeque<u8>,
    }

    impl Script {
        fn new(bytes: &[u8]) -> Self {
            Self {
                bytes: bytes.iter().copied().collect(),
            }
        }
    }

    impl Tty for Script {
        fn is_tty(&self) -> bool {
            true
        }
        fn read(&mut self, _timeout: Option<Duration>) -> io::Result<TtyRead> {
            Ok(match self.bytes.pop_front() {
                Some(b) => TtyRead::Byte(b),
                None => TtyRead::TimedOut,
            })
        }
        fn write(&mut self, _bytes: &[u8]) -> io::Result<()> {
            Ok(())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
        fn size(&self) -> (u16, u16) {
            (80, 25)
        }
        fn waker(&self) -> line_terminal::Waker {
            line_terminal::Waker::new(|| {})
        }
        fn enter_raw(&mut self) -> io::Result<()> {
            Ok(())
        }
        fn leave_raw(&mut self) -> io::Result<()> {
            Ok(())
        }
        fn suspend(&mut self) -> io::Result<()> {
            Ok(())
        }
        fn read_line_cooked(&mut self) -> io::Result<Option<String>> {
            Ok(None)
        }
    }

    fn decode_all(bytes: &[u8]) -> Vec<InputEvent> {
        let mut script = Script::new(bytes);
        let mut decoder = KeyDecoder::new();
        let mut out = Vec::new();
        loop {
            match decoder.read_event(&mut script, Some(Duration::ZERO)).unwrap() {
                Decoded::Event(ev) => out.push(ev),
                Decoded::TimedOut if script.bytes.is_empty() && decoder.pending.is_empty() => break,
                Decoded::TimedOut => continue,
                other => panic!("unexpected {other:?}"),
            }
        }
        out
    }

    fn single_key(bytes: &[u8]) -> KeyPress {
        match decode_all(bytes).as_slice() {
            [InputEvent::Key(k)] => *k,
            other => panic!("expected one key, got {other:?}"),
        }
    }

    #[test]
    fn plain_ascii() {
        assert_eq!(single_key(b"a"), KeyPress::plain(Key::Char('a')));
    }

    #[test]
    fn control_letters() {
        assert_eq!(single_key(&[0x12]), KeyPress::ctrl(Key::Char('r')));
        assert_eq!(single_key(&[0x17]), KeyPress::ctrl(Key::Char('w')));
        assert_eq!(single_key(&[0x19]), KeyPress::ctrl(Key::Char('y')));
    }

    #[test]
    fn enter_tab_backspace() {
        assert_eq!(single_key(b"\r"), KeyPress::plain(Key::Enter));
        assert_eq!(single_key(b"\t"), KeyPress::plain(Key::Tab));
        assert_eq!(single_key(&[0x7f]), KeyPress::plain(Key::Backspace));
        assert_eq!(single_key(&[0x08]), KeyPress::plain(Key::Backspace));
    }

    #[test]
    fn tilde_family() {
        assert_eq!(single_key(b"\x1b[1~"), KeyPress::plain(Key::Home));
        assert_eq!(single_key(b"\x1b[4~"), KeyPress::plain(Key::End));
        assert_eq!(single_key(b"\x1b[3~"), KeyPress::plain(Key::Delete));
        assert_eq!(single_key(b"\x1b[5~"), KeyPress::plain(Key::PageUp));
        assert_eq!(single_key(b"\x1b[6~"), KeyPress::plain(Key::PageDown));
    }

    #[test]
    fn arrows_plain_and_alternate() {
        assert_eq!(single_key(b"\x1b[A"), KeyPress::plain(Key::Up));
        assert_eq!(single_key(b"\x1bOD"), KeyPress::plain(Key::Left));
        assert_eq!(single_key(b"\x1bOP"), KeyPress::plain(Key::F(1)));
    }

    #[test]
    fn arrows_with_modifiers() {
        assert_eq!(single_key(b"\x1b[1;5D"), KeyPress::ctrl(Key::Left));
        assert_eq!(single_key(b"\x1b[1;3C"), KeyPress::meta(Key::Right));
        let shift_ctrl = single_key(b"\x1b[1;6A");
        assert_eq!(shift_ctrl.key, Key::Up);
        assert!(shift_ctrl.mods.contains(Mods::CTRL | Mods::SHIFT));
    }

    #[test]
    fn meta_prefix_and_meta_backspace() {
        assert_eq!(single_key(b"\x1bp"), KeyPress::meta(Key::Char('p')));
        assert_eq!(single_key(b"\x1by"), KeyPress::meta(Key::Char('y')));
        assert_eq!(single_key(&[0x1b, 0x7f]), KeyPress::meta(Key::Backspace));
    }

    #[test]
    fn lone_escape_times_out_to_esc_key() {
        assert_eq!(single_key(&[0x1b]), KeyPress::plain(Key::Esc));
    }

    #[test]
    fn utf8_multibyte() {
        assert_eq!(single_key("ó".as_bytes()), KeyPress::plain(Key::Char('ó')));
        assert_eq!(single_key("界".as_bytes()), KeyPress::plain(Key::Char('界')));
        assert_eq!(single_key("😀".as_bytes()), KeyPress::plain(Key::Char('😀')));
    }

    #[test]
    fn malformed_utf8_becomes_replacement_and_resyncs() {
        // Stray continuation byte, then a valid ASCII byte.
        let events = decode_all(&[0x80, b'x']);
        assert_eq!(
            events,
            vec![
                InputEvent::Key(KeyPress::plain(Key::Char('\u{fffd}'))),
                InputEvent::Key(KeyPress::plain(Key::Char('x'))),
            ]
        );
        // Truncated two-byte sequence followed by ASCII: the lead is
        // replaced and the follower survives.
        let events = decode_all(&[0xc3, b'q']);
        assert_eq!(
            events,
            vec![
                InputEvent::Key(KeyPress::plain(Key::Char('\u{fffd}'))),
                InputEvent::Key(KeyPress::plain(Key::Char('q'))),
            ]
        );
    }

    #[test]
    fn overlong_encoding_rejected() {
        // 0xC0 0xAF is an overlong '/': lead byte is already invalid.
        let events = decode_all(&[0xc0, 0xaf]);
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[0],
            InputEvent::Key(KeyPress {
                key: Key::Char('\u{fffd}'),
                ..
            })
        ));
        // 0xE0 0x80 0x80 is an overlong NUL with a valid lead byte.
        let events = decode_all(&[0xe0, 0x80, 0x80]);
        assert_eq!(
            events[0],
            InputEvent::Key(KeyPress::plain(Key::Char('\u{fffd}')))
        );
    }

    #[test]
    fn bracketed_paste_round_trip() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"\x1b[200~");
        bytes.extend_from_slice("pasted 界".as_bytes());
        bytes.extend_from_slice(b"\x1b[201~");
        let events = decode_all(&bytes);
        assert_eq!(
            events,
            vec![
                InputEvent::PasteBegin,
                InputEvent::PasteChunk("pasted 界".to_string()),
                InputEvent::PasteEnd,
            ]
        );
    }

    #[test]
    fn unknown_sequences_are_dropped() {
        // Unknown CSI final byte, then ordinary input.
        let events = decode_all(b"\x1b[9z!");
        assert_eq!(events, vec![InputEvent::Key(KeyPress::plain(Key::Char('!')))]);
    }
}
