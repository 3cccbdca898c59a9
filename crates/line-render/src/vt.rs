//! The small VT sequence vocabulary the renderer is allowed to emit.

pub const CRLF: &str = "\r\n";
pub const BELL: &str = "\x07";
pub const ERASE_TO_END: &str = "\x1b[J";
pub const CLEAR_SCREEN: &str = "\x1b[2J";
pub const CURSOR_HOME: &str = "\x1b[H";
pub const RESET_TERMINAL: &str = "\x1bc";
pub const SGR_RESET: &str = "\x1b[0m";

/// Absolute column move, 1-based.
pub fn cursor_col(out: &mut Vec<u8>, col: usize) {
    out.extend_from_slice(format!("\x1b[{col}G").as_bytes());
}

/// Relative cursor up; no-op for zero rows.
pub fn cursor_up(out: &mut Vec<u8>, rows: usize) {
    if rows > 0 {
        out.extend_from_slice(format!("\x1b[{rows}A").as_bytes());
    }
}

pub fn push(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(s.as_bytes());
}
