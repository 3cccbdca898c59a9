//! Public error type for `read_line` and the persistence helpers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReadlineError {
    /// Terminal read or write failed; the terminal mode has been restored
    /// and the host decides whether to retry.
    #[error("terminal i/o: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of one `read_line` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadResult {
    /// The user accepted the line (Enter).
    Accepted(String),
    /// The line was discarded (Ctrl-C outside any sub-mode).
    Canceled,
    /// End of input (Ctrl-D on an empty buffer, or the stream closed).
    Eof,
}
