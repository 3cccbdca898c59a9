//! Terminal I/O abstraction: a narrow trait the engine reads and writes
//! through, plus the Unix implementation.
//!
//! The trait hides VT specifics (raw mode, polling, window size) so the
//! edit loop can be driven by an in-memory double in tests.

use std::io;
use std::sync::Arc;
use std::time::Duration;

#[cfg(unix)]
mod unix;

#[cfg(unix)]
pub use unix::UnixTty;

/// Outcome of one bounded read poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtyRead {
    /// One raw input byte.
    Byte(u8),
    /// The timeout elapsed with no input.
    TimedOut,
    /// The cross-thread waker fired (async print pending).
    Wake,
    /// The window size changed since the last poll.
    Resize,
    /// The input stream is closed.
    Eof,
}

/// Cross-thread wake handle; calling `wake` unblocks a pending
/// [`Tty::read`]. Cheap to clone and safe to call from any thread.
#[derive(Clone)]
pub struct Waker(Arc<dyn Fn() + Send + Sync>);

impl Waker {
    pub fn new(f: impl Fn() + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn wake(&self) {
        (self.0)()
    }
}

impl std::fmt::Debug for Waker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Waker")
    }
}

/// Blocking terminal endpoint used by the edit loop.
///
/// All reads are bounded: `timeout == None` blocks until a byte, a wake
/// or a resize arrives. Implementations must restore the previous
/// terminal mode in `leave_raw` and on drop.
pub trait Tty {
    /// Both ends connected to a real terminal?
    fn is_tty(&self) -> bool;

    /// Wait for the next byte, wake or resize, up to `timeout`.
    fn read(&mut self, timeout: Option<Duration>) -> io::Result<TtyRead>;

    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;

    /// Current window size as (columns, rows).
    fn size(&self) -> (u16, u16);

    /// Handle other threads use to unblock `read`.
    fn waker(&self) -> Waker;

    fn enter_raw(&mut self) -> io::Result<()>;

    fn leave_raw(&mut self) -> io::Result<()>;

    /// Stop the process (job control); returns after resumption with the
    /// terminal back in the mode it had before the call.
    fn suspend(&mut self) -> io::Result<()>;

    /// Cooked-mode line read for unsupported terminals; `None` on EOF.
    fn read_line_cooked(&mut self) -> io::Result<Option<String>>;
}

/// RAII guard keeping the terminal in raw mode for a scope.
///
/// Restores cooked mode on drop, which covers early returns, `?`
/// propagation and unwinding panics alike.
pub struct RawModeGuard<'a> {
    tty: &'a mut dyn Tty,
    active: bool,
}

impl<'a> RawModeGuard<'a> {
    pub fn enter(tty: &'a mut dyn Tty) -> io::Result<Self> {
        tty.enter_raw()?;
        Ok(Self { tty, active: true })
    }

    pub fn tty(&mut self) -> &mut dyn Tty {
        self.tty
    }

    /// Leave raw mode now; the guard stays usable for a later re-enter.
    pub fn release(&mut self) -> io::Result<()> {
        if self.active {
            self.active = false;
            self.tty.leave_raw()?;
        }
        Ok(())
    }

    pub fn reacquire(&mut self) -> io::Result<()> {
        if !self.active {
            self.tty.enter_raw()?;
            self.active = true;
        }
        Ok(())
    }
}

impl Drop for RawModeGuard<'_> {
    fn drop(&mut self) {
        if self.active {
            let _ = self.tty.leave_raw();
        }
    }
}

/// Terminals the renderer cannot drive; they get the plain-echo path.
pub fn is_unsupported_term() -> bool {
    match std::env::var("TERM") {
        Ok(term) => {
            let term = term.to_ascii_lowercase();
            term == "dumb" || term == "cons25" || term == "emacs"
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_term_names() {
        // Exercised via the env var; run serially within this module only.
        let saved = std::env::var("TERM").ok();
        unsafe { std::env::set_var("TERM", "dumb") };
        assert!(is_unsupported_term());
        unsafe { std::env::set_var("TERM", "xterm-256color") };
        assert!(!is_unsupported_term());
        match saved {
            Some(v) => unsafe { std::env::set_var("TERM", v) },
            None => unsafe { std::env::remove_var("TERM") },
        }
    }

    #[test]
    fn waker_is_callable_from_threads() {
        use std::sync::atomic::{AtomicBool, Ordering};
        let flag = Arc::new(AtomicBool::new(false));
        let f = flag.clone();
        let waker = Waker::new(move || f.store(true, Ordering::SeqCst));
        let handle = std::thread::spawn(move || waker.wake());
        handle.join().unwrap();
        assert!(flag.load(Ordering::SeqCst));
    }
}
