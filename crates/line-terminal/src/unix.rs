//! Unix terminal backend: raw mode via crossterm, byte reads via poll(2)
//! over stdin plus a self-pipe waker, window-size change via a SIGWINCH
//! flag checked at every poll.

use std::io::{self, BufRead, Write};
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossterm::terminal;
use tracing::debug;

use crate::{Tty, TtyRead, Waker};

/// Set by the SIGWINCH handler, consumed at the next read poll.
static WINCH_PENDING: AtomicBool = AtomicBool::new(false);

extern "C" fn on_sigwinch(_sig: libc::c_int) {
    WINCH_PENDING.store(true, Ordering::SeqCst);
}

pub struct UnixTty {
    stdin_fd: RawFd,
    wake_read: RawFd,
    wake_write: RawFd,
    raw: bool,
    out: io::Stdout,
}

impl UnixTty {
    pub fn new() -> io::Result<Self> {
        let mut fds = [0 as libc::c_int; 2];
        if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
            return Err(io::Error::last_os_error());
        }
        for fd in fds {
            unsafe {
                libc::fcntl(fd, libc::F_SETFL, libc::O_NONBLOCK);
                libc::fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC);
            }
        }
        unsafe {
            let handler: extern "C" fn(libc::c_int) = on_sigwinch;
            libc::signal(libc::SIGWINCH, handler as libc::sighandler_t);
        }
        Ok(Self {
            stdin_fd: libc::STDIN_FILENO,
            wake_read: fds[0],
            wake_write: fds[1],
            raw: false,
            out: io::stdout(),
        })
    }

    fn drain_wake_pipe(&self) {
        let mut sink = [0u8; 64];
        loop {
            let n = unsafe {
                libc::read(
                    self.wake_read,
                    sink.as_mut_ptr() as *mut libc::c_void,
                    sink.len(),
                )
            };
            if n <= 0 {
                break;
            }
        }
    }
}

impl Tty for UnixTty {
    fn is_tty(&self) -> bool {
        unsafe { libc::isatty(self.stdin_fd) == 1 && libc::isatty(libc::STDOUT_FILENO) == 1 }
    }

    fn read(&mut self, timeout: Option<Duration>) -> io::Result<TtyRead> {
        loop {
            if WINCH_PENDING.swap(false, Ordering::SeqCst) {
                return Ok(TtyRead::Resize);
            }
            let mut fds = [
                libc::pollfd {
                    fd: self.stdin_fd,
                    events: libc::POLLIN,
                    revents: 0,
                },
                libc::pollfd {
                    fd: self.wake_read,
                    events: libc::POLLIN,
                    revents: 0,
                },
            ];
            let timeout_ms = match timeout {
                Some(t) => t.as_millis().min(i32::MAX as u128) as libc::c_int,
                None => -1,
            };
            let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) };
            if rc < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    // Signal delivery; the WINCH check at the loop head
                    // decides whether it was a resize.
                    continue;
                }
                return Err(err);
            }
            if rc == 0 {
                return Ok(TtyRead::TimedOut);
            }
            if fds[1].revents & libc::POLLIN != 0 {
                self.drain_wake_pipe();
                return Ok(TtyRead::Wake);
            }
            if fds[0].revents & (libc::POLLIN | libc::POLLHUP) != 0 {
                let mut byte = 0u8;
                let n = unsafe {
                    libc::read(self.stdin_fd, &mut byte as *mut u8 as *mut libc::c_void, 1)
                };
                if n < 0 {
                    return Err(io::Error::last_os_error());
                }
                if n == 0 {
                    return Ok(TtyRead::Eof);
                }
                return Ok(TtyRead::Byte(byte));
            }
        }
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.out.write_all(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    fn size(&self) -> (u16, u16) {
        terminal::size().unwrap_or((80, 25))
    }

    fn waker(&self) -> Waker {
        let fd = self.wake_write;
        Waker::new(move || {
            // A single byte is enough; EAGAIN on a full pipe is fine, the
            // reader is already due to wake.
            let byte = 1u8;
            unsafe {
                libc::write(fd, &byte as *const u8 as *const libc::c_void, 1);
            }
        })
    }

    fn enter_raw(&mut self) -> io::Result<()> {
        if !self.raw {
            terminal::enable_raw_mode()?;
            self.raw = true;
            debug!(target: "terminal", "raw mode enabled");
        }
        Ok(())
    }

    fn leave_raw(&mut self) -> io::Result<()> {
        if self.raw {
            terminal::disable_raw_mode()?;
            self.raw = false;
            debug!(target: "terminal", "raw mode disabled");
        }
        Ok(())
    }

    fn suspend(&mut self) -> io::Result<()> {
        let was_raw = self.raw;
        self.leave_raw()?;
        self.flush()?;
        unsafe {
            libc::raise(libc::SIGTSTP);
        }
        // Execution resumes here on SIGCONT.
        if was_raw {
            self.enter_raw()?;
        }
        Ok(())
    }

    fn read_line_cooked(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        let n = io::stdin().lock().read_line(&mut line)?;
        if n == 0 {
            return Ok(None);
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }
}

impl Drop for UnixTty {
    fn drop(&mut self) {
        let _ = self.leave_raw();
        unsafe {
            libc::close(self.wake_read);
            libc::close(self.wake_write);
        }
    }
}
