//! Async-print channel: host threads enqueue text that the edit loop
//! scrolls above the prompt.
//!
//! A bounded channel provides memory safety and natural producer
//! backpressure; with the edit loop as the single consumer, parking a
//! producer briefly is preferable to dropping output. The waker byte
//! unblocks the loop's terminal poll.

use crossbeam_channel::{Receiver, Sender, bounded};
use line_terminal::Waker;

pub const PRINT_CHANNEL_CAP: usize = 8192;

/// Thread-safe handle for pushing text above an active prompt.
///
/// Messages appear on screen in push order and are never interleaved
/// mid-line with user input.
#[derive(Clone)]
pub struct Printer {
    tx: Sender<String>,
    waker: Waker,
}

impl Printer {
    pub fn print(&self, text: &str) {
        if self.tx.send(text.to_string()).is_ok() {
            self.waker.wake();
        }
    }
}

pub(crate) fn print_channel(waker: Waker) -> (Printer, Receiver<String>) {
    let (tx, rx) = bounded(PRINT_CHANNEL_CAP);
    (Printer { tx, waker }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn messages_arrive_in_push_order_and_wake() {
        let wakes = Arc::new(AtomicUsize::new(0));
        let counter = wakes.clone();
        let waker = Waker::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let (printer, rx) = print_channel(waker);
        let from_thread = printer.clone();
        std::thread::spawn(move || {
            from_thread.print("one");
            from_thread.print("two");
        })
        .join()
        .unwrap();
        assert_eq!(rx.try_recv().unwrap(), "one");
        assert_eq!(rx.try_recv().unwrap(), "two");
        assert_eq!(wakes.load(Ordering::SeqCst), 2);
    }
}
