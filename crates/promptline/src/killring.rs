//! Bounded kill-ring with same-direction coalescing and yank rotation.

use std::collections::VecDeque;

use crate::config::DEFAULT_KILL_RING_CAPACITY;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillDirection {
    Forward,
    Backward,
}

/// Ring of killed segments. Slots are ordered oldest to newest; the yank
/// index rotates toward older slots on yank-cycle and is reset to the
/// newest slot by a fresh kill.
#[derive(Debug, Clone)]
pub struct KillRing {
    slots: VecDeque<String>,
    capacity: usize,
    /// Rotation offset: 0 = newest, grows toward older slots.
    rotation: usize,
    /// The newest slot still accepts coalescing kills.
    open: bool,
}

impl Default for KillRing {
    fn default() -> Self {
        Self::new(DEFAULT_KILL_RING_CAPACITY)
    }
}

impl KillRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: VecDeque::new(),
            capacity: capacity.max(1),
            rotation: 0,
            open: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Record a kill. `coalesce` is true when the previous action was a
    /// kill in the same direction: forward kills append to the open slot,
    /// backward kills prepend.
    pub fn kill(&mut self, text: &str, direction: KillDirection, coalesce: bool) {
        if text.is_empty() {
            return;
        }
        if coalesce && self.open {
            if let Some(top) = self.slots.back_mut() {
                match direction {
                    KillDirection::Forward => top.push_str(text),
                    KillDirection::Backward => top.insert_str(0, text),
                }
                self.rotation = 0;
                return;
            }
        }
        while self.slots.len() >= self.capacity {
            self.slots.pop_front();
        }
        self.slots.push_back(text.to_string());
        self.rotation = 0;
        self.open = true;
    }

    /// Any non-kill action seals the open slot; the next kill starts a
    /// fresh entry.
    pub fn seal(&mut self) {
        self.open = false;
    }

    /// Slot the next yank inserts: the ring position the last rotation
    /// left off at.
    pub fn yank(&self) -> Option<&str> {
        if self.slots.is_empty() {
            return None;
        }
        let idx = self.slots.len() - 1 - (self.rotation % self.slots.len());
        self.slots.get(idx).map(|s| s.as_str())
    }

    /// Rotate one slot older (wrapping) and return it.
    pub fn cycle(&mut self) -> Option<&str> {
        if self.slots.is_empty() {
            return None;
        }
        self.rotation = (self.rotation + 1) % self.slots.len();
        self.yank()
    }
}
