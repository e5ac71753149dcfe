//! The capacity-bounded feed buffer and its admission gate.
//!
//! `BoundedFeed` is append-at-back, evict-at-front: when an entry is
//! admitted at capacity the oldest entry goes, strict FIFO. Presentation
//! order (newest-first vs oldest-first) is a view concern; the buffer holds
//! oldest-first.
//!
//! `PauseGate` is the operator switch in front of the buffer. While paused,
//! arriving entries are dropped outright — not queued for replay on resume.
//! The buffer freezes at the snapshot present when pausing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::feed::entry::LogEntry;

pub struct BoundedFeed {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl BoundedFeed {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "feed capacity must be non-zero");
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends an entry, evicting the oldest one when at capacity.
    /// O(1) admit + evict.
    pub fn admit(&mut self, entry: LogEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest-first copy of the retained entries.
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }
}

/// Operator-controlled admission switch. Two states, Live and Paused;
/// initial state Live; toggles indefinitely for the life of the view.
/// Toggling has no side effects on buffer contents.
#[derive(Default)]
pub struct PauseGate {
    paused: AtomicBool,
}

impl PauseGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }
}
