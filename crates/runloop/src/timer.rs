//! Interval timers for the runloop.
//!
//! Timers are monotonic-clock based and re-arm after each firing until
//! they are removed or their callback returns false.

use std::time::{Duration, Instant};

/// Identifies a registered timer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub(crate) u64);

impl TimerHandle {
    /// The raw handle value.
    pub fn raw(self) -> u64 {
        self.0
    }
}

pub(crate) struct TimerEntry {
    pub interval: Duration,
    pub due: Instant,
    pub callback: Box<dyn FnMut() -> bool>,
}

#[derive(Default)]
pub(crate) struct TimerTable {
    entries: Vec<(u64, TimerEntry)>,
    next_id: u64,
}

impl TimerTable {
    pub fn add(&mut self, interval: Duration, callback: Box<dyn FnMut() -> bool>) -> TimerHandle {
        self.next_id += 1;
        let id = self.next_id;
        self.entries.push((
            id,
            TimerEntry {
                interval,
                due: Instant::now() + interval,
                callback,
            },
        ));
        TimerHandle(id)
    }

    pub fn remove(&mut self, handle: TimerHandle) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(id, _)| *id != handle.0);
        self.entries.len() != before
    }

    /// The earliest due instant across all timers.
    pub fn next_due(&self) -> Option<Instant> {
        self.entries.iter().map(|(_, entry)| entry.due).min()
    }

    /// Removes and returns every timer due at `now`. The caller invokes
    /// the callbacks outside the table borrow and reinstalls survivors.
    pub fn take_due(&mut self, now: Instant) -> Vec<(u64, TimerEntry)> {
        let mut due = Vec::new();
        let mut idx = 0;
        while idx < self.entries.len() {
            if self.entries[idx].1.due <= now {
                due.push(self.entries.remove(idx));
            } else {
                idx += 1;
            }
        }
        due
    }

    /// Puts a fired timer back, re-armed one interval ahead.
    pub fn reinstall(&mut self, id: u64, mut entry: TimerEntry) {
        entry.due = Instant::now() + entry.interval;
        self.entries.push((id, entry));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
