//! Virtual-clock timer queue.
//!
//! Deferred messages are ordered by deadline, then by insertion. The clock
//! only moves when the owner advances it, which keeps replay and highlight
//! scheduling deterministic under test and lets the async driver map it onto
//! real time.

use std::collections::BTreeMap;
use std::time::Duration;

/// Deferred messages keyed by virtual deadline.
#[derive(Debug, Clone)]
pub struct TimerQueue<T> {
    now: Duration,
    seq: u64,
    pending: BTreeMap<(Duration, u64), T>,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            seq: 0,
            pending: BTreeMap::new(),
        }
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Deliver `msg` once `after` has elapsed. Returns the absolute deadline.
    pub fn schedule(&mut self, after: Duration, msg: T) -> Duration {
        let deadline = self.now + after;
        self.pending.insert((deadline, self.seq), msg);
        self.seq += 1;
        deadline
    }

    /// Absolute time of the earliest pending message.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.pending.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Time left until the earliest pending message.
    pub fn until_next(&self) -> Option<Duration> {
        self.next_deadline()
            .map(|deadline| deadline.saturating_sub(self.now))
    }

    /// Move the clock forward by `elapsed` and drain everything now due.
    pub fn advance(&mut self, elapsed: Duration) -> Vec<T> {
        self.advance_to(self.now + elapsed)
    }

    /// Move the clock to `at` (never backwards) and drain everything due.
    pub fn advance_to(&mut self, at: Duration) -> Vec<T> {
        self.now = self.now.max(at);
        let mut due = Vec::new();
        while let Some(entry) = self.pending.first_entry() {
            if entry.key().0 > self.now {
                break;
            }
            due.push(entry.remove());
        }
        due
    }

    /// Jump to the earliest deadline and drain what is due there.
    pub fn advance_to_next(&mut self) -> Option<Vec<T>> {
        let deadline = self.next_deadline()?;
        Some(self.advance_to(deadline))
    }

    /// Drop every pending message; the clock keeps its time.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
