//! Replay cursor over the attack sequence.
//!
//! The cursor `x` ranges over `0..=step_count`: branches at indices `< x`
//! are drawn as attacked. Automatic replay advances one step per tick;
//! every tick carries the generation it was scheduled under, and any stop
//! or manual move bumps the generation so outstanding ticks go stale.
//!
//! The scheduler never mutates the session and never fails: out-of-range
//! requests are ignored.

use std::time::Duration;

use sequin_core::BranchId;
use serde::{Deserialize, Serialize};

/// Replay state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReplayState {
    #[default]
    Idle,
    Playing,
}

/// Ticket for the next automatic replay step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReplayToken {
    generation: u64,
}

/// New view of the sequence after a cursor move.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorUpdate {
    pub cursor: usize,
    /// Branches before the cursor.
    pub marked: Vec<BranchId>,
    /// Branches at or after the cursor.
    pub unmarked: Vec<BranchId>,
    /// Branch to highlight for this move.
    pub highlight: Option<BranchId>,
}

/// Result of delivering a replay tick.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplayTick {
    /// Cancelled or superseded; nothing changed.
    Stale,
    /// Cursor advanced. `next` is set while replay keeps going.
    Advanced {
        update: CursorUpdate,
        next: Option<ReplayToken>,
    },
    /// Already at the end; replay stopped without moving.
    Finished,
}

/// What `run` did.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayStart {
    pub update: Option<CursorUpdate>,
    pub next: Option<ReplayToken>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

/// Cursor and playback state machine.
#[derive(Debug, Clone)]
pub struct ReplayScheduler {
    cursor: usize,
    state: ReplayState,
    generation: u64,
    delay: Duration,
}

impl ReplayScheduler {
    pub fn new(delay: Duration) -> Self {
        Self {
            cursor: 0,
            state: ReplayState::Idle,
            generation: 0,
            delay,
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn state(&self) -> ReplayState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == ReplayState::Playing
    }

    /// Delay between automatic steps.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    fn invalidate(&mut self) {
        self.generation += 1;
    }

    fn token(&self) -> ReplayToken {
        ReplayToken {
            generation: self.generation,
        }
    }

    /// Start automatic replay.
    ///
    /// From the end of the sequence the cursor rewinds to 0 first; otherwise
    /// it advances one step right away. An empty sequence does nothing.
    pub fn run(&mut self, sequence: &[BranchId]) -> ReplayStart {
        if sequence.is_empty() {
            return ReplayStart {
                update: None,
                next: None,
            };
        }
        self.invalidate();
        self.state = ReplayState::Playing;

        if self.cursor >= sequence.len() {
            self.cursor = 0;
            tracing::debug!(steps = sequence.len(), "replay rewound");
            return ReplayStart {
                update: Some(self.update(Direction::Backward, false, sequence)),
                next: Some(self.token()),
            };
        }

        let update = self.advance(sequence);
        let next = self.is_playing().then(|| self.token());
        ReplayStart {
            update: Some(update),
            next,
        }
    }

    /// Deliver a scheduled replay tick.
    pub fn on_tick(&mut self, token: ReplayToken, sequence: &[BranchId]) -> ReplayTick {
        if token.generation != self.generation || !self.is_playing() {
            return ReplayTick::Stale;
        }
        if self.cursor >= sequence.len() {
            self.state = ReplayState::Idle;
            return ReplayTick::Finished;
        }
        let update = self.advance(sequence);
        let next = self.is_playing().then(|| self.token());
        ReplayTick::Advanced { update, next }
    }

    fn advance(&mut self, sequence: &[BranchId]) -> CursorUpdate {
        self.cursor += 1;
        if self.cursor >= sequence.len() {
            self.state = ReplayState::Idle;
            tracing::debug!(cursor = self.cursor, "replay reached the end");
        }
        self.update(Direction::Forward, true, sequence)
    }

    /// Stop automatic replay. Returns whether it was playing.
    pub fn stop(&mut self) -> bool {
        self.invalidate();
        let was_playing = self.is_playing();
        self.state = ReplayState::Idle;
        was_playing
    }

    /// Move the cursor to `x`, stopping playback.
    ///
    /// Ignored when `x` is past the end of the sequence.
    pub fn seek(&mut self, x: usize, sequence: &[BranchId]) -> Option<CursorUpdate> {
        if x > sequence.len() {
            return None;
        }
        self.stop();
        let direction = if x >= self.cursor {
            Direction::Forward
        } else {
            Direction::Backward
        };
        self.cursor = x;
        Some(self.update(direction, true, sequence))
    }

    pub fn step(&mut self, sequence: &[BranchId]) -> Option<CursorUpdate> {
        self.seek(self.cursor + 1, sequence)
    }

    pub fn back(&mut self, sequence: &[BranchId]) -> Option<CursorUpdate> {
        let x = self.cursor.checked_sub(1)?;
        self.seek(x, sequence)
    }

    /// Jump to the end of a changed sequence without highlighting.
    pub fn follow(&mut self, sequence: &[BranchId]) -> CursorUpdate {
        self.stop();
        self.cursor = sequence.len();
        self.update(Direction::Forward, false, sequence)
    }

    /// Back to the initial state, e.g. on case reload.
    pub fn reset(&mut self) {
        self.stop();
        self.cursor = 0;
    }

    fn update(&self, direction: Direction, highlight: bool, sequence: &[BranchId]) -> CursorUpdate {
        let cursor = self.cursor.min(sequence.len());
        let highlight = if highlight {
            match direction {
                Direction::Forward => cursor.checked_sub(1).map(|i| sequence[i]),
                Direction::Backward => sequence.get(cursor).copied(),
            }
        } else {
            None
        };
        CursorUpdate {
            cursor,
            marked: sequence[..cursor].to_vec(),
            unmarked: sequence[cursor..].to_vec(),
            highlight,
        }
    }
}
