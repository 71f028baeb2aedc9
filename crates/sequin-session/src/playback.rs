//! Replay and highlight coordination.
//!
//! [`Playback`] ties the [`ReplayScheduler`], the [`HighlightBoard`] and a
//! [`TimerQueue`] together on one thread. Every entry point returns the
//! [`ViewEvent`]s the renderer needs; nothing here touches the session.

use std::time::Duration;

use sequin_core::BranchId;
use tracing::debug;

use crate::config::PlaybackConfig;
use crate::events::ViewEvent;
use crate::highlight::{EdgeStyle, HighlightBoard, HighlightTick, HighlightToken};
use crate::replay::{CursorUpdate, ReplayScheduler, ReplayState, ReplayTick, ReplayToken};
use crate::timer::TimerQueue;

/// Deferred tick messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Replay(ReplayToken),
    Highlight(HighlightToken),
}

/// Cursor, styles and timers for one session view.
#[derive(Debug, Clone)]
pub struct Playback {
    replay: ReplayScheduler,
    board: HighlightBoard,
    timers: TimerQueue<Tick>,
}

impl Default for Playback {
    fn default() -> Self {
        Self::new(&PlaybackConfig::default())
    }
}

impl Playback {
    pub fn new(config: &PlaybackConfig) -> Self {
        Self {
            replay: ReplayScheduler::new(config.replay_delay()),
            board: HighlightBoard::new(config.highlight_animation()),
            timers: TimerQueue::new(),
        }
    }

    pub fn cursor(&self) -> usize {
        self.replay.cursor()
    }

    pub fn state(&self) -> ReplayState {
        self.replay.state()
    }

    pub fn is_playing(&self) -> bool {
        self.replay.is_playing()
    }

    pub fn style(&self, branch: BranchId) -> EdgeStyle {
        self.board.style(branch)
    }

    pub fn board(&self) -> &HighlightBoard {
        &self.board
    }

    pub fn timers(&self) -> &TimerQueue<Tick> {
        &self.timers
    }

    /// Absolute virtual time of the next pending tick.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers.next_deadline()
    }

    /// Time left until the next pending tick.
    pub fn until_next(&self) -> Option<Duration> {
        self.timers.until_next()
    }

    /// Start automatic replay.
    pub fn run(&mut self, sequence: &[BranchId]) -> Vec<ViewEvent> {
        let start = self.replay.run(sequence);
        let mut events = Vec::new();
        if start.update.is_some() || start.next.is_some() {
            events.push(ViewEvent::PlaybackStarted);
        }
        if let Some(update) = start.update {
            self.apply(update, sequence.len(), &mut events);
        }
        self.after_replay_step(start.next, &mut events);
        events
    }

    /// Stop automatic replay.
    pub fn stop(&mut self) -> Vec<ViewEvent> {
        if self.replay.stop() {
            vec![ViewEvent::PlaybackStopped]
        } else {
            Vec::new()
        }
    }

    pub fn step(&mut self, sequence: &[BranchId]) -> Vec<ViewEvent> {
        let was_playing = self.is_playing();
        let update = self.replay.step(sequence);
        self.manual(update, was_playing, sequence.len())
    }

    pub fn back(&mut self, sequence: &[BranchId]) -> Vec<ViewEvent> {
        let was_playing = self.is_playing();
        let update = self.replay.back(sequence);
        self.manual(update, was_playing, sequence.len())
    }

    pub fn seek(&mut self, x: usize, sequence: &[BranchId]) -> Vec<ViewEvent> {
        let was_playing = self.is_playing();
        let update = self.replay.seek(x, sequence);
        self.manual(update, was_playing, sequence.len())
    }

    fn manual(&mut self, update: Option<CursorUpdate>, was_playing: bool, step_count: usize) -> Vec<ViewEvent> {
        let mut events = Vec::new();
        if let Some(update) = update {
            if was_playing {
                events.push(ViewEvent::PlaybackStopped);
            }
            self.apply(update, step_count, &mut events);
        }
        events
    }

    /// A branch was attacked: jump to the end and highlight it.
    pub fn on_attack(&mut self, sequence: &[BranchId]) -> Vec<ViewEvent> {
        let mut events = self.follow(sequence);
        if let Some(branch) = sequence.last() {
            self.highlight(*branch, &mut events);
        }
        events
    }

    /// The last branch was undone: restore it and jump to the end.
    pub fn on_undo(&mut self, restored: BranchId, sequence: &[BranchId]) -> Vec<ViewEvent> {
        let mut events = self.follow(sequence);
        self.set_style(restored, EdgeStyle::Normal, &mut events);
        self.highlight(restored, &mut events);
        events
    }

    /// The sequence was cleared.
    pub fn on_reset(&mut self, removed: &[BranchId]) -> Vec<ViewEvent> {
        let mut events = self.follow(&[]);
        for branch in removed {
            self.set_style(*branch, EdgeStyle::Normal, &mut events);
        }
        events
    }

    /// A new case replaced the old one; forget every style and timer.
    pub fn on_case_loaded(&mut self) -> Vec<ViewEvent> {
        let was_playing = self.is_playing();
        self.replay.reset();
        self.board.clear();
        self.timers.clear();
        let mut events = Vec::new();
        if was_playing {
            events.push(ViewEvent::PlaybackStopped);
        }
        events.push(ViewEvent::CursorMoved {
            cursor: 0,
            step_count: 0,
        });
        events
    }

    fn follow(&mut self, sequence: &[BranchId]) -> Vec<ViewEvent> {
        let mut events = Vec::new();
        if self.replay.stop() {
            events.push(ViewEvent::PlaybackStopped);
        }
        let update = self.replay.follow(sequence);
        self.apply(update, sequence.len(), &mut events);
        events
    }

    /// Advance the virtual clock by `elapsed` and deliver due ticks.
    pub fn advance(&mut self, elapsed: Duration, sequence: &[BranchId]) -> Vec<ViewEvent> {
        self.advance_to(self.timers.now() + elapsed, sequence)
    }

    /// Advance the virtual clock to `at`, delivering ticks deadline by
    /// deadline so that ticks rescheduled on the way fire too.
    pub fn advance_to(&mut self, at: Duration, sequence: &[BranchId]) -> Vec<ViewEvent> {
        let mut events = Vec::new();
        while let Some(deadline) = self.timers.next_deadline() {
            if deadline > at {
                break;
            }
            let due = self.timers.advance_to(deadline);
            events.extend(self.deliver(due, sequence));
        }
        self.timers.advance_to(at);
        events
    }

    /// Jump to the next deadline and deliver what is due there.
    pub fn advance_to_next(&mut self, sequence: &[BranchId]) -> Option<Vec<ViewEvent>> {
        let due = self.timers.advance_to_next()?;
        Some(self.deliver(due, sequence))
    }

    fn deliver(&mut self, due: Vec<Tick>, sequence: &[BranchId]) -> Vec<ViewEvent> {
        let mut events = Vec::new();
        for tick in due {
            match tick {
                Tick::Replay(token) => match self.replay.on_tick(token, sequence) {
                    ReplayTick::Stale => debug!("dropping stale replay tick"),
                    ReplayTick::Finished => events.push(ViewEvent::PlaybackStopped),
                    ReplayTick::Advanced { update, next } => {
                        self.apply(update, sequence.len(), &mut events);
                        self.after_replay_step(next, &mut events);
                    }
                },
                Tick::Highlight(token) => match self.board.on_tick(token) {
                    HighlightTick::Stale => {}
                    HighlightTick::Continue(next) => {
                        self.timers
                            .schedule(self.board.tick_interval(), Tick::Highlight(next));
                        self.push_style(next.branch(), &mut events);
                    }
                    HighlightTick::Finished(branch) => {
                        debug!(%branch, "highlight finished");
                        self.push_style(branch, &mut events);
                    }
                },
            }
        }
        events
    }

    fn after_replay_step(&mut self, next: Option<ReplayToken>, events: &mut Vec<ViewEvent>) {
        match next {
            Some(token) => {
                self.timers.schedule(self.replay.delay(), Tick::Replay(token));
            }
            None if !self.is_playing() && self.replay.cursor() > 0 => {
                events.push(ViewEvent::PlaybackStopped);
            }
            None => {}
        }
    }

    fn apply(&mut self, update: CursorUpdate, step_count: usize, events: &mut Vec<ViewEvent>) {
        for branch in &update.marked {
            self.set_style(*branch, EdgeStyle::Marked, events);
        }
        for branch in &update.unmarked {
            self.set_style(*branch, EdgeStyle::Normal, events);
        }
        events.push(ViewEvent::CursorMoved {
            cursor: update.cursor,
            step_count,
        });
        if let Some(branch) = update.highlight {
            self.highlight(branch, events);
        }
    }

    /// Set a base style, emitting an event only when the drawn style changes.
    fn set_style(&mut self, branch: BranchId, style: EdgeStyle, events: &mut Vec<ViewEvent>) {
        let before = self.board.style(branch);
        match style {
            EdgeStyle::Marked => self.board.mark(branch),
            _ => self.board.unmark(branch),
        }
        if self.board.style(branch) != before {
            self.push_style(branch, events);
        }
    }

    fn highlight(&mut self, branch: BranchId, events: &mut Vec<ViewEvent>) {
        if let Some(token) = self.board.highlight(branch) {
            self.timers
                .schedule(self.board.tick_interval(), Tick::Highlight(token));
            self.push_style(branch, events);
        }
    }

    fn push_style(&self, branch: BranchId, events: &mut Vec<ViewEvent>) {
        events.push(ViewEvent::StyleChanged {
            branch,
            style: self.board.style(branch),
        });
    }
}
