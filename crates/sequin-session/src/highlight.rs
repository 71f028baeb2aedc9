//! Per-branch render styles and the transient highlight animation.
//!
//! A highlight blinks a branch between the style it had when the highlight
//! began and an emphasis style, then restores the captured style. Marking or
//! unmarking a branch cancels its highlight; a tick carrying an outdated
//! generation is dropped.

use std::collections::HashMap;
use std::time::Duration;

use sequin_core::BranchId;
use serde::{Deserialize, Serialize};

/// Style the renderer draws a branch with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeStyle {
    Normal,
    /// Attacked branch (dashed).
    Marked,
    /// Highlight emphasis (thick red).
    Emphasis,
}

/// Style a highlight falls back to when it ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseStyle {
    Normal,
    Marked,
}

impl From<BaseStyle> for EdgeStyle {
    fn from(style: BaseStyle) -> Self {
        match style {
            BaseStyle::Normal => EdgeStyle::Normal,
            BaseStyle::Marked => EdgeStyle::Marked,
        }
    }
}

/// State of one branch on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightState {
    Normal,
    Marked,
    Highlighting { tick: u32, restore: BaseStyle },
}

/// What a highlight stage shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStyle {
    /// The captured pre-highlight style.
    Restore,
    Emphasis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightStage {
    pub style: StageStyle,
    pub ticks: u32,
}

/// Highlight timeline: `stages` played `repeat` times, one step per `tick`.
#[derive(Debug, Clone, PartialEq)]
pub struct HighlightAnimation {
    pub stages: Vec<HighlightStage>,
    pub repeat: u32,
    pub tick: Duration,
}

impl Default for HighlightAnimation {
    fn default() -> Self {
        Self {
            stages: vec![
                HighlightStage {
                    style: StageStyle::Restore,
                    ticks: 2,
                },
                HighlightStage {
                    style: StageStyle::Emphasis,
                    ticks: 5,
                },
            ],
            repeat: 2,
            tick: Duration::from_millis(100),
        }
    }
}

impl HighlightAnimation {
    pub fn total_ticks(&self) -> u32 {
        self.stages.iter().map(|s| s.ticks).sum::<u32>() * self.repeat
    }

    /// Stage shown at `tick`, or `None` once the animation is over.
    pub fn style_at(&self, tick: u32) -> Option<StageStyle> {
        let mut remaining = tick;
        for _ in 0..self.repeat {
            for stage in &self.stages {
                if remaining < stage.ticks {
                    return Some(stage.style);
                }
                remaining -= stage.ticks;
            }
        }
        None
    }
}

/// Ticket for the next animation step of one branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HighlightToken {
    branch: BranchId,
    generation: u64,
}

impl HighlightToken {
    pub fn branch(&self) -> BranchId {
        self.branch
    }
}

/// Result of delivering a highlight tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightTick {
    /// Cancelled or superseded; nothing changed.
    Stale,
    /// Animation continues; schedule the token again.
    Continue(HighlightToken),
    /// Animation over; the branch is back to its captured style.
    Finished(BranchId),
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    state: HighlightState,
    generation: u64,
}

/// Styles of every branch touched so far.
#[derive(Debug, Clone)]
pub struct HighlightBoard {
    animation: HighlightAnimation,
    entries: HashMap<BranchId, Entry>,
    next_generation: u64,
}

impl Default for HighlightBoard {
    fn default() -> Self {
        Self::new(HighlightAnimation::default())
    }
}

impl HighlightBoard {
    pub fn new(animation: HighlightAnimation) -> Self {
        Self {
            animation,
            entries: HashMap::new(),
            next_generation: 0,
        }
    }

    pub fn animation(&self) -> &HighlightAnimation {
        &self.animation
    }

    pub fn tick_interval(&self) -> Duration {
        self.animation.tick
    }

    /// State of `branch`; untouched branches are `Normal`.
    pub fn state(&self, branch: BranchId) -> HighlightState {
        self.entries
            .get(&branch)
            .map(|e| e.state)
            .unwrap_or(HighlightState::Normal)
    }

    pub fn is_highlighting(&self, branch: BranchId) -> bool {
        matches!(self.state(branch), HighlightState::Highlighting { .. })
    }

    /// Style to draw `branch` with right now.
    pub fn style(&self, branch: BranchId) -> EdgeStyle {
        match self.state(branch) {
            HighlightState::Normal => EdgeStyle::Normal,
            HighlightState::Marked => EdgeStyle::Marked,
            HighlightState::Highlighting { tick, restore } => match self.animation.style_at(tick) {
                Some(StageStyle::Emphasis) => EdgeStyle::Emphasis,
                _ => restore.into(),
            },
        }
    }

    fn bump(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    fn set(&mut self, branch: BranchId, state: HighlightState) {
        let generation = self.bump();
        self.entries.insert(branch, Entry { state, generation });
    }

    /// Draw `branch` as attacked, cancelling any highlight.
    pub fn mark(&mut self, branch: BranchId) {
        self.set(branch, HighlightState::Marked);
    }

    /// Draw `branch` as intact, cancelling any highlight.
    pub fn unmark(&mut self, branch: BranchId) {
        self.set(branch, HighlightState::Normal);
    }

    /// Start highlighting `branch`.
    ///
    /// Returns `None` when it is already highlighting.
    pub fn highlight(&mut self, branch: BranchId) -> Option<HighlightToken> {
        let restore = match self.state(branch) {
            HighlightState::Highlighting { .. } => return None,
            HighlightState::Normal => BaseStyle::Normal,
            HighlightState::Marked => BaseStyle::Marked,
        };
        self.set(branch, HighlightState::Highlighting { tick: 0, restore });
        let generation = self.entries.get(&branch).map(|e| e.generation)?;
        Some(HighlightToken { branch, generation })
    }

    /// Advance the highlight the token belongs to by one tick.
    pub fn on_tick(&mut self, token: HighlightToken) -> HighlightTick {
        let total = self.animation.total_ticks();
        let Some(entry) = self.entries.get_mut(&token.branch) else {
            return HighlightTick::Stale;
        };
        if entry.generation != token.generation {
            return HighlightTick::Stale;
        }
        let HighlightState::Highlighting { tick, restore } = entry.state else {
            return HighlightTick::Stale;
        };

        let tick = tick + 1;
        if tick >= total {
            entry.state = match restore {
                BaseStyle::Normal => HighlightState::Normal,
                BaseStyle::Marked => HighlightState::Marked,
            };
            HighlightTick::Finished(token.branch)
        } else {
            entry.state = HighlightState::Highlighting { tick, restore };
            HighlightTick::Continue(token)
        }
    }

    /// Forget every branch, e.g. on case reload.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.bump();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(id: usize) -> BranchId {
        BranchId::new(id)
    }

    #[test]
    fn test_default_animation_timeline() {
        let anim = HighlightAnimation::default();
        assert_eq!(anim.total_ticks(), 14);
        assert_eq!(anim.style_at(0), Some(StageStyle::Restore));
        assert_eq!(anim.style_at(2), Some(StageStyle::Emphasis));
        assert_eq!(anim.style_at(6), Some(StageStyle::Emphasis));
        assert_eq!(anim.style_at(7), Some(StageStyle::Restore));
        assert_eq!(anim.style_at(13), Some(StageStyle::Emphasis));
        assert_eq!(anim.style_at(14), None);
    }

    #[test]
    fn test_lazy_default_state() {
        let board = HighlightBoard::default();
        assert_eq!(board.state(b(9)), HighlightState::Normal);
        assert_eq!(board.style(b(9)), EdgeStyle::Normal);
    }

    #[test]
    fn test_highlight_restores_marked_style() {
        let mut board = HighlightBoard::default();
        board.mark(b(1));
        let mut token = board.highlight(b(1)).unwrap();
        assert_eq!(board.style(b(1)), EdgeStyle::Marked);

        let mut ticks = 0;
        loop {
            ticks += 1;
            match board.on_tick(token) {
                HighlightTick::Continue(next) => {
                    token = next;
                    if ticks == 2 {
                        assert_eq!(board.style(b(1)), EdgeStyle::Emphasis);
                    }
                }
                HighlightTick::Finished(branch) => {
                    assert_eq!(branch, b(1));
                    break;
                }
                HighlightTick::Stale => panic!("unexpected stale tick"),
            }
        }
        assert_eq!(ticks, 14);
        assert_eq!(board.state(b(1)), HighlightState::Marked);
    }

    #[test]
    fn test_rehighlight_ignored() {
        let mut board = HighlightBoard::default();
        assert!(board.highlight(b(2)).is_some());
        assert!(board.highlight(b(2)).is_none());
    }

    #[test]
    fn test_mark_cancels_highlight() {
        let mut board = HighlightBoard::default();
        let token = board.highlight(b(3)).unwrap();
        board.mark(b(3));
        assert_eq!(board.on_tick(token), HighlightTick::Stale);
        assert_eq!(board.state(b(3)), HighlightState::Marked);
    }

    #[test]
    fn test_clear_drops_tokens() {
        let mut board = HighlightBoard::default();
        let token = board.highlight(b(4)).unwrap();
        board.clear();
        assert_eq!(board.on_tick(token), HighlightTick::Stale);
        assert_eq!(board.style(b(4)), EdgeStyle::Normal);
    }
}
