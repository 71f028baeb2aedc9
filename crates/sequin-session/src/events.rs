//! Event types for reactive front-end updates.

use std::path::PathBuf;

use sequin_core::BranchId;

use crate::highlight::EdgeStyle;
use crate::history::AttackMode;
use crate::session::SessionId;
use crate::strategy::Strategy;

/// Events emitted by a session when its state changes.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A case was loaded and a fresh session created.
    CaseLoaded {
        session: SessionId,
        path: Option<PathBuf>,
        n_bus: usize,
        n_branch: usize,
    },

    /// A branch was appended to the sequence; both histories grew by one.
    Attacked { branch: BranchId, step: usize },

    /// The last branch was removed; both histories shrank by one.
    Undone { branch: BranchId, step: usize },

    /// The sequence was cleared.
    Reset { removed: Vec<BranchId> },

    /// A strategy finished (fully or partially).
    StrategyFinished {
        strategy: Strategy,
        applied: Vec<BranchId>,
        complete: bool,
    },

    /// The history that metrics read from changed.
    ModeChanged { mode: AttackMode },

    /// The attack budget changed.
    BudgetChanged { budget: usize },

    /// The ramp bound changed.
    RampBoundChanged { ramp_bound: f64 },
}

/// Events emitted to the renderer by the playback driver.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    /// The replay cursor moved.
    CursorMoved { cursor: usize, step_count: usize },

    /// A branch must be redrawn in a new style.
    StyleChanged { branch: BranchId, style: EdgeStyle },

    /// Automatic replay started.
    PlaybackStarted,

    /// Automatic replay stopped (explicitly or at the end of the sequence).
    PlaybackStopped,

    /// Forwarded session change.
    Session(SessionEvent),
}

impl From<SessionEvent> for ViewEvent {
    fn from(event: SessionEvent) -> Self {
        ViewEvent::Session(event)
    }
}
