//! # sequin-session
//!
//! Attack-session state engine for interactive line-removal studies on a
//! power grid.
//!
//! A [`Session`] holds an ordered attack sequence and two parallel dispatch
//! histories, one per attack interpretation:
//!
//! - **sequential**: lines fail one at a time and dispatch re-solves after
//!   each removal, ramping from the previous step
//! - **simultaneous**: all lines in the prefix fail at once and dispatch
//!   ramps from the base case
//!
//! Dispatch itself is delegated to a [`DispatchEngine`]. The session only
//! orders calls, records snapshots and keeps the histories consistent.
//!
//! ## Architecture
//!
//! ```text
//! front end ──► SessionHandle ──► SessionActor ──┬──► Session ──► DispatchEngine
//!     ▲                                          └──► Playback (replay + highlight)
//!     └──────────── ViewEvent (broadcast) ◄──────┘
//! ```
//!
//! ## Core Components
//!
//! - [`Session`]: sequence, histories, metrics, strategies
//! - [`SessionHandle`]: async front end over a [`SessionActor`]
//! - [`Playback`]: replay cursor and edge highlight animation on a virtual clock
//! - [`SequinConfig`]: persisted settings in `~/.sequin/config.toml`
//!
//! ## Usage
//!
//! ```ignore
//! use sequin_session::{Session, SessionHandle, SequinConfig, Strategy};
//!
//! let config = SequinConfig::load()?;
//! let session = Session::open(engine, "case14.m", &config.attack)?;
//! let (handle, _join) = SessionHandle::spawn(session, config);
//!
//! handle.attack(BranchId::new(3)).await?;
//! let outcome = handle.run_strategy(Strategy::GreedyFlow).await?;
//! ```

pub mod actor;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod highlight;
pub mod history;
pub mod logging;
pub mod metrics;
pub mod percent;
pub mod playback;
pub mod replay;
pub mod sequence;
pub mod session;
pub mod strategy;
pub mod summary;
pub mod timer;

// Re-exports for convenience
pub use actor::{Command, SessionActor, SessionHandle, SessionStatus};
pub use config::{AttackConfig, CoreConfig, PlaybackConfig, SequinConfig};
pub use engine::{CaseData, DispatchEngine, SolveContext, SolverArgs};
pub use error::{AttackError, Error, Result, SolveStage};
pub use events::{SessionEvent, ViewEvent};
pub use highlight::{EdgeStyle, HighlightAnimation, HighlightBoard, HighlightState};
pub use history::{AttackMode, History};
pub use logging::init_logging;
pub use metrics::{derive_metric, DerivedMetric, Metric, MetricBounds, MetricTarget};
pub use percent::to_percent;
pub use playback::{Playback, Tick};
pub use replay::{CursorUpdate, ReplayScheduler, ReplayState};
pub use sequence::AttackSequence;
pub use session::{AttackRecord, PendingAttack, Session, SessionId, SolvedAttack};
pub use strategy::{Strategy, StrategyOutcome};
pub use summary::{summarize, StepSeries, SummaryKind};
pub use timer::TimerQueue;

pub use sequin_core;
