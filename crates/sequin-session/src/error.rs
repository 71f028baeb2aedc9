//! Error types for attack sessions.

use std::fmt;
use std::path::PathBuf;

use sequin_core::BranchId;
use thiserror::Error;

use crate::metrics::Metric;

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Solver stage that produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStage {
    Sequential,
    Simultaneous,
    Strategy,
    /// The blocking task running the solve panicked or was cancelled.
    Task,
}

impl fmt::Display for SolveStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveStage::Sequential => write!(f, "sequential"),
            SolveStage::Simultaneous => write!(f, "simultaneous"),
            SolveStage::Strategy => write!(f, "strategy"),
            SolveStage::Task => write!(f, "background"),
        }
    }
}

/// Rejected or failed change to the attack sequence.
///
/// Every variant leaves the session exactly as it was before the call.
#[derive(Debug, Error)]
pub enum AttackError {
    /// The branch is already in the sequence.
    #[error("{0} is already attacked")]
    AlreadyAttacked(BranchId),

    /// The sequence already holds `budget` branches.
    #[error("attack budget of {budget} lines is exhausted")]
    BudgetExceeded { budget: usize },

    /// The branch does not exist in the loaded case.
    #[error("{0} is not part of the loaded case")]
    UnknownBranch(BranchId),

    /// New budget would be smaller than the current sequence.
    #[error("budget {budget} is below the {attacked} lines already attacked")]
    InvalidBudget { budget: usize, attacked: usize },

    /// Ramp bound must be finite and non-negative.
    #[error("invalid ramp bound {0}")]
    InvalidRampBound(f64),

    /// The session changed while the attack was being solved.
    #[error("session changed while {0} was being solved")]
    Stale(BranchId),

    /// The external solver failed.
    #[error("{stage} solve failed: {source}")]
    Solver {
        stage: SolveStage,
        #[source]
        source: anyhow::Error,
    },
}

impl AttackError {
    /// Whether the error comes from the request itself rather than the solver.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, AttackError::Solver { .. } | AttackError::Stale(_))
    }
}

/// Errors from session operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to load a case file.
    #[error("failed to load case from {path}: {source}")]
    LoadFailed {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// Attack rejected or failed.
    #[error(transparent)]
    Attack(#[from] AttackError),

    /// Requested step is outside the history.
    #[error("step {step} is out of range (history has {len} steps)")]
    StepOutOfRange { step: usize, len: usize },

    /// Engine failed while deriving a metric.
    #[error("failed to derive {metric}: {source}")]
    Metric {
        metric: Metric,
        #[source]
        source: anyhow::Error,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Background solver task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(String),

    /// Channel closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Error::Task(e.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(e: toml::ser::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for Error {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        Error::ChannelClosed
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for Error {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        Error::ChannelClosed
    }
}
