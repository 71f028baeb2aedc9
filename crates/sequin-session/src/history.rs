//! Step-indexed snapshot histories.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use sequin_core::Snapshot;
use serde::{Deserialize, Serialize};

/// Consistency model a history is built under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttackMode {
    /// Each step re-dispatches from the previous step.
    #[default]
    Sequential,
    /// Each step re-dispatches from the base case with all lines removed at once.
    Simultaneous,
}

impl AttackMode {
    pub const ALL: [AttackMode; 2] = [AttackMode::Sequential, AttackMode::Simultaneous];
}

impl fmt::Display for AttackMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttackMode::Sequential => write!(f, "Sequential"),
            AttackMode::Simultaneous => write!(f, "Simultaneous"),
        }
    }
}

impl FromStr for AttackMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" | "seq" => Ok(AttackMode::Sequential),
            "simultaneous" | "simu" | "sim" => Ok(AttackMode::Simultaneous),
            other => Err(format!("unknown attack mode '{}'", other)),
        }
    }
}

/// Snapshots for steps `0..=N`; step 0 is the base case and is never removed.
#[derive(Debug, Clone, PartialEq)]
pub struct History {
    steps: Vec<Arc<Snapshot>>,
}

#[allow(clippy::len_without_is_empty)]
impl History {
    pub fn new(base: Arc<Snapshot>) -> Self {
        Self { steps: vec![base] }
    }

    pub fn base(&self) -> &Arc<Snapshot> {
        &self.steps[0]
    }

    pub fn latest(&self) -> &Arc<Snapshot> {
        // steps is never empty
        &self.steps[self.steps.len() - 1]
    }

    pub fn get(&self, step: usize) -> Option<&Arc<Snapshot>> {
        self.steps.get(step)
    }

    /// Number of snapshots, always at least 1.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn steps(&self) -> &[Arc<Snapshot>] {
        &self.steps
    }

    pub fn iter(&self) -> impl Iterator<Item = &Snapshot> {
        self.steps.iter().map(|s| s.as_ref())
    }

    pub fn push(&mut self, snapshot: Arc<Snapshot>) {
        self.steps.push(snapshot);
    }

    /// Drop the latest step. The base snapshot is never popped.
    pub fn pop(&mut self) -> Option<Arc<Snapshot>> {
        if self.steps.len() > 1 {
            self.steps.pop()
        } else {
            None
        }
    }

    pub fn truncate_to_base(&mut self) {
        self.steps.truncate(1);
    }
}
