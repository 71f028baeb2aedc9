//! Dispatch snapshots.
//!
//! A [`Snapshot`] is the operating state the solver reports for one attack
//! step: served load per load, generator output per generator and real power
//! flow per branch. Snapshots are produced once and never mutated; callers
//! that need a working copy clone.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{BranchId, GenId, LoadId, NetworkRef};

/// Operating state after a given set of line removals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Served load per load (per-unit)
    pub loads: BTreeMap<LoadId, f64>,
    /// Active power output per generator (per-unit)
    pub generation: BTreeMap<GenId, f64>,
    /// Real power flow per branch (per-unit, signed)
    pub flows: BTreeMap<BranchId, f64>,
}

impl Snapshot {
    pub fn new(
        loads: BTreeMap<LoadId, f64>,
        generation: BTreeMap<GenId, f64>,
        flows: BTreeMap<BranchId, f64>,
    ) -> Self {
        Self {
            loads,
            generation,
            flows,
        }
    }

    /// Base-case snapshot: full demand served at the reference setpoints,
    /// with flows supplied by the equilibrium solve.
    pub fn from_reference(network: &NetworkRef, flows: BTreeMap<BranchId, f64>) -> Self {
        Self {
            loads: network.base_loads(),
            generation: network.base_generation(),
            flows,
        }
    }

    /// Total load served (per-unit).
    pub fn served_load(&self) -> f64 {
        self.loads.values().sum()
    }

    /// Total generator output (per-unit).
    pub fn total_generation(&self) -> f64 {
        self.generation.values().map(|p| p.abs()).sum()
    }

    /// Sum of absolute branch flows (per-unit).
    pub fn total_flow(&self) -> f64 {
        self.flows.values().map(|f| f.abs()).sum()
    }

    /// Load shed relative to the full demand of `network`.
    pub fn load_shed(&self, network: &NetworkRef) -> f64 {
        network.total_load() - self.served_load()
    }
}
