//! # sequin-core: network reference model for line-attack sessions
//!
//! Provides the static, read-only description of a power grid that an attack
//! session works against, plus the dispatch [`Snapshot`] produced by the
//! external solver for each attack step.
//!
//! ## Design
//!
//! The grid is an **undirected multigraph**:
//! - **Nodes**: buses
//! - **Edges**: branches (transmission lines and transformers)
//!
//! Generators and loads are attached to buses through reference tables keyed
//! by stable integer ids, which is how the solver addresses them.
//!
//! ```rust,no_run
//! use sequin_core::*;
//!
//! let mut builder = NetworkBuilder::new("two-bus");
//! builder
//!     .add_bus(Bus::new(BusId::new(1), "Bus 1"))
//!     .add_bus(Bus::new(BusId::new(2), "Bus 2"))
//!     .add_branch(Branch::new(BranchId::new(1), BusId::new(1), BusId::new(2)).with_rate_a(1.5))
//!     .add_gen(Gen::new(GenId::new(1), BusId::new(1)).with_p_limits(0.0, 2.0).with_setpoint(0.8))
//!     .add_load(Load::new(LoadId::new(1), BusId::new(2), 0.8));
//! let network = builder.build().unwrap();
//! assert_eq!(network.total_load(), 0.8);
//! ```
//!
//! ## ID System
//!
//! Every element has a newtype id around `usize` ([`BusId`], [`BranchId`],
//! [`GenId`], [`LoadId`]). Metric maps use [`EntityId`] so node-side and
//! edge-side values share one key type without losing which table they
//! refer to.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use petgraph::{prelude::*, Undirected};
use serde::{Deserialize, Serialize};

pub mod builder;
pub mod error;
pub mod graph_utils;
pub mod snapshot;

pub use builder::NetworkBuilder;
pub use error::{CoreError, CoreResult};
pub use graph_utils::{islands, island_count, parse_branch_label};
pub use petgraph::graph::{EdgeIndex, NodeIndex};
pub use snapshot::Snapshot;

// Newtype wrappers for IDs for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoadId(usize);

impl BusId {
    #[inline]
    pub fn new(value: usize) -> Self {
        BusId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl BranchId {
    #[inline]
    pub fn new(value: usize) -> Self {
        BranchId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl GenId {
    #[inline]
    pub fn new(value: usize) -> Self {
        GenId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl LoadId {
    #[inline]
    pub fn new(value: usize) -> Self {
        LoadId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl fmt::Display for BusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bus#{}", self.0)
    }
}

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Branch#{}", self.0)
    }
}

impl fmt::Display for GenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Gen#{}", self.0)
    }
}

impl fmt::Display for LoadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Load#{}", self.0)
    }
}

/// Key of a per-entity metric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EntityId {
    Bus(BusId),
    Gen(GenId),
    Load(LoadId),
    Branch(BranchId),
}

impl From<BusId> for EntityId {
    fn from(id: BusId) -> Self {
        EntityId::Bus(id)
    }
}

impl From<GenId> for EntityId {
    fn from(id: GenId) -> Self {
        EntityId::Gen(id)
    }
}

impl From<LoadId> for EntityId {
    fn from(id: LoadId) -> Self {
        EntityId::Load(id)
    }
}

impl From<BranchId> for EntityId {
    fn from(id: BranchId) -> Self {
        EntityId::Branch(id)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Bus(id) => id.fmt(f),
            EntityId::Gen(id) => id.fmt(f),
            EntityId::Load(id) => id.fmt(f),
            EntityId::Branch(id) => id.fmt(f),
        }
    }
}

// Basic component structs
#[derive(Debug, Clone)]
pub struct Bus {
    pub id: BusId,
    pub name: String,
    /// Base voltage in kilovolts
    pub base_kv: f64,
    pub area_id: Option<i64>,
}

impl Default for Bus {
    fn default() -> Self {
        Self {
            id: BusId(0),
            name: String::new(),
            base_kv: 0.0,
            area_id: None,
        }
    }
}

impl Bus {
    pub fn new(id: BusId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct Branch {
    pub id: BranchId,
    pub name: String,
    pub from_bus: BusId,
    pub to_bus: BusId,
    /// Normal thermal rating (Rate A, per-unit)
    pub rate_a: f64,
    /// Operational status flag
    pub status: bool,
}

impl Default for Branch {
    fn default() -> Self {
        Self {
            id: BranchId(0),
            name: String::new(),
            from_bus: BusId(0),
            to_bus: BusId(0),
            rate_a: 0.0,
            status: true,
        }
    }
}

impl Branch {
    pub fn new(id: BranchId, from_bus: BusId, to_bus: BusId) -> Self {
        Self {
            id,
            from_bus,
            to_bus,
            ..Self::default()
        }
    }

    /// Attach a thermal rating in per-unit.
    pub fn with_rate_a(mut self, rate_a: f64) -> Self {
        self.rate_a = rate_a;
        self
    }

    /// Display label, endpoints ordered low-high: `branch 7(2-5)`.
    pub fn label(&self) -> String {
        let (lo, hi) = if self.from_bus <= self.to_bus {
            (self.from_bus, self.to_bus)
        } else {
            (self.to_bus, self.from_bus)
        };
        format!("branch {}({}-{})", self.id.0, lo.0, hi.0)
    }
}

#[derive(Debug, Clone)]
pub struct Gen {
    pub id: GenId,
    pub name: String,
    pub bus: BusId,
    /// Base-case active power setpoint (per-unit)
    pub pg: f64,
    /// Minimum active power output (per-unit)
    pub pmin: f64,
    /// Maximum active power output (per-unit)
    pub pmax: f64,
    /// In-service status
    pub status: bool,
}

impl Default for Gen {
    fn default() -> Self {
        Self {
            id: GenId(0),
            name: String::new(),
            bus: BusId(0),
            pg: 0.0,
            pmin: 0.0,
            pmax: 0.0,
            status: true,
        }
    }
}

impl Gen {
    pub fn new(id: GenId, bus: BusId) -> Self {
        Self {
            id,
            bus,
            ..Self::default()
        }
    }

    /// Set active power limits (per-unit)
    pub fn with_p_limits(mut self, pmin: f64, pmax: f64) -> Self {
        self.pmin = pmin;
        self.pmax = pmax;
        self
    }

    /// Set the base-case setpoint (per-unit)
    pub fn with_setpoint(mut self, pg: f64) -> Self {
        self.pg = pg;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Load {
    pub id: LoadId,
    pub name: String,
    pub bus: BusId,
    /// Active power demand (per-unit)
    pub pd: f64,
}

impl Load {
    pub fn new(id: LoadId, bus: BusId, pd: f64) -> Self {
        Self {
            id,
            name: String::new(),
            bus,
            pd,
        }
    }
}

/// Static, read-only description of one loaded case.
///
/// Buses are graph nodes and branches are graph edges; generator and load
/// tables hang off the buses. Built once through [`NetworkBuilder`] and never
/// mutated afterwards.
#[derive(Debug)]
pub struct NetworkRef {
    name: String,
    base_mva: f64,
    graph: Graph<Bus, Branch, Undirected>,
    bus_index: HashMap<BusId, NodeIndex>,
    branch_index: BTreeMap<BranchId, EdgeIndex>,
    gens: BTreeMap<GenId, Gen>,
    loads: BTreeMap<LoadId, Load>,
}

impl NetworkRef {
    pub(crate) fn from_parts(
        name: String,
        base_mva: f64,
        graph: Graph<Bus, Branch, Undirected>,
        bus_index: HashMap<BusId, NodeIndex>,
        branch_index: BTreeMap<BranchId, EdgeIndex>,
        gens: BTreeMap<GenId, Gen>,
        loads: BTreeMap<LoadId, Load>,
    ) -> Self {
        Self {
            name,
            base_mva,
            graph,
            bus_index,
            branch_index,
            gens,
            loads,
        }
    }

    /// Case name (usually the file stem).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_mva(&self) -> f64 {
        self.base_mva
    }

    /// Underlying topology graph.
    pub fn graph(&self) -> &Graph<Bus, Branch, Undirected> {
        &self.graph
    }

    pub fn bus(&self, id: BusId) -> Option<&Bus> {
        self.bus_index.get(&id).map(|idx| &self.graph[*idx])
    }

    pub(crate) fn branch_edge(&self, id: BranchId) -> Option<EdgeIndex> {
        self.branch_index.get(&id).copied()
    }

    /// All buses, in graph order.
    pub fn buses(&self) -> impl Iterator<Item = &Bus> {
        self.graph.node_weights()
    }

    pub fn branch(&self, id: BranchId) -> Option<&Branch> {
        self.branch_index.get(&id).map(|idx| &self.graph[*idx])
    }

    /// All branches, ordered by id.
    pub fn branches(&self) -> impl Iterator<Item = &Branch> {
        self.branch_index.values().map(|idx| &self.graph[*idx])
    }

    /// All branch ids, ascending.
    pub fn branch_ids(&self) -> Vec<BranchId> {
        self.branch_index.keys().copied().collect()
    }

    pub fn contains_branch(&self, id: BranchId) -> bool {
        self.branch_index.contains_key(&id)
    }

    /// Endpoint buses of a branch as stored (from, to).
    pub fn endpoints(&self, id: BranchId) -> Option<(BusId, BusId)> {
        self.branch(id).map(|br| (br.from_bus, br.to_bus))
    }

    /// Thermal rating (Rate A) of a branch.
    pub fn rate_a(&self, id: BranchId) -> Option<f64> {
        self.branch(id).map(|br| br.rate_a)
    }

    pub fn branch_label(&self, id: BranchId) -> Option<String> {
        self.branch(id).map(Branch::label)
    }

    pub fn generator(&self, id: GenId) -> Option<&Gen> {
        self.gens.get(&id)
    }

    /// Generator table, ordered by id.
    pub fn generators(&self) -> impl Iterator<Item = &Gen> {
        self.gens.values()
    }

    pub fn load(&self, id: LoadId) -> Option<&Load> {
        self.loads.get(&id)
    }

    /// Load table, ordered by id.
    pub fn loads(&self) -> impl Iterator<Item = &Load> {
        self.loads.values()
    }

    /// Total active demand (per-unit).
    pub fn total_load(&self) -> f64 {
        self.loads.values().map(|l| l.pd).sum()
    }

    /// Total in-service generation capacity (per-unit)
    pub fn total_capacity(&self) -> f64 {
        self.gens
            .values()
            .filter(|g| g.status)
            .map(|g| g.pmax)
            .filter(|v| v.is_finite())
            .sum()
    }

    /// Base-case generator setpoints.
    pub fn base_generation(&self) -> BTreeMap<GenId, f64> {
        self.gens.iter().map(|(id, g)| (*id, g.pg)).collect()
    }

    /// Base-case demand per load.
    pub fn base_loads(&self) -> BTreeMap<LoadId, f64> {
        self.loads.iter().map(|(id, l)| (*id, l.pd)).collect()
    }

    /// Compute basic statistics about the network
    pub fn stats(&self) -> NetworkStats {
        NetworkStats {
            num_buses: self.graph.node_count(),
            num_branches: self.branch_index.len(),
            num_gens: self.gens.len(),
            num_loads: self.loads.len(),
            total_load: self.total_load(),
            total_capacity: self.total_capacity(),
        }
    }
}

/// Statistics about a network's size and capacity
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkStats {
    pub num_buses: usize,
    pub num_branches: usize,
    pub num_gens: usize,
    pub num_loads: usize,
    pub total_load: f64,
    pub total_capacity: f64,
}

impl fmt::Display for NetworkStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} buses, {} branches, {} gens, {} loads; load {:.3} pu, capacity {:.3} pu",
            self.num_buses,
            self.num_branches,
            self.num_gens,
            self.num_loads,
            self.total_load,
            self.total_capacity
        )
    }
}
