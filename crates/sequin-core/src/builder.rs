//! Builder for [`NetworkRef`] instances
//!
//! Case loaders convert their format-specific tables into the element structs
//! and hand them to [`NetworkBuilder`], which does the graph construction, id
//! mapping and referential checks in one place.
//!
//! # Example
//! ```ignore
//! let mut builder = NetworkBuilder::new("case5");
//! builder.add_bus(Bus::new(BusId::new(1), "Bus 1"));
//! builder.add_load(Load::new(LoadId::new(1), BusId::new(1), 0.5));
//! let network = builder.build()?;
//! ```

use std::collections::{BTreeMap, HashMap};

use petgraph::graph::Graph;

use crate::error::{CoreError, CoreResult};
use crate::{Branch, Bus, BusId, Gen, Load, NetworkRef};

/// Collects elements and assembles an immutable [`NetworkRef`].
#[derive(Debug, Clone)]
pub struct NetworkBuilder {
    name: String,
    base_mva: f64,
    buses: Vec<Bus>,
    branches: Vec<Branch>,
    gens: Vec<Gen>,
    loads: Vec<Load>,
}

impl NetworkBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_mva: 100.0,
            buses: Vec::new(),
            branches: Vec::new(),
            gens: Vec::new(),
            loads: Vec::new(),
        }
    }

    /// System MVA base (defaults to 100).
    pub fn base_mva(&mut self, base_mva: f64) -> &mut Self {
        self.base_mva = base_mva;
        self
    }

    pub fn add_bus(&mut self, bus: Bus) -> &mut Self {
        self.buses.push(bus);
        self
    }

    pub fn add_branch(&mut self, branch: Branch) -> &mut Self {
        self.branches.push(branch);
        self
    }

    pub fn add_gen(&mut self, gen: Gen) -> &mut Self {
        self.gens.push(gen);
        self
    }

    pub fn add_load(&mut self, load: Load) -> &mut Self {
        self.loads.push(load);
        self
    }

    /// Validate references and build the graph.
    ///
    /// Fails on an empty bus table, duplicate ids, elements attached to an
    /// unknown bus, and non-finite or negative thermal ratings.
    pub fn build(self) -> CoreResult<NetworkRef> {
        if self.buses.is_empty() {
            return Err(CoreError::Validation(format!(
                "case '{}' has no buses",
                self.name
            )));
        }

        let mut graph = Graph::new_undirected();
        let mut bus_index = HashMap::with_capacity(self.buses.len());
        for bus in self.buses {
            let id = bus.id;
            if bus_index.contains_key(&id) {
                return Err(CoreError::Validation(format!("duplicate bus id {}", id)));
            }
            let idx = graph.add_node(bus);
            bus_index.insert(id, idx);
        }

        let lookup = |bus: BusId, owner: String| {
            bus_index
                .get(&bus)
                .copied()
                .ok_or_else(|| CoreError::Network(format!("{} references unknown {}", owner, bus)))
        };

        let mut branch_index = BTreeMap::new();
        for branch in self.branches {
            if !branch.rate_a.is_finite() || branch.rate_a < 0.0 {
                return Err(CoreError::Validation(format!(
                    "{} has invalid thermal rating {}",
                    branch.id, branch.rate_a
                )));
            }
            let from = lookup(branch.from_bus, branch.id.to_string())?;
            let to = lookup(branch.to_bus, branch.id.to_string())?;
            let id = branch.id;
            if branch_index.contains_key(&id) {
                return Err(CoreError::Validation(format!("duplicate branch id {}", id)));
            }
            let edge = graph.add_edge(from, to, branch);
            branch_index.insert(id, edge);
        }

        let mut gens = BTreeMap::new();
        for gen in self.gens {
            lookup(gen.bus, gen.id.to_string())?;
            let id = gen.id;
            if gens.insert(id, gen).is_some() {
                return Err(CoreError::Validation(format!("duplicate generator id {}", id)));
            }
        }

        let mut loads = BTreeMap::new();
        for load in self.loads {
            lookup(load.bus, load.id.to_string())?;
            let id = load.id;
            if loads.insert(id, load).is_some() {
                return Err(CoreError::Validation(format!("duplicate load id {}", id)));
            }
        }

        Ok(NetworkRef::from_parts(
            self.name,
            self.base_mva,
            graph,
            bus_index,
            branch_index,
            gens,
            loads,
        ))
    }
}
