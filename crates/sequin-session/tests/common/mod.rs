//! Shared fixtures: a five-line ring and a deterministic dispatch stub.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use sequin_core::{
    Branch, BranchId, Bus, BusId, Gen, GenId, Load, LoadId, NetworkBuilder, NetworkRef, Snapshot,
};
use sequin_session::{
    AttackConfig, CaseData, DispatchEngine, Session, SolveContext, SolveStage, Strategy,
};

pub fn b(id: usize) -> BranchId {
    BranchId::new(id)
}

pub fn seq(ids: &[usize]) -> Vec<BranchId> {
    ids.iter().map(|i| BranchId::new(*i)).collect()
}

/// Buses 1..=5 in a ring, line `i` joins bus `i` to bus `i % 5 + 1`.
///
/// One generator at bus 1, a 0.25 p.u. load on each of buses 2..=5.
pub fn ring_network() -> NetworkRef {
    let mut builder = NetworkBuilder::new("ring5");
    for i in 1..=5 {
        builder.add_bus(Bus::new(BusId::new(i), format!("Bus {i}")));
    }
    for i in 1..=5 {
        builder.add_branch(
            Branch::new(b(i), BusId::new(i), BusId::new(i % 5 + 1)).with_rate_a(0.5 + 0.1 * i as f64),
        );
    }
    builder.add_gen(
        Gen::new(GenId::new(1), BusId::new(1))
            .with_p_limits(0.0, 2.0)
            .with_setpoint(1.0),
    );
    for i in 2..=5 {
        builder.add_load(Load::new(LoadId::new(i - 1), BusId::new(i), 0.25));
    }
    builder.build().expect("ring network")
}

pub fn base_flows() -> BTreeMap<BranchId, f64> {
    (1..=5).map(|i| (b(i), 0.1 * i as f64)).collect()
}

pub fn ring_case() -> CaseData {
    let network = ring_network();
    let base = Snapshot::from_reference(&network, base_flows());
    CaseData { network, base }
}

/// Deterministic engine.
///
/// Every removed line sheds 10% of each load. Sequential steps compound on
/// the previous snapshot, simultaneous steps scale the base case. Attacked
/// lines carry no flow.
#[derive(Default)]
pub struct StubEngine {
    fail_on: Mutex<Option<(BranchId, SolveStage)>>,
    strategy_order: Mutex<Option<Vec<BranchId>>>,
    pub sequential_calls: AtomicUsize,
    pub simultaneous_calls: AtomicUsize,
    pub strategy_calls: AtomicUsize,
    sequential_inputs: Mutex<Vec<Snapshot>>,
    simultaneous_inputs: Mutex<Vec<SimultaneousInput>>,
}

/// Arguments one simultaneous solve was called with.
#[derive(Debug, Clone, PartialEq)]
pub struct SimultaneousInput {
    pub sequence: Vec<BranchId>,
    pub base_generation: BTreeMap<GenId, f64>,
    pub ramp_bound: f64,
    pub inner_solver: String,
}

impl StubEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail `stage` whenever `branch` is the newest attacked line.
    pub fn fail_on(&self, branch: BranchId, stage: SolveStage) {
        *self.fail_on.lock().unwrap() = Some((branch, stage));
    }

    pub fn clear_failure(&self) {
        *self.fail_on.lock().unwrap() = None;
    }

    /// Order every engine-backed strategy proposes.
    pub fn propose(&self, order: Vec<BranchId>) {
        *self.strategy_order.lock().unwrap() = Some(order);
    }

    /// Previous snapshots handed to sequential solves, in call order.
    pub fn sequential_inputs(&self) -> Vec<Snapshot> {
        self.sequential_inputs.lock().unwrap().clone()
    }

    pub fn simultaneous_inputs(&self) -> Vec<SimultaneousInput> {
        self.simultaneous_inputs.lock().unwrap().clone()
    }

    fn should_fail(&self, sequence: &[BranchId], stage: SolveStage) -> bool {
        match *self.fail_on.lock().unwrap() {
            Some((branch, s)) => s == stage && sequence.last() == Some(&branch),
            None => false,
        }
    }

    fn shed(previous: &Snapshot, removed: usize, sequence: &[BranchId]) -> Snapshot {
        let factor = (1.0 - 0.1 * removed as f64).max(0.0);
        let flows = previous
            .flows
            .iter()
            .map(|(id, v)| (*id, if sequence.contains(id) { 0.0 } else { *v }))
            .collect();
        Snapshot::new(
            previous.loads.iter().map(|(id, v)| (*id, v * factor)).collect(),
            previous.generation.iter().map(|(id, v)| (*id, v * factor)).collect(),
            flows,
        )
    }
}

impl DispatchEngine for StubEngine {
    fn name(&self) -> &str {
        "stub"
    }

    fn init_reference(&self, path: &Path) -> anyhow::Result<CaseData> {
        let text = std::fs::read_to_string(path)?;
        anyhow::ensure!(text.contains("mpc"), "not a case file: {}", path.display());
        Ok(ring_case())
    }

    fn solve_sequential_step(
        &self,
        _ctx: &SolveContext<'_>,
        previous: &Snapshot,
        sequence: &[BranchId],
    ) -> anyhow::Result<Snapshot> {
        self.sequential_calls.fetch_add(1, Ordering::SeqCst);
        self.sequential_inputs.lock().unwrap().push(previous.clone());
        anyhow::ensure!(
            !self.should_fail(sequence, SolveStage::Sequential),
            "sequential dispatch infeasible"
        );
        Ok(Self::shed(previous, 1, sequence))
    }

    fn solve_simultaneous_step(
        &self,
        ctx: &SolveContext<'_>,
        sequence: &[BranchId],
        base_generation: &BTreeMap<GenId, f64>,
        ramp_bound: f64,
        inner_solver: &str,
    ) -> anyhow::Result<Snapshot> {
        self.simultaneous_calls.fetch_add(1, Ordering::SeqCst);
        self.simultaneous_inputs.lock().unwrap().push(SimultaneousInput {
            sequence: sequence.to_vec(),
            base_generation: base_generation.clone(),
            ramp_bound,
            inner_solver: inner_solver.to_string(),
        });
        anyhow::ensure!(
            !self.should_fail(sequence, SolveStage::Simultaneous),
            "simultaneous dispatch infeasible"
        );
        let base = Snapshot::from_reference(ctx.network, base_flows());
        Ok(Self::shed(&base, sequence.len(), sequence))
    }

    fn solve_strategy(
        &self,
        _strategy: Strategy,
        ctx: &SolveContext<'_>,
        failed: &[BranchId],
    ) -> anyhow::Result<Vec<BranchId>> {
        self.strategy_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(last) = failed.last() {
            anyhow::ensure!(
                !self.should_fail(&[*last], SolveStage::Strategy),
                "strategy search failed"
            );
        }
        let order = self.strategy_order.lock().unwrap().clone();
        Ok(order.unwrap_or_else(|| {
            let mut ids = ctx.network.branch_ids();
            ids.reverse();
            ids
        }))
    }

    fn generator_criticality(
        &self,
        _network: &NetworkRef,
        snapshot: &Snapshot,
        ramp_bound: f64,
    ) -> anyhow::Result<BTreeMap<GenId, f64>> {
        Ok(snapshot
            .generation
            .iter()
            .map(|(id, v)| (*id, v * ramp_bound))
            .collect())
    }

    fn branch_criticality(
        &self,
        _network: &NetworkRef,
        snapshot: &Snapshot,
    ) -> anyhow::Result<BTreeMap<BranchId, f64>> {
        Ok(snapshot.flows.iter().map(|(id, v)| (*id, v.abs())).collect())
    }

    fn transmission_width(
        &self,
        network: &NetworkRef,
        snapshot: &Snapshot,
    ) -> anyhow::Result<BTreeMap<BusId, f64>> {
        let served = snapshot.served_load();
        Ok(network.buses().map(|bus| (bus.id, served)).collect())
    }

    fn cut_impact(
        &self,
        _ctx: &SolveContext<'_>,
        snapshot: &Snapshot,
        remaining: &[BranchId],
        _sequence: &[BranchId],
    ) -> anyhow::Result<BTreeMap<BranchId, f64>> {
        let served = snapshot.served_load();
        Ok(remaining
            .iter()
            .enumerate()
            .map(|(i, id)| (*id, served * 0.1 * (i + 1) as f64))
            .collect())
    }
}

pub fn attack_config(budget: usize) -> AttackConfig {
    AttackConfig {
        budget,
        random_seed: Some(7),
        ..AttackConfig::default()
    }
}

pub fn session_with(engine: Arc<StubEngine>, budget: usize) -> Session {
    Session::from_case(engine, ring_case(), &attack_config(budget)).expect("ring session")
}

pub fn session(budget: usize) -> (Arc<StubEngine>, Session) {
    let engine = StubEngine::new();
    let session = session_with(engine.clone(), budget);
    (engine, session)
}
