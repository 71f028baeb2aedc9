//! Boundary to the external dispatch engine.
//!
//! The optimal-power-flow solves, the combinatorial attack searches and the
//! criticality analyses all live outside this crate. A session reaches them
//! through [`DispatchEngine`], which takes shared references to immutable
//! inputs and returns fresh results, so nothing stored in a history is ever
//! touched by a solver call.
//!
//! Engines report failures as [`anyhow::Error`]; the session wraps them with
//! the stage that failed.

use std::collections::BTreeMap;
use std::path::Path;

use sequin_core::{BranchId, BusId, GenId, NetworkRef, Snapshot};
use serde::{Deserialize, Serialize};

use crate::config::AttackConfig;
use crate::strategy::Strategy;

/// Solver arguments shared by every call in a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverArgs {
    /// Maximum number of lines in the attack sequence.
    pub budget: usize,
    /// Generator ramp bound.
    pub ramp_bound: f64,
    /// Inner solver name, passed through untouched.
    pub inner_solver: String,
}

impl Default for SolverArgs {
    fn default() -> Self {
        Self::from(&AttackConfig::default())
    }
}

impl From<&AttackConfig> for SolverArgs {
    fn from(config: &AttackConfig) -> Self {
        Self {
            budget: config.budget,
            ramp_bound: config.ramp_bound,
            inner_solver: config.inner_solver.clone(),
        }
    }
}

/// Read-only inputs common to every engine call.
#[derive(Debug, Clone, Copy)]
pub struct SolveContext<'a> {
    pub network: &'a NetworkRef,
    pub args: &'a SolverArgs,
}

impl<'a> SolveContext<'a> {
    pub fn new(network: &'a NetworkRef, args: &'a SolverArgs) -> Self {
        Self { network, args }
    }
}

/// A loaded case: the network plus its unperturbed base snapshot.
#[derive(Debug)]
pub struct CaseData {
    pub network: NetworkRef,
    pub base: Snapshot,
}

/// Dispatch engine used by attack sessions.
///
/// Implementations must be deterministic for identical inputs. All methods
/// may block for a long time; async callers run them on a blocking thread.
pub trait DispatchEngine: Send + Sync {
    /// Short engine name for logs.
    fn name(&self) -> &str;

    /// Parse a case file and solve its base operating point.
    fn init_reference(&self, path: &Path) -> anyhow::Result<CaseData>;

    /// Re-dispatch from `previous` after removing every branch in `sequence`.
    ///
    /// Ramp limits are relative to the generation in `previous`.
    fn solve_sequential_step(
        &self,
        ctx: &SolveContext<'_>,
        previous: &Snapshot,
        sequence: &[BranchId],
    ) -> anyhow::Result<Snapshot>;

    /// Re-dispatch from scratch with every branch in `sequence` removed at once.
    ///
    /// Ramp limits are relative to `base_generation`.
    fn solve_simultaneous_step(
        &self,
        ctx: &SolveContext<'_>,
        sequence: &[BranchId],
        base_generation: &BTreeMap<GenId, f64>,
        ramp_bound: f64,
        inner_solver: &str,
    ) -> anyhow::Result<Snapshot>;

    /// Best attack order found by `strategy`, given the already failed lines.
    ///
    /// The result may repeat the failed prefix; callers normalize it.
    fn solve_strategy(
        &self,
        strategy: Strategy,
        ctx: &SolveContext<'_>,
        failed: &[BranchId],
    ) -> anyhow::Result<Vec<BranchId>>;

    /// Criticality score per generator in the given operating state.
    fn generator_criticality(
        &self,
        network: &NetworkRef,
        snapshot: &Snapshot,
        ramp_bound: f64,
    ) -> anyhow::Result<BTreeMap<GenId, f64>>;

    /// Criticality score per branch in the given operating state.
    fn branch_criticality(
        &self,
        network: &NetworkRef,
        snapshot: &Snapshot,
    ) -> anyhow::Result<BTreeMap<BranchId, f64>>;

    /// Transmission width per bus in the given operating state.
    fn transmission_width(
        &self,
        network: &NetworkRef,
        snapshot: &Snapshot,
    ) -> anyhow::Result<BTreeMap<BusId, f64>>;

    /// Load shed caused by cutting each remaining branch next.
    fn cut_impact(
        &self,
        ctx: &SolveContext<'_>,
        snapshot: &Snapshot,
        remaining: &[BranchId],
        sequence: &[BranchId],
    ) -> anyhow::Result<BTreeMap<BranchId, f64>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct NullEngine;

    impl DispatchEngine for NullEngine {
        fn name(&self) -> &str {
            "null"
        }

        fn init_reference(&self, path: &Path) -> anyhow::Result<CaseData> {
            anyhow::bail!("cannot load {}", path.display())
        }

        fn solve_sequential_step(
            &self,
            _ctx: &SolveContext<'_>,
            previous: &Snapshot,
            _sequence: &[BranchId],
        ) -> anyhow::Result<Snapshot> {
            Ok(previous.clone())
        }

        fn solve_simultaneous_step(
            &self,
            _ctx: &SolveContext<'_>,
            _sequence: &[BranchId],
            _base_generation: &BTreeMap<GenId, f64>,
            _ramp_bound: f64,
            _inner_solver: &str,
        ) -> anyhow::Result<Snapshot> {
            Ok(Snapshot::default())
        }

        fn solve_strategy(
            &self,
            _strategy: Strategy,
            _ctx: &SolveContext<'_>,
            failed: &[BranchId],
        ) -> anyhow::Result<Vec<BranchId>> {
            Ok(failed.to_vec())
        }

        fn generator_criticality(
            &self,
            _network: &NetworkRef,
            _snapshot: &Snapshot,
            _ramp_bound: f64,
        ) -> anyhow::Result<BTreeMap<GenId, f64>> {
            Ok(BTreeMap::new())
        }

        fn branch_criticality(
            &self,
            _network: &NetworkRef,
            _snapshot: &Snapshot,
        ) -> anyhow::Result<BTreeMap<BranchId, f64>> {
            Ok(BTreeMap::new())
        }

        fn transmission_width(
            &self,
            _network: &NetworkRef,
            _snapshot: &Snapshot,
        ) -> anyhow::Result<BTreeMap<BusId, f64>> {
            Ok(BTreeMap::new())
        }

        fn cut_impact(
            &self,
            _ctx: &SolveContext<'_>,
            _snapshot: &Snapshot,
            _remaining: &[BranchId],
            _sequence: &[BranchId],
        ) -> anyhow::Result<BTreeMap<BranchId, f64>> {
            Ok(BTreeMap::new())
        }
    }

    #[test]
    fn test_engine_is_object_safe() {
        let engine: Arc<dyn DispatchEngine> = Arc::new(NullEngine);
        assert_eq!(engine.name(), "null");
        assert!(engine.init_reference(Path::new("missing.m")).is_err());
    }

    #[test]
    fn test_engine_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn DispatchEngine>();
    }

    #[test]
    fn test_solver_args_from_config() {
        let config = AttackConfig {
            budget: 5,
            ramp_bound: 0.1,
            inner_solver: "cbc".into(),
            ..AttackConfig::default()
        };
        let args = SolverArgs::from(&config);
        assert_eq!(args.budget, 5);
        assert_eq!(args.ramp_bound, 0.1);
        assert_eq!(args.inner_solver, "cbc");
    }
}
