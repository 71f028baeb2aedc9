//! Strategy invocation layer.
//!
//! Strategies do not search here: they ask the engine for an attack order
//! and normalize what comes back. The only strategy computed locally is
//! [`Strategy::Random`], a uniform sample without replacement.
//!
//! Preconditions are checked before the engine is called. A strategy that
//! cannot apply returns an empty candidate list rather than an error.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use rand::seq::SliceRandom;
use rand::Rng;
use sequin_core::{BranchId, NetworkRef};
use serde::{Deserialize, Serialize};

use crate::engine::{DispatchEngine, SolveContext};
use crate::error::{AttackError, SolveStage};

/// Largest budget the permutation search accepts.
pub const PERMUTATION_MAX_BUDGET: usize = 4;

/// Attack sequence generators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    /// Exhaustive search over sequences of the remaining budget.
    Enumeration,
    /// Exhaustive search over orderings; fresh sequences with small budgets only.
    Permutation,
    /// Greedily cut the branch carrying the most flow.
    GreedyFlow,
    /// Greedily cut the most critical branch.
    GreedyCriticality,
    /// Greedily cut the branch with the largest load shed.
    GreedyLoadShed,
    /// Sequential-interdiction heuristic.
    Sequin,
    /// Uniform random sample.
    Random,
}

impl Strategy {
    pub const ALL: [Strategy; 7] = [
        Strategy::Enumeration,
        Strategy::Permutation,
        Strategy::GreedyFlow,
        Strategy::GreedyCriticality,
        Strategy::GreedyLoadShed,
        Strategy::Sequin,
        Strategy::Random,
    ];

    /// Canonical display name.
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Enumeration => "Enumeration",
            Strategy::Permutation => "Permutation",
            Strategy::GreedyFlow => "Greedy-Flow",
            Strategy::GreedyCriticality => "Greedy-Criticality",
            Strategy::GreedyLoadShed => "Greedy-LoadShed",
            Strategy::Sequin => "SEQUIN",
            Strategy::Random => "Random",
        }
    }

    /// Whether the engine is asked for candidates.
    pub fn uses_engine(&self) -> bool {
        !matches!(self, Strategy::Random)
    }

    /// Whether the strategy may run with `current` already attacked.
    pub fn applies(&self, current: &[BranchId], budget: usize) -> bool {
        match self {
            Strategy::Permutation => current.is_empty() && budget <= PERMUTATION_MAX_BUDGET,
            _ => current.len() < budget,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .flat_map(char::to_lowercase)
            .collect();
        match key.as_str() {
            "enumeration" | "enum" => Ok(Strategy::Enumeration),
            "permutation" | "perm" => Ok(Strategy::Permutation),
            "greedyflow" => Ok(Strategy::GreedyFlow),
            "greedycriticality" | "greedycrit" => Ok(Strategy::GreedyCriticality),
            "greedyloadshed" => Ok(Strategy::GreedyLoadShed),
            "sequin" => Ok(Strategy::Sequin),
            "random" => Ok(Strategy::Random),
            _ => Err(format!("unknown strategy '{}'", s.trim())),
        }
    }
}

/// Result of feeding a strategy's candidates into a session.
#[derive(Debug)]
pub struct StrategyOutcome {
    pub strategy: Strategy,
    /// Candidates in the order they were proposed.
    pub candidates: Vec<BranchId>,
    /// Candidates that were attacked successfully.
    pub applied: Vec<BranchId>,
    /// First failure; later candidates were not tried.
    pub failure: Option<AttackError>,
}

impl StrategyOutcome {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

/// Ask `strategy` for the next branches to attack.
///
/// Returns at most `budget - current.len()` distinct branches, none of them
/// already in `current`.
pub fn generate_candidates<R: Rng + ?Sized>(
    engine: &dyn DispatchEngine,
    strategy: Strategy,
    ctx: &SolveContext<'_>,
    current: &[BranchId],
    rng: &mut R,
) -> Result<Vec<BranchId>, AttackError> {
    let budget = ctx.args.budget;
    if !strategy.applies(current, budget) {
        tracing::debug!(%strategy, attacked = current.len(), budget, "strategy precondition not met");
        return Ok(Vec::new());
    }

    if strategy == Strategy::Random {
        return Ok(sample_random(ctx.network, current, budget, rng));
    }
    request_candidates(engine, strategy, ctx, current)
}

/// Ask the engine for `strategy`'s attack order and normalize it.
///
/// Same preconditions as [`generate_candidates`]; `Random` yields nothing
/// here since it never reaches the engine.
pub fn request_candidates(
    engine: &dyn DispatchEngine,
    strategy: Strategy,
    ctx: &SolveContext<'_>,
    current: &[BranchId],
) -> Result<Vec<BranchId>, AttackError> {
    let budget = ctx.args.budget;
    if !strategy.uses_engine() || !strategy.applies(current, budget) {
        return Ok(Vec::new());
    }

    tracing::debug!(engine = engine.name(), %strategy, attacked = current.len(), "requesting candidates");
    let proposed = engine
        .solve_strategy(strategy, ctx, current)
        .map_err(|source| AttackError::Solver {
            stage: SolveStage::Strategy,
            source,
        })?;
    Ok(normalize(proposed, current, budget))
}

/// Strip the applied prefix, drop repeats and cap at the remaining budget.
pub fn normalize(proposed: Vec<BranchId>, current: &[BranchId], budget: usize) -> Vec<BranchId> {
    let remaining = budget.saturating_sub(current.len());
    let tail = if proposed.starts_with(current) {
        &proposed[current.len()..]
    } else {
        &proposed[..]
    };

    let mut seen: HashSet<BranchId> = current.iter().copied().collect();
    tail.iter()
        .copied()
        .filter(|id| seen.insert(*id))
        .take(remaining)
        .collect()
}

/// Sample `budget - current.len()` distinct branches not in `current`.
///
/// Returns fewer when the network runs out of branches.
pub fn sample_random<R: Rng + ?Sized>(
    network: &NetworkRef,
    current: &[BranchId],
    budget: usize,
    rng: &mut R,
) -> Vec<BranchId> {
    let pool: Vec<BranchId> = network
        .branch_ids()
        .into_iter()
        .filter(|id| !current.contains(id))
        .collect();
    let n = budget.saturating_sub(current.len()).min(pool.len());
    let mut picked: Vec<BranchId> = pool.choose_multiple(rng, n).copied().collect();
    picked.shuffle(rng);
    picked
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use sequin_core::{Branch, Bus, BusId, NetworkBuilder};

    fn b(id: usize) -> BranchId {
        BranchId::new(id)
    }

    fn line(n: usize) -> NetworkRef {
        let mut builder = NetworkBuilder::new("line");
        for i in 1..=n + 1 {
            builder.add_bus(Bus::new(BusId::new(i), format!("Bus {i}")));
        }
        for i in 1..=n {
            builder.add_branch(Branch::new(b(i), BusId::new(i), BusId::new(i + 1)));
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_strategy_names_roundtrip() {
        for strategy in Strategy::ALL {
            assert_eq!(strategy.name().parse::<Strategy>(), Ok(strategy));
        }
        assert_eq!("greedy_flow".parse::<Strategy>(), Ok(Strategy::GreedyFlow));
        assert_eq!("GREEDY LOADSHED".parse::<Strategy>(), Ok(Strategy::GreedyLoadShed));
        assert!("annealing".parse::<Strategy>().is_err());
    }

    #[test]
    fn test_permutation_preconditions() {
        assert!(Strategy::Permutation.applies(&[], 4));
        assert!(!Strategy::Permutation.applies(&[], 5));
        assert!(!Strategy::Permutation.applies(&[b(1)], 3));
    }

    #[test]
    fn test_iterative_preconditions() {
        assert!(Strategy::Sequin.applies(&[b(1)], 2));
        assert!(!Strategy::GreedyFlow.applies(&[b(1), b(2)], 2));
        assert!(!Strategy::Enumeration.applies(&[], 0));
    }

    #[test]
    fn test_normalize_drops_prefix_and_caps() {
        let current = [b(3)];
        let proposed = vec![b(3), b(1), b(1), b(4), b(5)];
        assert_eq!(normalize(proposed, &current, 3), vec![b(1), b(4)]);
    }

    #[test]
    fn test_normalize_without_prefix() {
        let current = [b(3)];
        let proposed = vec![b(2), b(3), b(5)];
        assert_eq!(normalize(proposed, &current, 4), vec![b(2), b(5)]);
    }

    #[test]
    fn test_random_sample_is_disjoint() {
        let network = line(6);
        let mut rng = StdRng::seed_from_u64(11);
        let current = [b(2), b(5)];
        let picked = sample_random(&network, &current, 5, &mut rng);

        assert_eq!(picked.len(), 3);
        let unique: HashSet<_> = picked.iter().collect();
        assert_eq!(unique.len(), 3);
        assert!(picked.iter().all(|id| !current.contains(id)));
    }

    #[test]
    fn test_random_sample_limited_by_pool() {
        let network = line(3);
        let mut rng = StdRng::seed_from_u64(1);
        let picked = sample_random(&network, &[b(1)], 10, &mut rng);
        assert_eq!(picked.len(), 2);
    }

    #[test]
    fn test_random_sample_seeded_is_reproducible() {
        let network = line(8);
        let a = sample_random(&network, &[], 4, &mut StdRng::seed_from_u64(42));
        let c = sample_random(&network, &[], 4, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, c);
    }
}
