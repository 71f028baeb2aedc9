//! Attack session state.
//!
//! A [`Session`] owns one loaded case, the attack sequence and the two
//! histories built from it. The histories always hold exactly one snapshot
//! more than the sequence has entries; every mutation keeps that in step or
//! changes nothing at all.
//!
//! Solving is split from committing so that a caller can run the engine on
//! another thread: [`Session::prepare_push`] captures owned inputs and the
//! current epoch, [`PendingAttack::solve`] runs both engine calls, and
//! [`Session::commit_push`] applies the results only if nothing else changed
//! the session in between.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use sequin_core::{BranchId, GenId, NetworkRef, Snapshot};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::AttackConfig;
use crate::engine::{CaseData, DispatchEngine, SolveContext, SolverArgs};
use crate::error::{AttackError, Error, Result, SolveStage};
use crate::events::SessionEvent;
use crate::history::{AttackMode, History};
use crate::metrics::{self, DerivedMetric, Metric, MetricContext};
use crate::sequence::AttackSequence;
use crate::strategy::{self, Strategy, StrategyOutcome};
use crate::summary::{self, StepSeries, SummaryContext, SummaryKind};

/// Unique identifier for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Show first 8 chars for readability
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// One entry of the attack sequence, for listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackRecord {
    pub branch: BranchId,
    /// History step this attack produced (1-based).
    pub step: usize,
    pub label: String,
    pub attacked_at: DateTime<Utc>,
}

/// Validated attack waiting for the engine.
///
/// Holds owned copies of everything the two solver calls need, so it can be
/// moved to a blocking thread.
#[derive(Debug, Clone)]
pub struct PendingAttack {
    session: SessionId,
    branch: BranchId,
    epoch: u64,
    network: Arc<NetworkRef>,
    args: SolverArgs,
    sequence: Vec<BranchId>,
    previous: Arc<Snapshot>,
    base_generation: BTreeMap<GenId, f64>,
}

impl PendingAttack {
    pub fn branch(&self) -> BranchId {
        self.branch
    }

    /// The sequence including the new branch.
    pub fn sequence(&self) -> &[BranchId] {
        &self.sequence
    }

    /// Run the sequential and the simultaneous solve.
    pub fn solve(self, engine: &dyn DispatchEngine) -> std::result::Result<SolvedAttack, AttackError> {
        let ctx = SolveContext::new(&self.network, &self.args);

        debug!(engine = engine.name(), branch = %self.branch, "solving sequential step");
        let sequential = engine
            .solve_sequential_step(&ctx, &self.previous, &self.sequence)
            .map_err(|source| AttackError::Solver {
                stage: SolveStage::Sequential,
                source,
            })?;

        debug!(engine = engine.name(), branch = %self.branch, "solving simultaneous step");
        let simultaneous = engine
            .solve_simultaneous_step(
                &ctx,
                &self.sequence,
                &self.base_generation,
                self.args.ramp_bound,
                &self.args.inner_solver,
            )
            .map_err(|source| AttackError::Solver {
                stage: SolveStage::Simultaneous,
                source,
            })?;

        Ok(SolvedAttack {
            session: self.session,
            branch: self.branch,
            epoch: self.epoch,
            sequential,
            simultaneous,
        })
    }
}

/// Engine results ready to be committed.
#[derive(Debug, Clone)]
pub struct SolvedAttack {
    session: SessionId,
    branch: BranchId,
    epoch: u64,
    sequential: Snapshot,
    simultaneous: Snapshot,
}

impl SolvedAttack {
    pub fn branch(&self) -> BranchId {
        self.branch
    }
}

/// A loaded case with its attack sequence and both histories.
pub struct Session {
    id: SessionId,
    engine: Arc<dyn DispatchEngine>,
    network: Arc<NetworkRef>,
    source_path: Option<PathBuf>,
    sequence: AttackSequence,
    attacked_at: Vec<DateTime<Utc>>,
    sequential: History,
    simultaneous: History,
    mode: AttackMode,
    args: SolverArgs,
    epoch: u64,
    rng: StdRng,
    events_tx: broadcast::Sender<SessionEvent>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("engine", &self.engine.name())
            .field("case", &self.network.name())
            .field("sequence", &self.sequence)
            .field("mode", &self.mode)
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Load a case through the engine and start an empty session on it.
    pub fn open(
        engine: Arc<dyn DispatchEngine>,
        path: impl AsRef<Path>,
        config: &AttackConfig,
    ) -> Result<Self> {
        let path = path.as_ref();
        info!(engine = engine.name(), path = %path.display(), "loading case");
        let case = engine.init_reference(path).map_err(|source| {
            warn!(path = %path.display(), error = %source, "case load failed");
            Error::LoadFailed {
                path: path.to_path_buf(),
                source,
            }
        })?;
        Ok(Self::build(engine, case, Some(path.to_path_buf()), config)?)
    }

    /// Start an empty session on an already loaded case.
    pub fn from_case(
        engine: Arc<dyn DispatchEngine>,
        case: CaseData,
        config: &AttackConfig,
    ) -> std::result::Result<Self, AttackError> {
        Self::build(engine, case, None, config)
    }

    fn build(
        engine: Arc<dyn DispatchEngine>,
        case: CaseData,
        source_path: Option<PathBuf>,
        config: &AttackConfig,
    ) -> std::result::Result<Self, AttackError> {
        check_ramp_bound(config.ramp_bound)?;
        let (events_tx, _) = broadcast::channel(64);
        let base = Arc::new(case.base);
        let rng = match config.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let session = Self {
            id: SessionId::new(),
            engine,
            network: Arc::new(case.network),
            source_path,
            sequence: AttackSequence::new(config.budget),
            attacked_at: Vec::new(),
            sequential: History::new(base.clone()),
            simultaneous: History::new(base),
            mode: config.default_mode,
            args: SolverArgs::from(config),
            epoch: 0,
            rng,
            events_tx,
        };
        let stats = session.network.stats();
        info!(session = %session.id, case = session.network.name(), %stats, "case loaded");
        session.emit(SessionEvent::CaseLoaded {
            session: session.id,
            path: session.source_path.clone(),
            n_bus: stats.num_buses,
            n_branch: stats.num_branches,
        });
        Ok(session)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn network(&self) -> &Arc<NetworkRef> {
        &self.network
    }

    pub fn engine(&self) -> &Arc<dyn DispatchEngine> {
        &self.engine
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    pub fn sequence(&self) -> &AttackSequence {
        &self.sequence
    }

    /// Number of attacked lines.
    pub fn step_count(&self) -> usize {
        self.sequence.len()
    }

    pub fn history(&self, mode: AttackMode) -> &History {
        match mode {
            AttackMode::Sequential => &self.sequential,
            AttackMode::Simultaneous => &self.simultaneous,
        }
    }

    pub fn sequential(&self) -> &History {
        &self.sequential
    }

    pub fn simultaneous(&self) -> &History {
        &self.simultaneous
    }

    pub fn mode(&self) -> AttackMode {
        self.mode
    }

    pub fn args(&self) -> &SolverArgs {
        &self.args
    }

    pub fn budget(&self) -> usize {
        self.sequence.budget()
    }

    /// Counter bumped by every change to the sequence.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events_tx.subscribe()
    }

    fn emit(&self, event: SessionEvent) {
        // Ignore send errors (no subscribers)
        let _ = self.events_tx.send(event);
    }

    /// Attack list with labels and timestamps.
    pub fn records(&self) -> Vec<AttackRecord> {
        self.sequence
            .iter()
            .zip(&self.attacked_at)
            .enumerate()
            .map(|(i, (branch, at))| AttackRecord {
                branch,
                step: i + 1,
                label: self
                    .network
                    .branch_label(branch)
                    .unwrap_or_else(|| branch.to_string()),
                attacked_at: *at,
            })
            .collect()
    }

    /// Histories are one longer than the sequence and share the base snapshot.
    pub fn invariants_hold(&self) -> bool {
        let n = self.sequence.len();
        self.sequential.len() == n + 1
            && self.simultaneous.len() == n + 1
            && self.attacked_at.len() == n
            && self.sequential.base() == self.simultaneous.base()
    }

    /// Validate `branch` and capture the solver inputs.
    pub fn prepare_push(&self, branch: BranchId) -> std::result::Result<PendingAttack, AttackError> {
        if !self.network.contains_branch(branch) {
            return Err(AttackError::UnknownBranch(branch));
        }
        self.sequence.check(branch)?;

        Ok(PendingAttack {
            session: self.id,
            branch,
            epoch: self.epoch,
            network: self.network.clone(),
            args: self.args.clone(),
            sequence: self.sequence.with_pushed(branch),
            previous: self.sequential.latest().clone(),
            base_generation: self.simultaneous.base().generation.clone(),
        })
    }

    /// Apply solved results if this session has not changed since preparing.
    pub fn commit_push(&mut self, solved: SolvedAttack) -> std::result::Result<(), AttackError> {
        if solved.session != self.id || solved.epoch != self.epoch {
            warn!(branch = %solved.branch, expected = solved.epoch, actual = self.epoch, "discarding stale attack");
            return Err(AttackError::Stale(solved.branch));
        }
        self.sequence.push(solved.branch)?;
        self.attacked_at.push(Utc::now());
        self.sequential.push(Arc::new(solved.sequential));
        self.simultaneous.push(Arc::new(solved.simultaneous));
        self.epoch += 1;
        debug_assert!(self.invariants_hold());

        let step = self.sequence.len();
        info!(session = %self.id, branch = %solved.branch, step, "branch attacked");
        self.emit(SessionEvent::Attacked {
            branch: solved.branch,
            step,
        });
        Ok(())
    }

    /// Attack `branch`: validate, solve both histories and append.
    ///
    /// On any error the sequence and both histories are unchanged.
    pub fn push(&mut self, branch: BranchId) -> std::result::Result<(), AttackError> {
        let result = self
            .prepare_push(branch)
            .and_then(|pending| pending.solve(self.engine.as_ref()))
            .and_then(|solved| self.commit_push(solved));
        if let Err(err) = &result {
            warn!(session = %self.id, %branch, error = %err, "attack rejected");
        }
        result
    }

    /// Remove the last attacked branch and its snapshots.
    pub fn undo(&mut self) -> Option<BranchId> {
        let branch = self.sequence.pop_last()?;
        self.attacked_at.pop();
        self.sequential.pop();
        self.simultaneous.pop();
        self.epoch += 1;
        debug_assert!(self.invariants_hold());

        let step = self.sequence.len();
        info!(session = %self.id, %branch, step, "attack undone");
        self.emit(SessionEvent::Undone { branch, step });
        Some(branch)
    }

    /// Clear the sequence and truncate both histories to the base case.
    pub fn reset(&mut self) -> Vec<BranchId> {
        let removed = self.sequence.as_slice().to_vec();
        self.sequence.clear();
        self.attacked_at.clear();
        self.sequential.truncate_to_base();
        self.simultaneous.truncate_to_base();
        self.epoch += 1;
        debug_assert!(self.invariants_hold());

        info!(session = %self.id, removed = removed.len(), "session reset");
        self.emit(SessionEvent::Reset {
            removed: removed.clone(),
        });
        removed
    }

    pub fn set_mode(&mut self, mode: AttackMode) {
        if self.mode != mode {
            self.mode = mode;
            info!(session = %self.id, %mode, "attack mode changed");
            self.emit(SessionEvent::ModeChanged { mode });
        }
    }

    /// Change the budget; rejected below the current sequence length.
    pub fn set_budget(&mut self, budget: usize) -> std::result::Result<(), AttackError> {
        self.sequence.set_budget(budget)?;
        self.args.budget = budget;
        info!(session = %self.id, budget, "attack budget changed");
        self.emit(SessionEvent::BudgetChanged { budget });
        Ok(())
    }

    /// Change the ramp bound used by later solves.
    ///
    /// Snapshots already in the histories keep the bound they were solved with.
    pub fn set_ramp_bound(&mut self, ramp_bound: f64) -> std::result::Result<(), AttackError> {
        check_ramp_bound(ramp_bound)?;
        self.args.ramp_bound = ramp_bound;
        info!(session = %self.id, ramp_bound, "ramp bound changed");
        self.emit(SessionEvent::RampBoundChanged { ramp_bound });
        Ok(())
    }

    /// Candidates `strategy` proposes for the current sequence.
    pub fn generate_candidates(
        &mut self,
        strategy: Strategy,
    ) -> std::result::Result<Vec<BranchId>, AttackError> {
        let ctx = SolveContext::new(&self.network, &self.args);
        strategy::generate_candidates(
            self.engine.as_ref(),
            strategy,
            &ctx,
            self.sequence.as_slice(),
            &mut self.rng,
        )
    }

    /// Generate candidates and attack them in order.
    ///
    /// Stops at the first failure; branches attacked before it stay attacked.
    pub fn run_strategy(&mut self, strategy: Strategy) -> StrategyOutcome {
        info!(session = %self.id, %strategy, "running strategy");
        let candidates = match self.generate_candidates(strategy) {
            Ok(candidates) => candidates,
            Err(err) => {
                warn!(session = %self.id, %strategy, error = %err, "strategy failed");
                return self.finish_strategy(strategy, Vec::new(), Vec::new(), Some(err));
            }
        };

        let mut applied = Vec::with_capacity(candidates.len());
        let mut failure = None;
        for branch in &candidates {
            match self.push(*branch) {
                Ok(()) => applied.push(*branch),
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }
        self.finish_strategy(strategy, candidates, applied, failure)
    }

    pub(crate) fn finish_strategy(
        &self,
        strategy: Strategy,
        candidates: Vec<BranchId>,
        applied: Vec<BranchId>,
        failure: Option<AttackError>,
    ) -> StrategyOutcome {
        self.emit(SessionEvent::StrategyFinished {
            strategy,
            applied: applied.clone(),
            complete: failure.is_none(),
        });
        StrategyOutcome {
            strategy,
            candidates,
            applied,
            failure,
        }
    }

    /// Derive `metric` at `step` of the history selected by `mode`.
    pub fn derive_metric(&self, metric: Metric, step: usize, mode: AttackMode) -> Result<DerivedMetric> {
        let ctx = MetricContext {
            engine: self.engine.as_ref(),
            network: &self.network,
            history: self.history(mode),
            sequence: self.sequence.as_slice(),
            args: &self.args,
        };
        metrics::derive_metric(&ctx, metric, step)
    }

    /// Derive `metric` at `step` of the current mode's history.
    pub fn current_metric(&self, metric: Metric, step: usize) -> Result<DerivedMetric> {
        self.derive_metric(metric, step, self.mode)
    }

    /// Series of `kind` over steps `1..=N` for both modes.
    pub fn summarize(&self, kind: SummaryKind) -> Result<StepSeries> {
        let ctx = SummaryContext {
            engine: self.engine.as_ref(),
            network: &self.network,
            sequential: &self.sequential,
            simultaneous: &self.simultaneous,
            sequence: self.sequence.as_slice(),
            args: &self.args,
        };
        summary::summarize(&ctx, kind)
    }
}

fn check_ramp_bound(ramp_bound: f64) -> std::result::Result<(), AttackError> {
    if !ramp_bound.is_finite() || ramp_bound < 0.0 {
        return Err(AttackError::InvalidRampBound(ramp_bound));
    }
    Ok(())
}
