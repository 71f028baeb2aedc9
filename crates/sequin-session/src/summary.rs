//! Per-step summary series for both attack modes.
//!
//! A series holds one scalar per attack step `k = 1..=N` for each history,
//! ready for export or plotting by the caller.

use std::fmt;

use sequin_core::{island_count, BranchId, NetworkRef, Snapshot};
use serde::{Deserialize, Serialize};

use crate::engine::{DispatchEngine, SolverArgs};
use crate::error::{Error, Result};
use crate::history::{AttackMode, History};
use crate::metrics::Metric;

/// Scalar tracked across attack steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryKind {
    LoadShed,
    LoadServiced,
    GeneratorCriticality,
    BranchCriticality,
    PowerFlow,
    PowerGenerated,
    Islands,
}

impl SummaryKind {
    pub const ALL: [SummaryKind; 7] = [
        SummaryKind::LoadShed,
        SummaryKind::LoadServiced,
        SummaryKind::GeneratorCriticality,
        SummaryKind::BranchCriticality,
        SummaryKind::PowerFlow,
        SummaryKind::PowerGenerated,
        SummaryKind::Islands,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SummaryKind::LoadShed => "Load Shed",
            SummaryKind::LoadServiced => "Load Serviced",
            SummaryKind::GeneratorCriticality => "Generator Criticality",
            SummaryKind::BranchCriticality => "Branch Criticality",
            SummaryKind::PowerFlow => "Power Flow",
            SummaryKind::PowerGenerated => "Power Generated",
            SummaryKind::Islands => "Islands",
        }
    }

    /// Axis label including the unit.
    pub fn axis_label(&self) -> &'static str {
        match self {
            SummaryKind::LoadShed => "Load Shed (p.u.)",
            SummaryKind::LoadServiced => "Load Serviced (p.u.)",
            SummaryKind::GeneratorCriticality => "Generator Criticality",
            SummaryKind::BranchCriticality => "Branch Criticality",
            SummaryKind::PowerFlow => "Power Flow (p.u.)",
            SummaryKind::PowerGenerated => "Power Generated (p.u.)",
            SummaryKind::Islands => "Islands",
        }
    }
}

impl fmt::Display for SummaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One value per step for each mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSeries {
    pub kind: SummaryKind,
    /// Step numbers, starting at 1.
    pub steps: Vec<usize>,
    pub sequential: Vec<f64>,
    pub simultaneous: Vec<f64>,
}

impl StepSeries {
    pub fn get(&self, mode: AttackMode) -> &[f64] {
        match mode {
            AttackMode::Sequential => &self.sequential,
            AttackMode::Simultaneous => &self.simultaneous,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Inputs for summarizing both histories.
#[derive(Clone, Copy)]
pub struct SummaryContext<'a> {
    pub engine: &'a dyn DispatchEngine,
    pub network: &'a NetworkRef,
    pub sequential: &'a History,
    pub simultaneous: &'a History,
    pub sequence: &'a [BranchId],
    pub args: &'a SolverArgs,
}

/// Build the series of `kind` for steps `1..=N`.
pub fn summarize(ctx: &SummaryContext<'_>, kind: SummaryKind) -> Result<StepSeries> {
    let n = ctx.sequence.len();
    let steps: Vec<usize> = (1..=n).collect();

    let (sequential, simultaneous) = if kind == SummaryKind::Islands {
        // topology is identical in both modes
        let counts: Vec<f64> = steps
            .iter()
            .map(|k| island_count(ctx.network, &ctx.sequence[..*k]) as f64)
            .collect();
        (counts.clone(), counts)
    } else {
        (
            series(ctx, kind, ctx.sequential, n)?,
            series(ctx, kind, ctx.simultaneous, n)?,
        )
    };

    Ok(StepSeries {
        kind,
        steps,
        sequential,
        simultaneous,
    })
}

fn series(ctx: &SummaryContext<'_>, kind: SummaryKind, history: &History, n: usize) -> Result<Vec<f64>> {
    history
        .steps()
        .iter()
        .skip(1)
        .take(n)
        .map(|snap| step_value(ctx, kind, snap))
        .collect()
}

fn step_value(ctx: &SummaryContext<'_>, kind: SummaryKind, snap: &Snapshot) -> Result<f64> {
    let value = match kind {
        SummaryKind::LoadShed => snap.load_shed(ctx.network),
        SummaryKind::LoadServiced => snap.served_load(),
        SummaryKind::PowerFlow => snap.total_flow(),
        SummaryKind::PowerGenerated => snap.total_generation(),
        SummaryKind::GeneratorCriticality => ctx
            .engine
            .generator_criticality(ctx.network, snap, ctx.args.ramp_bound)
            .map_err(|source| Error::Metric {
                metric: Metric::GeneratorCriticality,
                source,
            })?
            .values()
            .sum::<f64>(),
        SummaryKind::BranchCriticality => ctx
            .engine
            .branch_criticality(ctx.network, snap)
            .map_err(|source| Error::Metric {
                metric: Metric::BranchCriticality,
                source,
            })?
            .values()
            .sum::<f64>(),
        SummaryKind::Islands => 0.0,
    };
    Ok(value)
}
