//! Metric derivation layer.
//!
//! Every metric maps one history step to a per-entity value map together
//! with normalization bounds. Bounds are taken over the whole relevant
//! history (or over the static network tables), never over the queried
//! step alone, so a color scale stays put while the cursor moves.
//!
//! Values are always per-unit; see [`crate::percent`] for the presentation
//! conversion.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use sequin_core::{BranchId, EntityId, NetworkRef, Snapshot};
use serde::{Deserialize, Serialize};

use crate::engine::{DispatchEngine, SolveContext, SolverArgs};
use crate::error::{Error, Result};
use crate::history::History;

/// Which side of the graph a metric colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricTarget {
    Node,
    Edge,
}

/// Visualization metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    TotalLoad,
    LoadShed,
    PowerGenerated,
    GeneratorCriticality,
    TransmissionWidth,
    ThermalRating,
    PowerFlow,
    BranchCriticality,
    CutImpact,
}

impl Metric {
    pub const ALL: [Metric; 9] = [
        Metric::TotalLoad,
        Metric::LoadShed,
        Metric::PowerGenerated,
        Metric::GeneratorCriticality,
        Metric::TransmissionWidth,
        Metric::ThermalRating,
        Metric::PowerFlow,
        Metric::BranchCriticality,
        Metric::CutImpact,
    ];

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Metric::TotalLoad => "Total Load",
            Metric::LoadShed => "Load Shed",
            Metric::PowerGenerated => "Power Generated",
            Metric::GeneratorCriticality => "Generator Criticality",
            Metric::TransmissionWidth => "Transmission Width",
            Metric::ThermalRating => "Thermal Rating",
            Metric::PowerFlow => "Power Flow",
            Metric::BranchCriticality => "Branch Criticality",
            Metric::CutImpact => "Cut Impact",
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Metric::TotalLoad => "total_load",
            Metric::LoadShed => "load_shed",
            Metric::PowerGenerated => "power_generated",
            Metric::GeneratorCriticality => "generator_criticality",
            Metric::TransmissionWidth => "transmission_width",
            Metric::ThermalRating => "thermal_rating",
            Metric::PowerFlow => "power_flow",
            Metric::BranchCriticality => "branch_criticality",
            Metric::CutImpact => "cut_impact",
        }
    }

    pub fn target(&self) -> MetricTarget {
        match self {
            Metric::TotalLoad
            | Metric::LoadShed
            | Metric::PowerGenerated
            | Metric::GeneratorCriticality
            | Metric::TransmissionWidth => MetricTarget::Node,
            Metric::ThermalRating
            | Metric::PowerFlow
            | Metric::BranchCriticality
            | Metric::CutImpact => MetricTarget::Edge,
        }
    }

    /// Whether values ignore the step and mode.
    pub fn is_static(&self) -> bool {
        matches!(self, Metric::TotalLoad | Metric::ThermalRating)
    }

    /// Whether derivation calls into the engine.
    pub fn uses_engine(&self) -> bool {
        matches!(
            self,
            Metric::GeneratorCriticality
                | Metric::BranchCriticality
                | Metric::TransmissionWidth
                | Metric::CutImpact
        )
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim();
        Metric::ALL
            .into_iter()
            .find(|m| m.key().eq_ignore_ascii_case(wanted) || m.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown metric '{}'", wanted))
    }
}

/// Normalization range of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricBounds {
    pub min: f64,
    pub max: f64,
}

impl MetricBounds {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Min/max of `values`; `[0, 0]` when empty.
    pub fn from_values<I: IntoIterator<Item = f64>>(values: I) -> Self {
        let mut iter = values.into_iter();
        let Some(first) = iter.next() else {
            return Self::new(0.0, 0.0);
        };
        iter.fold(Self::new(first, first), |acc, v| {
            Self::new(acc.min.min(v), acc.max.max(v))
        })
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    /// Position of `value` in the range, clamped to `[0, 1]`.
    pub fn normalize(&self, value: f64) -> f64 {
        let span = self.span();
        if span <= 0.0 {
            return 0.0;
        }
        ((value - self.min) / span).clamp(0.0, 1.0)
    }
}

/// Values of one metric at one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetric {
    pub metric: Metric,
    pub step: usize,
    pub values: BTreeMap<EntityId, f64>,
    pub bounds: MetricBounds,
}

impl DerivedMetric {
    pub fn get(&self, id: impl Into<EntityId>) -> Option<f64> {
        self.values.get(&id.into()).copied()
    }

    /// Value rescaled into `[0, 1]` by the bounds.
    pub fn normalized(&self, id: impl Into<EntityId>) -> Option<f64> {
        self.get(id).map(|v| self.bounds.normalize(v))
    }
}

/// Inputs for deriving a metric from one history.
#[derive(Clone, Copy)]
pub struct MetricContext<'a> {
    pub engine: &'a dyn DispatchEngine,
    pub network: &'a NetworkRef,
    pub history: &'a History,
    pub sequence: &'a [BranchId],
    pub args: &'a SolverArgs,
}

type ValueMap = BTreeMap<EntityId, f64>;

/// Derive `metric` at `step` of the history in `ctx`.
pub fn derive_metric(ctx: &MetricContext<'_>, metric: Metric, step: usize) -> Result<DerivedMetric> {
    let len = ctx.history.len();
    if step >= len {
        return Err(Error::StepOutOfRange { step, len });
    }

    let (values, bounds) = match metric {
        Metric::TotalLoad => {
            let values: ValueMap = ctx
                .network
                .loads()
                .map(|l| (EntityId::from(l.id), l.pd))
                .collect();
            let max = MetricBounds::from_values(values.values().copied()).max;
            (values, MetricBounds::new(0.0, max))
        }
        Metric::ThermalRating => {
            let values: ValueMap = ctx
                .network
                .branches()
                .map(|b| (EntityId::from(b.id), b.rate_a))
                .collect();
            let bounds = MetricBounds::from_values(values.values().copied());
            (values, bounds)
        }
        Metric::LoadShed | Metric::PowerGenerated | Metric::PowerFlow => {
            let per_step: Vec<ValueMap> = ctx
                .history
                .iter()
                .map(|snap| snapshot_values(metric, snap))
                .collect();
            across_steps(per_step, step)
        }
        Metric::GeneratorCriticality | Metric::BranchCriticality | Metric::TransmissionWidth => {
            let per_step = ctx
                .history
                .iter()
                .map(|snap| engine_values(ctx, metric, snap))
                .collect::<Result<Vec<_>>>()?;
            across_steps(per_step, step)
        }
        Metric::CutImpact => {
            let snap = ctx.history.steps()[step].as_ref();
            let values = engine_values(ctx, metric, snap)?;
            (values, MetricBounds::new(0.0, ctx.network.total_load()))
        }
    };

    tracing::debug!(metric = metric.key(), step, min = bounds.min, max = bounds.max, "derived metric");
    Ok(DerivedMetric {
        metric,
        step,
        values,
        bounds,
    })
}

/// Values at `step`, bounds over every step.
fn across_steps(mut per_step: Vec<ValueMap>, step: usize) -> (ValueMap, MetricBounds) {
    let bounds = MetricBounds::from_values(per_step.iter().flat_map(|m| m.values().copied()));
    let values = per_step.swap_remove(step);
    (values, bounds)
}

fn snapshot_values(metric: Metric, snap: &Snapshot) -> ValueMap {
    match metric {
        Metric::LoadShed => snap
            .loads
            .iter()
            .map(|(id, v)| (EntityId::from(*id), v.abs()))
            .collect(),
        Metric::PowerGenerated => snap
            .generation
            .iter()
            .map(|(id, v)| (EntityId::from(*id), v.abs()))
            .collect(),
        Metric::PowerFlow => snap
            .flows
            .iter()
            .map(|(id, v)| (EntityId::from(*id), v.abs()))
            .collect(),
        _ => ValueMap::new(),
    }
}

fn engine_values(ctx: &MetricContext<'_>, metric: Metric, snap: &Snapshot) -> Result<ValueMap> {
    let wrap = |source: anyhow::Error| Error::Metric { metric, source };
    let values = match metric {
        Metric::GeneratorCriticality => ctx
            .engine
            .generator_criticality(ctx.network, snap, ctx.args.ramp_bound)
            .map_err(wrap)?
            .into_iter()
            .map(|(id, v)| (EntityId::from(id), v))
            .collect(),
        Metric::BranchCriticality => ctx
            .engine
            .branch_criticality(ctx.network, snap)
            .map_err(wrap)?
            .into_iter()
            .map(|(id, v)| (EntityId::from(id), v))
            .collect(),
        Metric::TransmissionWidth => ctx
            .engine
            .transmission_width(ctx.network, snap)
            .map_err(wrap)?
            .into_iter()
            .map(|(id, v)| (EntityId::from(id), v))
            .collect(),
        Metric::CutImpact => {
            let remaining: Vec<BranchId> = ctx
                .network
                .branch_ids()
                .into_iter()
                .filter(|id| !ctx.sequence.contains(id))
                .collect();
            let solve = SolveContext::new(ctx.network, ctx.args);
            ctx.engine
                .cut_impact(&solve, snap, &remaining, ctx.sequence)
                .map_err(wrap)?
                .into_iter()
                .map(|(id, v)| (EntityId::from(id), v))
                .collect()
        }
        _ => ValueMap::new(),
    };
    Ok(values)
}
