//! Percent presentation of derived metrics.
//!
//! Converts per-unit values into fractions of a reference: the entity's own
//! rating where one exists, otherwise the metric's global maximum. The
//! resulting bounds always top out at 1.

use sequin_core::{EntityId, NetworkRef};

use crate::metrics::{DerivedMetric, Metric, MetricBounds};

/// Rescale `derived` into fractions for display.
///
/// Transmission width has no meaningful reference and is returned as is.
pub fn to_percent(derived: &DerivedMetric, network: &NetworkRef) -> DerivedMetric {
    if derived.metric == Metric::TransmissionWidth {
        return derived.clone();
    }

    let global_max = derived.bounds.max;
    let values = derived
        .values
        .iter()
        .map(|(id, value)| {
            let reference = match (derived.metric, id) {
                (Metric::LoadShed, EntityId::Load(load)) => {
                    network.load(*load).map(|l| l.pd).unwrap_or(0.0)
                }
                (Metric::PowerGenerated, EntityId::Gen(gen)) => network
                    .generator(*gen)
                    .map(|g| g.pmax)
                    .filter(|pmax| *pmax != 0.0)
                    .unwrap_or(1.0),
                (Metric::PowerFlow, EntityId::Branch(branch)) => {
                    network.rate_a(*branch).unwrap_or(0.0)
                }
                _ => global_max,
            };
            (*id, ratio(*value, reference))
        })
        .collect();

    DerivedMetric {
        metric: derived.metric,
        step: derived.step,
        values,
        bounds: MetricBounds::new(derived.bounds.min, 1.0),
    }
}

fn ratio(value: f64, reference: f64) -> f64 {
    if reference == 0.0 {
        0.0
    } else {
        value / reference
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sequin_core::{Branch, BranchId, Bus, BusId, Gen, GenId, Load, LoadId, NetworkBuilder};
    use std::collections::BTreeMap;

    fn network() -> NetworkRef {
        let mut builder = NetworkBuilder::new("pct");
        builder
            .add_bus(Bus::new(BusId::new(1), "a"))
            .add_bus(Bus::new(BusId::new(2), "b"))
            .add_branch(Branch::new(BranchId::new(1), BusId::new(1), BusId::new(2)).with_rate_a(2.0))
            .add_branch(Branch::new(BranchId::new(2), BusId::new(1), BusId::new(2)))
            .add_gen(Gen::new(GenId::new(1), BusId::new(1)).with_p_limits(0.0, 4.0))
            .add_gen(Gen::new(GenId::new(2), BusId::new(1)))
            .add_load(Load::new(LoadId::new(1), BusId::new(2), 0.8));
        builder.build().unwrap()
    }

    fn derived(metric: Metric, values: &[(EntityId, f64)], bounds: MetricBounds) -> DerivedMetric {
        DerivedMetric {
            metric,
            step: 1,
            values: values.iter().copied().collect::<BTreeMap<_, _>>(),
            bounds,
        }
    }

    #[test]
    fn test_load_shed_relative_to_demand() {
        let d = derived(
            Metric::LoadShed,
            &[(LoadId::new(1).into(), 0.4)],
            MetricBounds::new(0.4, 0.8),
        );
        let pct = to_percent(&d, &network());
        assert_eq!(pct.get(LoadId::new(1)), Some(0.5));
        assert_eq!(pct.bounds, MetricBounds::new(0.4, 1.0));
    }

    #[test]
    fn test_generation_falls_back_to_unit_capacity() {
        let d = derived(
            Metric::PowerGenerated,
            &[(GenId::new(1).into(), 2.0), (GenId::new(2).into(), 0.3)],
            MetricBounds::new(0.3, 2.0),
        );
        let pct = to_percent(&d, &network());
        assert_eq!(pct.get(GenId::new(1)), Some(0.5));
        assert_eq!(pct.get(GenId::new(2)), Some(0.3));
    }

    #[test]
    fn test_flow_relative_to_rating() {
        let d = derived(
            Metric::PowerFlow,
            &[(BranchId::new(1).into(), 1.0), (BranchId::new(2).into(), 1.0)],
            MetricBounds::new(1.0, 1.0),
        );
        let pct = to_percent(&d, &network());
        assert_eq!(pct.get(BranchId::new(1)), Some(0.5));
        // unrated branch
        assert_eq!(pct.get(BranchId::new(2)), Some(0.0));
    }

    #[test]
    fn test_other_metrics_use_global_max() {
        let d = derived(
            Metric::BranchCriticality,
            &[(BranchId::new(1).into(), 3.0)],
            MetricBounds::new(1.0, 6.0),
        );
        let pct = to_percent(&d, &network());
        assert_eq!(pct.get(BranchId::new(1)), Some(0.5));
        assert_eq!(pct.bounds.max, 1.0);
    }

    #[test]
    fn test_width_untouched() {
        let d = derived(
            Metric::TransmissionWidth,
            &[(BusId::new(1).into(), 3.0)],
            MetricBounds::new(1.0, 6.0),
        );
        assert_eq!(to_percent(&d, &network()), d);
    }
}
