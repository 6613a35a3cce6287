use std::collections::BTreeMap;

use super::Metric;
use crate::controller::ControllerState;
use crate::stats::StatsMap;

/// Assigns every strategy a weight of 1, regardless of stats. Useful as a config default and
/// in tests that don't want the stage controller to bias selection at all.
pub struct DummyMetric;

impl Metric for DummyMetric {
    fn identifier(&self) -> &'static str {
        "dummy"
    }

    fn evaluate(&self, state: &ControllerState, _stats: &StatsMap) -> BTreeMap<String, f64> {
        state.prob_dist.keys().map(|id| (id.clone(), 1.0)).collect()
    }
}
