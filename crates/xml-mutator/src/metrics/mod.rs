//! Scoring metrics driving the stage controller: each one turns accumulated stats into a new
//! set of per-strategy weights and (optionally) a new stage duration.

mod dummy;
mod ratio;

pub use dummy::DummyMetric;
pub use ratio::RatioMetric;

use std::collections::BTreeMap;
use std::time::Duration;

use crate::controller::ControllerState;
use crate::stats::StatsMap;

/// A pluggable scorer. `evaluate` returns the full replacement weight map (identifiers match
/// `ControllerState::prob_dist`, fallback excluded); `stage_duration` returns the next stage's
/// length. The stage controller folds metrics in declaration order and keeps only the last
/// one's outputs — metrics are not meant to be composed, only swapped.
pub trait Metric: Send + Sync {
    fn identifier(&self) -> &'static str;
    fn evaluate(&self, state: &ControllerState, stats: &StatsMap) -> BTreeMap<String, f64>;
    fn stage_duration(&self, current: Duration, _state: &ControllerState, _stats: &StatsMap) -> Duration {
        current
    }
}

/// Normalizes one ratio field (e.g. `percent_well_formed`) across the strategies already
/// present in `state.prob_dist`, floored at `0.1` so no strategy's weight collapses to zero —
/// a starved strategy could otherwise never recover once every other one out-produces it.
fn normalize(values: &BTreeMap<String, f64>) -> BTreeMap<String, f64> {
    let min = values.values().cloned().fold(f64::INFINITY, f64::min);
    let max = values.values().cloned().fold(f64::NEG_INFINITY, f64::max);

    if (max - min).abs() < f64::EPSILON {
        return values.keys().map(|id| (id.clone(), 0.1)).collect();
    }

    values
        .iter()
        .map(|(id, value)| {
            let normalized = (value - min) / (max - min);
            (id.clone(), normalized.max(0.1))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_floors_at_one_tenth() {
        let mut values = BTreeMap::new();
        values.insert("a".to_string(), 0.0);
        values.insert("b".to_string(), 1.0);
        let normalized = normalize(&values);
        assert_eq!(normalized["a"], 0.1);
        assert_eq!(normalized["b"], 1.0);
    }

    #[test]
    fn normalize_is_uniform_when_all_values_are_equal() {
        let mut values = BTreeMap::new();
        values.insert("a".to_string(), 0.5);
        values.insert("b".to_string(), 0.5);
        let normalized = normalize(&values);
        assert_eq!(normalized["a"], 0.1);
        assert_eq!(normalized["b"], 0.1);
    }
}
