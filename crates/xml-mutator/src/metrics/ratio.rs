use std::collections::BTreeMap;

use super::{normalize, Metric};
use crate::controller::ControllerState;
use crate::stats::StatsMap;

/// Normalizes a single stats ratio field (`percent_well_formed`, `percent_saml_valid`, or
/// `percent_new_finds`) across every known strategy. Strategies with no recorded stats yet
/// read as `0.0`, same as a fresh `StatsRecord`.
pub struct RatioMetric {
    identifier: &'static str,
    field: &'static str,
}

impl RatioMetric {
    pub const fn well_formed() -> Self {
        Self {
            identifier: "well_formed",
            field: "percent_well_formed",
        }
    }

    pub const fn saml_valid() -> Self {
        Self {
            identifier: "saml_valid",
            field: "percent_saml_valid",
        }
    }

    pub const fn new_finds() -> Self {
        Self {
            identifier: "new_finds",
            field: "percent_new_finds",
        }
    }
}

impl Metric for RatioMetric {
    fn identifier(&self) -> &'static str {
        self.identifier
    }

    fn evaluate(&self, state: &ControllerState, stats: &StatsMap) -> BTreeMap<String, f64> {
        let raw: BTreeMap<String, f64> = state
            .prob_dist
            .keys()
            .map(|id| {
                let value = stats
                    .get(id)
                    .and_then(|record| record.ratio_field(self.field))
                    .unwrap_or(0.0);
                (id.clone(), value)
            })
            .collect();
        normalize(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::Paths;
    use crate::stats::StatsRecord;
    use std::path::PathBuf;
    use std::time::Duration;

    fn state() -> ControllerState {
        let mut prob_dist = BTreeMap::new();
        prob_dist.insert("a".to_string(), 1.0);
        prob_dist.insert("b".to_string(), 1.0);
        ControllerState::new(
            1,
            prob_dist,
            Duration::from_secs(60),
            Paths {
                corpus_dir: PathBuf::from("c"),
                backup_dir: PathBuf::from("b"),
                config_dir: PathBuf::from("k"),
            },
        )
    }

    #[test]
    fn favors_the_strategy_with_the_higher_ratio() {
        let mut stats = StatsMap::new();
        let mut a = StatsRecord {
            execs: 10,
            well_formed: 9,
            ..Default::default()
        };
        a.recompute_ratios();
        let mut b = StatsRecord {
            execs: 10,
            well_formed: 1,
            ..Default::default()
        };
        b.recompute_ratios();
        stats.insert("a".to_string(), a);
        stats.insert("b".to_string(), b);

        let weights = RatioMetric::well_formed().evaluate(&state(), &stats);
        assert!(weights["a"] > weights["b"]);
    }

    #[test]
    fn strategies_missing_from_stats_read_as_zero() {
        let weights = RatioMetric::saml_valid().evaluate(&state(), &StatsMap::new());
        assert_eq!(weights["a"], 0.1);
        assert_eq!(weights["b"], 0.1);
    }
}
