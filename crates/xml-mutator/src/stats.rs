//! Per-strategy counters and their derived ratios.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Execution counters for one strategy identifier (or `"fallback_mutator"`), plus the four
/// ratios derived from them. The ratios are stored rather than computed on read because the
/// persisted snapshot round-trips the stats map as opaque binary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsRecord {
    pub execs: u64,
    pub successful_mut: u64,
    pub well_formed: u64,
    pub saml_valid: u64,
    pub new_finds: u64,

    pub percent_successful_mut: f64,
    pub percent_well_formed: f64,
    pub percent_saml_valid: f64,
    pub percent_new_finds: f64,
}

impl StatsRecord {
    /// Recomputes the four ratios from the counters, each rounded to 7 decimal places.
    pub fn recompute_ratios(&mut self) {
        self.percent_successful_mut = ratio(self.successful_mut, self.execs);
        self.percent_well_formed = ratio(self.well_formed, self.execs);
        self.percent_saml_valid = ratio(self.saml_valid, self.execs);
        self.percent_new_finds = ratio(self.new_finds, self.execs);
    }

    /// Reads the ratio backing a metric's field name, e.g. `"percent_well_formed"`.
    pub fn ratio_field(&self, field: &str) -> Option<f64> {
        match field {
            "percent_successful_mut" => Some(self.percent_successful_mut),
            "percent_well_formed" => Some(self.percent_well_formed),
            "percent_saml_valid" => Some(self.percent_saml_valid),
            "percent_new_finds" => Some(self.percent_new_finds),
            _ => None,
        }
    }
}

fn ratio(count: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let value = count as f64 / total as f64;
    (value * 1e7).round() / 1e7
}

/// `BTreeMap` rather than `HashMap`: deterministic iteration order matters for the stage
/// controller's declaration-order fold and makes persisted snapshots diffable.
pub type StatsMap = BTreeMap<String, StatsRecord>;
