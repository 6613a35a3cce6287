//! Dispatcher-facing state: which strategy fired last, the current selection weights, and the
//! timers that gate stage transitions and backups.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Filesystem locations resolved once at startup from the host's environment, mirroring the
/// env-var-driven path resolution the original plugin did in its own `init`.
#[derive(Debug, Clone)]
pub struct Paths {
    pub corpus_dir: PathBuf,
    pub backup_dir: PathBuf,
    pub config_dir: PathBuf,
}

/// Live controller state. `prob_dist` carries one entry per non-fallback strategy identifier;
/// `last_mutation` names whichever strategy (or the fallback) produced the most recent buffer.
pub struct ControllerState {
    pub last_mutation: String,
    pub prob_dist: BTreeMap<String, f64>,
    pub start_time: Instant,
    pub stage_duration: Duration,
    pub last_backup: Instant,
    pub seed: u64,
    pub paths: Paths,
}

impl ControllerState {
    pub fn new(seed: u64, prob_dist: BTreeMap<String, f64>, stage_duration: Duration, paths: Paths) -> Self {
        let now = Instant::now();
        Self {
            last_mutation: String::new(),
            prob_dist,
            start_time: now,
            stage_duration,
            last_backup: now,
            seed,
            paths,
        }
    }

    pub fn due_for_backup(&self, now: Instant, interval: Duration) -> bool {
        now.duration_since(self.last_backup) >= interval
    }

    pub fn due_for_stage_transition(&self, now: Instant) -> bool {
        now.duration_since(self.start_time) >= self.stage_duration
    }
}

/// The subset of controller state that survives a process restart. `Instant` isn't
/// representable across process boundaries, so timers are simply reset on restore: only the
/// seed and the selection weights are worth persisting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedController {
    pub seed: u64,
    pub prob_dist: BTreeMap<String, f64>,
    pub stage_duration_secs: u64,
    pub last_mutation: String,
}

impl PersistedController {
    pub fn capture(state: &ControllerState) -> Self {
        Self {
            seed: state.seed,
            prob_dist: state.prob_dist.clone(),
            stage_duration_secs: state.stage_duration.as_secs(),
            last_mutation: state.last_mutation.clone(),
        }
    }

    pub fn restore(self, paths: Paths) -> ControllerState {
        let now = Instant::now();
        ControllerState {
            last_mutation: self.last_mutation,
            prob_dist: self.prob_dist,
            start_time: now,
            stage_duration: Duration::from_secs(self.stage_duration_secs),
            last_backup: now,
            seed: self.seed,
            paths,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths() -> Paths {
        Paths {
            corpus_dir: PathBuf::from("corpus"),
            backup_dir: PathBuf::from("backup"),
            config_dir: PathBuf::from("config"),
        }
    }

    #[test]
    fn round_trips_seed_and_weights_through_persistence() {
        let mut prob_dist = BTreeMap::new();
        prob_dist.insert("change_attribute".to_string(), 2.5);
        let state = ControllerState::new(7, prob_dist.clone(), Duration::from_secs(120), paths());
        let persisted = PersistedController::capture(&state);
        let restored = persisted.restore(paths());
        assert_eq!(restored.seed, 7);
        assert_eq!(restored.prob_dist, prob_dist);
        assert_eq!(restored.stage_duration, Duration::from_secs(120));
    }

    #[test]
    fn backup_due_after_interval_elapses() {
        let state = ControllerState::new(1, BTreeMap::new(), Duration::from_secs(600), paths());
        assert!(!state.due_for_backup(state.last_backup, Duration::from_secs(600)));
        let later = state.last_backup + Duration::from_secs(601);
        assert!(state.due_for_backup(later, Duration::from_secs(600)));
    }
}
