//! Snapshot/restore of the mutator's durable state across AFL++ host restarts.
//!
//! Only the stats map and controller scalars are persisted: corpora, the XML parser, and the
//! logger are process-wide and rebuilt fresh on every `init`/`restore`, never serialized.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::controller::{ControllerState, Paths, PersistedController};
use crate::error::{MutatorError, Result};
use crate::stats::StatsMap;

const SCHEMA_VERSION: u32 = 1;
const STATS_FILE: &str = "data.bak";
const CONTROLLER_FILE: &str = "state.bak";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Snapshot<T> {
    version: u32,
    payload: T,
}

/// Writes the stats map and controller state to their sibling files in `backup_dir`,
/// overwriting whatever was there. Logged at error level, matching the original plugin's
/// choice to surface every backup as loudly as a failure — a snapshot is itself a rare,
/// noteworthy event on the fuzzing timeline.
pub fn backup(backup_dir: &Path, stats: &StatsMap, controller: &ControllerState) -> Result<()> {
    error!(path = %backup_dir.display(), execs_tracked = stats.len(), "snapshotting mutator state");
    fs::create_dir_all(backup_dir).map_err(|source| MutatorError::BackupIo {
        path: backup_dir.display().to_string(),
        source,
    })?;
    write_snapshot(&backup_dir.join(STATS_FILE), stats)?;
    write_snapshot(&backup_dir.join(CONTROLLER_FILE), &PersistedController::capture(controller))?;
    Ok(())
}

/// Reads a prior snapshot back, if present. `Ok(None)` means no snapshot exists yet (cold
/// init); `Err` means a snapshot exists but is corrupt or on an unsupported schema version.
pub fn restore(backup_dir: &Path, paths: Paths) -> Result<Option<(StatsMap, ControllerState)>> {
    let stats_path = backup_dir.join(STATS_FILE);
    let controller_path = backup_dir.join(CONTROLLER_FILE);
    if !stats_path.exists() || !controller_path.exists() {
        return Ok(None);
    }
    let stats: StatsMap = read_snapshot(&stats_path)?;
    let controller: PersistedController = read_snapshot(&controller_path)?;
    Ok(Some((stats, controller.restore(paths))))
}

fn write_snapshot<T: Serialize>(path: &Path, payload: &T) -> Result<()> {
    let snapshot = Snapshot {
        version: SCHEMA_VERSION,
        payload,
    };
    let bytes = serde_cbor::to_vec(&snapshot).map_err(MutatorError::PersistWrite)?;
    fs::write(path, bytes).map_err(|source| MutatorError::BackupIo {
        path: path.display().to_string(),
        source,
    })
}

fn read_snapshot<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).map_err(|source| MutatorError::BackupIo {
        path: path.display().to_string(),
        source,
    })?;
    let snapshot: Snapshot<T> = serde_cbor::from_slice(&bytes).map_err(MutatorError::PersistRead)?;
    Ok(snapshot.payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::StatsRecord;
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn paths(dir: &Path) -> Paths {
        Paths {
            corpus_dir: dir.join("corpus"),
            backup_dir: dir.to_path_buf(),
            config_dir: dir.join("config"),
        }
    }

    #[test]
    fn round_trips_stats_and_controller_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let dir = dir.path();

        let mut stats = StatsMap::new();
        let mut record = StatsRecord {
            execs: 5,
            successful_mut: 3,
            ..Default::default()
        };
        record.recompute_ratios();
        stats.insert("change_attribute".to_string(), record);

        let mut prob_dist = BTreeMap::new();
        prob_dist.insert("change_attribute".to_string(), 1.0);
        let controller = ControllerState::new(42, prob_dist, Duration::from_secs(60), paths(dir));

        backup(dir, &stats, &controller).unwrap();
        let (restored_stats, restored_controller) = restore(dir, paths(dir)).unwrap().unwrap();

        assert_eq!(restored_stats, stats);
        assert_eq!(restored_controller.seed, 42);
        assert_eq!(restored_controller.prob_dist, controller.prob_dist);
    }

    #[test]
    fn restore_without_a_prior_snapshot_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(restore(dir.path(), paths(dir.path())).unwrap().is_none());
    }
}
