//! Cold/warm startup: reads the environment and config files, harvests the seed corpus, and
//! restores or creates controller/stats state, producing a ready-to-use [`Mutator`].

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::{self, MetricConfig, MutatorConfig};
use crate::controller::ControllerState;
use crate::dispatcher::Mutator;
use crate::error::{MutatorError, Result};
use crate::metrics::{DummyMetric, Metric, RatioMetric};
use crate::rand;
use crate::schema::NullSchemaValidator;
use crate::stats::StatsMap;
use crate::strategies::{default_portfolio, FallbackMutator, SeedCorpus};

pub fn init(seed: &[u8], executable_dir: &Path) -> Result<Mutator> {
    let env = config::resolve_env(executable_dir);
    let seed_files = read_corpus(&env.paths.corpus_dir)?;
    let corpus = Arc::new(SeedCorpus::harvest(&seed_files));
    let strategies = default_portfolio(corpus.clone());
    let fallback = FallbackMutator::new(corpus);

    let mutator_cfg = try_load(&env.mutator_cfg_path, config::load_mutator_config)?;
    let metric_cfg = try_load(&env.metric_cfg_path, config::load_metric_config)?;

    let mut prob_dist: BTreeMap<String, f64> = strategies.iter().map(|s| (s.identifier().to_string(), 1.0)).collect();
    if let Some(cfg) = &mutator_cfg {
        apply_weights(&mut prob_dist, cfg)?;
    }

    let metrics = build_metrics(metric_cfg.as_ref())?;
    let stage_duration = Duration::from_secs(env.stage_duration_secs);

    if !env.dont_restore
        && let Some((stats, controller)) = crate::persistence::restore(&env.paths.backup_dir, env.paths.clone())? {
            info!("restored mutator state from prior snapshot");
            return Ok(Mutator::new(
                strategies,
                fallback,
                metrics,
                Box::new(NullSchemaValidator),
                rand::seeded(seed),
                stats,
                controller,
            ));
        }

    let seed_u64 = fold_seed(seed);
    let controller = ControllerState::new(seed_u64, prob_dist, stage_duration, env.paths);
    Ok(Mutator::new(
        strategies,
        fallback,
        metrics,
        Box::new(NullSchemaValidator),
        rand::seeded(seed),
        StatsMap::new(),
        controller,
    ))
}

fn fold_seed(seed: &[u8]) -> u64 {
    seed.iter().fold(0u64, |acc, &b| acc.wrapping_mul(31).wrapping_add(u64::from(b)))
}

/// Loads an optional config file. A missing file is the documented zero-config path (compiled-in
/// defaults apply); anything else — malformed YAML, an unreadable file that isn't simply absent —
/// is a fatal config error per spec §7 and propagates out of `init`.
fn try_load<T>(path: &Path, loader: impl Fn(&Path) -> Result<T>) -> Result<Option<T>> {
    match loader(path) {
        Ok(cfg) => Ok(Some(cfg)),
        Err(MutatorError::ConfigIo { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "config file not found, using compiled-in defaults");
            Ok(None)
        }
        Err(err) => {
            tracing::error!(path = %path.display(), %err, "fatal config error during init");
            Err(err)
        }
    }
}

/// An unrecognized `identifier` (the strategy set is a closed, compiled-in enumeration — see
/// `config::MutatorConfig`) or an empty one is a fatal config error, not something to skip.
fn apply_weights(prob_dist: &mut BTreeMap<String, f64>, cfg: &MutatorConfig) -> Result<()> {
    for entry in &cfg.mutator_cfg {
        if entry.identifier.trim().is_empty() {
            return Err(MutatorError::MissingField("identifier"));
        }
        if !prob_dist.contains_key(&entry.identifier) {
            return Err(MutatorError::UnknownStrategy(entry.identifier.clone()));
        }
        prob_dist.insert(entry.identifier.clone(), entry.weight);
    }
    Ok(())
}

fn build_metrics(cfg: Option<&MetricConfig>) -> Result<Vec<Box<dyn Metric>>> {
    let Some(cfg) = cfg else {
        return Ok(vec![Box::new(DummyMetric)]);
    };
    let mut metrics: Vec<Box<dyn Metric>> = Vec::with_capacity(cfg.metric_cfg.len());
    for entry in &cfg.metric_cfg {
        if entry.identifier.trim().is_empty() {
            return Err(MutatorError::MissingField("identifier"));
        }
        let metric: Box<dyn Metric> = match entry.kind.as_str() {
            "dummy" => Box::new(DummyMetric),
            "well_formed" => Box::new(RatioMetric::well_formed()),
            "saml_valid" => Box::new(RatioMetric::saml_valid()),
            "new_finds" => Box::new(RatioMetric::new_finds()),
            other => return Err(MutatorError::UnknownMetric(other.to_string())),
        };
        metrics.push(metric);
    }
    if metrics.is_empty() {
        metrics.push(Box::new(DummyMetric));
    }
    Ok(metrics)
}

fn read_corpus(corpus_dir: &Path) -> Result<Vec<Vec<u8>>> {
    let Ok(entries) = std::fs::read_dir(corpus_dir) else {
        return Ok(Vec::new());
    };
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| MutatorError::CorpusIo {
            path: corpus_dir.display().to_string(),
            source,
        })?;
        if entry.path().is_file() {
            let bytes = std::fs::read(entry.path()).map_err(|source| MutatorError::CorpusIo {
                path: entry.path().display().to_string(),
                source,
            })?;
            files.push(bytes);
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn cold_init_with_empty_environment_produces_a_usable_mutator() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        fs::create_dir_all(dir.join("input")).unwrap();
        fs::write(dir.join("input/seed.xml"), b"<Response ID=\"1\"><a>x</a></Response>").unwrap();

        unsafe {
            std::env::set_var("INPUT_DIR", dir.join("input"));
            std::env::set_var("BACKUP_DIR", dir.join("backup"));
            std::env::set_var("CFG_DIR", dir.join("config"));
            std::env::set_var("DONT_RESTORE", "1");
        }
        fs::create_dir_all(dir.join("backup")).unwrap();

        let mut mutator = init(b"test-seed", dir).unwrap();
        let out = mutator.fuzz(b"<Response/>", &[], 4096);
        assert!(!out.is_empty());

        unsafe {
            std::env::remove_var("INPUT_DIR");
            std::env::remove_var("BACKUP_DIR");
            std::env::remove_var("CFG_DIR");
            std::env::remove_var("DONT_RESTORE");
        }
    }

    #[test]
    fn malformed_mutator_config_aborts_init() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        fs::create_dir_all(dir.join("input")).unwrap();
        fs::create_dir_all(dir.join("backup")).unwrap();
        fs::create_dir_all(dir.join("config")).unwrap();
        fs::write(dir.join("config/mutators.yaml"), b"not: [valid, yaml: at all").unwrap();

        unsafe {
            std::env::set_var("INPUT_DIR", dir.join("input"));
            std::env::set_var("BACKUP_DIR", dir.join("backup"));
            std::env::set_var("CFG_DIR", dir.join("config"));
            std::env::set_var("DONT_RESTORE", "1");
        }

        let result = init(b"test-seed", dir);
        assert!(matches!(result, Err(MutatorError::ConfigParse { .. })));

        unsafe {
            std::env::remove_var("INPUT_DIR");
            std::env::remove_var("BACKUP_DIR");
            std::env::remove_var("CFG_DIR");
            std::env::remove_var("DONT_RESTORE");
        }
    }

    #[test]
    fn unknown_strategy_identifier_aborts_init() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        fs::create_dir_all(dir.join("input")).unwrap();
        fs::create_dir_all(dir.join("backup")).unwrap();
        fs::create_dir_all(dir.join("config")).unwrap();
        fs::write(
            dir.join("config/mutators.yaml"),
            br#"
mutator_cfg:
  - type: not_a_real_strategy
    identifier: not_a_real_strategy
    weight: 1.0
fallback_mutator_cfg:
  - type: fallback_mutator
    identifier: fallback_mutator
"#,
        )
        .unwrap();

        unsafe {
            std::env::set_var("INPUT_DIR", dir.join("input"));
            std::env::set_var("BACKUP_DIR", dir.join("backup"));
            std::env::set_var("CFG_DIR", dir.join("config"));
            std::env::set_var("DONT_RESTORE", "1");
        }

        let result = init(b"test-seed", dir);
        assert!(matches!(result, Err(MutatorError::UnknownStrategy(_))));

        unsafe {
            std::env::remove_var("INPUT_DIR");
            std::env::remove_var("BACKUP_DIR");
            std::env::remove_var("CFG_DIR");
            std::env::remove_var("DONT_RESTORE");
        }
    }

    #[test]
    fn unknown_metric_type_aborts_init() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        fs::create_dir_all(dir.join("input")).unwrap();
        fs::create_dir_all(dir.join("backup")).unwrap();
        fs::create_dir_all(dir.join("config")).unwrap();
        fs::write(
            dir.join("config/metrics.yaml"),
            br#"
metric_cfg:
  - type: not_a_real_metric
    identifier: bogus
"#,
        )
        .unwrap();

        unsafe {
            std::env::set_var("INPUT_DIR", dir.join("input"));
            std::env::set_var("BACKUP_DIR", dir.join("backup"));
            std::env::set_var("CFG_DIR", dir.join("config"));
            std::env::set_var("DONT_RESTORE", "1");
        }

        let result = init(b"test-seed", dir);
        assert!(matches!(result, Err(MutatorError::UnknownMetric(_))));

        unsafe {
            std::env::remove_var("INPUT_DIR");
            std::env::remove_var("BACKUP_DIR");
            std::env::remove_var("CFG_DIR");
            std::env::remove_var("DONT_RESTORE");
        }
    }
}
