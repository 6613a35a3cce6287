//! Typed YAML configuration for the three config files the host points us at, plus the
//! environment-variable-driven path resolution that locates them and the backup/corpus dirs.

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::controller::Paths;
use crate::error::{MutatorError, Result};

const DEFAULT_STAGE_DURATION_SECS: u64 = 7200;

/// `logging.yaml`: a per-module level map plus a `default` fallback.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub default: String,
    #[serde(flatten)]
    pub modules: HashMap<String, String>,
}

/// One entry of `mutator_cfg` / `fallback_mutator_cfg` in `mutators.yaml`.
#[derive(Debug, Clone, Deserialize)]
pub struct StrategyEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub identifier: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

/// `mutators.yaml`. `mutator_plugins` is informational only — the strategy set is a closed,
/// compiled-in enumeration, so this list is logged at startup rather than used to look anything
/// up dynamically.
#[derive(Debug, Clone, Deserialize)]
pub struct MutatorConfig {
    #[serde(default)]
    pub mutator_plugins: Vec<String>,
    pub mutator_cfg: Vec<StrategyEntry>,
    pub fallback_mutator_cfg: [StrategyEntry; 1],
}

/// One entry of `metric_cfg` in `metrics.yaml`.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub identifier: String,
}

/// `metrics.yaml`.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricConfig {
    #[serde(default)]
    pub metric_plugins: Vec<String>,
    pub metric_cfg: Vec<MetricEntry>,
}

pub fn load_mutator_config(path: &Path) -> Result<MutatorConfig> {
    load_yaml(path)
}

pub fn load_metric_config(path: &Path) -> Result<MetricConfig> {
    load_yaml(path)
}

pub fn load_logging_config(path: &Path) -> Result<LoggingConfig> {
    load_yaml(path)
}

fn load_yaml<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).map_err(|source| MutatorError::ConfigIo {
        path: path.display().to_string(),
        source,
    })?;
    serde_yaml::from_str(&text).map_err(|source| MutatorError::ConfigParse {
        path: path.display().to_string(),
        source,
    })
}

/// Resolves every directory and config-file path the host environment can override, the Rust
/// equivalent of the original plugin's `os.environ.get(..., default)` resolution in `init`.
pub struct ResolvedEnv {
    pub paths: Paths,
    pub mutator_cfg_path: PathBuf,
    pub metric_cfg_path: PathBuf,
    pub logging_cfg_path: PathBuf,
    pub log_level: Option<String>,
    pub stage_duration_secs: u64,
    pub dont_restore: bool,
}

pub fn resolve_env(executable_dir: &Path) -> ResolvedEnv {
    let dir_or_default = |var: &str, default: &str| {
        env::var(var).map(PathBuf::from).unwrap_or_else(|_| executable_dir.join(default))
    };

    let config_dir = dir_or_default("CFG_DIR", "config");
    let paths = Paths {
        corpus_dir: dir_or_default("INPUT_DIR", "input"),
        backup_dir: dir_or_default("BACKUP_DIR", "backup"),
        config_dir: config_dir.clone(),
    };

    ResolvedEnv {
        mutator_cfg_path: env::var("MUTATOR_CFG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir.join("mutators.yaml")),
        metric_cfg_path: env::var("METRIC_CFG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir.join("metrics.yaml")),
        logging_cfg_path: config_dir.join("logging.yaml"),
        log_level: env::var("LOG_LEVEL").ok(),
        stage_duration_secs: env::var("STAGE_DURATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_STAGE_DURATION_SECS),
        dont_restore: env::var_os("DONT_RESTORE").is_some(),
        paths,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn parses_a_minimal_mutators_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mutators.yaml");
        fs::write(
            &path,
            r#"
mutator_plugins: ["change_attribute"]
mutator_cfg:
  - type: change_attribute
    identifier: change_attribute
    weight: 2.0
fallback_mutator_cfg:
  - type: fallback_mutator
    identifier: fallback_mutator
"#,
        )
        .unwrap();

        let config = load_mutator_config(&path).unwrap();
        assert_eq!(config.mutator_cfg[0].weight, 2.0);
        assert_eq!(config.fallback_mutator_cfg[0].identifier, "fallback_mutator");
    }

    #[test]
    fn strategy_entry_defaults_weight_to_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mutators.yaml");
        fs::write(
            &path,
            r#"
mutator_cfg:
  - type: move_subtree
    identifier: move_subtree
fallback_mutator_cfg:
  - type: fallback_mutator
    identifier: fallback_mutator
"#,
        )
        .unwrap();

        let config = load_mutator_config(&path).unwrap();
        assert_eq!(config.mutator_cfg[0].weight, 1.0);
    }
}
