use std::path::PathBuf;

use anyhow::Context;
use tracing::info;

use super::GlobalOptions;

/// Replay a corpus through the mutator for a fixed number of iterations and dump the resulting
/// stats as JSON, the rough equivalent of the original plugin's `__main__` smoke test.
#[derive(Debug, clap::Parser)]
pub(super) struct FuzzCommand {
    /// Directory the mutator's runtime environment is rooted at (holds `input/`, `backup/`,
    /// `config/` unless overridden individually).
    #[clap(long)]
    executable_dir: PathBuf,

    /// Directory of seed files to replay. Defaults to `<executable-dir>/input`.
    #[clap(long)]
    input_dir: Option<PathBuf>,

    /// Directory backups are written to. Defaults to `<executable-dir>/backup`.
    #[clap(long)]
    backup_dir: Option<PathBuf>,

    #[clap(long, default_value_t = 1000)]
    iterations: usize,

    #[clap(long, default_value_t = 65536)]
    max_size: usize,

    #[clap(long, default_value_t = 0)]
    seed: u64,

    /// Skip restoring a prior snapshot from the backup directory.
    #[clap(long)]
    fresh: bool,
}

impl FuzzCommand {
    pub(super) fn run(self, _global: &GlobalOptions) -> anyhow::Result<()> {
        super::set_path_env(&self.executable_dir, self.input_dir.as_deref(), self.backup_dir.as_deref(), self.fresh);

        let input_dir = self.input_dir.unwrap_or_else(|| self.executable_dir.join("input"));
        let seeds = read_corpus(&input_dir).context("reading seed corpus")?;
        anyhow::ensure!(!seeds.is_empty(), "no seed files found in {}", input_dir.display());

        let mut mutator =
            xml_mutator::init::init(&self.seed.to_le_bytes(), &self.executable_dir).context("initializing mutator")?;

        for i in 0..self.iterations {
            let seed = &seeds[i % seeds.len()];
            let out = mutator.fuzz(seed, &[], self.max_size);
            if out.is_empty() {
                tracing::warn!(iteration = i, "mutator produced an empty buffer");
            }
        }

        info!(iterations = self.iterations, corpus_size = seeds.len(), "fuzz replay complete");
        mutator.deinit();

        let stats_json = serde_json::to_string_pretty(mutator.stats()).context("serializing stats")?;
        println!("{stats_json}");
        Ok(())
    }
}

fn read_corpus(dir: &std::path::Path) -> anyhow::Result<Vec<Vec<u8>>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("reading corpus dir {}", dir.display()))? {
        let entry = entry?;
        if entry.path().is_file() {
            files.push(std::fs::read(entry.path())?);
        }
    }
    Ok(files)
}
