use std::path::PathBuf;

use anyhow::Context;

use super::GlobalOptions;

/// Restore a mutator's persisted snapshot and print its last mutation's identifier, truncated
/// to `--max-len` bytes, the way `afl_custom_describe` reports it to the host.
#[derive(Debug, clap::Parser)]
pub(super) struct DescribeCommand {
    #[clap(long)]
    executable_dir: PathBuf,

    #[clap(long)]
    input_dir: Option<PathBuf>,

    #[clap(long)]
    backup_dir: Option<PathBuf>,

    #[clap(long, default_value_t = 64)]
    max_len: usize,
}

impl DescribeCommand {
    pub(super) fn run(self, _global: &GlobalOptions) -> anyhow::Result<()> {
        super::set_path_env(&self.executable_dir, self.input_dir.as_deref(), self.backup_dir.as_deref(), false);
        let mutator = xml_mutator::init::init(&[], &self.executable_dir).context("restoring mutator snapshot")?;
        let description = mutator.describe(self.max_len);
        println!("{}", String::from_utf8_lossy(&description));
        Ok(())
    }
}
