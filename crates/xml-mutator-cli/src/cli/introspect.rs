use std::path::PathBuf;

use anyhow::Context;

use super::GlobalOptions;

/// Restore a mutator's persisted snapshot, mark its last mutation as having led to a new find,
/// and print its identifier, the way `afl_custom_introspection` reports it to the host.
#[derive(Debug, clap::Parser)]
pub(super) struct IntrospectCommand {
    #[clap(long)]
    executable_dir: PathBuf,

    #[clap(long)]
    input_dir: Option<PathBuf>,

    #[clap(long)]
    backup_dir: Option<PathBuf>,
}

impl IntrospectCommand {
    pub(super) fn run(self, _global: &GlobalOptions) -> anyhow::Result<()> {
        super::set_path_env(&self.executable_dir, self.input_dir.as_deref(), self.backup_dir.as_deref(), false);
        let mut mutator = xml_mutator::init::init(&[], &self.executable_dir).context("restoring mutator snapshot")?;
        let identifier = mutator.introspection();
        mutator.deinit();
        println!("{}", String::from_utf8_lossy(&identifier));
        Ok(())
    }
}
