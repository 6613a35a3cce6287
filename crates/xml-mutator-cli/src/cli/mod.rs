mod describe;
mod fuzz;
mod introspect;

use std::path::PathBuf;

use anyhow::Context;
use describe::DescribeCommand;
use fuzz::FuzzCommand;
use introspect::IntrospectCommand;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, clap::Parser)]
#[command(version, about, styles = clap::builder::Styles::styled())]
pub struct Cli {
    #[clap(flatten)]
    global_options: GlobalOptions,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    pub(super) fn run(self) -> anyhow::Result<()> {
        setup_logger(&self.global_options).context("Setting up logger")?;
        match self.command {
            Command::Fuzz(cmd) => cmd.run(&self.global_options),
            Command::Describe(cmd) => cmd.run(&self.global_options),
            Command::Introspect(cmd) => cmd.run(&self.global_options),
        }
    }
}

#[derive(Debug, clap::Parser)]
pub(super) struct GlobalOptions {
    #[clap(long, default_value = "info")]
    default_log_level: LevelFilter,
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    Fuzz(FuzzCommand),
    Describe(DescribeCommand),
    Introspect(IntrospectCommand),
}

fn setup_logger(global_opts: &GlobalOptions) -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_timer(fmt::time::ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_owned()))
                .with_writer(std::io::stderr),
        )
        .with(
            EnvFilter::builder()
                .with_default_directive(global_opts.default_log_level.into())
                .from_env()
                .context("Constructing log filter from env.")?,
        )
        .init();

    Ok(())
}

/// Every subcommand restores or creates a mutator via `xml_mutator::init::init`, which reads its
/// paths from the environment. Setting these here keeps each subcommand's flags in terms of
/// plain directories instead of duplicating `config::resolve_env`'s variable names.
fn set_path_env(executable_dir: &std::path::Path, input_dir: Option<&std::path::Path>, backup_dir: Option<&std::path::Path>, fresh: bool) {
    unsafe {
        std::env::set_var("INPUT_DIR", input_dir.map_or_else(|| executable_dir.join("input"), PathBuf::from));
        std::env::set_var("BACKUP_DIR", backup_dir.map_or_else(|| executable_dir.join("backup"), PathBuf::from));
        if fresh {
            std::env::set_var("DONT_RESTORE", "1");
        } else {
            std::env::remove_var("DONT_RESTORE");
        }
    }
}
