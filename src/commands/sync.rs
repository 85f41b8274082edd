use clap::Args;
use std::path::PathBuf;

use opsbox::config::Config;
use opsbox::sync::{self, SyncOptions, SyncResult};

use super::{CmdResult, GlobalArgs};

#[derive(Args)]
pub struct SyncArgs {
    /// Sync context from opsbox.json
    pub context: String,

    /// Print the planned pipelines without running them
    #[arg(long)]
    pub dry_run: bool,

    /// Keep dumps in this directory instead of a temporary one
    #[arg(long, value_name = "DIR")]
    pub dump_dir: Option<PathBuf>,

    /// rsync target directory (defaults to the current directory)
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub target_dir: PathBuf,
}

pub fn run(args: SyncArgs, global: &GlobalArgs) -> CmdResult<SyncResult> {
    let config = Config::load()?;
    let ctx = config.context(&args.context)?;

    let options = SyncOptions {
        dry_run: args.dry_run,
        dump_dir: args.dump_dir,
        target_dir: args.target_dir,
    };

    let result = sync::run(&config, &ctx, &options, &global.executor())?;
    Ok((result, 0))
}
