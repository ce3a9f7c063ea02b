use std::io;
use std::process;
use std::sync::Arc;

use anyhow::Result;
use clap::CommandFactory;
use clap_complete::generate;
use tracing::error;

use rsapt::cli::{self, Cli, Commands};
use rsapt::executor::{CommandExecutor, RealCommandExecutor};

fn main() -> Result<()> {
    let args = cli::parse_args()?;

    rsapt::init_logging(args.command.log_level())?;

    if let Commands::Completions(opts) = &args.command {
        let mut cmd = Cli::command();
        generate(opts.shell, &mut cmd, env!("CARGO_PKG_NAME"), &mut io::stdout());
        return Ok(());
    }

    let common = args
        .command
        .common()
        .expect("all system-touching commands carry common options");
    let executor: Arc<dyn CommandExecutor> = Arc::new(RealCommandExecutor {
        dry_run: common.dry_run,
    });

    let result = match &args.command {
        Commands::AddSource(opts) => rsapt::run_add_source(opts, executor),
        Commands::ImportKey(opts) => rsapt::run_import_key(opts, executor),
        Commands::Install(opts) => rsapt::run_install(opts, executor),
        Commands::Upgrade(opts) => rsapt::run_upgrade(opts, executor),
        Commands::Update(opts) => rsapt::run_update(opts, executor),
        Commands::Purge(opts) => rsapt::run_purge(opts, executor),
        Commands::Autoremove(opts) => rsapt::run_autoremove(opts, executor),
        Commands::Hold(opts) => rsapt::run_hold(opts, executor),
        Commands::Unhold(opts) => rsapt::run_unhold(opts, executor),
        Commands::CheckDefaults(opts) => rsapt::run_check_defaults(opts),
        Commands::Completions(_) => unreachable!("handled above"),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        process::exit(1);
    }

    Ok(())
}
