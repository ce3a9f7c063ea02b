pub mod apt;
pub mod cli;
pub mod context;
pub mod defaults;
pub mod error;
pub mod executor;
pub mod keys;
pub mod privilege;
pub mod proxy;
pub mod release;
pub mod retry;
pub mod sources;

use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{FmtSubscriber, filter::LevelFilter};

pub use context::AptContext;
pub use error::RsaptError;

use crate::executor::CommandExecutor;

pub fn init_logging(log_level: cli::LogLevel) -> Result<()> {
    let filter = match log_level {
        cli::LogLevel::Trace => LevelFilter::TRACE,
        cli::LogLevel::Debug => LevelFilter::DEBUG,
        cli::LogLevel::Info => LevelFilter::INFO,
        cli::LogLevel::Warn => LevelFilter::WARN,
        cli::LogLevel::Error => LevelFilter::ERROR,
    };

    tracing::subscriber::set_global_default(
        FmtSubscriber::builder().with_max_level(filter).finish(),
    )
    .context("failed to set global default tracing subscriber")
}

/// Builds the operation context from common CLI options.
fn context_for(common: &cli::CommonArgs, executor: Arc<dyn CommandExecutor>) -> AptContext {
    AptContext::new(executor)
        .with_apt_dir(common.apt_dir.clone())
        .with_privilege(common.privilege)
}

/// Resolves key material given either inline text or a file path.
fn key_material(
    inline: &Option<String>,
    file: &Option<camino::Utf8PathBuf>,
) -> Result<Option<String>> {
    match (inline, file) {
        (Some(key), _) => Ok(Some(key.clone())),
        (None, Some(path)) => {
            let material = fs::read_to_string(path)
                .with_context(|| format!("failed to read key file: {}", path))?;
            Ok(Some(material))
        }
        (None, None) => Ok(None),
    }
}

pub fn run_add_source(
    opts: &cli::AddSourceArgs,
    executor: Arc<dyn CommandExecutor>,
) -> Result<()> {
    let ctx = context_for(&opts.common, executor);
    let key = key_material(&opts.key, &opts.key_file)?;
    sources::add_source(&ctx, &opts.source, key.as_deref(), opts.strict)
}

pub fn run_import_key(
    opts: &cli::ImportKeyArgs,
    executor: Arc<dyn CommandExecutor>,
) -> Result<()> {
    let ctx = context_for(&opts.common, executor);
    let key = key_material(&opts.key, &opts.file)?
        .context("either a key argument or --file is required")?;
    keys::import_key(&ctx, &key)
}

pub fn run_install(opts: &cli::InstallArgs, executor: Arc<dyn CommandExecutor>) -> Result<()> {
    let ctx = context_for(&opts.common, executor);
    let options = (!opts.options.is_empty()).then_some(opts.options.as_slice());
    apt::install(&ctx, &opts.packages, options, opts.fatal)
}

pub fn run_upgrade(opts: &cli::UpgradeArgs, executor: Arc<dyn CommandExecutor>) -> Result<()> {
    let ctx = context_for(&opts.common, executor);
    let options = (!opts.options.is_empty()).then_some(opts.options.as_slice());
    apt::upgrade(&ctx, options, opts.fatal, opts.dist)
}

pub fn run_update(opts: &cli::UpdateArgs, executor: Arc<dyn CommandExecutor>) -> Result<()> {
    let ctx = context_for(&opts.common, executor);
    apt::update(&ctx, opts.fatal)
}

pub fn run_purge(opts: &cli::PurgeArgs, executor: Arc<dyn CommandExecutor>) -> Result<()> {
    let ctx = context_for(&opts.common, executor);
    apt::purge(&ctx, &opts.packages, opts.fatal)
}

pub fn run_autoremove(
    opts: &cli::AutoremoveArgs,
    executor: Arc<dyn CommandExecutor>,
) -> Result<()> {
    let ctx = context_for(&opts.common, executor);
    apt::autoremove(&ctx, opts.purge, opts.fatal)
}

pub fn run_hold(opts: &cli::MarkArgs, executor: Arc<dyn CommandExecutor>) -> Result<()> {
    let ctx = context_for(&opts.common, executor);
    apt::hold(&ctx, &opts.packages, opts.fatal)
}

pub fn run_unhold(opts: &cli::MarkArgs, executor: Arc<dyn CommandExecutor>) -> Result<()> {
    let ctx = context_for(&opts.common, executor);
    apt::unhold(&ctx, &opts.packages, opts.fatal)
}

pub fn run_check_defaults(opts: &cli::CheckDefaultsArgs) -> Result<()> {
    defaults::validate_defaults_dir(&opts.dir)?;
    info!("defaults validation successful: {}", opts.dir);
    Ok(())
}
