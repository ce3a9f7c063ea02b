use anyhow::Result;
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use crate::privilege::PrivilegeMethod;

#[derive(Parser, Debug)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = env!("CARGO_PKG_DESCRIPTION"),
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add a package source (add-apt-repository spec, proposed, cloud archive)
    AddSource(AddSourceArgs),

    /// Import a GPG key into the APT trusted keyring directory
    ImportKey(ImportKeyArgs),

    /// Install one or more packages
    Install(InstallArgs),

    /// Upgrade all packages
    Upgrade(UpgradeArgs),

    /// Update the local apt package index
    Update(UpdateArgs),

    /// Purge one or more packages
    Purge(PurgeArgs),

    /// Remove automatically installed packages that are no longer needed
    Autoremove(AutoremoveArgs),

    /// Hold packages at their current version
    Hold(MarkArgs),

    /// Release a hold placed on packages
    Unhold(MarkArgs),

    /// Validate YAML defaults/schema file pairs in a directory
    CheckDefaults(CheckDefaultsArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

impl Commands {
    /// The common options of this subcommand, when it has any.
    pub fn common(&self) -> Option<&CommonArgs> {
        match self {
            Self::AddSource(opts) => Some(&opts.common),
            Self::ImportKey(opts) => Some(&opts.common),
            Self::Install(opts) => Some(&opts.common),
            Self::Upgrade(opts) => Some(&opts.common),
            Self::Update(opts) => Some(&opts.common),
            Self::Purge(opts) => Some(&opts.common),
            Self::Autoremove(opts) => Some(&opts.common),
            Self::Hold(opts) => Some(&opts.common),
            Self::Unhold(opts) => Some(&opts.common),
            Self::CheckDefaults(opts) => Some(&opts.common),
            Self::Completions(_) => None,
        }
    }

    /// The effective log level for this invocation.
    pub fn log_level(&self) -> LogLevel {
        self.common().map(|c| c.log_level).unwrap_or(LogLevel::Info)
    }
}

/// Options shared by every system-touching subcommand.
#[derive(Args, Debug)]
pub struct CommonArgs {
    /// Set the log level
    #[arg(short, long, default_value = "info")]
    pub log_level: LogLevel,

    /// Do not run commands or write files, just show what would be done
    #[arg(long)]
    pub dry_run: bool,

    /// APT configuration directory
    #[arg(long, default_value = crate::context::DEFAULT_APT_DIR)]
    pub apt_dir: Utf8PathBuf,

    /// Wrap external commands with a privilege escalation method
    #[arg(long, value_enum)]
    pub privilege: Option<PrivilegeMethod>,
}

#[derive(Args, Debug)]
pub struct AddSourceArgs {
    /// Source specification (e.g. 'ppa:user/archive', 'deb <spec>',
    /// 'proposed', 'cloud:<pocket>', 'distro')
    pub source: String,

    /// GPG key material or key ID to import alongside the source
    #[arg(short, long)]
    pub key: Option<String>,

    /// Read GPG key material from a file instead
    #[arg(long, conflicts_with = "key")]
    pub key_file: Option<Utf8PathBuf>,

    /// Fail on unrecognized source specifications instead of logging
    #[arg(long)]
    pub strict: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Args, Debug)]
pub struct ImportKeyArgs {
    /// GPG key material (ASCII armor) or a bare key ID
    #[arg(required_unless_present = "file")]
    pub key: Option<String>,

    /// Read GPG key material from a file instead
    #[arg(long, conflicts_with = "key")]
    pub file: Option<Utf8PathBuf>,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Packages to install
    #[arg(required = true)]
    pub packages: Vec<String>,

    /// Override the default dpkg options (repeatable)
    #[arg(short, long = "option", allow_hyphen_values = true)]
    pub options: Vec<String>,

    /// Retry on transient apt failures and error when the command fails
    #[arg(long)]
    pub fatal: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Args, Debug)]
pub struct UpgradeArgs {
    /// Run dist-upgrade instead of upgrade
    #[arg(long)]
    pub dist: bool,

    /// Override the default dpkg options (repeatable)
    #[arg(short, long = "option", allow_hyphen_values = true)]
    pub options: Vec<String>,

    /// Retry on transient apt failures and error when the command fails
    #[arg(long)]
    pub fatal: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Retry on transient apt failures and error when the command fails
    #[arg(long)]
    pub fatal: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Args, Debug)]
pub struct PurgeArgs {
    /// Packages to purge
    #[arg(required = true)]
    pub packages: Vec<String>,

    /// Retry on transient apt failures and error when the command fails
    #[arg(long)]
    pub fatal: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Args, Debug)]
pub struct AutoremoveArgs {
    /// Also remove configuration files of removed packages
    #[arg(long)]
    pub purge: bool,

    /// Retry on transient apt failures and error when the command fails
    #[arg(long)]
    pub fatal: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Args, Debug)]
pub struct MarkArgs {
    /// Packages to mark
    #[arg(required = true)]
    pub packages: Vec<String>,

    /// Error when apt-mark fails
    #[arg(long)]
    pub fatal: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Args, Debug)]
pub struct CheckDefaultsArgs {
    /// Directory containing YAML defaults/schema file pairs
    pub dir: Utf8PathBuf,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Represents log levels for controlling the verbosity of logging output.
///
/// This enum maps directly to the log levels used by the `tracing` crate:
/// - `Trace`: Designates very detailed application-level information.
/// - `Debug`: Designates information useful for debugging.
/// - `Info`: Designates general operational messages.
/// - `Warn`: Designates potentially harmful situations.
/// - `Error`: Designates error events that might still allow the application to continue running.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

pub fn parse_args() -> Result<Cli> {
    Ok(Cli::parse())
}
