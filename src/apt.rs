//! Thin wrappers around `apt-get`, `apt-mark`, and `dpkg-query`.
//!
//! Each operation builds an argument vector, hands it to the context's
//! executor, and interprets the exit status. Mutating apt-get commands run
//! through [`run_apt_command`](crate::retry::run_apt_command), which injects
//! `DEBIAN_FRONTEND=noninteractive` and retries fatal commands on the
//! dpkg-lock exit code.

use anyhow::Result;
use strum::Display;
use tracing::{info, warn};

use crate::context::AptContext;
use crate::error::RsaptError;
use crate::executor::CommandSpec;
use crate::retry::run_apt_command;

/// Default dpkg options for install/upgrade: keep existing conffiles on
/// package upgrades instead of prompting.
pub const DEFAULT_DPKG_OPTIONS: &[&str] = &["--option=Dpkg::Options::=--force-confold"];

/// apt-mark operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum MarkAction {
    Hold,
    Unhold,
}

fn apt_get_spec(ctx: &AptContext, args: Vec<String>) -> CommandSpec {
    CommandSpec::new("apt-get", args).with_privilege(ctx.privilege())
}

fn effective_options(options: Option<&[String]>) -> Vec<String> {
    match options {
        Some(options) => options.to_vec(),
        None => DEFAULT_DPKG_OPTIONS.iter().map(|s| s.to_string()).collect(),
    }
}

/// Installs one or more packages.
///
/// `options` defaults to [`DEFAULT_DPKG_OPTIONS`] when `None`.
pub fn install(
    ctx: &AptContext,
    packages: &[String],
    options: Option<&[String]>,
    fatal: bool,
) -> Result<()> {
    if packages.is_empty() {
        info!("no packages to install");
        return Ok(());
    }

    let options = effective_options(options);
    let mut args = vec!["--assume-yes".to_string()];
    args.extend(options.iter().cloned());
    args.push("install".to_string());
    args.extend(packages.iter().cloned());

    info!("installing {:?} with options: {:?}", packages, options);
    run_apt_command(ctx.executor(), apt_get_spec(ctx, args), fatal)
}

/// Upgrades all packages; `dist` selects `dist-upgrade`.
pub fn upgrade(ctx: &AptContext, options: Option<&[String]>, fatal: bool, dist: bool) -> Result<()> {
    let options = effective_options(options);
    let mut args = vec!["--assume-yes".to_string()];
    args.extend(options.iter().cloned());
    args.push(if dist { "dist-upgrade" } else { "upgrade" }.to_string());

    info!("upgrading with options: {:?}", options);
    run_apt_command(ctx.executor(), apt_get_spec(ctx, args), fatal)
}

/// Updates the local apt package index.
pub fn update(ctx: &AptContext, fatal: bool) -> Result<()> {
    run_apt_command(ctx.executor(), apt_get_spec(ctx, vec!["update".to_string()]), fatal)
}

/// Purges one or more packages.
pub fn purge(ctx: &AptContext, packages: &[String], fatal: bool) -> Result<()> {
    if packages.is_empty() {
        info!("no packages to purge");
        return Ok(());
    }

    let mut args = vec!["--assume-yes".to_string(), "purge".to_string()];
    args.extend(packages.iter().cloned());

    info!("purging {:?}", packages);
    run_apt_command(ctx.executor(), apt_get_spec(ctx, args), fatal)
}

/// Removes packages that were automatically installed and are no longer
/// needed; `purge` also removes their configuration files.
pub fn autoremove(ctx: &AptContext, purge: bool, fatal: bool) -> Result<()> {
    let mut args = vec!["--assume-yes".to_string(), "autoremove".to_string()];
    if purge {
        args.push("--purge".to_string());
    }
    run_apt_command(ctx.executor(), apt_get_spec(ctx, args), fatal)
}

/// Flags one or more packages using `apt-mark`.
///
/// Unlike apt-get commands, apt-mark does not contend for the dpkg lock in
/// a way worth retrying; fatal failures error immediately.
pub fn mark(ctx: &AptContext, packages: &[String], action: MarkAction, fatal: bool) -> Result<()> {
    if packages.is_empty() {
        return Ok(());
    }

    let mut args = vec![action.to_string()];
    args.extend(packages.iter().cloned());
    let spec = CommandSpec::new("apt-mark", args).with_privilege(ctx.privilege());

    info!("marking {:?} as {}", packages, action);
    let result = ctx.executor().execute(&spec)?;
    if fatal && !result.success() {
        return Err(RsaptError::Execution {
            command: spec.display(),
            status: format!("exit status: {:?}", result.code()),
        }
        .into());
    }
    Ok(())
}

/// Holds packages at their current version.
pub fn hold(ctx: &AptContext, packages: &[String], fatal: bool) -> Result<()> {
    mark(ctx, packages, MarkAction::Hold, fatal)
}

/// Releases a hold placed by [`hold`].
pub fn unhold(ctx: &AptContext, packages: &[String], fatal: bool) -> Result<()> {
    mark(ctx, packages, MarkAction::Unhold, fatal)
}

/// Returns the installed version of a package, or `None` when the package
/// is unknown to dpkg or not in the `installed` state.
pub fn installed_version(ctx: &AptContext, package: &str) -> Result<Option<String>> {
    let spec = CommandSpec::new(
        "dpkg-query",
        vec![
            "--show".to_string(),
            "--showformat=${db:Status-Status}\t${Version}".to_string(),
            package.to_string(),
        ],
    );

    let output = ctx.executor().capture(&spec, None)?;
    if !output.success() {
        // dpkg-query exits non-zero for packages it has never seen
        warn!("package {} has no installation candidate", package);
        return Ok(None);
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut fields = stdout.trim_end().splitn(2, '\t');
    let status = fields.next().unwrap_or_default();
    let version = fields.next().unwrap_or_default();

    if status == "installed" && !version.is_empty() {
        Ok(Some(version.to_string()))
    } else {
        Ok(None)
    }
}

/// Returns the subset of `packages` that still require installation.
///
/// Packages unknown to dpkg are included; apt-get decides their fate.
pub fn filter_installed(ctx: &AptContext, packages: &[String]) -> Result<Vec<String>> {
    let mut missing = Vec::new();
    for package in packages {
        if installed_version(ctx, package)?.is_none() {
            missing.push(package.clone());
        }
    }
    Ok(missing)
}

/// Returns the subset of `packages` that are already installed.
pub fn filter_missing(ctx: &AptContext, packages: &[String]) -> Result<Vec<String>> {
    let mut installed = Vec::new();
    for package in packages {
        if installed_version(ctx, package)?.is_some() {
            installed.push(package.clone());
        }
    }
    Ok(installed)
}

/// Strips the epoch and Debian revision from a dpkg version string,
/// leaving the upstream version (`1:2.34-0ubuntu3` becomes `2.34`).
pub fn upstream_version(version: &str) -> &str {
    let without_epoch = match version.split_once(':') {
        Some((epoch, rest)) if epoch.chars().all(|c| c.is_ascii_digit()) => rest,
        _ => version,
    };
    match without_epoch.rsplit_once('-') {
        Some((upstream, _revision)) => upstream,
        None => without_epoch,
    }
}

/// Returns the upstream version of an installed package, or `None` when it
/// is not installed.
pub fn get_upstream_version(ctx: &AptContext, package: &str) -> Result<Option<String>> {
    Ok(installed_version(ctx, package)?.map(|v| upstream_version(&v).to_string()))
}
