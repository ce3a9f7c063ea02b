//! Package source registration.
//!
//! [`add_source`] accepts the source specifications supported by
//! `add-apt-repository(1)` plus a few shorthand forms, and dispatches on the
//! first matching pattern:
//!
//! - `distro` — a no-op
//! - `proposed` / `distro-proposed` — enable the proposed pocket for the
//!   host series
//! - `cloud-archive:<spec>`, `ppa:<name>`, `deb <spec>`, `http://...`,
//!   `https://...` — handed to `add-apt-repository --yes`
//! - `cloud:<series>-<release>/staging` — the Ubuntu Cloud Archive staging
//!   PPA for `<release>`, after checking `<series>` against the host
//! - `cloud:<series>-<release>` / `snap:...-<series>-<release>` — a cloud
//!   archive pocket, after checking `<series>` against the host
//! - `cloud:<pocket>` — a cloud archive pocket
//!
//! Classification ([`SourceRequest::parse`]) is separate from execution so
//! the dispatch order is testable without touching the system.

use std::fs;
use std::sync::LazyLock;

use camino::Utf8PathBuf;
use regex::{Captures, Regex};
use tracing::{debug, error, info};

use crate::context::AptContext;
use crate::error::RsaptError;
use crate::executor::CommandSpec;
use crate::proxy::{ProxyScheme, proxy_settings};
use crate::retry::{RetryPolicy, run_with_retries};
use crate::{apt, keys};

const PROPOSED_POCKET: &str = "# Proposed\n\
    deb http://archive.ubuntu.com/ubuntu {series}-proposed main universe \
    multiverse restricted\n";
const PROPOSED_PORTS_POCKET: &str = "# Proposed\n\
    deb http://ports.ubuntu.com/ubuntu-ports {series}-proposed main universe \
    multiverse restricted\n";

const CLOUD_ARCHIVE: &str = "# Ubuntu Cloud Archive\n\
    deb http://ubuntu-cloud.archive.canonical.com/ubuntu {pocket} main\n";

/// Keyring package providing the Ubuntu Cloud Archive signing key.
const CLOUD_ARCHIVE_KEYRING: &str = "ubuntu-cloud-keyring";

/// Alias spellings accepted for Ubuntu Cloud Archive pockets, mapped to the
/// actual pocket name used in the deb line.
const CLOUD_ARCHIVE_POCKETS: &[(&str, &str)] = &[
    // Folsom
    ("folsom", "precise-updates/folsom"),
    ("folsom/updates", "precise-updates/folsom"),
    ("precise-folsom", "precise-updates/folsom"),
    ("precise-folsom/updates", "precise-updates/folsom"),
    ("precise-updates/folsom", "precise-updates/folsom"),
    ("folsom/proposed", "precise-proposed/folsom"),
    ("precise-folsom/proposed", "precise-proposed/folsom"),
    ("precise-proposed/folsom", "precise-proposed/folsom"),
    // Grizzly
    ("grizzly", "precise-updates/grizzly"),
    ("grizzly/updates", "precise-updates/grizzly"),
    ("precise-grizzly", "precise-updates/grizzly"),
    ("precise-grizzly/updates", "precise-updates/grizzly"),
    ("precise-updates/grizzly", "precise-updates/grizzly"),
    ("grizzly/proposed", "precise-proposed/grizzly"),
    ("precise-grizzly/proposed", "precise-proposed/grizzly"),
    ("precise-proposed/grizzly", "precise-proposed/grizzly"),
    // Havana
    ("havana", "precise-updates/havana"),
    ("havana/updates", "precise-updates/havana"),
    ("precise-havana", "precise-updates/havana"),
    ("precise-havana/updates", "precise-updates/havana"),
    ("precise-updates/havana", "precise-updates/havana"),
    ("havana/proposed", "precise-proposed/havana"),
    ("precise-havana/proposed", "precise-proposed/havana"),
    ("precise-proposed/havana", "precise-proposed/havana"),
    // Icehouse
    ("icehouse", "precise-updates/icehouse"),
    ("icehouse/updates", "precise-updates/icehouse"),
    ("precise-icehouse", "precise-updates/icehouse"),
    ("precise-icehouse/updates", "precise-updates/icehouse"),
    ("precise-updates/icehouse", "precise-updates/icehouse"),
    ("icehouse/proposed", "precise-proposed/icehouse"),
    ("precise-icehouse/proposed", "precise-proposed/icehouse"),
    ("precise-proposed/icehouse", "precise-proposed/icehouse"),
    // Juno
    ("juno", "trusty-updates/juno"),
    ("juno/updates", "trusty-updates/juno"),
    ("trusty-juno", "trusty-updates/juno"),
    ("trusty-juno/updates", "trusty-updates/juno"),
    ("trusty-updates/juno", "trusty-updates/juno"),
    ("juno/proposed", "trusty-proposed/juno"),
    ("trusty-juno/proposed", "trusty-proposed/juno"),
    ("trusty-proposed/juno", "trusty-proposed/juno"),
    // Kilo
    ("kilo", "trusty-updates/kilo"),
    ("kilo/updates", "trusty-updates/kilo"),
    ("trusty-kilo", "trusty-updates/kilo"),
    ("trusty-kilo/updates", "trusty-updates/kilo"),
    ("trusty-updates/kilo", "trusty-updates/kilo"),
    ("kilo/proposed", "trusty-proposed/kilo"),
    ("trusty-kilo/proposed", "trusty-proposed/kilo"),
    ("trusty-proposed/kilo", "trusty-proposed/kilo"),
    // Liberty
    ("liberty", "trusty-updates/liberty"),
    ("liberty/updates", "trusty-updates/liberty"),
    ("trusty-liberty", "trusty-updates/liberty"),
    ("trusty-liberty/updates", "trusty-updates/liberty"),
    ("trusty-updates/liberty", "trusty-updates/liberty"),
    ("liberty/proposed", "trusty-proposed/liberty"),
    ("trusty-liberty/proposed", "trusty-proposed/liberty"),
    ("trusty-proposed/liberty", "trusty-proposed/liberty"),
    // Mitaka
    ("mitaka", "trusty-updates/mitaka"),
    ("mitaka/updates", "trusty-updates/mitaka"),
    ("trusty-mitaka", "trusty-updates/mitaka"),
    ("trusty-mitaka/updates", "trusty-updates/mitaka"),
    ("trusty-updates/mitaka", "trusty-updates/mitaka"),
    ("mitaka/proposed", "trusty-proposed/mitaka"),
    ("trusty-mitaka/proposed", "trusty-proposed/mitaka"),
    ("trusty-proposed/mitaka", "trusty-proposed/mitaka"),
    // Newton
    ("newton", "xenial-updates/newton"),
    ("newton/updates", "xenial-updates/newton"),
    ("xenial-newton", "xenial-updates/newton"),
    ("xenial-newton/updates", "xenial-updates/newton"),
    ("xenial-updates/newton", "xenial-updates/newton"),
    ("newton/proposed", "xenial-proposed/newton"),
    ("xenial-newton/proposed", "xenial-proposed/newton"),
    ("xenial-proposed/newton", "xenial-proposed/newton"),
    // Ocata
    ("ocata", "xenial-updates/ocata"),
    ("ocata/updates", "xenial-updates/ocata"),
    ("xenial-ocata", "xenial-updates/ocata"),
    ("xenial-ocata/updates", "xenial-updates/ocata"),
    ("xenial-updates/ocata", "xenial-updates/ocata"),
    ("ocata/proposed", "xenial-proposed/ocata"),
    ("xenial-ocata/proposed", "xenial-proposed/ocata"),
    ("xenial-proposed/ocata", "xenial-proposed/ocata"),
    // Pike
    ("pike", "xenial-updates/pike"),
    ("xenial-pike", "xenial-updates/pike"),
    ("xenial-pike/updates", "xenial-updates/pike"),
    ("xenial-updates/pike", "xenial-updates/pike"),
    ("pike/proposed", "xenial-proposed/pike"),
    ("xenial-pike/proposed", "xenial-proposed/pike"),
    ("xenial-proposed/pike", "xenial-proposed/pike"),
    // Queens
    ("queens", "xenial-updates/queens"),
    ("xenial-queens", "xenial-updates/queens"),
    ("xenial-queens/updates", "xenial-updates/queens"),
    ("xenial-updates/queens", "xenial-updates/queens"),
    ("queens/proposed", "xenial-proposed/queens"),
    ("xenial-queens/proposed", "xenial-proposed/queens"),
    ("xenial-proposed/queens", "xenial-proposed/queens"),
    // Rocky
    ("rocky", "bionic-updates/rocky"),
    ("bionic-rocky", "bionic-updates/rocky"),
    ("bionic-rocky/updates", "bionic-updates/rocky"),
    ("bionic-updates/rocky", "bionic-updates/rocky"),
    ("rocky/proposed", "bionic-proposed/rocky"),
    ("bionic-rocky/proposed", "bionic-proposed/rocky"),
    ("bionic-proposed/rocky", "bionic-proposed/rocky"),
];

/// Resolves a cloud archive pocket alias to the actual pocket name.
pub fn cloud_archive_pocket(name: &str) -> Option<&'static str> {
    CLOUD_ARCHIVE_POCKETS
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, pocket)| *pocket)
}

/// A classified source specification, ready to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRequest {
    /// `distro` — nothing to do.
    Distro,
    /// `proposed` / `distro-proposed` — write the proposed pocket list file.
    Proposed,
    /// A spec handed to `add-apt-repository --yes` verbatim (after
    /// `{series}` substitution).
    AptRepository(String),
    /// `cloud:<series>-<release>/staging` — the UCA staging PPA.
    CloudStaging { series: String, release: String },
    /// `cloud:<series>-<release>` or `snap:...` — a cloud pocket gated on
    /// the host running `<series>`.
    CloudPocketChecked { series: String, release: String },
    /// `cloud:<pocket>` — a cloud pocket, no series check.
    CloudPocket(String),
}

type RequestBuilder = fn(&Captures<'_>) -> SourceRequest;

/// Ordered dispatch table; the first matching pattern wins, so the more
/// specific `cloud-archive:` and `/staging` forms precede the general ones.
static DISPATCH: LazyLock<Vec<(Regex, RequestBuilder)>> = LazyLock::new(|| {
    fn capture(c: &Captures<'_>, i: usize) -> String {
        c.get(i).map(|m| m.as_str().to_string()).unwrap_or_default()
    }

    vec![
        (Regex::new(r"^distro$").unwrap(), (|_| SourceRequest::Distro) as RequestBuilder),
        (Regex::new(r"^(?:proposed|distro-proposed)$").unwrap(), |_| SourceRequest::Proposed),
        (Regex::new(r"^cloud-archive:(.*)$").unwrap(), |c| {
            SourceRequest::AptRepository(capture(c, 1))
        }),
        (Regex::new(r"^((?:deb |http:|https:|ppa:).*)$").unwrap(), |c| {
            SourceRequest::AptRepository(capture(c, 1))
        }),
        (Regex::new(r"^cloud:(.*)-(.*)/staging$").unwrap(), |c| {
            SourceRequest::CloudStaging {
                series: capture(c, 1),
                release: capture(c, 2),
            }
        }),
        (Regex::new(r"^cloud:(.*)-(.*)$").unwrap(), |c| {
            SourceRequest::CloudPocketChecked {
                series: capture(c, 1),
                release: capture(c, 2),
            }
        }),
        (Regex::new(r"^cloud:(.*)$").unwrap(), |c| {
            SourceRequest::CloudPocket(capture(c, 1))
        }),
        (Regex::new(r"^snap:.*-(.*)-(.*)$").unwrap(), |c| {
            SourceRequest::CloudPocketChecked {
                series: capture(c, 1),
                release: capture(c, 2),
            }
        }),
    ]
});

impl SourceRequest {
    /// Classifies a source string against the ordered pattern table.
    pub fn parse(source: &str) -> Option<Self> {
        DISPATCH
            .iter()
            .find_map(|(pattern, build)| pattern.captures(source).map(|c| build(&c)))
    }

    /// Applies this request to the system.
    pub fn apply(&self, ctx: &AptContext) -> anyhow::Result<()> {
        match self {
            Self::Distro => {
                debug!("source 'distro' is a no-op");
                Ok(())
            }
            Self::Proposed => add_proposed(ctx),
            Self::AptRepository(spec) => add_apt_repository(ctx, spec),
            Self::CloudStaging { series, release } => {
                verify_host_series(ctx, series, release)?;
                let ppa = format!("ppa:ubuntu-cloud-archive/{}-staging", release);
                add_apt_repository(ctx, &ppa)
            }
            Self::CloudPocketChecked { series, release } => {
                verify_host_series(ctx, series, release)?;
                add_cloud_pocket(ctx, &format!("{}-{}", series, release))
            }
            Self::CloudPocket(pocket) => add_cloud_pocket(ctx, pocket),
        }
    }
}

/// Adds a package source to the system.
///
/// Unrecognized sources are logged; they only become an error under
/// `strict`. When `key` is given it is imported after the source is
/// applied, and key failures surface as `SourceConfig` errors.
pub fn add_source(
    ctx: &AptContext,
    source: &str,
    key: Option<&str>,
    strict: bool,
) -> anyhow::Result<()> {
    match SourceRequest::parse(source) {
        Some(request) => {
            info!("adding source {:?}", source);
            request.apply(ctx)?;
            if let Some(key) = key {
                keys::import_key(ctx, key)
                    .map_err(|e| RsaptError::SourceConfig(e.to_string()))?;
            }
            Ok(())
        }
        None => {
            error!("unknown source: {:?}", source);
            if strict {
                Err(RsaptError::SourceConfig(format!("unknown source: {:?}", source)).into())
            } else {
                Ok(())
            }
        }
    }
}

/// Writes a list file under the context's `sources.list.d`, creating the
/// directory when missing, and returns the written path.
fn write_sources_file(
    ctx: &AptContext,
    name: &str,
    content: &str,
) -> Result<Utf8PathBuf, RsaptError> {
    let dir = ctx.sources_list_dir();
    fs::create_dir_all(&dir).map_err(|e| RsaptError::io(dir.to_string(), e))?;

    let path = dir.join(name);
    info!("writing {}", path);
    fs::write(&path, content).map_err(|e| RsaptError::io(path.to_string(), e))?;
    Ok(path)
}

/// Enables the proposed pocket for the host series.
///
/// Intel architectures pull from the main archive; ports architectures from
/// `ports.ubuntu.com`. Anything else is unsupported for proposed.
fn add_proposed(ctx: &AptContext) -> anyhow::Result<()> {
    let series = ctx.host_release()?.codename().to_string();
    let template = match ctx.machine_arch() {
        "x86_64" => PROPOSED_POCKET,
        "ppc64le" | "powerpc64" | "aarch64" | "s390x" => PROPOSED_PORTS_POCKET,
        arch => {
            return Err(RsaptError::SourceConfig(format!(
                "arch {} not supported for (distro-)proposed",
                arch
            ))
            .into());
        }
    };

    write_sources_file(ctx, "proposed.list", &template.replace("{series}", &series))?;
    Ok(())
}

/// Hands a spec to `add-apt-repository --yes`, retry-wrapped, with
/// `{series}` substituted and https proxy settings applied.
fn add_apt_repository(ctx: &AptContext, spec: &str) -> anyhow::Result<()> {
    let spec = if spec.contains("{series}") {
        let series = ctx.host_release()?.codename().to_string();
        spec.replace("{series}", &series)
    } else {
        spec.to_string()
    };

    let command = CommandSpec::new(
        "add-apt-repository",
        vec!["--yes".to_string(), spec],
    )
    .with_privilege(ctx.privilege())
    .with_envs(proxy_settings(&[ProxyScheme::Https]));

    run_with_retries(ctx.executor(), &command, &RetryPolicy::default())?;
    Ok(())
}

/// Adds a cloud archive pocket as `sources.list.d/cloud-archive.list`,
/// overwriting any existing file.
///
/// The keyring package is installed first (fatal) so the new deb line can
/// be verified on the next index update.
fn add_cloud_pocket(ctx: &AptContext, pocket: &str) -> anyhow::Result<()> {
    let keyring = vec![CLOUD_ARCHIVE_KEYRING.to_string()];
    apt::install(ctx, &apt::filter_installed(ctx, &keyring)?, None, true)?;

    let actual_pocket = cloud_archive_pocket(pocket).ok_or_else(|| {
        RsaptError::SourceConfig(format!("unsupported cloud: source option {}", pocket))
    })?;

    write_sources_file(
        ctx,
        "cloud-archive.list",
        &CLOUD_ARCHIVE.replace("{pocket}", actual_pocket),
    )?;
    Ok(())
}

/// Verifies that the requested cloud archive series matches the host.
fn verify_host_series(ctx: &AptContext, series: &str, release: &str) -> anyhow::Result<()> {
    let host = ctx.host_release()?;
    if host.codename() != series {
        return Err(RsaptError::SourceConfig(format!(
            "invalid cloud archive release specified: {}-{} on this Ubuntu version ({})",
            series,
            release,
            host.codename()
        ))
        .into());
    }
    Ok(())
}
