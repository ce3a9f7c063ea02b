//! Host release detection and series comparison.
//!
//! The gpg 1.x to 2.x transition (at bionic) and the cloud-archive series
//! checks both need to know which Ubuntu series the host runs and how it
//! orders against others. [`Series`] is the ordered codename enum;
//! [`HostRelease`] carries what `/etc/lsb-release` reports, which may be a
//! codename newer than this enum knows.

use std::fs;

use camino::Utf8Path;
use strum::{Display, EnumString};

use crate::error::RsaptError;

/// Ubuntu series codenames in release order.
///
/// The derived `Ord` follows declaration order, so
/// `Series::Xenial < Series::Bionic` holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Series {
    Precise,
    Quantal,
    Raring,
    Saucy,
    Trusty,
    Utopic,
    Vivid,
    Wily,
    Xenial,
    Yakkety,
    Zesty,
    Artful,
    Bionic,
    Cosmic,
    Disco,
    Eoan,
    Focal,
    Groovy,
    Hirsute,
    Impish,
    Jammy,
    Kinetic,
    Lunar,
    Mantic,
    Noble,
}

/// The release the host is running, as reported by `/etc/lsb-release`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRelease {
    codename: String,
}

impl HostRelease {
    /// Default location of the LSB release file.
    pub const LSB_RELEASE_PATH: &'static str = "/etc/lsb-release";

    /// Creates a host release from a known codename (used by tests and by
    /// callers that already detected the series).
    pub fn new(codename: impl Into<String>) -> Self {
        Self {
            codename: codename.into().to_lowercase(),
        }
    }

    /// Detects the host release from [`Self::LSB_RELEASE_PATH`].
    pub fn detect() -> Result<Self, RsaptError> {
        Self::from_lsb_release(Utf8Path::new(Self::LSB_RELEASE_PATH))
    }

    /// Parses `DISTRIB_CODENAME` out of an lsb-release style file
    /// (`KEY=VALUE` lines, values optionally double-quoted).
    pub fn from_lsb_release(path: &Utf8Path) -> Result<Self, RsaptError> {
        let content =
            fs::read_to_string(path).map_err(|e| RsaptError::io(path.to_string(), e))?;

        for line in content.lines() {
            if let Some((key, value)) = line.split_once('=') {
                if key.trim() == "DISTRIB_CODENAME" {
                    let codename = value.trim().trim_matches('"');
                    if codename.is_empty() {
                        break;
                    }
                    return Ok(Self::new(codename));
                }
            }
        }

        Err(RsaptError::Config(format!(
            "DISTRIB_CODENAME not found in {}",
            path
        )))
    }

    /// The release codename, lowercased (e.g. `"jammy"`).
    pub fn codename(&self) -> &str {
        &self.codename
    }

    /// The codename as a [`Series`], if it is one this build knows about.
    pub fn series(&self) -> Option<Series> {
        self.codename.parse().ok()
    }

    /// Whether the host release orders at or after `series`.
    ///
    /// Unknown codenames compare as older than everything: the gpg v2
    /// cutoff then conservatively picks the legacy invocation, which is the
    /// original behavior for unrecognized hosts.
    pub fn is_at_least(&self, series: Series) -> bool {
        self.series().is_some_and(|own| own >= series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_ordering() {
        assert!(Series::Precise < Series::Trusty);
        assert!(Series::Xenial < Series::Bionic);
        assert!(Series::Bionic < Series::Noble);
        assert!(Series::Jammy >= Series::Bionic);
    }

    #[test]
    fn test_series_parse_and_display() {
        let series: Series = "bionic".parse().expect("bionic should parse");
        assert_eq!(series, Series::Bionic);
        assert_eq!(series.to_string(), "bionic");
        assert!("warty".parse::<Series>().is_err());
    }

    #[test]
    fn test_host_release_series_lookup() {
        let host = HostRelease::new("Jammy");
        assert_eq!(host.codename(), "jammy");
        assert_eq!(host.series(), Some(Series::Jammy));
        assert!(host.is_at_least(Series::Bionic));
        assert!(!host.is_at_least(Series::Noble));
    }

    #[test]
    fn test_unknown_codename_compares_older() {
        let host = HostRelease::new("futuristic");
        assert_eq!(host.series(), None);
        assert!(!host.is_at_least(Series::Precise));
    }

    #[test]
    fn test_from_lsb_release_parses_codename() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = dir.path().join("lsb-release");
        std::fs::write(
            &path,
            "DISTRIB_ID=Ubuntu\nDISTRIB_RELEASE=22.04\n\
             DISTRIB_CODENAME=jammy\nDISTRIB_DESCRIPTION=\"Ubuntu 22.04 LTS\"\n",
        )
        .expect("failed to write lsb-release");

        let host = HostRelease::from_lsb_release(Utf8Path::from_path(&path).unwrap())
            .expect("parse should succeed");
        assert_eq!(host.codename(), "jammy");
    }

    #[test]
    fn test_from_lsb_release_quoted_codename() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = dir.path().join("lsb-release");
        std::fs::write(&path, "DISTRIB_CODENAME=\"focal\"\n").expect("failed to write");

        let host = HostRelease::from_lsb_release(Utf8Path::from_path(&path).unwrap())
            .expect("parse should succeed");
        assert_eq!(host.codename(), "focal");
    }

    #[test]
    fn test_from_lsb_release_missing_codename() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = dir.path().join("lsb-release");
        std::fs::write(&path, "DISTRIB_ID=Ubuntu\n").expect("failed to write");

        let err = HostRelease::from_lsb_release(Utf8Path::from_path(&path).unwrap())
            .expect_err("missing codename should error");
        assert!(matches!(err, RsaptError::Config(_)));
    }

    #[test]
    fn test_from_lsb_release_missing_file() {
        let err = HostRelease::from_lsb_release(Utf8Path::new("/nonexistent/lsb-release"))
            .expect_err("missing file should error");
        assert!(matches!(err, RsaptError::Io { .. }));
    }
}
