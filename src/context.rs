//! Shared context for apt configuration operations.
//!
//! Bundles the pieces every operation needs: the command executor, the APT
//! configuration directory (overridable so tests write into a tempdir),
//! host release detection, the machine architecture, an optional privilege
//! wrapper, and the keyserver endpoint.

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use url::Url;

use crate::error::RsaptError;
use crate::executor::CommandExecutor;
use crate::privilege::PrivilegeMethod;
use crate::release::HostRelease;

/// Default APT configuration directory.
pub const DEFAULT_APT_DIR: &str = "/etc/apt";
/// Default HKPS keyserver used for key-ID lookups.
pub const DEFAULT_KEYSERVER: &str = "https://keyserver.ubuntu.com";

/// Context for apt configuration operations.
#[derive(Clone)]
pub struct AptContext {
    executor: Arc<dyn CommandExecutor>,
    apt_dir: Utf8PathBuf,
    lsb_release_path: Utf8PathBuf,
    machine_arch: String,
    privilege: Option<PrivilegeMethod>,
    keyserver: Url,
}

impl std::fmt::Debug for AptContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AptContext")
            .field("apt_dir", &self.apt_dir)
            .field("lsb_release_path", &self.lsb_release_path)
            .field("machine_arch", &self.machine_arch)
            .field("privilege", &self.privilege)
            .field("keyserver", &self.keyserver.as_str())
            .finish_non_exhaustive()
    }
}

impl AptContext {
    /// Creates a context with production defaults.
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            executor,
            apt_dir: Utf8PathBuf::from(DEFAULT_APT_DIR),
            lsb_release_path: Utf8PathBuf::from(HostRelease::LSB_RELEASE_PATH),
            machine_arch: std::env::consts::ARCH.to_string(),
            privilege: None,
            keyserver: Url::parse(DEFAULT_KEYSERVER)
                .expect("default keyserver URL is valid"),
        }
    }

    /// Overrides the APT configuration directory (`/etc/apt`).
    #[must_use]
    pub fn with_apt_dir(mut self, apt_dir: impl Into<Utf8PathBuf>) -> Self {
        self.apt_dir = apt_dir.into();
        self
    }

    /// Overrides the lsb-release file used for host detection.
    #[must_use]
    pub fn with_lsb_release_path(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.lsb_release_path = path.into();
        self
    }

    /// Overrides the machine architecture (defaults to the running one).
    #[must_use]
    pub fn with_machine_arch(mut self, arch: impl Into<String>) -> Self {
        self.machine_arch = arch.into();
        self
    }

    /// Sets the privilege escalation method applied to external commands.
    #[must_use]
    pub fn with_privilege(mut self, privilege: Option<PrivilegeMethod>) -> Self {
        self.privilege = privilege;
        self
    }

    /// Overrides the keyserver endpoint.
    #[must_use]
    pub fn with_keyserver(mut self, keyserver: Url) -> Self {
        self.keyserver = keyserver;
        self
    }

    /// The command executor.
    pub fn executor(&self) -> &dyn CommandExecutor {
        self.executor.as_ref()
    }

    /// The APT configuration directory.
    pub fn apt_dir(&self) -> &Utf8Path {
        &self.apt_dir
    }

    /// The `sources.list.d` directory under [`Self::apt_dir`].
    pub fn sources_list_dir(&self) -> Utf8PathBuf {
        self.apt_dir.join("sources.list.d")
    }

    /// The `trusted.gpg.d` keyring directory under [`Self::apt_dir`].
    pub fn trusted_keyring_dir(&self) -> Utf8PathBuf {
        self.apt_dir.join("trusted.gpg.d")
    }

    /// The machine architecture string (e.g. `"x86_64"`).
    pub fn machine_arch(&self) -> &str {
        &self.machine_arch
    }

    /// The privilege escalation method, if any.
    pub fn privilege(&self) -> Option<PrivilegeMethod> {
        self.privilege
    }

    /// The keyserver endpoint for key-ID lookups.
    pub fn keyserver(&self) -> &Url {
        &self.keyserver
    }

    /// Detects the host release from the configured lsb-release path.
    pub fn host_release(&self) -> Result<HostRelease, RsaptError> {
        HostRelease::from_lsb_release(&self.lsb_release_path)
    }
}
