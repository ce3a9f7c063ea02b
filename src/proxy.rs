//! Proxy environment propagation for network-facing commands.
//!
//! `add-apt-repository` and `curl` both honor proxy settings passed as
//! environment variables, but tooling disagrees on upper- versus lowercase
//! names, so both forms are emitted. An `RSAPT_`-prefixed variable takes
//! precedence over the plain one, letting a caller scope proxy settings to
//! rsapt without touching the wider environment.

/// Proxy-related environment variable families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyScheme {
    Http,
    Https,
    NoProxy,
    Ftp,
}

impl ProxyScheme {
    /// All supported schemes.
    pub const ALL: [ProxyScheme; 4] = [Self::Http, Self::Https, Self::NoProxy, Self::Ftp];

    /// The canonical (uppercase) environment variable name.
    fn var_name(&self) -> &'static str {
        match self {
            Self::Http => "HTTP_PROXY",
            Self::Https => "HTTPS_PROXY",
            Self::NoProxy => "NO_PROXY",
            Self::Ftp => "FTP_PROXY",
        }
    }
}

/// Prefix for rsapt-scoped proxy overrides (e.g. `RSAPT_HTTPS_PROXY`).
const OVERRIDE_PREFIX: &str = "RSAPT_";

/// Collects proxy settings for the given schemes from the process
/// environment, in a form suitable for
/// [`CommandSpec::with_envs`](crate::executor::CommandSpec::with_envs).
///
/// Each configured scheme yields both the uppercase and lowercase variable
/// forms. Returns an empty vector when nothing is configured.
pub fn proxy_settings(schemes: &[ProxyScheme]) -> Vec<(String, String)> {
    proxy_settings_with(schemes, |name| std::env::var(name).ok())
}

/// [`proxy_settings`] with an injectable environment lookup.
pub fn proxy_settings_with(
    schemes: &[ProxyScheme],
    lookup: impl Fn(&str) -> Option<String>,
) -> Vec<(String, String)> {
    let mut settings = Vec::new();
    for scheme in schemes {
        let var = scheme.var_name();
        let value = lookup(&format!("{}{}", OVERRIDE_PREFIX, var)).or_else(|| lookup(var));
        if let Some(value) = value {
            if value.is_empty() {
                continue;
            }
            settings.push((var.to_string(), value.clone()));
            settings.push((var.to_lowercase(), value));
        }
    }
    settings
}
