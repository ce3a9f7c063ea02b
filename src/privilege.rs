//! Privilege escalation configuration.
//!
//! Most apt operations require root. When rsapt itself runs unprivileged,
//! a [`PrivilegeMethod`] on the [`CommandSpec`](crate::executor::CommandSpec)
//! wraps the external command with `sudo` or `doas`.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Privilege escalation method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PrivilegeMethod {
    /// Use `sudo` for privilege escalation.
    Sudo,
    /// Use `doas` for privilege escalation.
    Doas,
}

impl PrivilegeMethod {
    /// Returns the command name for this privilege method.
    pub fn command_name(&self) -> &'static str {
        match self {
            Self::Sudo => "sudo",
            Self::Doas => "doas",
        }
    }
}

impl std::fmt::Display for PrivilegeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.command_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_name() {
        assert_eq!(PrivilegeMethod::Sudo.command_name(), "sudo");
        assert_eq!(PrivilegeMethod::Doas.command_name(), "doas");
    }

    #[test]
    fn test_display() {
        assert_eq!(PrivilegeMethod::Sudo.to_string(), "sudo");
        assert_eq!(PrivilegeMethod::Doas.to_string(), "doas");
    }
}
