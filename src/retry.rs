//! Retry-wrapped external command execution.
//!
//! apt-get holds the dpkg lock for the duration of an operation, so
//! concurrent invocations fail transiently with exit code 100. Commands run
//! through [`run_with_retries`] are retried a bounded number of times when
//! they exit with a code classified as retryable; any other non-zero exit
//! fails immediately.

use std::time::Duration;

use anyhow::Result;

use crate::error::RsaptError;
use crate::executor::{CommandExecutor, CommandSpec, ExecutionResult};

/// The exit code apt-get returns when it cannot acquire the dpkg lock.
pub const APT_NO_LOCK: i32 = 100;
/// Wait between command retries.
pub const CMD_RETRY_DELAY: Duration = Duration::from_secs(10);
/// Number of retries for a failing retryable command.
pub const CMD_RETRY_COUNT: u32 = 3;

/// Classification of exit codes that warrant a retry, plus retry bounds.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,
    /// Delay between attempts.
    pub delay: Duration,
    /// Exit codes that trigger a retry instead of an immediate error.
    pub retry_exit_codes: Vec<i32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: CMD_RETRY_COUNT,
            delay: CMD_RETRY_DELAY,
            retry_exit_codes: vec![1],
        }
    }
}

impl RetryPolicy {
    /// Policy for apt-get commands: also retries on the dpkg-lock exit code.
    pub fn apt_lock() -> Self {
        Self {
            retry_exit_codes: vec![1, APT_NO_LOCK],
            ..Self::default()
        }
    }

    /// Overrides the delay between attempts.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn is_retryable(&self, code: i32) -> bool {
        self.retry_exit_codes.contains(&code)
    }
}

/// Runs a command, retrying on retryable exit codes until success or until
/// `policy.max_retries` is exhausted.
///
/// A non-zero exit code outside the retry set errors immediately. Spawn
/// failures and missing binaries are not retried either; only exit-code
/// failures are considered transient.
pub fn run_with_retries(
    executor: &dyn CommandExecutor,
    spec: &CommandSpec,
    policy: &RetryPolicy,
) -> Result<ExecutionResult> {
    let mut retry_count = 0u32;

    loop {
        let result = executor.execute(spec)?;
        if result.success() {
            return Ok(result);
        }

        match result.code() {
            Some(code) if policy.is_retryable(code) => {
                retry_count += 1;
                if retry_count > policy.max_retries {
                    return Err(RsaptError::Execution {
                        command: spec.display(),
                        status: format!(
                            "exit code {} after {} retries",
                            code, policy.max_retries
                        ),
                    }
                    .into());
                }
                tracing::warn!(
                    "Failed executing '{}' (exit code {}). Will retry in {} seconds ({}/{})",
                    spec.display(),
                    code,
                    policy.delay.as_secs(),
                    retry_count,
                    policy.max_retries,
                );
                std::thread::sleep(policy.delay);
            }
            Some(code) => {
                return Err(RsaptError::Execution {
                    command: spec.display(),
                    status: format!("exit status: {}", code),
                }
                .into());
            }
            None => {
                return Err(RsaptError::Execution {
                    command: spec.display(),
                    status: "terminated by signal".to_string(),
                }
                .into());
            }
        }
    }
}

/// Runs an apt command with optional retries.
///
/// `DEBIAN_FRONTEND` is always passed to the command, defaulting to
/// `noninteractive` when the surrounding process environment does not set
/// it. Fatal commands run under the dpkg-lock retry policy; non-fatal
/// commands run once and their exit status is ignored.
pub fn run_apt_command(
    executor: &dyn CommandExecutor,
    spec: CommandSpec,
    fatal: bool,
) -> Result<()> {
    let frontend = std::env::var("DEBIAN_FRONTEND")
        .unwrap_or_else(|_| "noninteractive".to_string());
    let spec = spec.with_env("DEBIAN_FRONTEND", frontend);

    if fatal {
        run_with_retries(executor, &spec, &RetryPolicy::apt_lock())?;
    } else {
        let result = executor.execute(&spec)?;
        if !result.success() {
            tracing::warn!(
                "non-fatal command '{}' exited with {:?}",
                spec.display(),
                result.code(),
            );
        }
    }
    Ok(())
}
