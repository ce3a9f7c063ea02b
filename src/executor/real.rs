//! Real command executor implementation.
//!
//! This module provides [`RealCommandExecutor`], which executes commands
//! using `std::process::Command`. `execute()` streams output to the log in
//! real-time; `capture()` pipes stdio and collects the output for callers
//! that consume it programmatically (`gpg`, `curl`, `dpkg-query`).

use std::io::Write;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::thread::JoinHandle;

use anyhow::{Context, Result};
use which::which;

use super::pipe::{StreamType, panic_message, read_pipe_to_log};
use super::{CapturedOutput, CommandExecutor, CommandSpec, ExecutionResult};
use crate::error::RsaptError;

/// Cleans up a child process and its associated reader threads.
///
/// This function kills the child process, waits for it to terminate,
/// and joins all reader threads to prevent resource leaks.
///
/// Called from error paths in [`RealCommandExecutor::execute()`] to ensure
/// proper cleanup when thread spawning or process waiting fails.
fn cleanup_child_process<I>(child: &mut Child, handles: I)
where
    I: IntoIterator<Item = JoinHandle<()>>,
{
    let pid = child.id();
    if let Err(e) = child.kill() {
        tracing::debug!(pid = pid, "kill returned error (process may have already exited): {}", e);
    }
    if let Err(e) = child.wait() {
        tracing::warn!(pid = pid, "failed to wait for child process after kill: {}", e);
    }
    for handle in handles {
        if let Err(e) = handle.join() {
            tracing::warn!("reader thread panicked during cleanup: {}", panic_message(&*e));
        }
    }
}

/// Command executor that runs actual system commands.
///
/// When `dry_run` is true, commands are logged but not executed;
/// `execute()` returns `Ok(ExecutionResult { status: None })` and
/// `capture()` returns empty output with no status.
pub struct RealCommandExecutor {
    pub dry_run: bool,
}

impl RealCommandExecutor {
    /// Resolves the effective program via PATH lookup and builds the
    /// `Command` with args and environment applied.
    fn build_command(&self, spec: &CommandSpec) -> Result<Command> {
        let (program, args) = spec.effective_command();
        let resolved = which(&program).map_err(|_| RsaptError::CommandNotFound {
            command: program.clone(),
        })?;
        tracing::trace!("command found: {}: {}", program, resolved.to_string_lossy());

        let mut command = Command::new(resolved);
        command.args(&args);
        for (key, value) in &spec.env {
            command.env(key, value);
        }
        Ok(command)
    }
}

impl CommandExecutor for RealCommandExecutor {
    fn execute(&self, spec: &CommandSpec) -> Result<ExecutionResult> {
        if self.dry_run {
            tracing::info!("dry run: {:?}", spec);
            return Ok(ExecutionResult { status: None });
        }

        let mut command = self.build_command(spec)?;
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());

        let mut child = command
            .spawn()
            .with_context(|| format!("failed to spawn command `{}`", spec.display()))?;

        tracing::trace!("spawned command: {}: pid={}", spec.command, child.id());

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();

        // Read both stdout and stderr in separate threads with panic error propagation
        let stdout_handle = match thread::Builder::new()
            .name("stdout-reader".to_string())
            .spawn(move || read_pipe_to_log(stdout_pipe, StreamType::Stdout))
        {
            Ok(handle) => handle,
            Err(e) => {
                cleanup_child_process(&mut child, []);
                return Err(RsaptError::Execution {
                    command: spec.display(),
                    status: format!("failed to spawn stdout reader thread: {}", e),
                }
                .into());
            }
        };

        let stderr_handle = match thread::Builder::new()
            .name("stderr-reader".to_string())
            .spawn(move || read_pipe_to_log(stderr_pipe, StreamType::Stderr))
        {
            Ok(handle) => handle,
            Err(e) => {
                // Clean up by killing the child process and joining the stdout thread
                cleanup_child_process(&mut child, [stdout_handle]);
                return Err(RsaptError::Execution {
                    command: spec.display(),
                    status: format!("failed to spawn stderr reader thread: {}", e),
                }
                .into());
            }
        };

        // Wait for the child process to complete
        let status = match child.wait() {
            Ok(s) => s,
            Err(e) => {
                // If waiting fails, the process might still be running.
                // Kill it and clean up threads to prevent resource leaks.
                cleanup_child_process(&mut child, [stdout_handle, stderr_handle]);
                return Err(RsaptError::Execution {
                    command: spec.display(),
                    status: format!("failed to wait for command: {}", e),
                }
                .into());
            }
        };

        // Wait for reader threads to complete (with error propagation on panic)
        let mut panicked_streams = Vec::new();
        let handles = [("stdout", stdout_handle), ("stderr", stderr_handle)];
        for (name, handle) in handles {
            if let Err(e) = handle.join() {
                let msg = panic_message(&*e);
                tracing::error!(stream = name, panic = msg, "reader thread panicked");
                panicked_streams.push(format!("{}: {}", name, msg));
            }
        }

        if !panicked_streams.is_empty() {
            return Err(RsaptError::Execution {
                command: spec.display(),
                status: format!(
                    "reader thread(s) panicked during command execution: {}",
                    panicked_streams.join(", ")
                ),
            }
            .into());
        }

        tracing::trace!("executed command: {}: success={}", spec.command, status.success());

        Ok(ExecutionResult {
            status: Some(status),
        })
    }

    fn capture(&self, spec: &CommandSpec, stdin: Option<&[u8]>) -> Result<CapturedOutput> {
        if self.dry_run {
            tracing::info!("dry run (capture): {:?}", spec);
            return Ok(CapturedOutput {
                stdout: Vec::new(),
                stderr: String::new(),
                status: None,
            });
        }

        let mut command = self.build_command(spec)?;
        command.stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());

        let mut child = command
            .spawn()
            .with_context(|| format!("failed to spawn command `{}`", spec.display()))?;

        tracing::trace!("spawned command (capture): {}: pid={}", spec.command, child.id());

        // Feed stdin from a separate thread so a child blocked on writing
        // output cannot deadlock against us blocked on writing input.
        let writer_handle = match (stdin, child.stdin.take()) {
            (Some(data), Some(mut pipe)) => {
                let data = data.to_vec();
                let handle = thread::Builder::new()
                    .name("stdin-writer".to_string())
                    .spawn(move || {
                        if let Err(e) = pipe.write_all(&data) {
                            // A child that exits without draining stdin produces
                            // a broken pipe; the exit status carries the verdict.
                            tracing::debug!("failed to write stdin: {}", e);
                        }
                    });
                match handle {
                    Ok(handle) => Some(handle),
                    Err(e) => {
                        cleanup_child_process(&mut child, []);
                        return Err(RsaptError::Execution {
                            command: spec.display(),
                            status: format!("failed to spawn stdin writer thread: {}", e),
                        }
                        .into());
                    }
                }
            }
            _ => None,
        };

        let output = child
            .wait_with_output()
            .with_context(|| format!("failed to wait for command `{}`", spec.display()))?;

        if let Some(handle) = writer_handle {
            if let Err(e) = handle.join() {
                tracing::warn!("stdin writer thread panicked: {}", panic_message(&*e));
            }
        }

        tracing::trace!(
            "captured command: {}: success={}",
            spec.command,
            output.status.success()
        );

        Ok(CapturedOutput {
            stdout: output.stdout,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            status: Some(output.status),
        })
    }
}
