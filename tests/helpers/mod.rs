use std::collections::VecDeque;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};
use rsapt::AptContext;
use rsapt::executor::{CapturedOutput, CommandExecutor, CommandSpec, ExecutionResult};
use rsapt::privilege::PrivilegeMethod;
use tempfile::TempDir;

/// Builds an `ExitStatus` carrying the given exit code.
#[allow(dead_code)]
pub fn exit_status(code: i32) -> ExitStatus {
    ExitStatus::from_raw(code << 8)
}

/// A single recorded executor invocation.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct CallRecord {
    pub command: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub privilege: Option<PrivilegeMethod>,
    pub stdin: Option<Vec<u8>>,
    pub captured: bool,
}

/// Test executor that records every invocation and replays scripted results.
///
/// `execute()` pops an exit code from the exec queue (success when empty);
/// `capture()` pops a scripted (stdout, stderr, code) triple (empty success
/// when the queue is drained).
#[derive(Default)]
pub struct ScriptedExecutor {
    calls: Mutex<Vec<CallRecord>>,
    exec_codes: Mutex<VecDeque<i32>>,
    capture_outputs: Mutex<VecDeque<(Vec<u8>, String, i32)>>,
}

#[allow(dead_code)]
impl ScriptedExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queues an exit code for the next `execute()` call.
    pub fn push_exec_code(&self, code: i32) {
        self.exec_codes.lock().unwrap().push_back(code);
    }

    /// Queues stdout/stderr/exit-code for the next `capture()` call.
    pub fn push_capture(&self, stdout: &[u8], stderr: &str, code: i32) {
        self.capture_outputs
            .lock()
            .unwrap()
            .push_back((stdout.to_vec(), stderr.to_string(), code));
    }

    pub fn calls(&self) -> Vec<CallRecord> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn record(&self, spec: &CommandSpec, stdin: Option<&[u8]>, captured: bool) {
        self.calls.lock().unwrap().push(CallRecord {
            command: spec.command.clone(),
            args: spec.args.clone(),
            env: spec.env.clone(),
            privilege: spec.privilege,
            stdin: stdin.map(|s| s.to_vec()),
            captured,
        });
    }
}

impl CommandExecutor for ScriptedExecutor {
    fn execute(&self, spec: &CommandSpec) -> Result<ExecutionResult> {
        self.record(spec, None, false);
        let code = self.exec_codes.lock().unwrap().pop_front().unwrap_or(0);
        Ok(ExecutionResult {
            status: Some(exit_status(code)),
        })
    }

    fn capture(&self, spec: &CommandSpec, stdin: Option<&[u8]>) -> Result<CapturedOutput> {
        self.record(spec, stdin, true);
        let (stdout, stderr, code) = self
            .capture_outputs
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or((Vec::new(), String::new(), 0));
        Ok(CapturedOutput {
            stdout,
            stderr,
            status: Some(exit_status(code)),
        })
    }
}

/// Creates a context rooted in a tempdir, reporting `codename` as the host
/// series and `arch` as the machine architecture.
///
/// The returned `TempDir` keeps the APT directory alive for the test's
/// duration.
#[allow(dead_code)]
pub fn test_context(
    executor: Arc<dyn CommandExecutor>,
    codename: &str,
    arch: &str,
) -> (AptContext, TempDir) {
    let temp_dir = tempfile::tempdir().expect("failed to create temp dir");
    let root = Utf8Path::from_path(temp_dir.path()).expect("tempdir path should be UTF-8");

    let lsb_path = root.join("lsb-release");
    std::fs::write(&lsb_path, format!("DISTRIB_CODENAME={}\n", codename))
        .expect("failed to write lsb-release");

    let ctx = AptContext::new(executor)
        .with_apt_dir(root.join("apt"))
        .with_lsb_release_path(lsb_path)
        .with_machine_arch(arch);
    (ctx, temp_dir)
}

/// Reads a file under the context's APT directory.
#[allow(dead_code)]
pub fn read_apt_file(ctx: &AptContext, relative: &str) -> String {
    let path: Utf8PathBuf = ctx.apt_dir().join(relative);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("failed to read {}: {}", path, e))
}
