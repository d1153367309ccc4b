//! Process Runner - Supervised Child Process Execution
//!
//! **Core Responsibility:**
//! Run one compiler or interpreter invocation as a child process with a
//! hard wall-clock timeout and a cap on captured output, and report the
//! captured streams plus how the process ended.
//!
//! **Safety Guarantees:**
//! - No shell: the program and arguments are passed directly to the OS,
//!   so user-supplied code can never be interpreted as shell syntax.
//! - Stdin is closed: user programs that read input see EOF instead of
//!   blocking forever on a caller who cannot type.
//! - Hard timeout: enforced via tokio::time::timeout; on expiry the whole
//!   process group is killed, not just the immediate child, so grandchild
//!   processes die too.
//! - Bounded capture: stdout/stderr are read up to a byte cap; the rest is
//!   drained and discarded so the child cannot block on a full pipe, and
//!   the outcome is flagged as truncated.
//!
//! The runner itself never decides whether a failure is the user's fault.
//! It reports `timed_out` / `output_truncated` / `exit_code` and leaves the
//! classification to the result formatter.

use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::EngineError;

/// Bounds applied to one child-process invocation.
#[derive(Debug, Clone)]
pub struct RunLimits {
    pub timeout: Duration,
    pub max_output_bytes: usize,
}

/// Raw outcome of one invocation.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was killed by a signal (including our own
    /// timeout kill).
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub output_truncated: bool,
    pub duration: Duration,
}

impl RunOutcome {
    pub fn success(&self) -> bool {
        !self.timed_out && !self.output_truncated && self.exit_code == Some(0)
    }
}

/// Run a command to completion under the given limits.
///
/// Spawn failures (program not on PATH, permission denied) are
/// infrastructure errors; everything the child itself does wrong comes
/// back inside the `RunOutcome`.
pub async fn run_command(
    program: &str,
    args: &[String],
    limits: &RunLimits,
) -> Result<RunOutcome, EngineError> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // Own process group, so a timeout kill reaches grandchildren.
    #[cfg(unix)]
    cmd.process_group(0);

    let start = Instant::now();
    let mut child = cmd.spawn().map_err(|e| EngineError::Spawn {
        program: program.to_string(),
        source: e,
    })?;
    let pid = child.id();

    let stdout = child.stdout.take().expect("stdout is piped");
    let stderr = child.stderr.take().expect("stderr is piped");
    let cap = limits.max_output_bytes;
    let stdout_task = tokio::spawn(read_capped(stdout, cap));
    let stderr_task = tokio::spawn(read_capped(stderr, cap));

    let mut timed_out = false;
    let exit_code = match timeout(limits.timeout, child.wait()).await {
        Ok(Ok(status)) => status.code(),
        Ok(Err(e)) => return Err(EngineError::Supervise(e)),
        Err(_) => {
            timed_out = true;
            warn!(program = %program, timeout_ms = limits.timeout.as_millis() as u64,
                "Execution timed out, killing process group");
            kill_process_tree(&mut child, pid).await;
            None
        }
    };

    // The child is gone either way, so the pipes are at EOF and the reader
    // tasks finish with whatever was captured before the cut-off.
    let (stdout_bytes, stdout_truncated) = stdout_task.await.unwrap_or_default();
    let (stderr_bytes, stderr_truncated) = stderr_task.await.unwrap_or_default();

    let outcome = RunOutcome {
        stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
        stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
        exit_code,
        timed_out,
        output_truncated: stdout_truncated || stderr_truncated,
        duration: start.elapsed(),
    };

    debug!(
        program = %program,
        exit_code = ?outcome.exit_code,
        timed_out = outcome.timed_out,
        truncated = outcome.output_truncated,
        duration_ms = outcome.duration.as_millis() as u64,
        "Child process finished"
    );

    Ok(outcome)
}

/// Read up to `cap` bytes, then keep draining so the writer never blocks
/// on a full pipe. Returns the captured prefix and whether bytes were
/// dropped.
async fn read_capped<R>(mut reader: R, cap: usize) -> (Vec<u8>, bool)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let mut truncated = false;
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                let remaining = cap.saturating_sub(buf.len());
                if remaining == 0 {
                    truncated = true;
                    continue;
                }
                if n > remaining {
                    buf.extend_from_slice(&chunk[..remaining]);
                    truncated = true;
                } else {
                    buf.extend_from_slice(&chunk[..n]);
                }
            }
            Err(_) => break,
        }
    }
    (buf, truncated)
}

/// Kill the child's whole process group, then reap the child.
async fn kill_process_tree(child: &mut Child, pid: Option<u32>) {
    #[cfg(unix)]
    if let Some(pid) = pid {
        // Negative pid targets the process group created at spawn.
        unsafe {
            libc::kill(-(pid as i32), libc::SIGKILL);
        }
    }
    #[cfg(not(unix))]
    let _ = pid;

    // Direct kill as a fallback; on unix the group signal got there first,
    // so an error here just means the child is already gone.
    let _ = child.start_kill();
    let _ = child.wait().await;
}
