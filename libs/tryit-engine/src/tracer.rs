//! Bridge to the Python trace hook.
//!
//! The instrumentation script is compiled into this crate and written to
//! the shared temp directory once per process, outside any per-request
//! workspace. The hook is then invoked as
//! `<interpreter> <hook> <user-script>` under the same runner limits as a
//! plain execution, and its stdout - a single JSON document - is parsed
//! into the trace payload.

use std::path::PathBuf;

use tracing::warn;
use tryit_common::types::TracePayload;
use uuid::Uuid;

use crate::error::EngineError;
use crate::runner::RunOutcome;
use crate::workspace::WorkspaceManager;

/// Instrumentation script shipped inside the binary.
const TRACE_HOOK_SOURCE: &str = include_str!("trace_hook.py");

const TRACE_HOOK_FILENAME: &str = "tryit_trace_hook.py";

/// Write the hook script into the shared temp directory and return its
/// path. The write goes to a unique temp name first and is renamed into
/// place, so concurrent callers can never observe a half-written hook.
pub async fn ensure_hook_script(manager: &WorkspaceManager) -> Result<PathBuf, EngineError> {
    manager.ensure_base_dir().await?;
    let hook_path = manager.base_dir().join(TRACE_HOOK_FILENAME);

    let staging = manager
        .base_dir()
        .join(format!(".{}.{}", TRACE_HOOK_FILENAME, Uuid::new_v4()));
    tokio::fs::write(&staging, TRACE_HOOK_SOURCE)
        .await
        .map_err(|e| EngineError::Workspace {
            path: staging.clone(),
            source: e,
        })?;
    tokio::fs::rename(&staging, &hook_path)
        .await
        .map_err(|e| EngineError::Workspace {
            path: hook_path.clone(),
            source: e,
        })?;

    Ok(hook_path)
}

/// Turn a finished hook invocation into the trace payload.
///
/// A timed-out or signal-killed hook is a user-facing failure (their code
/// ran too long); hook stdout that is not valid JSON is an infrastructure
/// error - the service, not the user, broke the protocol.
pub fn payload_from_outcome(
    outcome: &RunOutcome,
    timeout_ms: u64,
) -> Result<TracePayload, EngineError> {
    if outcome.timed_out {
        return Ok(TracePayload::failure(
            format!("Execution timed out after {}ms", timeout_ms),
            outcome.stderr.clone(),
        ));
    }
    if outcome.output_truncated {
        return Ok(TracePayload::failure(
            "Trace output exceeded the size limit".to_string(),
            outcome.stderr.clone(),
        ));
    }
    if outcome.stdout.trim().is_empty() {
        // The hook prints JSON even for broken user code, so an empty
        // stdout means the hook itself died (killed, OOM, bad install).
        warn!(exit_code = ?outcome.exit_code, stderr = %outcome.stderr,
            "Trace hook produced no output");
        return Ok(TracePayload::failure(
            "The tracer terminated before producing a trace".to_string(),
            outcome.stderr.clone(),
        ));
    }

    serde_json::from_str(&outcome.stdout).map_err(EngineError::Trace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn outcome(stdout: &str, timed_out: bool) -> RunOutcome {
        RunOutcome {
            stdout: stdout.to_string(),
            stderr: String::new(),
            exit_code: if timed_out { None } else { Some(0) },
            timed_out,
            output_truncated: false,
            duration: Duration::from_millis(10),
        }
    }

    #[test]
    fn test_parses_hook_payload() {
        let raw = r#"{
            "success": true,
            "events": [
                {"event": "call", "function": "<module>", "line": 1,
                 "locals": {}, "stack": [{"function": "<module>", "line": 1}], "stdout": ""}
            ],
            "stdout": "1\n",
            "stderr": "",
            "truncated": false,
            "error": null
        }"#;
        let payload = payload_from_outcome(&outcome(raw, false), 5000).unwrap();
        assert!(payload.success);
        assert_eq!(payload.events.len(), 1);
        assert_eq!(payload.stdout, "1\n");
    }

    #[test]
    fn test_timeout_is_user_facing_failure() {
        let payload = payload_from_outcome(&outcome("", true), 5000).unwrap();
        assert!(!payload.success);
        let error = payload.error.unwrap();
        assert!(error.message.contains("timed out"));
    }

    #[test]
    fn test_garbage_stdout_is_infrastructure_error() {
        let result = payload_from_outcome(&outcome("not json at all", false), 5000);
        assert!(matches!(result, Err(EngineError::Trace(_))));
    }

    #[test]
    fn test_empty_stdout_reports_dead_tracer() {
        let payload = payload_from_outcome(&outcome("   \n", false), 5000).unwrap();
        assert!(!payload.success);
        assert!(payload
            .error
            .unwrap()
            .message
            .contains("terminated before producing a trace"));
    }

    #[test]
    fn test_hook_source_is_embedded() {
        assert!(TRACE_HOOK_SOURCE.contains("sys.settrace"));
        assert!(TRACE_HOOK_SOURCE.contains("MAX_EVENTS"));
    }

    #[tokio::test]
    async fn test_ensure_hook_script_writes_file() {
        let manager = WorkspaceManager::new(
            std::env::temp_dir().join(format!("tryit-hook-test-{}", Uuid::new_v4())),
        );
        let path = ensure_hook_script(&manager).await.unwrap();
        let written = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(written, TRACE_HOOK_SOURCE);
        // Idempotent.
        let again = ensure_hook_script(&manager).await.unwrap();
        assert_eq!(again, path);
        let _ = tokio::fs::remove_dir_all(manager.base_dir()).await;
    }
}
