//! Execution Engine - High-Level Orchestration
//!
//! **Responsibility:**
//! Coordinate workspace, resolver, runner, and tracer to turn a source
//! string into a response payload.
//!
//! **Architecture:**
//! 1. Allocate a workspace and write the source (workspace.rs)
//! 2. Resolve the interpreter when the language needs one (resolver.rs)
//! 3. Compile (if configured), then execute or trace (runner.rs, tracer.rs)
//! 4. Map the raw outcome onto the wire payload (this module)
//! 5. Release the workspace unconditionally
//!
//! The formatter never throws for "the user's code failed" - compile
//! errors, runtime errors, timeouts, and output overflows become normal
//! payloads with the failure flagged. Only infrastructure failures (no
//! interpreter, workspace trouble, tracer protocol breakage) surface as
//! `EngineError` for the HTTP layer to turn into a 5xx.

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::OnceCell;
use tracing::info;
use tryit_common::types::{FailureKind, Language, RunResponse, TracePayload};

use crate::config::{LanguageConfigManager, LanguageSpec, RenderContext, TRACE_TIMEOUT_SLACK_MS};
use crate::error::EngineError;
use crate::resolver::InterpreterResolver;
use crate::runner::{self, RunLimits, RunOutcome};
use crate::tracer;
use crate::workspace::{Workspace, WorkspaceManager};

pub struct Engine {
    workspaces: WorkspaceManager,
    configs: LanguageConfigManager,
    resolver: InterpreterResolver,
    hook_path: OnceCell<PathBuf>,
}

impl Engine {
    pub fn new(workspaces: WorkspaceManager, configs: LanguageConfigManager) -> Self {
        let candidates = configs
            .get_config(&Language::Python)
            .map(|spec| spec.interpreter_candidates.clone())
            .unwrap_or_else(|_| vec!["python3".to_string(), "python".to_string()]);

        Self {
            workspaces,
            configs,
            resolver: InterpreterResolver::new(candidates),
            hook_path: OnceCell::new(),
        }
    }

    /// Create the temp directory up front so a misconfigured base path
    /// fails at startup instead of on the first request.
    pub async fn prepare(&self) -> Result<(), EngineError> {
        self.workspaces.ensure_base_dir().await
    }

    pub fn workspaces(&self) -> &WorkspaceManager {
        &self.workspaces
    }

    pub fn configs(&self) -> &LanguageConfigManager {
        &self.configs
    }

    /// Run a source string: write, (compile,) execute, format, clean up.
    pub async fn run(
        &self,
        language: Language,
        code: &str,
    ) -> Result<RunResponse, EngineError> {
        let spec = self.configs.get_config(&language)?;

        info!(
            language = %language,
            source_bytes = code.len(),
            "Executing run request"
        );

        let workspace = self
            .workspaces
            .allocate(&spec.file_extension, spec.compile.is_some())
            .await?;
        // Cleanup must run on every path out of here, so the fallible part
        // lives in its own function and release happens unconditionally.
        let result = self.run_in_workspace(spec, code, &workspace).await;
        workspace.release().await;
        result
    }

    async fn run_in_workspace(
        &self,
        spec: &LanguageSpec,
        code: &str,
        workspace: &Workspace,
    ) -> Result<RunResponse, EngineError> {
        workspace.write_source(code).await?;

        let interpreter = if spec.uses_interpreter() {
            self.resolver
                .resolve()
                .await
                .ok_or(EngineError::InterpreterNotFound)?
        } else {
            String::new()
        };

        let ctx = RenderContext {
            src: workspace.source_path().display().to_string(),
            bin: workspace
                .binary_path()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            interpreter,
        };
        let limits = RunLimits {
            timeout: Duration::from_millis(spec.timeout_ms),
            max_output_bytes: spec.max_output_bytes,
        };

        if let Some(compile) = &spec.compile {
            let (program, args) = ctx.render(compile);
            let outcome = runner::run_command(&program, &args, &limits).await?;
            if !outcome.success() {
                return Ok(format_compile_failure(outcome, spec.timeout_ms));
            }
        }

        let (program, args) = ctx.render(&spec.run);
        let run_result = runner::run_command(&program, &args, &limits).await;
        if spec.uses_interpreter() {
            // A cached interpreter that stopped spawning means the host
            // changed under us; force the next request to re-probe.
            if matches!(run_result, Err(EngineError::Spawn { .. })) {
                self.resolver.invalidate();
            }
        }
        let outcome = run_result?;

        Ok(format_run_outcome(
            outcome,
            spec.timeout_ms,
            spec.max_output_bytes,
        ))
    }

    /// Trace a Python source string under the step instrumentation hook.
    pub async fn trace(&self, code: &str) -> Result<TracePayload, EngineError> {
        let spec = self.configs.get_config(&Language::Python)?;

        info!(source_bytes = code.len(), "Executing visualize request");

        let hook_path = self
            .hook_path
            .get_or_try_init(|| tracer::ensure_hook_script(&self.workspaces))
            .await?
            .clone();
        let interpreter = self
            .resolver
            .resolve()
            .await
            .ok_or(EngineError::InterpreterNotFound)?;

        let workspace = self
            .workspaces
            .allocate(&spec.file_extension, false)
            .await?;
        let result = self
            .trace_in_workspace(spec, &interpreter, &hook_path, code, &workspace)
            .await;
        workspace.release().await;
        result
    }

    async fn trace_in_workspace(
        &self,
        spec: &LanguageSpec,
        interpreter: &str,
        hook_path: &std::path::Path,
        code: &str,
        workspace: &Workspace,
    ) -> Result<TracePayload, EngineError> {
        workspace.write_source(code).await?;

        let timeout_ms = spec.timeout_ms + TRACE_TIMEOUT_SLACK_MS;
        let limits = RunLimits {
            timeout: Duration::from_millis(timeout_ms),
            max_output_bytes: spec.max_output_bytes,
        };
        let args = vec![
            hook_path.display().to_string(),
            workspace.source_path().display().to_string(),
        ];

        let run_result = runner::run_command(interpreter, &args, &limits).await;
        if matches!(run_result, Err(EngineError::Spawn { .. })) {
            self.resolver.invalidate();
        }
        let outcome = run_result?;

        tracer::payload_from_outcome(&outcome, timeout_ms)
    }
}

/// Map a compile-step outcome onto the run payload.
fn format_compile_failure(outcome: RunOutcome, timeout_ms: u64) -> RunResponse {
    if outcome.timed_out {
        return RunResponse::failed(
            format!("Compilation timed out after {}ms", timeout_ms),
            FailureKind::Timeout,
        );
    }
    let diagnostic = if !outcome.stderr.trim().is_empty() {
        outcome.stderr
    } else if !outcome.stdout.trim().is_empty() {
        outcome.stdout
    } else {
        "Compilation failed".to_string()
    };
    RunResponse::failed(diagnostic, FailureKind::CompileError)
}

/// Map an execute-step outcome onto the run payload.
fn format_run_outcome(
    outcome: RunOutcome,
    timeout_ms: u64,
    max_output_bytes: usize,
) -> RunResponse {
    if outcome.timed_out {
        let mut output = format!("Execution timed out after {}ms", timeout_ms);
        if !outcome.stderr.trim().is_empty() {
            output.push('\n');
            output.push_str(&outcome.stderr);
        }
        return RunResponse::failed(output, FailureKind::Timeout);
    }
    if outcome.output_truncated {
        return RunResponse::failed(
            format!("Output exceeded the limit of {} bytes", max_output_bytes),
            FailureKind::OutputLimit,
        );
    }
    match outcome.exit_code {
        Some(0) => RunResponse::ok(outcome.stdout),
        Some(code) => {
            let output = if !outcome.stderr.trim().is_empty() {
                outcome.stderr
            } else {
                format!("Process exited with code {}", code)
            };
            RunResponse::failed(output, FailureKind::RuntimeError)
        }
        None => {
            let output = if !outcome.stderr.trim().is_empty() {
                outcome.stderr
            } else {
                "Process was terminated by a signal".to_string()
            };
            RunResponse::failed(output, FailureKind::RuntimeError)
        }
    }
}
