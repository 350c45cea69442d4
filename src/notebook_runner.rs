//! Notebook execution
//!
//! `run_notebook_safe` is the single place that launches the external
//! executor. It spawns the process in its own process group, registers the
//! PID for cleanup and waits for it to finish. The `NotebookExecutor` trait
//! sits in front of it so the pipeline runner can be driven by a fake in
//! tests and by a dry-run executor.

use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::notebook_traits::{ExecutorArgs, NotebookArgs};
use crate::process_guard::{ChildRegistry, CommandProcessGroup};

/// Result of one executor invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutput {
    /// Captured standard output (empty when streamed)
    pub stdout: String,
    /// Captured standard error (empty when streamed)
    pub stderr: String,
    /// Exit code, `None` if killed by a signal
    pub exit_code: Option<i32>,
    pub success: bool,
    /// Execution was skipped
    pub dry_run: bool,
}

impl ExecutionOutput {
    /// Output for a skipped invocation
    pub fn skipped(description: String) -> Self {
        Self {
            stdout: description,
            stderr: String::new(),
            exit_code: Some(0),
            success: true,
            dry_run: true,
        }
    }

    /// Turn a failed run into an error mentioning `context`
    pub fn ensure_success(&self, context: &str) -> Result<()> {
        if self.success {
            return Ok(());
        }
        let code = self
            .exit_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            anyhow::bail!("{} failed (exit code {})", context, code)
        } else {
            anyhow::bail!("{} failed (exit code {}): {}", context, code, stderr)
        }
    }
}

/// Something that can execute a notebook
pub trait NotebookExecutor {
    fn execute(&mut self, args: &NotebookArgs) -> Result<ExecutionOutput>;
}

/// How executor output reaches the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Child writes straight to our stdout/stderr
    #[default]
    Stream,
    /// Child output is captured into `ExecutionOutput`
    Capture,
}

/// Runs notebooks through the papermill command line
#[derive(Debug, Clone, Default)]
pub struct PapermillExecutor {
    pub dry_run: bool,
    pub output: OutputMode,
}

impl PapermillExecutor {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            output: OutputMode::default(),
        }
    }

    pub fn capturing(mut self) -> Self {
        self.output = OutputMode::Capture;
        self
    }
}

impl NotebookExecutor for PapermillExecutor {
    fn execute(&mut self, args: &NotebookArgs) -> Result<ExecutionOutput> {
        if self.dry_run {
            let line = format!("{} {}", args.program(), args.to_cli_args().join(" "));
            info!(notebook = %args.label(), "[dry run] {}", line);
            return Ok(ExecutionOutput::skipped(format!("[DRY RUN] {}\n", line)));
        }
        run_notebook_safe(args, self.output)
    }
}

/// Execute one notebook and wait for it.
///
/// A non-zero exit is reported through `ExecutionOutput::success`, not as
/// an `Err`; `Err` means the executor could not be started or awaited.
pub fn run_notebook_safe<T: ExecutorArgs>(args: &T, mode: OutputMode) -> Result<ExecutionOutput> {
    let cli_args = args.to_cli_args();
    let env_keys: Vec<String> = args.get_env_vars().into_iter().map(|(k, _)| k).collect();

    // env values are credentials; only the names are logged
    info!(
        program = args.program(),
        args = ?cli_args,
        env = ?env_keys,
        "run_notebook_safe"
    );

    let mut cmd = Command::new(args.program());
    cmd.args(&cli_args).stdin(Stdio::null()).in_new_process_group();
    for (key, value) in args.get_env_vars() {
        cmd.env(key, value);
    }
    match mode {
        OutputMode::Stream => {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }
        OutputMode::Capture => {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        }
    }

    let child = cmd
        .spawn()
        .with_context(|| format!("Failed to spawn {} for {}", args.program(), args.label()))?;
    let pid = child.id();

    if let Ok(mut registry) = ChildRegistry::global().lock() {
        registry.register(pid);
    }

    let waited = child.wait_with_output();

    if let Ok(mut registry) = ChildRegistry::global().lock() {
        registry.unregister(pid);
    }

    let output = waited.with_context(|| format!("Failed waiting for {}", args.label()))?;

    let result = ExecutionOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        exit_code: output.status.code(),
        success: output.status.success(),
        dry_run: false,
    };

    if result.success {
        debug!(notebook = %args.label(), "executor finished");
    } else {
        warn!(
            notebook = %args.label(),
            exit_code = ?result.exit_code,
            "executor failed"
        );
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args_with_program(program: &str) -> NotebookArgs {
        NotebookArgs::new(PathBuf::from("in.ipynb"), PathBuf::from("out.ipynb"))
            .with_program(program)
    }

    #[test]
    fn test_ensure_success_ok() {
        let out = ExecutionOutput::skipped("x".to_string());
        assert!(out.ensure_success("grids").is_ok());
    }

    #[test]
    fn test_ensure_success_err_mentions_context_and_stderr() {
        let out = ExecutionOutput {
            stdout: String::new(),
            stderr: "PapermillExecutionError: cell 4".to_string(),
            exit_code: Some(1),
            success: false,
            dry_run: false,
        };
        let msg = out.ensure_success("3_rollout_model").unwrap_err().to_string();
        assert!(msg.contains("3_rollout_model"));
        assert!(msg.contains("exit code 1"));
        assert!(msg.contains("cell 4"));
    }

    #[test]
    fn test_ensure_success_signal() {
        let out = ExecutionOutput {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            success: false,
            dry_run: false,
        };
        let msg = out.ensure_success("grids").unwrap_err().to_string();
        assert!(msg.contains("exit code signal"));
    }

    #[test]
    fn test_dry_run_does_not_spawn() {
        let mut executor = PapermillExecutor::new(true);
        let out = executor
            .execute(&args_with_program("/nonexistent/papermill"))
            .unwrap();
        assert!(out.dry_run);
        assert!(out.success);
        assert!(out.stdout.contains("/nonexistent/papermill in.ipynb out.ipynb"));
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let result = run_notebook_safe(
            &args_with_program("/nonexistent/papermill"),
            OutputMode::Capture,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_captures_exit_status() {
        // `false` ignores its arguments and exits 1
        let out = run_notebook_safe(&args_with_program("false"), OutputMode::Capture).unwrap();
        assert!(!out.success);
        assert_eq!(out.exit_code, Some(1));

        let out = run_notebook_safe(&args_with_program("true"), OutputMode::Capture).unwrap();
        assert!(out.success);
    }
}
