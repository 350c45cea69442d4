//! Sequential pipeline execution.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{error, info};

use crate::credentials::Credentials;
use crate::error::{Result, RolloutError};
use crate::notebook_runner::NotebookExecutor;
use crate::notebook_traits::{DEFAULT_PAPERMILL, ExecutorArgs, NotebookArgs};
use crate::pipeline::{PipelinePlan, StageRun};
use crate::types::Stage;

/// Executor settings shared by every stage
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub program: String,
    pub kernel: Option<String>,
    pub log_output: bool,
    /// Create output directories before each stage
    pub create_dirs: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            program: DEFAULT_PAPERMILL.to_string(),
            kernel: None,
            log_output: false,
            create_dirs: true,
        }
    }
}

/// A stage that ran to completion
#[derive(Debug, Clone)]
pub struct StageOutcome {
    pub stage: Stage,
    pub output: PathBuf,
    pub elapsed: Duration,
    pub dry_run: bool,
}

/// Stages completed in a run, in order
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub completed: Vec<StageOutcome>,
}

impl RunReport {
    pub fn total_elapsed(&self) -> Duration {
        self.completed.iter().map(|s| s.elapsed).sum()
    }
}

fn notebook_args(run: &StageRun, credentials: &Credentials, options: &RunOptions) -> NotebookArgs {
    NotebookArgs::for_stage(run, credentials)
        .with_program(options.program.clone())
        .with_kernel(options.kernel.clone())
        .with_log_output(options.log_output)
}

/// Run every stage of `plan` in order, stopping at the first failure.
pub fn run_pipeline<E: NotebookExecutor + ?Sized>(
    plan: &PipelinePlan,
    executor: &mut E,
    credentials: &Credentials,
    options: &RunOptions,
) -> Result<RunReport> {
    if credentials.is_placeholder() {
        info!("using placeholder EOG credentials");
    }

    let mut report = RunReport::default();
    let total = plan.len();

    for (index, run) in plan.stages.iter().enumerate() {
        let stage_name = run.stage.to_string();
        info!(
            stage = %stage_name,
            step = index + 1,
            total,
            input = %run.input.display(),
            output = %run.output.display(),
            "running stage"
        );

        if options.create_dirs {
            if let Some(dir) = run.output_dir() {
                fs::create_dir_all(dir)?;
            }
        }

        let started = Instant::now();
        let args = notebook_args(run, credentials, options);
        let output = executor
            .execute(&args)
            .map_err(|e| RolloutError::stage(&stage_name, format!("{:#}", e)))?;

        if let Err(e) = output.ensure_success(args.program()) {
            error!(stage = %stage_name, "stage failed");
            return Err(RolloutError::stage(&stage_name, format!("{:#}", e)));
        }

        let elapsed = started.elapsed();
        info!(stage = %stage_name, elapsed_secs = elapsed.as_secs(), "stage finished");
        report.completed.push(StageOutcome {
            stage: run.stage,
            output: run.output.clone(),
            elapsed,
            dry_run: output.dry_run,
        });
    }

    Ok(report)
}
