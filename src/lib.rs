//! nbrollout library
//!
//! Collects run settings for the country rollout pipeline and executes its
//! notebooks one stage at a time through papermill.

pub mod answers;
pub mod cli;
pub mod config_file;
pub mod credentials;
pub mod error;
pub mod notebook_runner;
pub mod notebook_traits;
pub mod pipeline;
pub mod process_guard;
pub mod prompt;
pub mod runner;
pub mod session;
pub mod types;

pub use answers::Answers;
pub use config_file::{CountryProfile, PipelineConfig};
pub use credentials::Credentials;
pub use error::RolloutError;
pub use notebook_runner::{ExecutionOutput, NotebookExecutor, OutputMode, PapermillExecutor};
pub use notebook_traits::{ExecutorArgs, NotebookArgs};
pub use pipeline::{DataYears, NotebookLayout, PipelinePlan, StageRun, stage_params, stages_for};
pub use process_guard::{ChildRegistry, CommandProcessGroup, ProcessGuard};
pub use prompt::{DefaultsPrompter, Prompter, Question, ScriptedPrompter, TerminalPrompter};
pub use runner::{RunOptions, RunReport, run_pipeline};
pub use session::collect_answers;
pub use types::{QuestionKind, Stage, TaskType};
