use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::answers::DEFAULT_NOTEBOOK_TYPE;
use crate::config_file::DEFAULT_CONFIG_PATH;
use crate::notebook_traits::DEFAULT_PAPERMILL;
use crate::types::TaskType;

/// nbrollout - run the country rollout notebook pipeline
#[derive(Parser, Debug)]
#[command(name = "nbrollout")]
#[command(about = "Collects run settings interactively and executes the rollout notebooks in order")]
#[command(version)]
pub struct Cli {
    /// Pipeline configuration file, JSON (questions and country profiles)
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Dry-run mode: resolve every stage and log the executor command
    /// without running it.
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Prompt for settings and run the pipeline (default)
    Run(RunArgs),
    /// Validate a configuration file
    Validate {
        /// File to validate (defaults to --config)
        path: Option<PathBuf>,
    },
    /// List the stages a task type runs
    Stages {
        #[arg(short, long, default_value_t = TaskType::Rollout)]
        task: TaskType,
    },
    /// List configured country profiles
    Countries {
        #[arg(short, long, default_value = DEFAULT_NOTEBOOK_TYPE)]
        notebook_type: String,
    },
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct RunArgs {
    /// Country name (skips the country question)
    #[arg(long)]
    pub country: Option<String>,

    /// Rollout date, YYYY-MM-DD (skips the date question)
    #[arg(long)]
    pub date: Option<String>,

    /// Which stages to run
    #[arg(short, long, default_value_t = TaskType::Rollout)]
    pub task: TaskType,

    /// Notebook type (subdirectory of the notebook folders)
    #[arg(long)]
    pub notebook_type: Option<String>,

    /// Directory holding the input notebooks
    #[arg(long, default_value = "notebooks")]
    pub notebooks_dir: PathBuf,

    /// Directory receiving the executed notebooks
    #[arg(long, default_value = "output-notebooks")]
    pub output_dir: PathBuf,

    /// papermill executable
    #[arg(long, default_value = DEFAULT_PAPERMILL)]
    pub papermill: String,

    /// Jupyter kernel name passed to papermill
    #[arg(short, long)]
    pub kernel: Option<String>,

    /// Forward notebook cell output to the terminal
    #[arg(long)]
    pub log_output: bool,

    /// Accept every default without prompting
    #[arg(short, long)]
    pub yes: bool,

    /// Set an answer directly (repeatable), e.g. --set country_osm=kenya
    #[arg(long = "set", value_name = "NAME=VALUE")]
    pub set: Vec<String>,

    /// Print the resolved stage plan as JSON and exit
    #[arg(long)]
    pub plan: bool,
}

impl Default for RunArgs {
    fn default() -> Self {
        Self {
            country: None,
            date: None,
            task: TaskType::Rollout,
            notebook_type: None,
            notebooks_dir: PathBuf::from("notebooks"),
            output_dir: PathBuf::from("output-notebooks"),
            papermill: DEFAULT_PAPERMILL.to_string(),
            kernel: None,
            log_output: false,
            yes: false,
            set: Vec::new(),
            plan: false,
        }
    }
}

impl RunArgs {
    /// Answer overrides from the dedicated flags followed by `--set`
    pub fn raw_overrides(&self) -> Vec<String> {
        let mut raw = Vec::new();
        if let Some(country) = &self.country {
            raw.push(format!("country_name={}", country));
        }
        if let Some(date) = &self.date {
            raw.push(format!("rollout_date={}", date));
        }
        if let Some(notebook_type) = &self.notebook_type {
            raw.push(format!("notebook_type={}", notebook_type));
        }
        raw.extend(self.set.iter().cloned());
        raw
    }
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as clap::Parser>::parse()
    }

    /// The subcommand to run; no subcommand means `run` with defaults
    pub fn command_or_default(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or_else(|| Commands::Run(RunArgs::default()))
    }
}
