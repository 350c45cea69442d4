//! nbrollout - main entry point
//!
//! Parses the command line, loads the pipeline configuration and
//! dispatches to the subcommand handlers below.

use std::io::IsTerminal;
use std::path::Path;

use anyhow::Context;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use nbrollout::answers::DATE_FORMAT;
use nbrollout::cli::{Cli, Commands, RunArgs};
use nbrollout::session::parse_overrides;
use nbrollout::{
    DefaultsPrompter, NotebookLayout, PapermillExecutor, PipelineConfig, PipelinePlan,
    ProcessGuard, Prompter, RunOptions, TaskType, TerminalPrompter, collect_answers,
    process_guard, run_pipeline, stages_for,
};

/// Log to stderr, next to the prompts, so plan output on stdout stays clean.
/// `RUST_LOG` overrides the default `info` level.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    debug!("nbrollout starting up");

    if let Err(e) = process_guard::init_signal_handlers() {
        warn!("Failed to initialize signal handlers: {}", e);
    }

    let cli = Cli::parse_args();

    match cli.command_or_default() {
        Commands::Run(args) => run(&cli.config, cli.dry_run, &args),
        Commands::Validate { path } => validate(path.as_deref().unwrap_or(&cli.config)),
        Commands::Stages { task } => {
            print_stages(task);
            Ok(())
        }
        Commands::Countries { notebook_type } => print_countries(&cli.config, &notebook_type),
    }
}

fn load_config(path: &Path) -> anyhow::Result<PipelineConfig> {
    let config = PipelineConfig::load_from_file(path)?;
    config
        .validate()
        .with_context(|| format!("Invalid configuration {:?}", path))?;
    Ok(config)
}

fn run(config_path: &Path, dry_run: bool, args: &RunArgs) -> anyhow::Result<()> {
    info!(config = %config_path.display(), task = %args.task, dry_run, "Rolling out");
    let config = load_config(config_path)?;

    let overrides = parse_overrides(&args.raw_overrides())?;
    let today = chrono::Local::now().format(DATE_FORMAT).to_string();

    let mut prompter: Box<dyn Prompter> = if args.yes || !std::io::stdin().is_terminal() {
        debug!("non-interactive run, accepting defaults");
        Box::new(DefaultsPrompter)
    } else {
        Box::new(TerminalPrompter)
    };

    let answers = collect_answers(&config, prompter.as_mut(), &overrides, &today)?;
    debug!(answers = %serde_json::to_string(&answers)?, "answers resolved");

    let layout = NotebookLayout::new(&args.notebooks_dir, &args.output_dir);
    let plan = PipelinePlan::build(&answers, args.task, &config.years, &layout);

    if args.plan {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    for run in &plan.stages {
        if !dry_run && !run.input.exists() {
            warn!(notebook = %run.input.display(), "input notebook not found");
        }
    }

    let options = RunOptions {
        program: args.papermill.clone(),
        kernel: args.kernel.clone(),
        log_output: args.log_output,
        create_dirs: !dry_run,
    };
    let mut executor = PapermillExecutor::new(dry_run);
    let _guard = ProcessGuard::new();

    println!(
        "🚀 Running {} stage(s) for {} ({}), rollout date {}",
        plan.len(),
        answers.country_name,
        answers.country_code,
        answers.rollout_date
    );

    match run_pipeline(&plan, &mut executor, &config.credentials, &options) {
        Ok(report) => {
            for outcome in &report.completed {
                let marker = if outcome.dry_run { "[dry run]" } else { "✓" };
                println!("{} {} -> {}", marker, outcome.stage, outcome.output.display());
            }
            info!(
                stages = report.completed.len(),
                elapsed_secs = report.total_elapsed().as_secs(),
                "Pipeline finished"
            );
            Ok(())
        }
        Err(e) => {
            error!("Pipeline failed: {}", e);
            eprintln!("✗ {}", e);
            std::process::exit(1);
        }
    }
}

fn validate(path: &Path) -> anyhow::Result<()> {
    info!("Validating configuration file: {:?}", path);
    match load_config(path) {
        Ok(config) => {
            let countries: usize = config.profiles.values().map(Vec::len).sum();
            println!(
                "✓ Configuration file is valid: {} question(s), {} country profile(s)",
                config.questions_part1.len() + config.questions_part2.len(),
                countries
            );
            Ok(())
        }
        Err(e) => {
            error!("Configuration validation failed: {:#}", e);
            eprintln!("✗ Configuration validation failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn print_stages(task: TaskType) {
    for (i, stage) in stages_for(task).iter().enumerate() {
        println!("{}. {}", i + 1, stage);
    }
}

fn print_countries(config_path: &Path, notebook_type: &str) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let profiles = config.profiles_for(notebook_type);
    if profiles.is_empty() {
        eprintln!("No country profiles for notebook type '{}'", notebook_type);
        return Ok(());
    }

    for profile in profiles {
        println!(
            "{:<24} {:<5} osm={:<20} weights={}",
            profile.name,
            profile.code,
            profile.country_osm,
            if profile.model_weights_url.is_some() { "yes" } else { "no" }
        );
    }
    Ok(())
}
