//! Typed arguments for the external notebook executor.
//!
//! A stage run is turned into an exact command line and environment by
//! implementing `ExecutorArgs`; the execution layer never assembles raw
//! argument vectors itself.

use std::path::PathBuf;

use serde_json::{Map, Value};

use crate::credentials::Credentials;
use crate::pipeline::{StageParams, StageRun};

/// Default papermill executable, resolved through `PATH`
pub const DEFAULT_PAPERMILL: &str = "papermill";

/// Contract between a typed argument struct and the process it launches.
///
/// - `to_cli_args()` returns arguments exactly as the executable parses them.
/// - `get_env_vars()` returns variables added to the child's environment.
/// - `program()` is the executable name or path.
pub trait ExecutorArgs {
    fn to_cli_args(&self) -> Vec<String>;

    fn get_env_vars(&self) -> Vec<(String, String)>;

    fn program(&self) -> &str;

    /// Short label used in logs and errors
    fn label(&self) -> String;
}

/// Arguments for one `papermill` invocation.
///
/// | Field        | CLI                      |
/// |--------------|--------------------------|
/// | `input`      | positional 1             |
/// | `output`     | positional 2             |
/// | `parameters` | `-y <json>`              |
/// | `kernel`     | `-k <name>` (optional)   |
/// | `log_output` | `--log-output`           |
///
/// Parameters go through `-y` as JSON (a YAML subset) so null values reach
/// the notebook as `None` instead of the string `"None"`.
///
/// ```
/// use std::path::PathBuf;
/// use nbrollout::notebook_traits::{ExecutorArgs, NotebookArgs};
///
/// let mut args = NotebookArgs::new(
///     PathBuf::from("notebooks/single_country/2_generate_grids.ipynb"),
///     PathBuf::from("output-notebooks/single_country/NGA_2_generate_grids.ipynb"),
/// );
/// args.parameters.insert("COUNTRY_CODE".into(), "NGA".into());
///
/// assert_eq!(
///     args.to_cli_args(),
///     vec![
///         "notebooks/single_country/2_generate_grids.ipynb",
///         "output-notebooks/single_country/NGA_2_generate_grids.ipynb",
///         "-y",
///         r#"{"COUNTRY_CODE":"NGA"}"#,
///     ]
/// );
/// ```
#[derive(Debug, Clone)]
pub struct NotebookArgs {
    pub program: String,
    pub input: PathBuf,
    pub output: PathBuf,
    pub parameters: StageParams,
    pub kernel: Option<String>,
    pub log_output: bool,
    pub credentials: Option<Credentials>,
}

impl NotebookArgs {
    pub fn new(input: PathBuf, output: PathBuf) -> Self {
        Self {
            program: DEFAULT_PAPERMILL.to_string(),
            input,
            output,
            parameters: StageParams::new(),
            kernel: None,
            log_output: false,
            credentials: None,
        }
    }

    /// Arguments for a planned stage
    pub fn for_stage(run: &StageRun, credentials: &Credentials) -> Self {
        Self {
            parameters: run.parameters.clone(),
            credentials: Some(credentials.clone()),
            ..Self::new(run.input.clone(), run.output.clone())
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_kernel(mut self, kernel: Option<String>) -> Self {
        self.kernel = kernel;
        self
    }

    pub fn with_log_output(mut self, log_output: bool) -> Self {
        self.log_output = log_output;
        self
    }

    /// Parameters rendered as a single JSON object
    pub fn parameters_json(&self) -> String {
        let map: Map<String, Value> = self
            .parameters
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Value::Object(map).to_string()
    }
}

impl ExecutorArgs for NotebookArgs {
    fn to_cli_args(&self) -> Vec<String> {
        let mut args = vec![
            self.input.display().to_string(),
            self.output.display().to_string(),
        ];

        if !self.parameters.is_empty() {
            args.push("-y".to_string());
            args.push(self.parameters_json());
        }

        if let Some(kernel) = &self.kernel {
            args.push("-k".to_string());
            args.push(kernel.clone());
        }

        if self.log_output {
            args.push("--log-output".to_string());
        }

        args
    }

    fn get_env_vars(&self) -> Vec<(String, String)> {
        self.credentials
            .as_ref()
            .map(Credentials::to_env_vars)
            .unwrap_or_default()
    }

    fn program(&self) -> &str {
        &self.program
    }

    fn label(&self) -> String {
        self.input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.input.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Stage;

    fn grid_run() -> StageRun {
        let mut parameters = StageParams::new();
        parameters.insert("COUNTRY_CODE".into(), "NGA".into());
        parameters.insert("MODEL_GDRIVE_URL".into(), Value::Null);
        StageRun {
            stage: Stage::RolloutModel,
            input: PathBuf::from("notebooks/single_country/3_rollout_model.ipynb"),
            output: PathBuf::from("output-notebooks/single_country/NGA_3_rollout_model.ipynb"),
            parameters,
        }
    }

    #[test]
    fn test_cli_args_carry_null_parameters() {
        let args = NotebookArgs::for_stage(&grid_run(), &Credentials::default());
        let cli = args.to_cli_args();

        assert_eq!(cli[0], "notebooks/single_country/3_rollout_model.ipynb");
        assert_eq!(cli[2], "-y");
        let parsed: Value = serde_json::from_str(&cli[3]).unwrap();
        assert_eq!(parsed["COUNTRY_CODE"], "NGA");
        assert!(parsed["MODEL_GDRIVE_URL"].is_null());
    }

    #[test]
    fn test_optional_flags() {
        let args = NotebookArgs::for_stage(&grid_run(), &Credentials::default())
            .with_kernel(Some("python3".to_string()))
            .with_log_output(true);
        let cli = args.to_cli_args();

        assert!(cli.windows(2).any(|w| w[0] == "-k" && w[1] == "python3"));
        assert_eq!(cli.last().map(String::as_str), Some("--log-output"));
    }

    #[test]
    fn test_no_parameters_no_yaml_flag() {
        let args = NotebookArgs::new(PathBuf::from("a.ipynb"), PathBuf::from("b.ipynb"));
        assert_eq!(args.to_cli_args(), vec!["a.ipynb", "b.ipynb"]);
        assert!(args.get_env_vars().is_empty());
    }

    #[test]
    fn test_credentials_only_in_env() {
        let creds = Credentials {
            user: "analyst".to_string(),
            password: "hunter2".to_string(),
        };
        let args = NotebookArgs::for_stage(&grid_run(), &creds);

        assert!(!args.to_cli_args().iter().any(|a| a.contains("hunter2")));
        assert!(args
            .get_env_vars()
            .contains(&("EOG_PASSWORD".to_string(), "hunter2".to_string())));
    }

    #[test]
    fn test_label_and_program() {
        let args = NotebookArgs::for_stage(&grid_run(), &Credentials::default())
            .with_program("/opt/conda/bin/papermill");
        assert_eq!(args.label(), "3_rollout_model");
        assert_eq!(args.program(), "/opt/conda/bin/papermill");
    }
}
