//! Stage table and per-stage parameters.
//!
//! The pipeline is fixed: a task type selects an ordered slice of stages
//! and every stage has a fixed set of notebook parameters.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::answers::Answers;
use crate::types::{Stage, TaskType};

/// Notebook parameters for one stage, keyed by parameter name
pub type StageParams = BTreeMap<String, Value>;

const ROLLOUT_STAGES: &[Stage] = &[Stage::GenerateGrids, Stage::RolloutModel];
const TRAIN_STAGES: &[Stage] = &[Stage::GenerateTrainingData, Stage::TrainModel];
const ALL_STAGES: &[Stage] = &[
    Stage::GenerateTrainingData,
    Stage::TrainModel,
    Stage::GenerateGrids,
    Stage::RolloutModel,
];

/// Stages run for a task type, in execution order
pub fn stages_for(task: TaskType) -> &'static [Stage] {
    match task {
        TaskType::Rollout => ROLLOUT_STAGES,
        TaskType::Train => TRAIN_STAGES,
        TaskType::All => ALL_STAGES,
    }
}

/// Data vintages passed to the training and rollout notebooks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataYears {
    #[serde(default = "default_ookla_year")]
    pub ookla_year: String,
    #[serde(default = "default_nightlights_year")]
    pub nightlights_year: String,
}

fn default_ookla_year() -> String {
    "2019".to_string()
}

fn default_nightlights_year() -> String {
    "2016".to_string()
}

impl Default for DataYears {
    fn default() -> Self {
        Self {
            ookla_year: default_ookla_year(),
            nightlights_year: default_nightlights_year(),
        }
    }
}

fn text(value: &str) -> Value {
    Value::String(value.to_string())
}

/// Build the parameter map for one stage.
///
/// `MODEL_GDRIVE_URL` is only handed to the rollout notebook when the task
/// is a pure rollout; after a training run the freshly trained model is
/// used instead, so it is null.
pub fn stage_params(stage: Stage, answers: &Answers, task: TaskType, years: &DataYears) -> StageParams {
    let mut params = StageParams::new();
    let mut put = |key: &str, value: Value| {
        params.insert(key.to_string(), value);
    };

    put("COUNTRY_CODE", text(&answers.country_code));
    put("ROLLOUT_DATE", text(&answers.rollout_date));

    match stage {
        Stage::GenerateTrainingData => {
            put("COUNTRY_OSM", text(&answers.country_osm));
            put("DHS_DTA_PREFIX", text(&answers.dhs_dta_prefix));
            put("DHS_GEO_PREFIX", text(&answers.dhs_geo_prefix));
        }
        Stage::TrainModel => {
            put("COUNTRY_OSM", text(&answers.country_osm));
            put("OOKLA_YEAR", text(&years.ookla_year));
            put("NIGHTLIGHTS_YEAR", text(&years.nightlights_year));
        }
        Stage::GenerateGrids => {}
        Stage::RolloutModel => {
            put("COUNTRY_OSM", text(&answers.country_osm));
            put("OOKLA_YEAR", text(&years.ookla_year));
            put("NIGHTLIGHTS_YEAR", text(&years.nightlights_year));
            let url = if task == TaskType::Rollout && !answers.model_gdrive_url.is_empty() {
                text(&answers.model_gdrive_url)
            } else {
                Value::Null
            };
            put("MODEL_GDRIVE_URL", url);
        }
    }

    params
}

/// Where notebooks are read from and written to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotebookLayout {
    pub input_root: PathBuf,
    pub output_root: PathBuf,
}

impl Default for NotebookLayout {
    fn default() -> Self {
        Self {
            input_root: PathBuf::from("notebooks"),
            output_root: PathBuf::from("output-notebooks"),
        }
    }
}

impl NotebookLayout {
    pub fn new(input_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            input_root: input_root.into(),
            output_root: output_root.into(),
        }
    }

    /// `<input_root>/<notebook_type>/<stage>.ipynb`
    pub fn input_path(&self, notebook_type: &str, stage: Stage) -> PathBuf {
        self.input_root.join(notebook_type).join(stage.notebook_file())
    }

    /// `<output_root>/<notebook_type>/<country_code>_<stage>.ipynb`
    pub fn output_path(&self, notebook_type: &str, country_code: &str, stage: Stage) -> PathBuf {
        self.output_root
            .join(notebook_type)
            .join(format!("{}_{}", country_code, stage.notebook_file()))
    }
}

/// One resolved stage invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRun {
    pub stage: Stage,
    pub input: PathBuf,
    pub output: PathBuf,
    pub parameters: StageParams,
}

impl StageRun {
    pub fn output_dir(&self) -> Option<&Path> {
        self.output.parent()
    }
}

/// Every stage of a run, resolved up front
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelinePlan {
    pub task: TaskType,
    pub notebook_type: String,
    pub country_code: String,
    pub stages: Vec<StageRun>,
}

impl PipelinePlan {
    pub fn build(answers: &Answers, task: TaskType, years: &DataYears, layout: &NotebookLayout) -> Self {
        let stages = stages_for(task)
            .iter()
            .map(|&stage| StageRun {
                stage,
                input: layout.input_path(&answers.notebook_type, stage),
                output: layout.output_path(&answers.notebook_type, &answers.country_code, stage),
                parameters: stage_params(stage, answers, task, years),
            })
            .collect();

        Self {
            task,
            notebook_type: answers.notebook_type.clone(),
            country_code: answers.country_code.clone(),
            stages,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answers() -> Answers {
        Answers {
            country_name: "Nigeria".to_string(),
            rollout_date: "2024-03-01".to_string(),
            notebook_type: "single_country".to_string(),
            country_code: "NGA".to_string(),
            model_gdrive_url: "https://example.org/nga.pt".to_string(),
            country_osm: "nigeria".to_string(),
            dhs_dta_prefix: "NGHR7B".to_string(),
            dhs_geo_prefix: "NGGE7B".to_string(),
        }
    }

    fn keys(params: &StageParams) -> Vec<&str> {
        params.keys().map(String::as_str).collect()
    }

    #[test]
    fn test_stage_table() {
        assert_eq!(
            stages_for(TaskType::Rollout),
            [Stage::GenerateGrids, Stage::RolloutModel]
        );
        assert_eq!(
            stages_for(TaskType::Train),
            [Stage::GenerateTrainingData, Stage::TrainModel]
        );
        assert_eq!(stages_for(TaskType::All).len(), 4);
        assert_eq!(stages_for(TaskType::All)[0], Stage::GenerateTrainingData);
        assert_eq!(stages_for(TaskType::All)[3], Stage::RolloutModel);
    }

    #[test]
    fn test_training_data_params() {
        let params = stage_params(
            Stage::GenerateTrainingData,
            &answers(),
            TaskType::All,
            &DataYears::default(),
        );
        assert_eq!(
            keys(&params),
            [
                "COUNTRY_CODE",
                "COUNTRY_OSM",
                "DHS_DTA_PREFIX",
                "DHS_GEO_PREFIX",
                "ROLLOUT_DATE"
            ]
        );
        assert_eq!(params["DHS_DTA_PREFIX"], "NGHR7B");
    }

    #[test]
    fn test_train_model_params_use_years() {
        let params = stage_params(
            Stage::TrainModel,
            &answers(),
            TaskType::Train,
            &DataYears::default(),
        );
        assert_eq!(params["OOKLA_YEAR"], "2019");
        assert_eq!(params["NIGHTLIGHTS_YEAR"], "2016");
        assert!(!params.contains_key("DHS_DTA_PREFIX"));
    }

    #[test]
    fn test_grid_params_are_minimal() {
        let params = stage_params(
            Stage::GenerateGrids,
            &answers(),
            TaskType::Rollout,
            &DataYears::default(),
        );
        assert_eq!(keys(&params), ["COUNTRY_CODE", "ROLLOUT_DATE"]);
    }

    #[test]
    fn test_model_url_only_for_rollout_task() {
        let years = DataYears::default();
        let rollout = stage_params(Stage::RolloutModel, &answers(), TaskType::Rollout, &years);
        assert_eq!(rollout["MODEL_GDRIVE_URL"], "https://example.org/nga.pt");

        let all = stage_params(Stage::RolloutModel, &answers(), TaskType::All, &years);
        assert_eq!(all["MODEL_GDRIVE_URL"], Value::Null);
    }

    #[test]
    fn test_empty_model_url_is_null() {
        let mut answers = answers();
        answers.model_gdrive_url.clear();
        let params = stage_params(
            Stage::RolloutModel,
            &answers,
            TaskType::Rollout,
            &DataYears::default(),
        );
        assert_eq!(params["MODEL_GDRIVE_URL"], Value::Null);
    }

    #[test]
    fn test_layout_paths() {
        let layout = NotebookLayout::default();
        assert_eq!(
            layout.input_path("single_country", Stage::GenerateGrids),
            PathBuf::from("notebooks/single_country/2_generate_grids.ipynb")
        );
        assert_eq!(
            layout.output_path("single_country", "NGA", Stage::RolloutModel),
            PathBuf::from("output-notebooks/single_country/NGA_3_rollout_model.ipynb")
        );
    }

    #[test]
    fn test_plan_build() {
        let plan = PipelinePlan::build(
            &answers(),
            TaskType::Rollout,
            &DataYears::default(),
            &NotebookLayout::default(),
        );
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.stages[0].stage, Stage::GenerateGrids);
        assert_eq!(plan.stages[1].stage, Stage::RolloutModel);
        assert_eq!(
            plan.stages[1].output_dir(),
            Some(Path::new("output-notebooks/single_country"))
        );
    }

    #[test]
    fn test_plan_serializes_stage_names() {
        let plan = PipelinePlan::build(
            &answers(),
            TaskType::Train,
            &DataYears::default(),
            &NotebookLayout::default(),
        );
        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json["task"], "train");
        assert_eq!(json["stages"][0]["stage"], "0_generate_training_data");
        assert_eq!(json["stages"][1]["parameters"]["OOKLA_YEAR"], "2019");
    }
}
