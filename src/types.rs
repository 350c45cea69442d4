//! Type-safe enums for the rollout pipeline
//!
//! Task types, stages and question kinds are closed sets, so they are
//! modelled as enums instead of strings.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Which part of the pipeline to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter, IntoStaticStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TaskType {
    /// Grid generation and model application only
    #[default]
    Rollout,
    /// Training data generation and model training only
    Train,
    /// Every stage, training first
    All,
}

/// One named step of the pipeline, backed by one notebook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter, IntoStaticStr)]
pub enum Stage {
    #[strum(serialize = "0_generate_training_data")]
    #[serde(rename = "0_generate_training_data")]
    GenerateTrainingData,
    #[strum(serialize = "1_train_model")]
    #[serde(rename = "1_train_model")]
    TrainModel,
    #[strum(serialize = "2_generate_grids")]
    #[serde(rename = "2_generate_grids")]
    GenerateGrids,
    #[strum(serialize = "3_rollout_model")]
    #[serde(rename = "3_rollout_model")]
    RolloutModel,
}

impl Stage {
    /// Notebook file name for this stage (without directory)
    pub fn notebook_file(&self) -> String {
        format!("{}.ipynb", self)
    }
}

/// Kind of interactive question, mirroring the config file's `type` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum QuestionKind {
    /// Free text
    #[default]
    Input,
    /// Pick one of `choices`
    List,
    /// Yes/no
    Confirm,
    /// Free text, masked while typing
    Password,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_task_type_parse() {
        assert_eq!(TaskType::from_str("rollout").unwrap(), TaskType::Rollout);
        assert_eq!(TaskType::from_str("train").unwrap(), TaskType::Train);
        assert_eq!(TaskType::from_str("all").unwrap(), TaskType::All);
        assert!(TaskType::from_str("deploy").is_err());
    }

    #[test]
    fn test_task_type_default_is_rollout() {
        assert_eq!(TaskType::default(), TaskType::Rollout);
    }

    #[test]
    fn test_stage_names() {
        let names: Vec<String> = Stage::iter().map(|s| s.to_string()).collect();
        assert_eq!(
            names,
            vec![
                "0_generate_training_data",
                "1_train_model",
                "2_generate_grids",
                "3_rollout_model"
            ]
        );
    }

    #[test]
    fn test_stage_notebook_file() {
        assert_eq!(Stage::GenerateGrids.notebook_file(), "2_generate_grids.ipynb");
    }

    #[test]
    fn test_stage_serde_matches_display() {
        for stage in Stage::iter() {
            let json = serde_json::to_string(&stage).unwrap();
            assert_eq!(json, format!("\"{}\"", stage));
        }
    }

    #[test]
    fn test_question_kind_deserialize() {
        let kind: QuestionKind = serde_json::from_str("\"list\"").unwrap();
        assert_eq!(kind, QuestionKind::List);
        let kind: QuestionKind = serde_json::from_str("\"password\"").unwrap();
        assert_eq!(kind, QuestionKind::Password);
    }
}
