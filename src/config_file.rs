//! Pipeline configuration file.
//!
//! The file carries three things: the question definitions for the
//! interactive prompts, the static country profiles that supply defaults,
//! and a handful of run-wide settings (credentials, data years).
//!
//! ```json
//! {
//!   "questions-part1": [
//!     { "type": "list", "name": "country_name", "message": "Country?", "choices": ["Nigeria"] },
//!     { "type": "input", "name": "rollout_date", "message": "Rollout date?" }
//!   ],
//!   "single_country": [
//!     { "name": "Nigeria", "code": "NGA", "country_osm": "nigeria",
//!       "model_weights_url": "https://...", "dhs_stata_prefix": "NGHR7B",
//!       "dhs_geo_prefix": "NGGE7B" }
//!   ]
//! }
//! ```
//!
//! Every top-level key that is not a known section is a notebook type
//! mapping to its list of country profiles.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::answers::Answers;
use crate::credentials::Credentials;
use crate::error::{Result, RolloutError};
use crate::pipeline::DataYears;
use crate::prompt::Question;
use crate::types::QuestionKind;

/// Default location of the configuration file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "scripts/config.json";

/// Static defaults for one country
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryProfile {
    pub name: String,
    #[serde(default)]
    pub code: String,
    /// OSM region identifier (Geofabrik extract name)
    #[serde(default)]
    pub country_osm: String,
    /// Location of the pre-trained model weights
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_weights_url: Option<String>,
    /// DHS Stata household file prefix
    #[serde(default)]
    pub dhs_stata_prefix: String,
    /// DHS GPS cluster file prefix
    #[serde(default)]
    pub dhs_geo_prefix: String,
}

/// Everything loaded from the configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Questions asked first (country, date, ...)
    #[serde(rename = "questions-part1", default)]
    pub questions_part1: Vec<Question>,

    /// Follow-up questions, asked with country profile values as defaults
    #[serde(
        rename = "questions-part2",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub questions_part2: Vec<Question>,

    #[serde(default)]
    pub credentials: Credentials,

    #[serde(default)]
    pub years: DataYears,

    /// Country profiles keyed by notebook type
    #[serde(flatten)]
    pub profiles: BTreeMap<String, Vec<CountryProfile>>,
}

impl PipelineConfig {
    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read configuration from {:?}", path.as_ref()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse configuration {:?}", path.as_ref()))?;

        debug!(
            path = %path.as_ref().display(),
            questions = config.questions_part1.len() + config.questions_part2.len(),
            notebook_types = config.profiles.len(),
            "configuration loaded"
        );

        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize configuration to JSON")?;

        fs::write(&path, json)
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// All profiles configured for a notebook type
    pub fn profiles_for(&self, notebook_type: &str) -> &[CountryProfile] {
        self.profiles
            .get(notebook_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Look up a country profile by exact name
    pub fn profile(&self, notebook_type: &str, country_name: &str) -> Option<&CountryProfile> {
        self.profiles_for(notebook_type)
            .iter()
            .find(|p| p.name == country_name)
    }

    /// Names of every country configured for a notebook type, in file order
    pub fn country_names(&self, notebook_type: &str) -> Vec<&str> {
        self.profiles_for(notebook_type)
            .iter()
            .map(|p| p.name.as_str())
            .collect()
    }

    /// Validate question definitions and country profiles
    pub fn validate(&self) -> Result<()> {
        for question in self.questions_part1.iter().chain(&self.questions_part2) {
            if question.name.trim().is_empty() {
                return Err(RolloutError::config("question with empty name"));
            }
            if !Answers::is_known_field(&question.name) {
                return Err(RolloutError::config(format!(
                    "question '{}' does not target a known answer field",
                    question.name
                )));
            }
            if question.message.trim().is_empty() {
                return Err(RolloutError::config(format!(
                    "question '{}' has no message",
                    question.name
                )));
            }
            if question.kind == QuestionKind::List && question.choices.is_empty() {
                return Err(RolloutError::config(format!(
                    "list question '{}' has no choices",
                    question.name
                )));
            }
        }

        for (notebook_type, profiles) in &self.profiles {
            let mut seen = HashSet::new();
            for profile in profiles {
                if profile.name.trim().is_empty() {
                    return Err(RolloutError::config(format!(
                        "{}: country profile with empty name",
                        notebook_type
                    )));
                }
                if profile.code.trim().is_empty() {
                    return Err(RolloutError::config(format!(
                        "{}: country '{}' has no code",
                        notebook_type, profile.name
                    )));
                }
                if !seen.insert(profile.name.as_str()) {
                    return Err(RolloutError::config(format!(
                        "{}: country '{}' is listed twice",
                        notebook_type, profile.name
                    )));
                }
            }
        }

        Ok(())
    }
}
