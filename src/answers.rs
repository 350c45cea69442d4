//! Per-run answer set.
//!
//! Answers start empty (apart from the notebook type), are filled by the
//! prompts, and are then completed from the selected country profile.
//! Nothing here outlives the process.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config_file::CountryProfile;
use crate::error::{Result, RolloutError};

/// Notebook type used when none is given
pub const DEFAULT_NOTEBOOK_TYPE: &str = "single_country";

/// Date format for `rollout_date`
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Every answer field a question may target, in prompt order.
pub const ANSWER_FIELDS: &[&str] = &[
    "country_name",
    "rollout_date",
    "notebook_type",
    "country_code",
    "model_gdrive_url",
    "country_osm",
    "dhs_dta_prefix",
    "dhs_geo_prefix",
];

/// Answers collected for one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answers {
    pub country_name: String,
    pub rollout_date: String,
    pub notebook_type: String,
    pub country_code: String,
    pub model_gdrive_url: String,
    pub country_osm: String,
    pub dhs_dta_prefix: String,
    pub dhs_geo_prefix: String,
}

impl Default for Answers {
    fn default() -> Self {
        Self {
            country_name: String::new(),
            rollout_date: String::new(),
            notebook_type: DEFAULT_NOTEBOOK_TYPE.to_string(),
            country_code: String::new(),
            model_gdrive_url: String::new(),
            country_osm: String::new(),
            dhs_dta_prefix: String::new(),
            dhs_geo_prefix: String::new(),
        }
    }
}

impl Answers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `name` is a field questions may write to
    pub fn is_known_field(name: &str) -> bool {
        ANSWER_FIELDS.contains(&name)
    }

    fn field_mut(&mut self, name: &str) -> Result<&mut String> {
        let field = match name {
            "country_name" => &mut self.country_name,
            "rollout_date" => &mut self.rollout_date,
            "notebook_type" => &mut self.notebook_type,
            "country_code" => &mut self.country_code,
            "model_gdrive_url" => &mut self.model_gdrive_url,
            "country_osm" => &mut self.country_osm,
            "dhs_dta_prefix" => &mut self.dhs_dta_prefix,
            "dhs_geo_prefix" => &mut self.dhs_geo_prefix,
            other => {
                return Err(RolloutError::prompt(format!(
                    "unknown answer field '{}'",
                    other
                )));
            }
        };
        Ok(field)
    }

    /// Read an answer by field name
    pub fn get(&self, name: &str) -> Result<&str> {
        let value = match name {
            "country_name" => &self.country_name,
            "rollout_date" => &self.rollout_date,
            "notebook_type" => &self.notebook_type,
            "country_code" => &self.country_code,
            "model_gdrive_url" => &self.model_gdrive_url,
            "country_osm" => &self.country_osm,
            "dhs_dta_prefix" => &self.dhs_dta_prefix,
            "dhs_geo_prefix" => &self.dhs_geo_prefix,
            other => {
                return Err(RolloutError::prompt(format!(
                    "unknown answer field '{}'",
                    other
                )));
            }
        };
        Ok(value)
    }

    /// Write an answer by field name. Surrounding whitespace is dropped.
    pub fn set(&mut self, name: &str, value: impl Into<String>) -> Result<()> {
        let value = value.into();
        *self.field_mut(name)? = value.trim().to_string();
        Ok(())
    }

    /// Fill fields the user left empty from a country profile.
    ///
    /// Values the user typed are kept as-is.
    pub fn apply_profile(&mut self, profile: &CountryProfile) {
        fn fill(slot: &mut String, value: &str) {
            if slot.is_empty() {
                *slot = value.to_string();
            }
        }

        fill(&mut self.country_code, &profile.code);
        fill(&mut self.country_osm, &profile.country_osm);
        fill(
            &mut self.model_gdrive_url,
            profile.model_weights_url.as_deref().unwrap_or_default(),
        );
        fill(&mut self.dhs_dta_prefix, &profile.dhs_stata_prefix);
        fill(&mut self.dhs_geo_prefix, &profile.dhs_geo_prefix);
    }

    /// Check the fields every stage depends on
    pub fn validate_required(&self) -> Result<()> {
        for (name, value) in [
            ("country_name", &self.country_name),
            ("country_code", &self.country_code),
            ("rollout_date", &self.rollout_date),
            ("notebook_type", &self.notebook_type),
        ] {
            if value.trim().is_empty() {
                return Err(RolloutError::validation(format!("{} is required", name)));
            }
        }

        NaiveDate::parse_from_str(&self.rollout_date, DATE_FORMAT).map_err(|e| {
            RolloutError::validation(format!(
                "rollout_date '{}' is not a YYYY-MM-DD date: {}",
                self.rollout_date, e
            ))
        })?;

        Ok(())
    }
}
