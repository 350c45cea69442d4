//! Answer collection for one run.
//!
//! Order of resolution:
//! 1. explicit overrides (command-line flags)
//! 2. first question round, with today's date as the date default
//! 3. country profile values for anything still empty
//! 4. second question round, defaulting to the values from step 3

use tracing::{debug, info, warn};

use crate::answers::Answers;
use crate::config_file::PipelineConfig;
use crate::error::{Result, RolloutError};
use crate::prompt::{Prompter, Question, ask_all, with_date_default};

/// Collect and validate the answers for a run.
///
/// Questions whose field was set through `overrides` are not asked.
pub fn collect_answers<P: Prompter + ?Sized>(
    config: &PipelineConfig,
    prompter: &mut P,
    overrides: &[(String, String)],
    today: &str,
) -> Result<Answers> {
    let mut answers = Answers::new();
    for (name, value) in overrides {
        answers.set(name, value.as_str())?;
    }

    let not_overridden = |q: &Question| !overrides.iter().any(|(name, _)| *name == q.name);

    let first: Vec<Question> = with_date_default(config.questions_part1.clone(), today)
        .into_iter()
        .filter(not_overridden)
        .collect();
    debug!(count = first.len(), "asking first question round");
    ask_all(&first, prompter, &mut answers)?;

    match config.profile(&answers.notebook_type, &answers.country_name) {
        Some(profile) => {
            info!(country = %profile.name, code = %profile.code, "using country profile");
            answers.apply_profile(profile);
        }
        None => warn!(
            country = %answers.country_name,
            notebook_type = %answers.notebook_type,
            "no country profile found, defaults not applied"
        ),
    }

    let second: Vec<Question> = config
        .questions_part2
        .iter()
        .filter(|q| not_overridden(*q))
        .cloned()
        .collect();
    if !second.is_empty() {
        debug!(count = second.len(), "asking second question round");
        ask_all(&second, prompter, &mut answers)?;
    }

    answers.validate_required()?;
    Ok(answers)
}

/// Parse `name=value` override strings
pub fn parse_overrides(raw: &[String]) -> Result<Vec<(String, String)>> {
    raw.iter()
        .map(|item| {
            let (name, value) = item.split_once('=').ok_or_else(|| {
                RolloutError::validation(format!(
                    "override '{}' is not of the form name=value",
                    item
                ))
            })?;
            let name = name.trim();
            if !Answers::is_known_field(name) {
                return Err(RolloutError::validation(format!(
                    "override '{}' does not name an answer field",
                    name
                )));
            }
            Ok((name.to_string(), value.trim().to_string()))
        })
        .collect()
}
