//! Earth Observation Group credentials handed to every stage.
//!
//! The notebooks read `EOG_USER` / `EOG_PASSWORD` from their environment.
//! They are injected into each child process rather than into this
//! process's own environment.

use std::fmt;

use serde::{Deserialize, Serialize};

pub const EOG_USER_VAR: &str = "EOG_USER";
pub const EOG_PASSWORD_VAR: &str = "EOG_PASSWORD";

const PLACEHOLDER_USER: &str = "eog_user_id";
const PLACEHOLDER_PASSWORD: &str = "eog_password";

/// Credential pair for the nightlights download
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default = "placeholder_user")]
    pub user: String,
    #[serde(default = "placeholder_password")]
    pub password: String,
}

fn placeholder_user() -> String {
    PLACEHOLDER_USER.to_string()
}

fn placeholder_password() -> String {
    PLACEHOLDER_PASSWORD.to_string()
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            user: placeholder_user(),
            password: placeholder_password(),
        }
    }
}

impl Credentials {
    /// Environment variables for a stage process
    pub fn to_env_vars(&self) -> Vec<(String, String)> {
        vec![
            (EOG_USER_VAR.to_string(), self.user.clone()),
            (EOG_PASSWORD_VAR.to_string(), self.password.clone()),
        ]
    }

    /// Whether these are still the built-in placeholder values
    pub fn is_placeholder(&self) -> bool {
        self.user == PLACEHOLDER_USER && self.password == PLACEHOLDER_PASSWORD
    }
}

// Password never reaches logs
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"********")
            .finish()
    }
}
