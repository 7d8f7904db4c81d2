//! Actions performed on protected data.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AuthzError;

pub const ACTION_DECRYPT: &str = "decrypt";
pub const ACTION_TRANSMIT: &str = "transmit";

/// A named action, e.g. `decrypt`. Names compare case-insensitively.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Action {
    pub name: String,
}

impl Action {
    pub fn new<T: Into<String>>(name: T) -> Self {
        Action {
            name: name.into().to_lowercase(),
        }
    }

    pub fn decrypt() -> Self {
        Action::new(ACTION_DECRYPT)
    }

    pub fn transmit() -> Self {
        Action::new(ACTION_TRANSMIT)
    }

    pub fn matches(&self, other: &Action) -> bool {
        self.name.eq_ignore_ascii_case(&other.name)
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.name)
    }
}

impl FromStr for Action {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
            return Err(AuthzError::InvalidRequest(format!(
                "Failed to parse action: '{s}' (expected a single non-empty word)"
            )));
        }
        Ok(Action::new(trimmed))
    }
}
