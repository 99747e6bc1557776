use serde::{Deserialize, Serialize};

use super::ColumnType;
use crate::{Error, Result};

/// A user login.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserType {}

impl ColumnType for UserType {
    fn class(&self) -> &'static str {
        "User"
    }

    fn validate(&self, raw: &str) -> Result<String> {
        let login = raw.trim();
        if login.chars().any(char::is_whitespace) {
            return Err(Error::Validation(format!(
                "'{login}' is not a valid user login"
            )));
        }
        Ok(login.to_string())
    }

    fn default_comparator(&self) -> &'static str {
        "="
    }
}
