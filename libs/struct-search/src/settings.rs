use serde::{Deserialize, Serialize};

/// Limits applied to searches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Largest limit a search accepts; 0 disables the check.
    pub max_limit: u64,
    /// Limit used when an aggregation does not set one; 0 means unlimited.
    pub default_limit: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            max_limit: 1000,
            default_limit: 0,
        }
    }
}
