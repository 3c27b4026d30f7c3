//! Result table types.

use crate::ResultsError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Column name to value.
pub type Row = BTreeMap<String, Value>;

/// What to do when new data would replace values already stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverwritePolicy {
    /// Write nothing if any column already holds a value
    #[default]
    Abort = 0,
    /// Replace whatever is there
    Overwrite = 1,
    /// Only fill columns that are still empty
    PreferExisting = 2,
}

impl TryFrom<i64> for OverwritePolicy {
    type Error = ResultsError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(OverwritePolicy::Abort),
            1 => Ok(OverwritePolicy::Overwrite),
            2 => Ok(OverwritePolicy::PreferExisting),
            _ => Err(ResultsError::InvalidPolicy { value }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistOutcome {
    /// A row matched the key columns
    pub row_found: bool,
    pub written: Vec<String>,
    /// Columns left alone because they already held a value
    pub kept: Vec<String>,
}

/// RFC 3339 UTC timestamp for date columns.
pub fn timestamp_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// Whether `row` has every key column with the same value.
pub fn row_matches(row: &Row, keys: &Row) -> bool {
    keys.iter().all(|(k, v)| row.get(k) == Some(v))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_levels() {
        assert_eq!(OverwritePolicy::try_from(0).unwrap(), OverwritePolicy::Abort);
        assert_eq!(OverwritePolicy::try_from(2).unwrap(), OverwritePolicy::PreferExisting);
        assert!(OverwritePolicy::try_from(3).is_err());
        assert_eq!(OverwritePolicy::Overwrite as i64, 1);
    }

    #[test]
    fn timestamps_parse_back() {
        let t = timestamp_now();
        assert!(chrono::DateTime::parse_from_rfc3339(&t).is_ok());
    }
}
