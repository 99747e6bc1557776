//! Filter comparators and value normalization.

use std::fmt;

use super::value_list::parse_filter_value_list;
use super::QueryColumn;
use crate::query_builder::Combinator;
use crate::{Error, Result};

/// Comparators understood by column types after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Like,
    NotLike,
    Regexp,
    NotRegexp,
    In,
    NotIn,
}

impl Comparator {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Ge => ">=",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
            Self::Regexp => "REGEXP",
            Self::NotRegexp => "NOT REGEXP",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
        }
    }

    /// `<`, `>`, `<=` and `>=`.
    pub fn is_ordering(self) -> bool {
        matches!(self, Self::Lt | Self::Gt | Self::Le | Self::Ge)
    }

    /// Comparators taking the whole value list at once.
    pub fn is_set(self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// A filter operand: one value, or several alternatives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    Single(String),
    List(Vec<String>),
}

impl FilterValue {
    pub fn items(&self) -> Vec<&str> {
        match self {
            Self::Single(v) => vec![v.as_str()],
            Self::List(vs) => vs.iter().map(String::as_str).collect(),
        }
    }

    fn map(self, f: impl Fn(String) -> String) -> Self {
        match self {
            Self::Single(v) => Self::Single(f(v)),
            Self::List(vs) => Self::List(vs.into_iter().map(f).collect()),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::Single(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::Single(value)
    }
}

impl From<Vec<String>> for FilterValue {
    fn from(values: Vec<String>) -> Self {
        Self::List(values)
    }
}

impl From<Vec<&str>> for FilterValue {
    fn from(values: Vec<&str>) -> Self {
        Self::List(values.into_iter().map(str::to_string).collect())
    }
}

/// A resolved, normalized filter.
#[derive(Debug, Clone)]
pub struct Filter {
    pub column: QueryColumn,
    pub value: FilterValue,
    pub comparator: Comparator,
    pub combinator: Combinator,
}

/// Rewrite an author supplied comparator and value into their stored form.
///
/// `~` style comparators turn `*` into the SQL wildcard, `*~` wraps the value
/// in wildcards, and `IN` style comparators parse a single value as a
/// parenthesised value list.
pub fn normalize_filter(raw: &str, value: FilterValue) -> Result<(Comparator, FilterValue)> {
    let glob = |v: String| v.replace('*', "%");
    let normalized = match raw.trim().to_ascii_uppercase().as_str() {
        "=" => (Comparator::Eq, value),
        "!=" | "<>" => (Comparator::Ne, value),
        "<" => (Comparator::Lt, value),
        ">" => (Comparator::Gt, value),
        "<=" => (Comparator::Le, value),
        ">=" => (Comparator::Ge, value),
        "~" => (Comparator::Like, value.map(glob)),
        "!~" => (Comparator::NotLike, value.map(glob)),
        "*~" => (Comparator::Like, value.map(|v| format!("%{v}%"))),
        "=*" => (Comparator::Regexp, value),
        "!=*" => (Comparator::NotRegexp, value),
        "LIKE" => (Comparator::Like, value),
        "NOT LIKE" => (Comparator::NotLike, value),
        "REGEXP" => (Comparator::Regexp, value),
        "NOT REGEXP" => (Comparator::NotRegexp, value),
        "IN" => (Comparator::In, value_list(value)?),
        "NOT IN" => (Comparator::NotIn, value_list(value)?),
        _ => return Err(Error::config(format!("unknown filter comparator '{raw}'"))),
    };
    Ok(normalized)
}

fn value_list(value: FilterValue) -> Result<FilterValue> {
    match value {
        FilterValue::Single(raw) => Ok(FilterValue::List(parse_filter_value_list(&raw)?)),
        list => Ok(list),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(comparator: &str, value: &str) -> (String, FilterValue) {
        let (c, v) = normalize_filter(comparator, value.into()).unwrap();
        (c.to_string(), v)
    }

    #[test]
    fn comparator_rewrites() {
        assert_eq!(single("<>", "val"), ("!=".into(), "val".into()));
        assert_eq!(single("*~", "val"), ("LIKE".into(), "%val%".into()));
        assert_eq!(single("~", "val*"), ("LIKE".into(), "val%".into()));
        assert_eq!(single("!~", "*val"), ("NOT LIKE".into(), "%val".into()));
        assert_eq!(single("=*", "(value)"), ("REGEXP".into(), "(value)".into()));
        assert_eq!(single("!=*", "^x"), ("NOT REGEXP".into(), "^x".into()));
        assert_eq!(single("like", "a%"), ("LIKE".into(), "a%".into()));
        assert_eq!(single(">=", "5"), (">=".into(), "5".into()));
    }

    #[test]
    fn wildcard_rewrite_applies_to_every_list_item() {
        let (c, v) = normalize_filter("~", vec!["a*", "*b"].into()).unwrap();
        assert_eq!(c, Comparator::Like);
        assert_eq!(v, FilterValue::from(vec!["a%", "%b"]));
    }

    #[test]
    fn in_parses_value_lists() {
        let (c, v) = normalize_filter("in", "(1, 'two', \"three\")".into()).unwrap();
        assert_eq!(c, Comparator::In);
        assert_eq!(v, FilterValue::from(vec!["1", "two", "three"]));

        let err = normalize_filter("NOT IN", "(1, 'two".into()).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn unknown_comparators_are_config_errors() {
        for raw in ["?", "==", "CONTAINS", ""] {
            let err = normalize_filter(raw, "x".into()).unwrap_err();
            assert!(err.is_config(), "{raw}");
        }
        let err = normalize_filter("?", "x".into()).unwrap_err();
        assert!(err.to_string().contains("'?'"));
    }
}
