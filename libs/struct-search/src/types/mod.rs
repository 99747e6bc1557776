//! Column types.
//!
//! Every column is bound to one type out of a closed set. A type never owns
//! data: it is handed the table alias and column name of a cell and knows how
//! to project, filter and sort that cell in a query, how to validate raw
//! input for it and how to display and order stored values.

use std::cmp::Ordering;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::query_builder::{Combinator, Predicate, QueryBuilder};
use crate::schema::Column;
use crate::search::{Comparator, FilterValue};
use crate::{Error, Result};

mod date;
mod datetime;
mod decimal;
mod page;
mod text;
mod user;

pub use date::DateType;
pub use datetime::DateTimeType;
pub use decimal::DecimalType;
pub use page::PageType;
pub use text::TextType;
pub use user::UserType;

/// The cell a type operates on: `table_alias.column`, plus the column it
/// was resolved from so types can special-case pseudo columns.
#[derive(Debug, Clone, Copy)]
pub struct ColumnTarget<'a> {
    pub table_alias: &'a str,
    pub column: &'a str,
    pub source: &'a Column,
}

impl ColumnTarget<'_> {
    pub fn expr(&self) -> String {
        format!("{}.{}", self.table_alias, self.column)
    }
}

/// Capabilities every column type provides.
pub trait ColumnType {
    /// Class name used in schema definitions.
    fn class(&self) -> &'static str;

    /// Project the cell under `alias`.
    fn select(&self, qb: &mut QueryBuilder, target: &ColumnTarget<'_>, alias: &str) -> Result<()> {
        qb.add_select_statement(target.expr(), alias);
        Ok(())
    }

    /// Build the predicate comparing the cell with `value`.
    fn filter(
        &self,
        qb: &mut QueryBuilder,
        target: &ColumnTarget<'_>,
        comparator: Comparator,
        value: &FilterValue,
    ) -> Result<Predicate> {
        Ok(compare_predicate(qb, &target.expr(), comparator, value))
    }

    /// Add the ORDER BY term for the cell.
    fn sort(&self, qb: &mut QueryBuilder, target: &ColumnTarget<'_>, ascending: bool) -> Result<()> {
        qb.add_order_by(format!("{} {}", target.expr(), direction(ascending)));
        Ok(())
    }

    /// Check raw input and return the value to store.
    fn validate(&self, raw: &str) -> Result<String> {
        Ok(raw.trim().to_string())
    }

    /// Display form of a stored value.
    fn render(&self, raw: &str) -> String {
        raw.to_string()
    }

    /// Comparator offered to readers for ad-hoc filtering of this column.
    fn default_comparator(&self) -> &'static str {
        "*~"
    }

    /// Ordering of two stored values.
    fn compare(&self, a: &str, b: &str) -> Ordering {
        a.cmp(b)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    Text(TextType),
    Decimal(DecimalType),
    Date(DateType),
    DateTime(DateTimeType),
    User(UserType),
    Page(PageType),
}

impl TypeKind {
    /// Instantiate a type from its class name and JSON configuration.
    pub fn from_class(class: &str, config: &JsonValue) -> Result<Self> {
        let kind = match class.to_ascii_lowercase().as_str() {
            "text" => Self::Text(parse_config(class, config)?),
            "decimal" => Self::Decimal(parse_config(class, config)?),
            "date" => Self::Date(parse_config(class, config)?),
            "datetime" => Self::DateTime(parse_config(class, config)?),
            "user" => Self::User(parse_config(class, config)?),
            "page" => Self::Page(parse_config(class, config)?),
            _ => return Err(Error::config(format!("unknown column type class '{class}'"))),
        };
        Ok(kind)
    }

    pub fn text() -> Self {
        Self::Text(TextType::default())
    }

    /// Configuration as stored alongside the schema.
    pub fn config_json(&self) -> Result<JsonValue> {
        let value = match self {
            Self::Text(t) => serde_json::to_value(t)?,
            Self::Decimal(t) => serde_json::to_value(t)?,
            Self::Date(t) => serde_json::to_value(t)?,
            Self::DateTime(t) => serde_json::to_value(t)?,
            Self::User(t) => serde_json::to_value(t)?,
            Self::Page(t) => serde_json::to_value(t)?,
        };
        Ok(value)
    }

    fn inner(&self) -> &dyn ColumnType {
        match self {
            Self::Text(t) => t,
            Self::Decimal(t) => t,
            Self::Date(t) => t,
            Self::DateTime(t) => t,
            Self::User(t) => t,
            Self::Page(t) => t,
        }
    }
}

impl ColumnType for TypeKind {
    fn class(&self) -> &'static str {
        self.inner().class()
    }

    fn select(&self, qb: &mut QueryBuilder, target: &ColumnTarget<'_>, alias: &str) -> Result<()> {
        self.inner().select(qb, target, alias)
    }

    fn filter(
        &self,
        qb: &mut QueryBuilder,
        target: &ColumnTarget<'_>,
        comparator: Comparator,
        value: &FilterValue,
    ) -> Result<Predicate> {
        self.inner().filter(qb, target, comparator, value)
    }

    fn sort(&self, qb: &mut QueryBuilder, target: &ColumnTarget<'_>, ascending: bool) -> Result<()> {
        self.inner().sort(qb, target, ascending)
    }

    fn validate(&self, raw: &str) -> Result<String> {
        self.inner().validate(raw)
    }

    fn render(&self, raw: &str) -> String {
        self.inner().render(raw)
    }

    fn default_comparator(&self) -> &'static str {
        self.inner().default_comparator()
    }

    fn compare(&self, a: &str, b: &str) -> Ordering {
        self.inner().compare(a, b)
    }
}

fn parse_config<T: DeserializeOwned + Serialize>(class: &str, config: &JsonValue) -> Result<T> {
    let config = if config.is_null() {
        JsonValue::Object(Default::default())
    } else {
        config.clone()
    };
    serde_json::from_value(config)
        .map_err(|e| Error::config(format!("invalid configuration for type {class}: {e}")))
}

pub(crate) fn direction(ascending: bool) -> &'static str {
    if ascending {
        "ASC"
    } else {
        "DESC"
    }
}

/// `expr <op> ?N`, one bound value per item.
///
/// `IN` lists render as a single `IN (...)` leaf, any other list becomes an
/// OR group with one leaf per item.
pub(crate) fn compare_predicate(
    qb: &mut QueryBuilder,
    expr: &str,
    comparator: Comparator,
    value: &FilterValue,
) -> Predicate {
    compare_predicate_with(qb, expr, comparator, value, |ph| ph)
}

/// Like [`compare_predicate`], wrapping each placeholder with `wrap`.
pub(crate) fn compare_predicate_with(
    qb: &mut QueryBuilder,
    expr: &str,
    comparator: Comparator,
    value: &FilterValue,
    wrap: impl Fn(String) -> String,
) -> Predicate {
    if comparator.is_set() {
        let placeholders = value
            .items()
            .into_iter()
            .map(|item| wrap(qb.add_value(item)))
            .collect::<Vec<_>>()
            .join(", ");
        return Predicate::leaf(format!("{expr} {comparator} ({placeholders})"));
    }

    match value {
        FilterValue::Single(item) => {
            let ph = wrap(qb.add_value(item.as_str()));
            Predicate::leaf(format!("{expr} {comparator} {ph}"))
        }
        FilterValue::List(items) => items.iter().fold(Predicate::group(), |group, item| {
            let ph = wrap(qb.add_value(item.as_str()));
            group.with(Combinator::Or, Predicate::leaf(format!("{expr} {comparator} {ph}")))
        }),
    }
}

/// Left join `titles` from `left_alias` where `page_expr` is the page id.
pub(crate) fn join_titles(qb: &mut QueryBuilder, left_alias: &str, page_expr: &str) -> Result<String> {
    let alias = qb.generate_table_alias("T");
    qb.add_left_join(left_alias, "titles", &alias, &format!("{page_expr} = {alias}.pid"))?;
    Ok(alias)
}
