//! Aggregation configuration.
//!
//! The parsed form of an aggregation block: which schemas to query, which
//! columns to show, filters, sorts and paging. [`AggregationConfig::into_search`]
//! turns it into a ready to execute [`Search`]; [`DynamicParameters`] carry the
//! reader's own filters, sort and page on top of it.

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::schema::SchemaRegistry;
use crate::search::{FilterValue, Search};
use crate::settings::SearchSettings;
use crate::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// `name` or `name alias`.
    pub schemas: Vec<String>,
    pub cols: Vec<String>,
    pub filter: Vec<FilterConfig>,
    /// Column references, `^` prefixed for descending order.
    pub sort: Vec<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    pub column: String,
    #[serde(default = "default_comparator")]
    pub comparator: String,
    pub value: FilterInput,
    #[serde(default = "default_combinator")]
    pub combinator: String,
}

fn default_comparator() -> String {
    "=".to_string()
}

fn default_combinator() -> String {
    "AND".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterInput {
    One(String),
    Many(Vec<String>),
}

/// A reader supplied filter on one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicFilter {
    pub column: String,
    #[serde(default = "default_comparator")]
    pub comparator: String,
    pub value: String,
}

/// Overrides a reader applies to an authored aggregation, e.g. from the
/// sort links, filter fields and paging links of a rendered table.
///
/// Filters are keyed by column, one each, and narrow the authored result.
/// A sort replaces every authored sort key; an offset replaces the authored
/// offset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicParameters {
    pub filters: Vec<DynamicFilter>,
    /// Column reference, `^` prefixed for descending order.
    pub sort: Option<String>,
    pub offset: Option<i64>,
}

impl DynamicParameters {
    /// Filter `column`, replacing an earlier filter on the same column.
    pub fn set_filter(&mut self, column: &str, comparator: &str, value: &str) {
        let filter = DynamicFilter {
            column: column.to_string(),
            comparator: comparator.to_string(),
            value: value.to_string(),
        };
        match self.filters.iter_mut().find(|f| f.column == column) {
            Some(slot) => *slot = filter,
            None => self.filters.push(filter),
        }
    }

    /// Drop the filter on `column`; returns whether there was one.
    pub fn remove_filter(&mut self, column: &str) -> bool {
        let before = self.filters.len();
        self.filters.retain(|f| f.column != column);
        self.filters.len() != before
    }

    pub fn set_sort(&mut self, column: &str, ascending: bool) {
        self.sort = Some(if ascending {
            column.to_string()
        } else {
            format!("^{column}")
        });
    }

    pub fn set_offset(&mut self, offset: i64) {
        self.offset = Some(offset);
    }

    pub fn is_filtered(&self) -> bool {
        !self.filters.is_empty()
    }
}

fn add_sort(search: &mut Search, sort: &str) {
    match sort.trim().strip_prefix('^') {
        Some(col) => search.add_sort(col, false),
        None => search.add_sort(sort.trim(), true),
    }
}

/// Values substituted for the `$ID$`, `$NS$`, `$PAGE$`, `$USER$` and `$TODAY$`
/// placeholders in filter values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterContext {
    pub id: String,
    pub user: String,
    pub today: NaiveDate,
}

impl FilterContext {
    pub fn new(id: &str, user: &str) -> Self {
        Self {
            id: id.to_string(),
            user: user.to_string(),
            today: Local::now().date_naive(),
        }
    }

    pub fn namespace(&self) -> &str {
        self.id.rsplit_once(':').map(|(ns, _)| ns).unwrap_or("")
    }

    pub fn page(&self) -> &str {
        self.id.rsplit_once(':').map(|(_, page)| page).unwrap_or(&self.id)
    }

    pub fn substitute(&self, value: &str) -> String {
        value
            .replace("$ID$", &self.id)
            .replace("$NS$", self.namespace())
            .replace("$PAGE$", self.page())
            .replace("$USER$", &self.user)
            .replace("$TODAY$", &self.today.format("%Y-%m-%d").to_string())
    }
}

impl AggregationConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load the schemas and configure a search.
    ///
    /// Without `cols` every column of every schema is shown.
    pub async fn into_search(
        self,
        registry: &dyn SchemaRegistry,
        settings: SearchSettings,
        context: &FilterContext,
    ) -> Result<Search> {
        self.into_search_with(registry, settings, context, &DynamicParameters::default())
            .await
    }

    /// Like [`AggregationConfig::into_search`], with the reader's
    /// `dynamic` overrides applied on top.
    pub async fn into_search_with(
        self,
        registry: &dyn SchemaRegistry,
        settings: SearchSettings,
        context: &FilterContext,
        dynamic: &DynamicParameters,
    ) -> Result<Search> {
        if self.schemas.is_empty() {
            return Err(Error::config("aggregation names no schema"));
        }
        let default_limit = settings.default_limit;
        let mut search = Search::new(settings);

        for entry in &self.schemas {
            let mut parts = entry.split_whitespace();
            let (Some(name), alias, None) = (parts.next(), parts.next(), parts.next()) else {
                return Err(Error::config(format!(
                    "invalid schema entry '{entry}', expected 'name' or 'name alias'"
                )));
            };
            let schema = registry
                .load_schema(name)
                .await?
                .ok_or_else(|| Error::SchemaNotFound(name.to_string()))?;
            search.add_schema(schema, alias)?;
        }

        if self.cols.is_empty() {
            search.add_column("*");
        }
        for col in &self.cols {
            search.add_column(col);
        }

        for filter in self.filter {
            let value = match filter.value {
                FilterInput::One(v) => FilterValue::Single(context.substitute(&v)),
                FilterInput::Many(vs) => {
                    FilterValue::List(vs.iter().map(|v| context.substitute(v)).collect())
                }
            };
            search.add_filter(&filter.column, value, &filter.comparator, &filter.combinator)?;
        }

        for filter in &dynamic.filters {
            search.add_dynamic_filter(
                &filter.column,
                context.substitute(&filter.value),
                &filter.comparator,
            )?;
        }

        match &dynamic.sort {
            Some(sort) => add_sort(&mut search, sort),
            None => self.sort.iter().for_each(|sort| add_sort(&mut search, sort)),
        }

        let limit = self.limit.unwrap_or(default_limit as i64);
        search.set_limit(limit)?;
        search.set_offset(dynamic.offset.or(self.offset).unwrap_or(0))?;
        Ok(search)
    }
}
