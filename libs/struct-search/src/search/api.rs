use std::sync::{Arc, OnceLock};

use regex::Regex;
use tracing::trace;

use super::{normalize_filter, Filter, FilterValue, QueryColumn, SchemaRef, Search, Sort};
use crate::query_builder::Combinator;
use crate::schema::Schema;
use crate::{Error, Result};

fn alias_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("alias regex must compile"))
}

impl Search {
    /// Attach a schema, optionally under an alias (defaults to its name).
    pub fn add_schema(&mut self, schema: Arc<Schema>, alias: Option<&str>) -> Result<()> {
        let alias = alias.map(str::trim).filter(|a| !a.is_empty());
        let alias = match alias {
            Some(alias) if !alias_pattern().is_match(alias) => {
                return Err(Error::config(format!(
                    "invalid alias '{alias}' for schema {}",
                    schema.name()
                )));
            }
            Some(alias) => alias.to_string(),
            None => schema.name().to_string(),
        };
        if self
            .schemas
            .iter()
            .any(|s| s.alias.eq_ignore_ascii_case(&alias))
        {
            return Err(Error::config(format!(
                "alias '{alias}' is already used in this search"
            )));
        }

        self.schemas.push(SchemaRef { schema, alias });
        Ok(())
    }

    /// Add the column(s) `reference` resolves to. Returns how many were added.
    ///
    /// Unknown columns are skipped silently.
    pub fn add_column(&mut self, reference: &str) -> usize {
        let resolved = self.resolve_columns(reference);
        let added = resolved.len();
        self.columns.extend(resolved);
        added
    }

    /// Add a filter.
    ///
    /// The comparator and combinator are checked first and fail with a
    /// configuration error; a filter on an unknown column is dropped.
    pub fn add_filter(
        &mut self,
        reference: &str,
        value: impl Into<FilterValue>,
        comparator: &str,
        combinator: &str,
    ) -> Result<()> {
        let (comparator, value) = normalize_filter(comparator, value.into())?;
        let combinator = Combinator::parse(combinator)?;

        let Some(column) = self.resolve_column(reference) else {
            trace!(reference, "dropping filter on unknown column");
            return Ok(());
        };

        self.filters.push(Filter {
            column,
            value,
            comparator,
            combinator,
        });
        Ok(())
    }

    /// Add a reader supplied filter.
    ///
    /// Dynamic filters are combined with AND among themselves and with the
    /// authored filters as a whole, so an authored OR cannot widen them.
    pub fn add_dynamic_filter(
        &mut self,
        reference: &str,
        value: impl Into<FilterValue>,
        comparator: &str,
    ) -> Result<()> {
        let (comparator, value) = normalize_filter(comparator, value.into())?;
        let Some(column) = self.resolve_column(reference) else {
            trace!(reference, "dropping dynamic filter on unknown column");
            return Ok(());
        };

        self.dynamic_filters.push(Filter {
            column,
            value,
            comparator,
            combinator: Combinator::And,
        });
        Ok(())
    }

    /// Add a sort key; earlier keys take precedence.
    pub fn add_sort(&mut self, reference: &str, ascending: bool) {
        match self.resolve_column(reference) {
            Some(column) => self.sorts.push(Sort { column, ascending }),
            None => trace!(reference, "dropping sort on unknown column"),
        }
    }

    /// Maximum number of rows per execution; 0 means unlimited.
    pub fn set_limit(&mut self, limit: i64) -> Result<()> {
        let limit = u64::try_from(limit)
            .map_err(|_| Error::config(format!("invalid limit {limit}, must not be negative")))?;
        if self.settings.max_limit > 0 && limit > self.settings.max_limit {
            return Err(Error::config(format!(
                "limit {limit} exceeds the maximum of {}",
                self.settings.max_limit
            )));
        }
        self.limit = limit;
        Ok(())
    }

    pub fn set_offset(&mut self, offset: i64) -> Result<()> {
        self.offset = u64::try_from(offset)
            .map_err(|_| Error::config(format!("invalid offset {offset}, must not be negative")))?;
        Ok(())
    }

    pub fn schemas(&self) -> &[SchemaRef] {
        &self.schemas
    }

    pub fn columns(&self) -> &[QueryColumn] {
        &self.columns
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn dynamic_filters(&self) -> &[Filter] {
        &self.dynamic_filters
    }

    pub fn sorts(&self) -> &[Sort] {
        &self.sorts
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Page ids of the rows returned by the last execution.
    pub fn pids(&self) -> &[String] {
        &self.pids
    }

    pub fn rids(&self) -> &[i64] {
        &self.rids
    }

    pub fn revs(&self) -> &[i64] {
        &self.revs
    }
}
