//! Aggregation search engine.
//!
//! The `Search` is responsible for:
//! - Resolving column references against the attached schemas
//! - Normalizing filters and sorts supplied by the aggregation author
//! - Assembling one parameterized SQL statement per execution
//! - Executing it and reshaping the rows into `Value` cells
//! - Counting the matching rows independently of paging
//! - Tallying the values of one column for tag clouds

use std::sync::Arc;

use crate::permission::{AllowAll, PermissionFilter};
use crate::schema::{Column, Schema};
use crate::settings::SearchSettings;
use crate::types::TypeKind;

mod api;
mod execute;
mod filter;
mod resolve;
mod sql;
mod value_list;

pub use filter::{normalize_filter, Comparator, Filter, FilterValue};
pub use value_list::parse_filter_value_list;

/// A schema attached to a search under an alias.
#[derive(Debug, Clone)]
pub struct SchemaRef {
    schema: Arc<Schema>,
    alias: String,
}

impl SchemaRef {
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }
}

/// A column resolved against one of the search's schema references.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryColumn {
    column: Column,
    schema_index: usize,
    schema_alias: String,
    schema_name: String,
}

impl QueryColumn {
    pub(crate) fn new(column: Column, schema_index: usize, schema_ref: &SchemaRef) -> Self {
        Self {
            column,
            schema_index,
            schema_alias: schema_ref.alias.clone(),
            schema_name: schema_ref.schema.name().to_string(),
        }
    }

    pub fn column(&self) -> &Column {
        &self.column
    }

    pub fn label(&self) -> &str {
        self.column.label()
    }

    /// `alias.label`, unambiguous across the search's schemas.
    pub fn full_label(&self) -> String {
        format!("{}.{}", self.schema_alias, self.label())
    }

    pub fn schema_alias(&self) -> &str {
        &self.schema_alias
    }

    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    pub fn column_type(&self) -> &TypeKind {
        self.column.column_type()
    }

    pub fn is_multi(&self) -> bool {
        self.column.is_multi()
    }

    /// Position of the column in its schema; an error for pseudo columns.
    pub fn colref(&self) -> crate::Result<usize> {
        self.column.colref()
    }

    pub(crate) fn schema_index(&self) -> usize {
        self.schema_index
    }
}

#[derive(Debug, Clone)]
pub struct Sort {
    pub column: QueryColumn,
    pub ascending: bool,
}

/// One aggregation query: schemas, columns, filters, sorts and paging.
///
/// Configuration accumulates through the `add_*`/`set_*` methods; executing
/// is repeatable, typically after changing limit and offset to page through
/// the results.
pub struct Search {
    settings: SearchSettings,
    permission: Arc<dyn PermissionFilter>,
    schemas: Vec<SchemaRef>,
    columns: Vec<QueryColumn>,
    filters: Vec<Filter>,
    /// Reader supplied filters, ANDed as one group with the authored ones.
    dynamic_filters: Vec<Filter>,
    sorts: Vec<Sort>,
    limit: u64,
    offset: u64,
    pids: Vec<String>,
    rids: Vec<i64>,
    revs: Vec<i64>,
}

impl std::fmt::Debug for Search {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Search")
            .field("settings", &self.settings)
            .field("schemas", &self.schemas)
            .field("columns", &self.columns)
            .field("filters", &self.filters)
            .field("dynamic_filters", &self.dynamic_filters)
            .field("sorts", &self.sorts)
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .field("pids", &self.pids)
            .field("rids", &self.rids)
            .field("revs", &self.revs)
            .finish_non_exhaustive()
    }
}

impl Default for Search {
    fn default() -> Self {
        Self::new(SearchSettings::default())
    }
}

impl Search {
    pub fn new(settings: SearchSettings) -> Self {
        Self {
            settings,
            permission: Arc::new(AllowAll),
            schemas: Vec::new(),
            columns: Vec::new(),
            filters: Vec::new(),
            dynamic_filters: Vec::new(),
            sorts: Vec::new(),
            limit: 0,
            offset: 0,
            pids: Vec::new(),
            rids: Vec::new(),
            revs: Vec::new(),
        }
    }

    /// Restrict results to rows `permission` lets through.
    pub fn with_permission(mut self, permission: Arc<dyn PermissionFilter>) -> Self {
        self.permission = permission;
        self
    }
}
