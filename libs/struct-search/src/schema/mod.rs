//! Schemas and their columns.
//!
//! A schema is a named, ordered set of typed columns backed by a `data_<name>`
//! table (one row per record) and a `multi_<name>` table (one row per element
//! of a multi-valued column). Pseudo columns live alongside and are
//! synthesized from system tables instead.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;

use crate::types::TypeKind;
use crate::{Error, Result};

mod definition;
mod pseudo;

pub use definition::{ColumnDefinition, SchemaDefinition};
pub use pseudo::{PseudoColumn, PseudoKind};

/// Load access to stored schemas.
#[async_trait]
pub trait SchemaRegistry: Send + Sync {
    /// The current version of schema `name`, if it exists.
    async fn load_schema(&self, name: &str) -> Result<Option<Arc<Schema>>>;

    /// Names of the schemas assigned to page `pid`.
    async fn assigned_schemas(&self, pid: &str) -> Result<Vec<String>>;
}

fn schema_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z0-9_]+$").expect("valid regex"))
}

/// Schema names double as table name suffixes.
pub fn validate_schema_name(name: &str) -> Result<()> {
    if schema_name_pattern().is_match(name) {
        Ok(())
    } else {
        Err(Error::config(format!(
            "invalid schema name '{name}', only a-z, 0-9 and _ are allowed"
        )))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaColumn {
    table: String,
    colref: usize,
    label: String,
    multi: bool,
    enabled: bool,
    kind: TypeKind,
}

impl SchemaColumn {
    pub fn new(table: &str, colref: usize, label: &str, multi: bool, kind: TypeKind) -> Self {
        Self {
            table: table.to_string(),
            colref,
            label: label.to_string(),
            multi,
            enabled: true,
            kind,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn colref(&self) -> usize {
        self.colref
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_multi(&self) -> bool {
        self.multi
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn column_type(&self) -> &TypeKind {
        &self.kind
    }

    /// Name of the cell in the `data_<schema>` table.
    pub fn data_column(&self) -> String {
        format!("col{}", self.colref)
    }
}

/// A column as seen by a query: stored in a schema table or synthesized.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Physical(SchemaColumn),
    Pseudo(PseudoColumn),
}

impl Column {
    pub fn pseudo(kind: PseudoKind) -> Self {
        Self::Pseudo(PseudoColumn::new(kind))
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Physical(c) => c.label(),
            Self::Pseudo(p) => p.kind().token(),
        }
    }

    pub fn column_type(&self) -> &TypeKind {
        match self {
            Self::Physical(c) => c.column_type(),
            Self::Pseudo(p) => p.column_type(),
        }
    }

    pub fn is_multi(&self) -> bool {
        matches!(self, Self::Physical(c) if c.is_multi())
    }

    pub fn is_pseudo(&self) -> bool {
        matches!(self, Self::Pseudo(_))
    }

    /// Position within the schema. Pseudo columns have none.
    pub fn colref(&self) -> Result<usize> {
        match self {
            Self::Physical(c) => Ok(c.colref()),
            Self::Pseudo(p) => Err(Error::config(format!(
                "pseudo column {} has no column reference",
                p.kind().token()
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    name: String,
    id: i64,
    lookup: bool,
    timestamp: i64,
    columns: Vec<SchemaColumn>,
}

impl Schema {
    pub fn new(name: &str, lookup: bool) -> Result<Self> {
        validate_schema_name(name)?;
        Ok(Self {
            name: name.to_string(),
            id: 0,
            lookup,
            timestamp: 0,
            columns: Vec::new(),
        })
    }

    pub(crate) fn with_version(mut self, id: i64, timestamp: i64) -> Self {
        self.id = id;
        self.timestamp = timestamp;
        self
    }

    /// Append a column at the next free position.
    pub fn with_column(mut self, label: &str, multi: bool, kind: TypeKind) -> Self {
        let colref = self.columns.iter().map(|c| c.colref).max().unwrap_or(0) + 1;
        self.columns
            .push(SchemaColumn::new(&self.name, colref, label, multi, kind));
        self
    }

    pub(crate) fn push_column(&mut self, column: SchemaColumn) {
        self.columns.push(column);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Database id of the stored schema version, 0 when never saved.
    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Lookup schemas hold rows that do not belong to a page.
    pub fn is_lookup(&self) -> bool {
        self.lookup
    }

    pub fn data_table(&self) -> String {
        format!("data_{}", self.name)
    }

    pub fn multi_table(&self) -> String {
        format!("multi_{}", self.name)
    }

    /// Enabled columns in definition order.
    pub fn columns(&self) -> impl Iterator<Item = &SchemaColumn> {
        self.columns.iter().filter(|c| c.enabled)
    }

    /// Every column including disabled ones; storage keeps their cells.
    pub fn all_columns(&self) -> &[SchemaColumn] {
        &self.columns
    }

    /// Enabled column with label `label`, ignoring case.
    pub fn find_column(&self, label: &str) -> Option<&SchemaColumn> {
        self.columns().find(|c| c.label.eq_ignore_ascii_case(label))
    }

    pub fn has_multi(&self) -> bool {
        self.columns.iter().any(|c| c.multi)
    }
}
