use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::{Schema, SchemaColumn};
use crate::types::TypeKind;
use crate::{Error, Result};

/// JSON import/export format of a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub schema: String,
    #[serde(default)]
    pub lookup: bool,
    #[serde(default)]
    pub columns: Vec<ColumnDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    /// Position in the data table; assigned in order when missing.
    #[serde(default)]
    pub colref: Option<usize>,
    pub label: String,
    #[serde(default)]
    pub ismulti: bool,
    #[serde(default = "enabled")]
    pub isenabled: bool,
    #[serde(default = "text_class")]
    pub class: String,
    #[serde(default)]
    pub config: JsonValue,
}

fn enabled() -> bool {
    true
}

fn text_class() -> String {
    "Text".to_string()
}

impl SchemaDefinition {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Check the definition and turn it into a schema.
    pub fn into_schema(self) -> Result<Schema> {
        let mut schema = Schema::new(&self.schema, self.lookup)?;
        let mut labels = HashSet::new();
        let mut colrefs = HashSet::new();
        let mut next = 1;

        for col in self.columns {
            let label = col.label.trim();
            if label.is_empty() {
                return Err(Error::config(format!(
                    "column {next} of schema {} has no label",
                    self.schema
                )));
            }
            if label.starts_with('%') || label.contains('.') || label == "*" {
                return Err(Error::config(format!(
                    "column label '{label}' is reserved"
                )));
            }
            if !labels.insert(label.to_lowercase()) {
                return Err(Error::config(format!(
                    "duplicate column label '{label}' in schema {}",
                    self.schema
                )));
            }
            let colref = col.colref.unwrap_or(next);
            if colref == 0 || !colrefs.insert(colref) {
                return Err(Error::config(format!(
                    "invalid or duplicate colref {colref} for column '{label}'"
                )));
            }
            next = colref.max(next) + 1;

            let kind = TypeKind::from_class(&col.class, &col.config)?;
            let mut column = SchemaColumn::new(&self.schema, colref, label, col.ismulti, kind);
            if !col.isenabled {
                column = column.disabled();
            }
            schema.push_column(column);
        }

        Ok(schema)
    }

    /// Keep column positions stable across versions of a schema.
    ///
    /// Columns without a colref reuse the position of the same label in
    /// `current` or get a fresh one after the highest known position.
    /// Columns of `current` missing here are kept, disabled, so their stored
    /// cells stay addressable.
    pub fn aligned_with(mut self, current: &Schema) -> Self {
        let mut next = current
            .all_columns()
            .iter()
            .map(|c| c.colref())
            .chain(self.columns.iter().filter_map(|c| c.colref))
            .max()
            .unwrap_or(0)
            + 1;

        for col in &mut self.columns {
            if col.colref.is_some() {
                continue;
            }
            let existing = current
                .all_columns()
                .iter()
                .find(|c| c.label().eq_ignore_ascii_case(col.label.trim()));
            col.colref = Some(match existing {
                Some(c) => c.colref(),
                None => {
                    next += 1;
                    next - 1
                }
            });
        }

        for old in current.all_columns() {
            if self.columns.iter().any(|c| c.colref == Some(old.colref())) {
                continue;
            }
            self.columns.push(ColumnDefinition {
                colref: Some(old.colref()),
                label: old.label().to_string(),
                ismulti: old.is_multi(),
                isenabled: false,
                class: crate::types::ColumnType::class(old.column_type()).to_string(),
                config: old.column_type().config_json().unwrap_or_default(),
            });
        }
        self
    }

    /// Export a schema in the import format.
    pub fn from_schema(schema: &Schema) -> Result<Self> {
        let columns = schema
            .all_columns()
            .iter()
            .map(|c| {
                Ok(ColumnDefinition {
                    colref: Some(c.colref()),
                    label: c.label().to_string(),
                    ismulti: c.is_multi(),
                    isenabled: c.is_enabled(),
                    class: crate::types::ColumnType::class(c.column_type()).to_string(),
                    config: c.column_type().config_json()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            schema: schema.name().to_string(),
            lookup: schema.is_lookup(),
            columns,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFINITION: &str = r#"{
        "schema": "schema1",
        "columns": [
            {"label": "first"},
            {"label": "second", "ismulti": true},
            {"label": "price", "class": "Decimal", "config": {"prefix": "$"}},
            {"label": "old", "isenabled": false}
        ]
    }"#;

    #[test]
    fn parses_and_assigns_colrefs() {
        let schema = SchemaDefinition::from_json(DEFINITION)
            .unwrap()
            .into_schema()
            .unwrap();
        assert_eq!(schema.name(), "schema1");
        assert!(!schema.is_lookup());
        let cols: Vec<_> = schema
            .all_columns()
            .iter()
            .map(|c| (c.colref(), c.label(), c.is_multi(), c.is_enabled()))
            .collect();
        assert_eq!(
            cols,
            vec![
                (1, "first", false, true),
                (2, "second", true, true),
                (3, "price", false, true),
                (4, "old", false, false),
            ]
        );
    }

    #[test]
    fn export_round_trips() {
        let schema = SchemaDefinition::from_json(DEFINITION)
            .unwrap()
            .into_schema()
            .unwrap();
        let again = SchemaDefinition::from_schema(&schema)
            .unwrap()
            .into_schema()
            .unwrap();
        assert_eq!(schema, again);
    }

    #[test]
    fn new_versions_keep_column_positions() {
        let current = SchemaDefinition::from_json(DEFINITION)
            .unwrap()
            .into_schema()
            .unwrap();
        let update = r#"{
            "schema": "schema1",
            "columns": [{"label": "added"}, {"label": "PRICE", "class": "Decimal"}, {"label": "first"}]
        }"#;
        let schema = SchemaDefinition::from_json(update)
            .unwrap()
            .aligned_with(&current)
            .into_schema()
            .unwrap();

        let cols: Vec<_> = schema
            .all_columns()
            .iter()
            .map(|c| (c.colref(), c.label(), c.is_enabled()))
            .collect();
        assert_eq!(
            cols,
            vec![
                (5, "added", true),
                (3, "PRICE", true),
                (1, "first", true),
                (2, "second", false),
                (4, "old", false),
            ]
        );
    }

    #[test]
    fn rejects_bad_definitions() {
        let dup = r#"{"schema": "s", "columns": [{"label": "a"}, {"label": "A"}]}"#;
        assert!(SchemaDefinition::from_json(dup).unwrap().into_schema().unwrap_err().is_config());

        let class = r#"{"schema": "s", "columns": [{"label": "a", "class": "Wiki"}]}"#;
        assert!(SchemaDefinition::from_json(class).unwrap().into_schema().unwrap_err().is_config());

        let name = r#"{"schema": "Bad Name", "columns": []}"#;
        assert!(SchemaDefinition::from_json(name).unwrap().into_schema().is_err());

        let reserved = r#"{"schema": "s", "columns": [{"label": "%pageid%"}]}"#;
        assert!(SchemaDefinition::from_json(reserved).unwrap().into_schema().is_err());
    }
}
