//! Result cells.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value as JsonValue;

use crate::search::QueryColumn;
use crate::types::ColumnType;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueData {
    Empty,
    Single(String),
    /// Elements of a multi-valued cell in stored order.
    Multi(Vec<String>),
}

/// One cell of a search result, bound to the column it was selected for.
#[derive(Debug, Clone)]
pub struct Value {
    column: QueryColumn,
    data: ValueData,
}

impl Value {
    pub fn new(column: QueryColumn, data: ValueData) -> Self {
        let data = match data {
            ValueData::Single(s) if s.is_empty() => ValueData::Empty,
            ValueData::Multi(items) => {
                let items: Vec<String> = items.into_iter().filter(|s| !s.is_empty()).collect();
                if items.is_empty() {
                    ValueData::Empty
                } else {
                    ValueData::Multi(items)
                }
            }
            other => other,
        };
        Self { column, data }
    }

    pub fn empty(column: QueryColumn) -> Self {
        Self {
            column,
            data: ValueData::Empty,
        }
    }

    /// Wrap a raw result cell.
    ///
    /// Multi-valued cells arrive as a JSON object keyed by the stored row
    /// number; elements are returned in row order.
    pub fn from_cell(column: QueryColumn, cell: Option<String>) -> Result<Self> {
        let Some(raw) = cell else {
            return Ok(Self::empty(column));
        };
        if !column.is_multi() {
            return Ok(Self::new(column, ValueData::Single(raw)));
        }

        let elements: BTreeMap<i64, JsonValue> = serde_json::from_str(&raw).map_err(|e| {
            Error::Decode(format!(
                "multi-valued cell of {}: {e}",
                column.full_label()
            ))
        })?;
        let items = elements
            .into_values()
            .filter_map(|v| match v {
                JsonValue::Null => None,
                JsonValue::String(s) => Some(s),
                other => Some(other.to_string()),
            })
            .collect();
        Ok(Self::new(column, ValueData::Multi(items)))
    }

    pub fn column(&self) -> &QueryColumn {
        &self.column
    }

    pub fn data(&self) -> &ValueData {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data == ValueData::Empty
    }

    /// Stored values; one for single cells, none for empty ones.
    pub fn raw_values(&self) -> Vec<&str> {
        match &self.data {
            ValueData::Empty => Vec::new(),
            ValueData::Single(s) => vec![s.as_str()],
            ValueData::Multi(items) => items.iter().map(String::as_str).collect(),
        }
    }

    /// Display form through the column's type; multi values joined by `, `.
    pub fn display(&self) -> String {
        let kind = self.column.column_type();
        self.raw_values()
            .into_iter()
            .map(|raw| kind.render(raw))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Order by the column type's rule; empty cells sort first, multi cells
    /// compare element by element.
    pub fn compare(&self, other: &Value) -> Ordering {
        let kind = self.column.column_type();
        let (a, b) = (self.raw_values(), other.raw_values());
        for (x, y) in a.iter().zip(&b) {
            match kind.compare(x, y) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        a.len().cmp(&b.len())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.compare(other))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::schema::Schema;
    use crate::search::Search;
    use crate::types::TypeKind;
    use serde_json::json;

    fn columns() -> Vec<QueryColumn> {
        let schema = Schema::new("schema1", false)
            .unwrap()
            .with_column("text", false, TypeKind::text())
            .with_column("multi", true, TypeKind::text())
            .with_column(
                "price",
                false,
                TypeKind::from_class("Decimal", &json!({"postfix": " EUR"})).unwrap(),
            );
        let mut search = Search::default();
        search.add_schema(Arc::new(schema), None).unwrap();
        search.add_column("*");
        search.add_column("%title%");
        search.columns().to_vec()
    }

    #[test]
    fn empty_states_are_normalised() {
        let cols = columns();
        assert!(Value::from_cell(cols[0].clone(), None).unwrap().is_empty());
        assert!(Value::from_cell(cols[0].clone(), Some(String::new())).unwrap().is_empty());
        assert!(Value::from_cell(cols[1].clone(), Some("{}".into())).unwrap().is_empty());
        assert_eq!(Value::empty(cols[1].clone()).display(), "");
    }

    #[test]
    fn multi_cells_come_back_in_row_order() {
        let cols = columns();
        let raw = r#"{"3":"c","1":"a","10":"j","2":"b"}"#;
        let value = Value::from_cell(cols[1].clone(), Some(raw.into())).unwrap();
        assert_eq!(
            value.data(),
            &ValueData::Multi(vec!["a".into(), "b".into(), "c".into(), "j".into()])
        );
        assert_eq!(value.display(), "a, b, c, j");
    }

    #[test]
    fn malformed_multi_cells_are_decode_errors() {
        let cols = columns();
        let err = Value::from_cell(cols[1].clone(), Some("a,b".into())).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn comparison_follows_the_column_type() {
        let cols = columns();
        let price = |v: &str| Value::new(cols[2].clone(), ValueData::Single(v.into()));
        assert!(price("9") < price("10"));
        assert_eq!(price("10"), price("10.00"));
        assert!(Value::empty(cols[2].clone()) < price("0"));
        assert_eq!(price("10").to_string(), "10 EUR");
    }

    #[test]
    fn title_cells_render_the_title() {
        let cols = columns();
        let value = Value::from_cell(cols[3].clone(), Some(r#"["page01","TestTitle"]"#.into()))
            .unwrap();
        assert_eq!(value.display(), "TestTitle");
        assert_eq!(value.raw_values(), vec![r#"["page01","TestTitle"]"#]);
    }
}
