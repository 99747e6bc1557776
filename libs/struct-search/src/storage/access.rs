//! Write path for schema data.
//!
//! Page data is versioned: every save inserts a new row for the page at the
//! save timestamp and demotes the previous `latest` row. Lookup rows are not
//! tied to a page and are replaced in place.

use std::sync::Arc;

use serde_json::{Map, Value as JsonValue};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::info;

use crate::schema::{Schema, SchemaColumn};
use crate::types::ColumnType;
use crate::{Error, Result};

/// Input for one row: column label to a string, or an array of strings for
/// multi-valued columns.
pub type RowData = Map<String, JsonValue>;

enum Cell {
    Single(String),
    Multi(Vec<String>),
}

fn scalar(label: &str, value: &JsonValue) -> Result<String> {
    match value {
        JsonValue::Null => Ok(String::new()),
        JsonValue::String(s) => Ok(s.clone()),
        JsonValue::Number(n) => Ok(n.to_string()),
        JsonValue::Bool(b) => Ok(b.to_string()),
        _ => Err(Error::Validation(format!(
            "column {label} expects a single value"
        ))),
    }
}

/// Validate `data` against the enabled columns of `schema`.
fn prepare(schema: &Schema, data: &RowData) -> Result<Vec<(SchemaColumn, Cell)>> {
    if let Some(unknown) = data.keys().find(|label| schema.find_column(label).is_none()) {
        return Err(Error::Validation(format!(
            "schema {} has no column {unknown}",
            schema.name()
        )));
    }

    let mut cells = Vec::new();
    for column in schema.columns() {
        let input = data
            .iter()
            .find(|(label, _)| label.eq_ignore_ascii_case(column.label()))
            .map(|(_, value)| value);
        let kind = column.column_type();
        let cell = if column.is_multi() {
            let raw = match input {
                None | Some(JsonValue::Null) => Vec::new(),
                Some(JsonValue::Array(items)) => items
                    .iter()
                    .map(|v| scalar(column.label(), v))
                    .collect::<Result<Vec<_>>>()?,
                Some(other) => vec![scalar(column.label(), other)?],
            };
            let values = raw
                .iter()
                .filter(|v| !v.trim().is_empty())
                .map(|v| kind.validate(v))
                .collect::<Result<Vec<_>>>()?;
            Cell::Multi(values)
        } else {
            let raw = input.map(|v| scalar(column.label(), v)).transpose()?;
            match raw {
                Some(v) if !v.trim().is_empty() => Cell::Single(kind.validate(&v)?),
                _ => Cell::Single(String::new()),
            }
        };
        cells.push((column.clone(), cell));
    }
    Ok(cells)
}

async fn insert_row(
    tx: &mut Transaction<'_, Sqlite>,
    schema: &Schema,
    (pid, rid, rev): (&str, i64, i64),
    cells: &[(SchemaColumn, Cell)],
) -> Result<()> {
    let mut names = vec!["pid", "rid", "rev", "latest"]
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    let mut singles = Vec::new();
    for (column, cell) in cells {
        if let Cell::Single(value) = cell {
            names.push(column.data_column());
            singles.push(value.as_str());
        }
    }
    let placeholders = (1..=names.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!(
        "INSERT OR REPLACE INTO {} ({}) VALUES ({placeholders})",
        schema.data_table(),
        names.join(", ")
    );
    let mut query = sqlx::query(&sql).bind(pid).bind(rid).bind(rev).bind(1_i64);
    for value in singles {
        query = query.bind(value);
    }
    query.execute(&mut **tx).await?;

    let multi_sql = format!(
        "INSERT INTO {} (latest, rev, pid, rid, colref, row, value) \
         VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6)",
        schema.multi_table()
    );
    for (column, cell) in cells {
        let Cell::Multi(values) = cell else {
            continue;
        };
        for (row, value) in values.iter().enumerate() {
            sqlx::query(&multi_sql)
                .bind(rev)
                .bind(pid)
                .bind(rid)
                .bind(column.colref() as i64)
                .bind(row as i64 + 1)
                .bind(value)
                .execute(&mut **tx)
                .await?;
        }
    }
    Ok(())
}

/// Data of one page in one schema at one revision timestamp.
#[derive(Debug, Clone)]
pub struct AccessTablePage {
    schema: Arc<Schema>,
    pid: String,
    ts: i64,
}

impl AccessTablePage {
    pub const DEFAULT_PAGE_RID: i64 = 0;

    pub fn new(schema: Arc<Schema>, pid: &str, ts: i64) -> Self {
        Self {
            schema,
            pid: pid.to_string(),
            ts,
        }
    }

    /// Store `data` as the page's current revision.
    pub async fn save_data(&self, pool: &SqlitePool, data: &RowData) -> Result<()> {
        if self.ts == 0 {
            return Err(Error::Validation(
                "saving with a zero timestamp does not work".to_string(),
            ));
        }
        let cells = prepare(&self.schema, data)?;

        let mut tx = pool.begin().await?;
        for table in [self.schema.data_table(), self.schema.multi_table()] {
            sqlx::query(&format!(
                "UPDATE {table} SET latest = 0 WHERE latest = 1 AND pid = ?1 AND rid = 0"
            ))
            .bind(&self.pid)
            .execute(&mut *tx)
            .await?;
        }
        sqlx::query(&format!(
            "DELETE FROM {} WHERE pid = ?1 AND rid = 0 AND rev = ?2",
            self.schema.multi_table()
        ))
        .bind(&self.pid)
        .bind(self.ts)
        .execute(&mut *tx)
        .await?;

        insert_row(
            &mut tx,
            &self.schema,
            (&self.pid, Self::DEFAULT_PAGE_RID, self.ts),
            &cells,
        )
        .await?;
        tx.commit().await?;

        info!(schema = self.schema.name(), pid = %self.pid, rev = self.ts, "saved page data");
        Ok(())
    }

    /// Save an empty data set, removing the page's values from searches.
    pub async fn clear_data(&self, pool: &SqlitePool) -> Result<()> {
        self.save_data(pool, &RowData::new()).await
    }

    /// Newest stored revision of the page not newer than the access timestamp.
    pub async fn last_revision_timestamp(&self, pool: &SqlitePool) -> Result<Option<i64>> {
        let sql = format!(
            "SELECT rev FROM {} WHERE pid = ?1 AND rev > 0 AND (?2 = 0 OR rev <= ?2) \
             ORDER BY rev DESC LIMIT 1",
            self.schema.data_table()
        );
        Ok(sqlx::query_scalar(&sql)
            .bind(&self.pid)
            .bind(self.ts)
            .fetch_optional(pool)
            .await?)
    }
}

/// Rows of a lookup schema, addressed by row id.
#[derive(Debug, Clone)]
pub struct AccessTableLookup {
    schema: Arc<Schema>,
}

impl AccessTableLookup {
    pub fn new(schema: Arc<Schema>) -> Result<Self> {
        if !schema.is_lookup() {
            return Err(Error::config(format!(
                "schema {} is not a lookup schema",
                schema.name()
            )));
        }
        Ok(Self { schema })
    }

    /// Insert a new row (`rid` = `None`) or replace an existing one.
    /// Returns the row id.
    pub async fn save_row(&self, pool: &SqlitePool, rid: Option<i64>, data: &RowData) -> Result<i64> {
        let cells = prepare(&self.schema, data)?;
        let mut tx = pool.begin().await?;

        let rid = match rid {
            Some(rid) if rid > 0 => rid,
            Some(rid) => return Err(Error::Validation(format!("invalid row id {rid}"))),
            None => {
                let max: i64 = sqlx::query_scalar(&format!(
                    "SELECT COALESCE(MAX(rid), 0) FROM {}",
                    self.schema.data_table()
                ))
                .fetch_one(&mut *tx)
                .await?;
                max + 1
            }
        };
        self.delete_in(&mut tx, rid).await?;
        insert_row(&mut tx, &self.schema, ("", rid, 0), &cells).await?;
        tx.commit().await?;

        info!(schema = self.schema.name(), rid, "saved lookup row");
        Ok(rid)
    }

    pub async fn delete_row(&self, pool: &SqlitePool, rid: i64) -> Result<()> {
        let mut tx = pool.begin().await?;
        self.delete_in(&mut tx, rid).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete_in(&self, tx: &mut Transaction<'_, Sqlite>, rid: i64) -> Result<()> {
        for table in [self.schema.data_table(), self.schema.multi_table()] {
            sqlx::query(&format!("DELETE FROM {table} WHERE pid = '' AND rid = ?1"))
                .bind(rid)
                .execute(&mut **tx)
                .await?;
        }
        Ok(())
    }
}
