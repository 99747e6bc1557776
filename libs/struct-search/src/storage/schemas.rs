use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use crate::schema::{Schema, SchemaColumn, SchemaDefinition, SchemaRegistry};
use crate::types::{ColumnType, TypeKind};
use crate::{Error, Result};

/// Schema registry persisted in the `schemas`/`schema_cols` tables.
///
/// Every save stores a new version; loading returns the newest one.
#[derive(Debug, Clone)]
pub struct SqliteSchemaRegistry {
    pool: SqlitePool,
}

impl SqliteSchemaRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store a new version of a schema and create or extend its tables.
    pub async fn save_schema(&self, definition: SchemaDefinition, user: &str) -> Result<Arc<Schema>> {
        let definition = match self.load_schema(&definition.schema).await? {
            Some(current) => definition.aligned_with(&current),
            None => definition,
        };
        let schema = definition.into_schema()?;
        let ts = Utc::now().timestamp();

        let mut tx = self.pool.begin().await?;

        let sid: i64 = sqlx::query_scalar(
            "INSERT INTO schemas (tbl, ts, islookup, user) VALUES (?1, ?2, ?3, ?4) RETURNING id",
        )
        .bind(schema.name())
        .bind(ts)
        .bind(schema.is_lookup())
        .bind(user)
        .fetch_one(&mut *tx)
        .await?;

        for col in schema.all_columns() {
            let config = col.column_type().config_json()?.to_string();
            sqlx::query(
                "INSERT INTO schema_cols (sid, colref, enabled, label, ismulti, class, config) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )
            .bind(sid)
            .bind(col.colref() as i64)
            .bind(col.is_enabled())
            .bind(col.label())
            .bind(col.is_multi())
            .bind(col.column_type().class())
            .bind(config)
            .execute(&mut *tx)
            .await?;
        }

        // schema names are validated, safe to use as identifiers
        let data = schema.data_table();
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {data} (\
             pid TEXT NOT NULL DEFAULT '', \
             rid INTEGER NOT NULL DEFAULT 0, \
             rev INTEGER NOT NULL DEFAULT 0, \
             latest INTEGER NOT NULL DEFAULT 0, \
             PRIMARY KEY (pid, rid, rev))"
        ))
        .execute(&mut *tx)
        .await?;
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {} (\
             colref INTEGER NOT NULL, \
             pid TEXT NOT NULL DEFAULT '', \
             rid INTEGER NOT NULL DEFAULT 0, \
             rev INTEGER NOT NULL DEFAULT 0, \
             latest INTEGER NOT NULL DEFAULT 0, \
             row INTEGER NOT NULL, \
             value TEXT, \
             PRIMARY KEY (colref, pid, rid, rev, row))",
            schema.multi_table()
        ))
        .execute(&mut *tx)
        .await?;

        let existing: HashSet<String> =
            sqlx::query_scalar("SELECT name FROM pragma_table_info(?1)")
                .bind(&data)
                .fetch_all(&mut *tx)
                .await?
                .into_iter()
                .collect();
        for col in schema.all_columns() {
            let name = col.data_column();
            if !existing.contains(&name) {
                sqlx::query(&format!(
                    "ALTER TABLE {data} ADD COLUMN {name} TEXT NOT NULL DEFAULT ''"
                ))
                .execute(&mut *tx)
                .await?;
                debug!(table = %data, column = %name, "added data column");
            }
        }

        tx.commit().await?;
        info!(schema = schema.name(), sid, columns = schema.all_columns().len(), "saved schema");

        Ok(Arc::new(schema.with_version(sid, ts)))
    }

    /// Like [`SchemaRegistry::load_schema`] but failing for unknown schemas.
    pub async fn require_schema(&self, name: &str) -> Result<Arc<Schema>> {
        self.load_schema(name)
            .await?
            .ok_or_else(|| Error::SchemaNotFound(name.to_string()))
    }

    /// Mark schema `tbl` as assigned to page `pid`.
    pub async fn assign(&self, pid: &str, tbl: &str) -> Result<()> {
        self.require_schema(tbl).await?;
        sqlx::query(
            "INSERT INTO schema_assignments (pid, tbl, assigned) VALUES (?1, ?2, 1) \
             ON CONFLICT (pid, tbl) DO UPDATE SET assigned = 1",
        )
        .bind(pid)
        .bind(tbl)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Withdraw an assignment; stored data stays but no longer matches searches.
    pub async fn unassign(&self, pid: &str, tbl: &str) -> Result<()> {
        sqlx::query("UPDATE schema_assignments SET assigned = 0 WHERE pid = ?1 AND tbl = ?2")
            .bind(pid)
            .bind(tbl)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Names of all stored schemas.
    pub async fn schema_names(&self) -> Result<Vec<String>> {
        Ok(
            sqlx::query_scalar("SELECT DISTINCT tbl FROM schemas ORDER BY tbl")
                .fetch_all(&self.pool)
                .await?,
        )
    }
}

#[async_trait]
impl SchemaRegistry for SqliteSchemaRegistry {
    async fn load_schema(&self, name: &str) -> Result<Option<Arc<Schema>>> {
        let Some(head) = sqlx::query(
            "SELECT id, ts, islookup FROM schemas WHERE tbl = ?1 ORDER BY id DESC LIMIT 1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let sid: i64 = head.try_get("id")?;
        let ts: i64 = head.try_get("ts")?;
        let lookup: bool = head.try_get("islookup")?;

        let mut schema = Schema::new(name, lookup)?.with_version(sid, ts);
        let cols = sqlx::query(
            "SELECT colref, enabled, label, ismulti, class, config \
             FROM schema_cols WHERE sid = ?1 ORDER BY colref",
        )
        .bind(sid)
        .fetch_all(&self.pool)
        .await?;

        for row in cols {
            let colref: i64 = row.try_get("colref")?;
            let label: String = row.try_get("label")?;
            let class: String = row.try_get("class")?;
            let config: String = row.try_get("config")?;
            let config: JsonValue = serde_json::from_str(&config)?;

            let mut column = SchemaColumn::new(
                name,
                usize::try_from(colref)
                    .map_err(|_| Error::Decode(format!("negative colref {colref} in {name}")))?,
                &label,
                row.try_get("ismulti")?,
                TypeKind::from_class(&class, &config)?,
            );
            if !row.try_get::<bool, _>("enabled")? {
                column = column.disabled();
            }
            schema.push_column(column);
        }

        Ok(Some(Arc::new(schema)))
    }

    async fn assigned_schemas(&self, pid: &str) -> Result<Vec<String>> {
        Ok(sqlx::query_scalar(
            "SELECT tbl FROM schema_assignments WHERE pid = ?1 AND assigned = 1 ORDER BY tbl",
        )
        .bind(pid)
        .fetch_all(&self.pool)
        .await?)
    }
}
