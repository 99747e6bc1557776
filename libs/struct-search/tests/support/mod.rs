pub mod fixtures;

use std::sync::Arc;

use anyhow::Context as _;
use serde_json::Value as JsonValue;
use struct_search::schema::SchemaDefinition;
use struct_search::storage::{AccessTablePage, PageMeta, RowData, TitlesRepository};
use struct_search::{Schema, Search, SearchSettings, SqliteSchemaRegistry, SqliteStorage, Value};

pub use fixtures::*;

/// A migrated in-memory database with the registry and titles on top.
pub struct TestDb {
    pub storage: SqliteStorage,
    pub registry: SqliteSchemaRegistry,
    pub titles: TitlesRepository,
}

impl TestDb {
    pub async fn new() -> anyhow::Result<Self> {
        let storage = SqliteStorage::in_memory()
            .await
            .context("open in-memory database")?;
        storage.migrate().await.context("run migrations")?;
        let registry = SqliteSchemaRegistry::new(storage.pool().clone());
        let titles = TitlesRepository::new(storage.pool().clone());
        Ok(Self {
            storage,
            registry,
            titles,
        })
    }

    /// A database holding both search fixture schemas and their data.
    pub async fn seeded() -> anyhow::Result<Self> {
        let db = Self::new().await?;
        seed_search_fixture(&db).await?;
        Ok(db)
    }

    pub async fn import_schema(&self, json: JsonValue) -> anyhow::Result<Arc<Schema>> {
        let definition: SchemaDefinition = serde_json::from_value(json)?;
        Ok(self.registry.save_schema(definition, "admin").await?)
    }

    pub async fn schema(&self, name: &str) -> anyhow::Result<Arc<Schema>> {
        Ok(self.registry.require_schema(name).await?)
    }

    pub async fn save_page(
        &self,
        schema: &str,
        pid: &str,
        ts: i64,
        data: JsonValue,
    ) -> anyhow::Result<()> {
        let schema = self.schema(schema).await?;
        AccessTablePage::new(schema, pid, ts)
            .save_data(self.storage.pool(), &row(data))
            .await?;
        Ok(())
    }

    pub async fn set_meta(&self, meta: PageMeta) -> anyhow::Result<()> {
        Ok(self.titles.upsert(&meta).await?)
    }

    /// A search over the given `name` or `name alias` entries.
    pub async fn search(&self, schemas: &[&str]) -> anyhow::Result<Search> {
        let mut search = Search::new(SearchSettings::default());
        for entry in schemas {
            let mut parts = entry.split_whitespace();
            let name = parts.next().context("empty schema entry")?;
            search.add_schema(self.schema(name).await?, parts.next())?;
        }
        Ok(search)
    }
}

/// JSON object to row input.
pub fn row(data: JsonValue) -> RowData {
    match data {
        JsonValue::Object(map) => map,
        _ => RowData::new(),
    }
}

/// Raw value of a single cell, empty string for empty cells.
pub fn single(value: &Value) -> String {
    value.raw_values().first().map(|s| s.to_string()).unwrap_or_default()
}

/// Raw values of a multi-valued cell.
pub fn multi(value: &Value) -> Vec<String> {
    value.raw_values().into_iter().map(str::to_string).collect()
}

/// First cell of every row.
pub fn first_cells(rows: &[Vec<Value>]) -> Vec<String> {
    rows.iter().map(|r| single(&r[0])).collect()
}
