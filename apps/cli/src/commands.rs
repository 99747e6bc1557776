//! Subcommand implementations.

use std::fs;
use std::io::{self, Write as _};
use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use chrono::Utc;
use clap::ValueEnum;
use serde_json::{json, Value as JsonValue};
use struct_search::schema::SchemaDefinition;
use struct_search::storage::{
    AccessTableLookup, AccessTablePage, PageMeta, RowData, TitlesRepository,
};
use struct_search::{
    AggregationConfig, DynamicParameters, FilterContext, NamespaceAcl, Search, SearchSettings,
    SqliteSchemaRegistry, SqliteStorage, Value,
};

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Tab separated, one header line
    Table,
    /// One JSON object with rows and count
    Json,
}

pub struct QueryOptions {
    pub page: String,
    pub user: String,
    pub readable: Vec<String>,
    pub format: OutputFormat,
    /// JSON file with the reader's filters, sort and offset
    pub dynamic: Option<std::path::PathBuf>,
    /// Tally the first column instead of listing rows
    pub cloud: bool,
    pub sql_only: bool,
}

/// Database handles shared by all commands.
pub struct Context {
    storage: SqliteStorage,
    registry: SqliteSchemaRegistry,
    settings: SearchSettings,
}

impl Context {
    /// Open the database, applying pending migrations when `migrate` is set.
    pub async fn connect(config: &Config, migrate: bool) -> anyhow::Result<Self> {
        let storage = SqliteStorage::connect(&config.database.url, config.database.max_connections)
            .await
            .with_context(|| format!("Failed to open database {}", config.database.url))?;
        if migrate {
            storage.migrate().await.context("Failed to run migrations")?;
        }
        let registry = SqliteSchemaRegistry::new(storage.pool().clone());
        Ok(Self {
            storage,
            registry,
            settings: config.search.clone(),
        })
    }
}

fn read_json(path: &Path) -> anyhow::Result<JsonValue> {
    let raw = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not valid JSON", path.display()))
}

fn read_row(path: &Path) -> anyhow::Result<RowData> {
    match read_json(path)? {
        JsonValue::Object(map) => Ok(map),
        _ => anyhow::bail!("{} must contain a JSON object", path.display()),
    }
}

fn now() -> i64 {
    Utc::now().timestamp()
}

pub async fn migrate(ctx: &Context) -> anyhow::Result<()> {
    ctx.storage.migrate().await?;
    println!("database is up to date");
    Ok(())
}

pub async fn import_schema(ctx: &Context, file: &Path, user: &str) -> anyhow::Result<()> {
    let definition: SchemaDefinition = serde_json::from_value(read_json(file)?)
        .with_context(|| format!("{} is not a schema definition", file.display()))?;
    let schema = ctx.registry.save_schema(definition, user).await?;
    println!(
        "saved schema {} version {} with {} columns",
        schema.name(),
        schema.id(),
        schema.columns().count()
    );
    Ok(())
}

pub async fn export_schema(ctx: &Context, name: &str) -> anyhow::Result<()> {
    let schema = ctx.registry.require_schema(name).await?;
    let definition = SchemaDefinition::from_schema(&schema)?;
    println!("{}", serde_json::to_string_pretty(&definition)?);
    Ok(())
}

pub async fn list_schemas(ctx: &Context) -> anyhow::Result<()> {
    for name in ctx.registry.schema_names().await? {
        println!("{name}");
    }
    Ok(())
}

pub async fn assign(ctx: &Context, pid: &str, schema: &str) -> anyhow::Result<()> {
    ctx.registry.assign(pid, schema).await?;
    tracing::info!(pid, schema, "assigned schema");
    Ok(())
}

pub async fn unassign(ctx: &Context, pid: &str, schema: &str) -> anyhow::Result<()> {
    ctx.registry.unassign(pid, schema).await?;
    tracing::info!(pid, schema, "unassigned schema");
    Ok(())
}

pub async fn save_page(
    ctx: &Context,
    schema: &str,
    pid: &str,
    data: &Path,
    rev: Option<i64>,
) -> anyhow::Result<()> {
    let schema = ctx.registry.require_schema(schema).await?;
    let row = read_row(data)?;
    AccessTablePage::new(schema, pid, rev.unwrap_or_else(now))
        .save_data(ctx.storage.pool(), &row)
        .await?;
    Ok(())
}

pub async fn save_lookup_row(
    ctx: &Context,
    schema: &str,
    data: &Path,
    rid: Option<i64>,
) -> anyhow::Result<()> {
    let schema = ctx.registry.require_schema(schema).await?;
    let row = read_row(data)?;
    let rid = AccessTableLookup::new(schema)?
        .save_row(ctx.storage.pool(), rid, &row)
        .await?;
    println!("{rid}");
    Ok(())
}

pub async fn delete_lookup_row(ctx: &Context, schema: &str, rid: i64) -> anyhow::Result<()> {
    let schema = ctx.registry.require_schema(schema).await?;
    AccessTableLookup::new(schema)?
        .delete_row(ctx.storage.pool(), rid)
        .await?;
    Ok(())
}

pub async fn page_meta(
    ctx: &Context,
    pid: String,
    title: Option<String>,
    lasteditor: String,
    lastsummary: String,
    rev: Option<i64>,
) -> anyhow::Result<()> {
    let meta = PageMeta {
        pid,
        title,
        lastrev: rev.unwrap_or_else(now),
        lasteditor,
        lastsummary,
    };
    TitlesRepository::new(ctx.storage.pool().clone())
        .upsert(&meta)
        .await?;
    Ok(())
}

pub async fn query(ctx: &Context, aggregation: &Path, options: QueryOptions) -> anyhow::Result<()> {
    let config: AggregationConfig = serde_json::from_value(read_json(aggregation)?)
        .with_context(|| format!("{} is not an aggregation config", aggregation.display()))?;
    let filter_context = FilterContext::new(&options.page, &options.user);
    let dynamic: DynamicParameters = match &options.dynamic {
        Some(path) => serde_json::from_value(read_json(path)?)
            .with_context(|| format!("{} is not a set of dynamic parameters", path.display()))?,
        None => DynamicParameters::default(),
    };

    let mut search = config
        .into_search_with(&ctx.registry, ctx.settings.clone(), &filter_context, &dynamic)
        .await?;
    if !options.readable.is_empty() {
        search = search.with_permission(Arc::new(NamespaceAcl::new(options.readable)));
    }

    if options.sql_only {
        let (sql, binds) = if options.cloud {
            search.build_cloud_query()?
        } else {
            search.build_query()?
        };
        println!("{sql}");
        for (n, value) in binds.iter().enumerate() {
            println!("-- ?{} = {value:?}", n + 1);
        }
        return Ok(());
    }

    if options.cloud {
        let tags = search.cloud(&ctx.storage).await?;
        tracing::info!(tags = tags.len(), "cloud finished");
        let mut out = io::stdout().lock();
        match options.format {
            OutputFormat::Table => {
                for (tag, count) in &tags {
                    writeln!(out, "{}\t{count}", tag.display())?;
                }
            }
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut out, &cloud_json(&tags))?;
                writeln!(out)?;
            }
        }
        return Ok(());
    }

    let rows = search.execute(&ctx.storage).await?;
    let count = search.count(&ctx.storage).await?;
    tracing::info!(rows = rows.len(), count, "query finished");

    let mut out = io::stdout().lock();
    match options.format {
        OutputFormat::Table => write_table(&mut out, &search, &rows, count)?,
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut out, &rows_json(&search, &rows, count))?;
            writeln!(out)?;
        }
    }
    Ok(())
}

fn write_table(
    out: &mut impl io::Write,
    search: &Search,
    rows: &[Vec<Value>],
    count: u64,
) -> io::Result<()> {
    let header = search
        .columns()
        .iter()
        .map(|c| c.full_label())
        .collect::<Vec<_>>()
        .join("\t");
    writeln!(out, "{header}")?;
    for row in rows {
        let line = row.iter().map(Value::display).collect::<Vec<_>>().join("\t");
        writeln!(out, "{line}")?;
    }
    writeln!(out, "# {} of {count} rows", rows.len())
}

/// Cell values as JSON: an array for multi-valued columns, a string otherwise.
fn cell_json(value: &Value) -> JsonValue {
    let raw = value.raw_values();
    if value.column().is_multi() {
        json!(raw)
    } else {
        json!(raw.first().copied().unwrap_or_default())
    }
}

/// Rows as JSON. Cells are positional, aligned with `columns`, since the
/// same column may be selected more than once.
fn rows_json(search: &Search, rows: &[Vec<Value>], count: u64) -> JsonValue {
    let columns = search
        .columns()
        .iter()
        .map(|c| c.full_label())
        .collect::<Vec<_>>();
    let rows = rows
        .iter()
        .enumerate()
        .map(|(n, row)| {
            json!({
                "pid": search.pids().get(n),
                "rid": search.rids().get(n),
                "rev": search.revs().get(n),
                "values": row.iter().map(cell_json).collect::<Vec<_>>(),
            })
        })
        .collect::<Vec<_>>();
    json!({ "count": count, "columns": columns, "rows": rows })
}

fn cloud_json(tags: &[(Value, u64)]) -> JsonValue {
    let tags = tags
        .iter()
        .map(|(tag, count)| json!({ "tag": tag.display(), "count": count }))
        .collect::<Vec<_>>();
    json!({ "tags": tags })
}

#[cfg(test)]
mod tests {
    use super::*;
    use struct_search::types::TypeKind;
    use struct_search::{Schema, ValueData};

    fn search_with_repeated_column() -> Search {
        let schema = Schema::new("schema1", false)
            .unwrap()
            .with_column("first", false, TypeKind::text())
            .with_column("second", true, TypeKind::text());
        let mut search = Search::default();
        search.add_schema(Arc::new(schema), None).unwrap();
        search.add_column("*");
        search.add_column("first");
        search
    }

    #[test]
    fn json_rows_keep_one_cell_per_column() {
        let search = search_with_repeated_column();
        let columns = search.columns().to_vec();
        assert_eq!(columns.len(), 3);

        let row = vec![
            Value::new(columns[0].clone(), ValueData::Single("a".into())),
            Value::new(columns[1].clone(), ValueData::Multi(vec!["x".into(), "y".into()])),
            Value::new(columns[2].clone(), ValueData::Single("a".into())),
        ];
        let out = rows_json(&search, &[row], 1);

        assert_eq!(out["columns"], json!(["schema1.first", "schema1.second", "schema1.first"]));
        assert_eq!(out["rows"][0]["values"], json!(["a", ["x", "y"], "a"]));
        assert_eq!(out["count"], 1);
    }

    #[test]
    fn table_output_ends_with_the_count() {
        let search = search_with_repeated_column();
        let mut out = Vec::new();
        write_table(&mut out, &search, &[], 7).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "schema1.first\tschema1.second\tschema1.first\n# 0 of 7 rows\n");
    }
}
