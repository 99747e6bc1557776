//! Storage backends.
//!
//! The search engine only needs two read paths: rows of text cells in
//! projection order and a scalar count. [`SqliteStorage`] implements both
//! over a `sqlx` SQLite pool and owns the embedded migrations for the system
//! tables.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Arguments, Row, SqlitePool};
use tracing::info;

use crate::query_builder::BindValue;
use crate::Result;

mod access;
mod schemas;
mod titles;

pub use access::{AccessTableLookup, AccessTablePage, RowData};
pub use schemas::SqliteSchemaRegistry;
pub use titles::{PageMeta, TitlesRepository};

/// Read access used to execute searches.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Run `sql` and return every row as text cells in projection order.
    async fn fetch_rows(&self, sql: &str, binds: &[BindValue]) -> Result<Vec<Vec<Option<String>>>>;

    /// Run a statement returning a single integer.
    async fn fetch_count(&self, sql: &str, binds: &[BindValue]) -> Result<u64>;
}

/// SQLite storage with `REGEXP` support.
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open (creating if needed) the database at `url`.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .with_regexp();
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    /// A private in-memory database; lives as long as its single connection.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.with_regexp();
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create or update the system tables.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("struct search migrations applied");
        Ok(())
    }
}

/// Collect `binds` into positional SQLite arguments, `?1` first.
pub(crate) fn arguments(binds: &[BindValue]) -> Result<SqliteArguments<'_>> {
    let mut args = SqliteArguments::default();
    for value in binds {
        match value {
            BindValue::Text(v) => args.add(v.as_str()),
            BindValue::Integer(v) => args.add(*v),
        }
        .map_err(sqlx::Error::Encode)?;
    }
    Ok(args)
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn fetch_rows(&self, sql: &str, binds: &[BindValue]) -> Result<Vec<Vec<Option<String>>>> {
        let rows = sqlx::query_with(sql, arguments(binds)?)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                (0..row.len())
                    .map(|i| Ok(row.try_get_unchecked::<Option<String>, _>(i)?))
                    .collect::<Result<Vec<_>>>()
            })
            .collect()
    }

    async fn fetch_count(&self, sql: &str, binds: &[BindValue]) -> Result<u64> {
        let count = sqlx::query_scalar_with::<_, i64, _>(sql, arguments(binds)?)
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}
