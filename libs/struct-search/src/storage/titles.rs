use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use crate::Result;

/// Page metadata the pseudo columns read from the `titles` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct PageMeta {
    pub pid: String,
    pub title: Option<String>,
    /// Unix timestamp of the current page revision.
    pub lastrev: i64,
    pub lasteditor: String,
    pub lastsummary: String,
}

#[derive(Debug, Clone)]
pub struct TitlesRepository {
    pool: SqlitePool,
}

impl TitlesRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn upsert(&self, meta: &PageMeta) -> Result<()> {
        sqlx::query(
            "INSERT INTO titles (pid, title, lastrev, lasteditor, lastsummary) \
             VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT (pid) DO UPDATE SET \
             title = excluded.title, lastrev = excluded.lastrev, \
             lasteditor = excluded.lasteditor, lastsummary = excluded.lastsummary",
        )
        .bind(&meta.pid)
        .bind(&meta.title)
        .bind(meta.lastrev)
        .bind(&meta.lasteditor)
        .bind(&meta.lastsummary)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, pid: &str) -> Result<Option<PageMeta>> {
        Ok(sqlx::query_as::<_, PageMeta>(
            "SELECT pid, title, lastrev, lasteditor, lastsummary FROM titles WHERE pid = ?1",
        )
        .bind(pid)
        .fetch_optional(&self.pool)
        .await?)
    }
}
