//! Error types for the struct search engine

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Bad input supplied by the author of an aggregation (comparator,
    /// combinator, alias, paging bounds, value list syntax, ...).
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Schema not found: {0}")]
    SchemaNotFound(String),

    #[error("Query builder error: {0}")]
    QueryBuilder(String),

    #[error("Malformed stored value: {0}")]
    Decode(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True for errors raised by bad aggregation input rather than by storage.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_) | Self::SchemaNotFound(_))
    }
}
