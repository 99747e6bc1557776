//! Struct search - query engine for typed, tabular page data
//!
//! Pages carry structured data in user-defined schemas. This crate provides:
//! - Schemas with typed, single or multi-valued columns and pseudo columns
//! - A search engine translating aggregations into one parameterized
//!   SQLite statement, plus a paging independent row count
//! - Typed result values
//! - SQLite storage: system table migrations, schema registry, write path
//!
//! # Flow
//!
//! ```text
//! AggregationConfig --> Search (schemas, columns, filters, sorts, paging)
//!                          |
//!                    QueryBuilder --> SQL + binds --> Storage
//!                          |
//!                    rows of Value
//! ```

#![allow(clippy::type_complexity)]

pub mod aggregation;
pub mod error;
pub mod permission;
pub mod query_builder;
pub mod schema;
pub mod search;
pub mod settings;
pub mod storage;
pub mod types;
pub mod value;

pub use aggregation::{AggregationConfig, DynamicParameters, FilterContext};
pub use error::{Error, Result};
pub use permission::{AllowAll, NamespaceAcl, PermissionFilter};
pub use query_builder::QueryBuilder;
pub use schema::{Schema, SchemaDefinition, SchemaRegistry};
pub use search::{Comparator, FilterValue, QueryColumn, Search};
pub use settings::SearchSettings;
pub use storage::{SqliteSchemaRegistry, SqliteStorage, Storage};
pub use value::{Value, ValueData};
