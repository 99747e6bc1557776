//! struct-search - command-line front end
//!
//! Manages schemas, assignments and page data in a SQLite database and runs
//! aggregation configs against it.

mod commands;
mod config;
mod logging;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::config::Config;

#[derive(Debug, Parser)]
#[command(name = "struct-search", version, about = "Query structured data attached to pages")]
struct Cli {
    /// Configuration file (defaults to ./struct-search.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database URL, overrides the configuration
    #[arg(long, global = true)]
    database: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create or upgrade the database tables
    Migrate,

    /// Schema management
    #[command(subcommand)]
    Schema(SchemaCommand),

    /// Assign a schema to a page
    Assign { pid: String, schema: String },

    /// Withdraw a schema assignment from a page
    Unassign { pid: String, schema: String },

    /// Store a new revision of a page's data from a JSON object
    SavePage {
        schema: String,
        pid: String,
        /// JSON file mapping column labels to values
        data: PathBuf,
        /// Revision timestamp, defaults to now
        #[arg(long)]
        rev: Option<i64>,
    },

    /// Lookup row management
    #[command(subcommand)]
    Lookup(LookupCommand),

    /// Record page metadata used by the %title%, %lasteditor%, %lastsummary%
    /// and %lastupdate% columns
    PageMeta {
        pid: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, default_value = "")]
        editor: String,
        #[arg(long, default_value = "")]
        summary: String,
        /// Revision timestamp, defaults to now
        #[arg(long)]
        rev: Option<i64>,
    },

    /// Run an aggregation config and print the result
    Query {
        /// JSON aggregation config
        aggregation: PathBuf,
        /// Page the aggregation is shown on, used for $ID$, $NS$ and $PAGE$
        #[arg(long, default_value = "")]
        page: String,
        /// Reader, used for $USER$
        #[arg(long, default_value = "")]
        user: String,
        /// Namespaces the reader may see; unrestricted when omitted
        #[arg(long = "readable", value_name = "NAMESPACE")]
        readable: Vec<String>,
        #[arg(long, value_enum, default_value_t = commands::OutputFormat::Table)]
        format: commands::OutputFormat,
        /// JSON file with reader supplied filters, sort and offset
        #[arg(long)]
        dynamic: Option<PathBuf>,
        /// Print a tag cloud of the first column: each value with its row count
        #[arg(long)]
        cloud: bool,
        /// Print the generated SQL instead of running it
        #[arg(long)]
        sql: bool,
    },
}

#[derive(Debug, Subcommand)]
enum SchemaCommand {
    /// Import a schema definition (a new version when the schema exists)
    Import {
        file: PathBuf,
        #[arg(long, default_value = "cli")]
        user: String,
    },
    /// Print the current definition of a schema
    Export { name: String },
    /// List stored schemas
    List,
}

#[derive(Debug, Subcommand)]
enum LookupCommand {
    /// Insert a row, or replace row `--rid`
    Save {
        schema: String,
        data: PathBuf,
        #[arg(long)]
        rid: Option<i64>,
    },
    /// Delete a row
    Delete { schema: String, rid: i64 },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(url) = cli.database {
        config.database.url = url;
    }
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {e}"))?;

    let _logging_guard =
        logging::init_logging(&config.logging).context("Failed to initialize logging")?;

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        database = %config.database.url,
        "Starting struct-search"
    );

    let auto_migrate = !matches!(cli.command, Command::Migrate);
    let ctx = commands::Context::connect(&config, auto_migrate).await?;

    match cli.command {
        Command::Migrate => commands::migrate(&ctx).await,
        Command::Schema(SchemaCommand::Import { file, user }) => {
            commands::import_schema(&ctx, &file, &user).await
        }
        Command::Schema(SchemaCommand::Export { name }) => commands::export_schema(&ctx, &name).await,
        Command::Schema(SchemaCommand::List) => commands::list_schemas(&ctx).await,
        Command::Assign { pid, schema } => commands::assign(&ctx, &pid, &schema).await,
        Command::Unassign { pid, schema } => commands::unassign(&ctx, &pid, &schema).await,
        Command::SavePage {
            schema,
            pid,
            data,
            rev,
        } => commands::save_page(&ctx, &schema, &pid, &data, rev).await,
        Command::Lookup(LookupCommand::Save { schema, data, rid }) => {
            commands::save_lookup_row(&ctx, &schema, &data, rid).await
        }
        Command::Lookup(LookupCommand::Delete { schema, rid }) => {
            commands::delete_lookup_row(&ctx, &schema, rid).await
        }
        Command::PageMeta {
            pid,
            title,
            editor,
            summary,
            rev,
        } => commands::page_meta(&ctx, pid, title, editor, summary, rev).await,
        Command::Query {
            aggregation,
            page,
            user,
            readable,
            format,
            dynamic,
            cloud,
            sql,
        } => {
            let options = commands::QueryOptions {
                page,
                user,
                readable,
                format,
                dynamic,
                cloud,
                sql_only: sql,
            };
            commands::query(&ctx, &aggregation, options).await
        }
    }
}
