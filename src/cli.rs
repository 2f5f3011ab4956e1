//! CLI argument parsing for the batch query tool.
//!
//! One subcommand per operator action; all policy stays in the session and
//! runner.
use crate::client::QueryField;
use crate::config::Environment;
use crate::export::ExportFormat;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "cq",
    version,
    about = "Batch lookups against the case-management query API",
    after_help = "Examples:\n  cq query --field policy-number P001 P002\n  cq query --field receipt-number --input ids.txt --sort policyNumber --export csv\n  pbpaste | cq query --field apply-number --copy\n  cq env set PROD",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    /// Key-value store holding euisToken and kqt_environment
    #[arg(long, global = true, value_name = "PATH")]
    pub store: Option<PathBuf>,

    /// Log attempts and retries to stderr
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Query(QueryArgs),
    #[command(subcommand)]
    Env(EnvCommand),
    /// List the fields a batch can search on
    Fields,
}

/// Batch query inputs.
#[derive(Parser, Debug)]
#[command(about = "Run a sequential batch query and show the results")]
pub struct QueryArgs {
    /// Field the items are looked up by (e.g. policy-number, insuredId)
    #[arg(long, value_name = "FIELD", default_value = "receipt-number", value_parser = parse_field)]
    pub field: QueryField,

    /// Read items from a file (newline or comma separated)
    #[arg(long, value_name = "PATH", conflicts_with = "items")]
    pub input: Option<PathBuf>,

    /// Items to query; stdin is read when neither items nor --input are given
    #[arg(value_name = "ITEM")]
    pub items: Vec<String>,

    /// Column key or label to sort by; repeat a key to flip its direction
    #[arg(long, value_name = "KEY")]
    pub sort: Vec<String>,

    /// Print tab-separated text for pasting into a spreadsheet
    #[arg(long, conflicts_with = "json")]
    pub copy: bool,

    /// Print the result rows as JSON
    #[arg(long)]
    pub json: bool,

    /// Also write a dated export file (csv, json, html, xlsx)
    #[arg(long, value_name = "FORMAT", value_parser = parse_format)]
    pub export: Option<ExportFormat>,

    /// Directory for export files
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub out_dir: PathBuf,

    /// Pause after every item, in milliseconds (retries wait twice as long)
    #[arg(long, value_name = "MS", default_value_t = 300)]
    pub pacing_ms: u64,

    /// Attempts per item before it is recorded as failed
    #[arg(long, value_name = "N", default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
    pub retries: u32,
}

#[derive(Subcommand, Debug)]
pub enum EnvCommand {
    /// Show the active environment and its endpoint
    Show,
    /// Switch environments and persist the choice
    Set {
        #[arg(value_name = "ENV", value_parser = parse_environment)]
        environment: Environment,
    },
}

fn parse_field(value: &str) -> Result<QueryField, String> {
    value.parse().map_err(|err: crate::error::QueryError| err.to_string())
}

fn parse_environment(value: &str) -> Result<Environment, String> {
    value.parse().map_err(|err: crate::error::QueryError| err.to_string())
}

fn parse_format(value: &str) -> Result<ExportFormat, String> {
    value.parse()
}
