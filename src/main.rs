use anyhow::{Context, Result};
use clap::Parser;
use std::io::{IsTerminal, Read, Write};
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use unicode_width::UnicodeWidthStr;

mod batch;
mod cli;
mod client;
mod config;
mod error;
mod export;
mod session;
mod table;
mod util;

use crate::batch::RunnerConfig;
use crate::cli::{Command, EnvCommand, QueryArgs, RootArgs};
use crate::client::{HttpQueryClient, QueryField};
use crate::config::{resolve_store_path, Endpoints, FileStore};
use crate::session::Session;
use crate::table::{find_column, ResultTable, SortDirection, COLUMNS};
use crate::util::ThreadSleep;

const LOG_ENV_VAR: &str = "CASE_QUERY_LOG";

fn main() -> Result<()> {
    let args = RootArgs::parse();
    init_tracing(args.verbose);

    let store_path = resolve_store_path(args.store.as_deref())?;
    let mut store = FileStore::new(store_path);
    tracing::debug!(store = %store.path().display(), "using key-value store");

    match args.command {
        Command::Query(query) => run_query(&store, query),
        Command::Env(EnvCommand::Show) => {
            let session = open_session(&store, RunnerConfig::default())?;
            println!("{} {}", session.environment(), session.backend().url());
            Ok(())
        }
        Command::Env(EnvCommand::Set { environment }) => {
            let mut session = open_session(&store, RunnerConfig::default())?;
            session
                .set_environment(&mut store, environment)
                .with_context(|| format!("save environment to {}", store.path().display()))?;
            notify(Notice::Success, &format!("environment set to {environment}"));
            Ok(())
        }
        Command::Fields => {
            for field in QueryField::ALL {
                println!("{}\t{}", field.key(), field.label());
            }
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .try_init();
}

fn open_session(
    store: &FileStore,
    runner: RunnerConfig,
) -> Result<Session<HttpQueryClient, ThreadSleep>> {
    Ok(Session::open(store, Endpoints::from_env(), ThreadSleep, runner)?)
}

fn run_query(store: &FileStore, args: QueryArgs) -> Result<()> {
    // Reject bad sort keys before spending a whole batch run.
    for key in &args.sort {
        find_column(key)?;
    }

    let mut runner = RunnerConfig::with_pacing(Duration::from_millis(args.pacing_ms));
    runner.retry_budget = args.retries;
    let mut session = open_session(store, runner)?;
    notify(
        Notice::Info,
        &session.status_line(&format!("querying {}", session.backend().url())),
    );

    let raw_input = read_items(&args)?;
    let show_progress = std::io::stderr().is_terminal();
    let outcome = session
        .run_batch(args.field, &raw_input, |done, total| {
            if show_progress {
                eprint!("\rquerying... {done}/{total}");
                let _ = std::io::stderr().flush();
            }
        })
        .map(|_| ());
    if show_progress {
        eprintln!();
    }
    outcome?;

    for key in &args.sort {
        session.resort(key)?;
    }

    let table = session.table();
    if args.copy {
        match session.copy_text() {
            Ok(text) => println!("{text}"),
            Err(err) => notify(Notice::Error, &err.to_string()),
        }
    } else if args.json {
        let text = serde_json::to_string_pretty(table.records())?;
        println!("{text}");
    } else {
        print_table(table);
    }

    if let Some(format) = args.export {
        let date = chrono::Utc::now().date_naive();
        match session.export(format, &args.out_dir, date) {
            Ok(path) => notify(Notice::Success, &format!("exported {}", path.display())),
            // Export problems abort only the export.
            Err(err) => notify(Notice::Error, &err.to_string()),
        }
    }

    notify(
        Notice::Info,
        &session.status_line(&format!("{} results", table.len())),
    );
    Ok(())
}

fn read_items(args: &QueryArgs) -> Result<String> {
    if !args.items.is_empty() {
        return Ok(args.items.join("\n"));
    }
    if let Some(path) = &args.input {
        return std::fs::read_to_string(path)
            .with_context(|| format!("read items from {}", path.display()));
    }
    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .context("read items from stdin")?;
    Ok(text)
}

#[derive(Debug, Clone, Copy)]
enum Notice {
    Info,
    Success,
    Error,
}

/// Operator-facing notification on stderr; stdout stays reserved for data.
fn notify(kind: Notice, message: &str) {
    let tag = match kind {
        Notice::Info => "info",
        Notice::Success => "ok",
        Notice::Error => "error",
    };
    eprintln!("[{tag}] {message}");
}

fn print_table(table: &ResultTable) {
    for line in render_table(table) {
        println!("{line}");
    }
}

/// Header plus one line per row, padded to terminal display width.
fn render_table(table: &ResultTable) -> Vec<String> {
    let sort = table.sort_spec();
    let header: Vec<String> = COLUMNS
        .iter()
        .map(|col| {
            if col.key != sort.key {
                return col.label.to_string();
            }
            match sort.direction {
                SortDirection::Ascending => format!("{} ▲", col.label),
                SortDirection::Descending => format!("{} ▼", col.label),
            }
        })
        .collect();
    let rows = table.rows();

    let mut widths: Vec<usize> = header.iter().map(|cell| cell.width()).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.width());
        }
    }

    let render = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| {
                let pad = width.saturating_sub(cell.width());
                format!("{cell}{}", " ".repeat(pad))
            })
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut lines = vec![render(&header)];
    lines.extend(rows.iter().map(|row| render(row)));
    lines
}
