//! Bookstore walkthrough entry point.
//!
//! # Responsibility
//! - Wire a connection provider with the bookstore schema.
//! - Run the walkthrough and print each booklist as one JSON line.
//!
//! Usage: `tablepeer_cli [--db PATH] [--log-dir ABS_DIR] [--log-level LEVEL]`

use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tablepeer_core::bookstore::{apply_schema, run_walkthrough};
use tablepeer_core::{
    default_log_level, init_logging, DatabaseLocation, ProviderConfig, SqliteConnectionProvider,
};

const MEMORY_DATABASE_NAME: &str = "tablepeer-cli";

#[derive(Debug, Parser)]
#[command(name = "tablepeer_cli")]
#[command(about = "Runs the bookstore walkthrough and prints each booklist as JSON", long_about = None)]
struct Args {
    /// SQLite database file; an in-memory database is used when omitted.
    #[arg(long)]
    db: Option<PathBuf>,
    /// Absolute directory for rolling log files. Logging stays off without it.
    #[arg(long)]
    log_dir: Option<String>,
    #[arg(long)]
    log_level: Option<String>,
}

fn run(args: Args) -> Result<(), String> {
    if let Some(log_dir) = &args.log_dir {
        let level = args.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, log_dir)?;
    }

    let location = match args.db {
        Some(path) => DatabaseLocation::File(path),
        None => DatabaseLocation::Memory(MEMORY_DATABASE_NAME.to_string()),
    };
    let provider = SqliteConnectionProvider::new(ProviderConfig::single(location))
        .map_err(|err| err.to_string())?
        .with_bootstrap(apply_schema);

    let lists = run_walkthrough(Arc::new(provider)).map_err(|err| err.to_string())?;
    for list in &lists {
        let line = serde_json::to_string(list).map_err(|err| err.to_string())?;
        println!("{line}");
    }
    info!(
        "event=cli_done module=cli status=ok lists={} version={}",
        lists.len(),
        tablepeer_core::core_version()
    );
    Ok(())
}

fn main() -> ExitCode {
    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("tablepeer_cli: {err}");
            ExitCode::FAILURE
        }
    }
}
