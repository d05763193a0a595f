//! kiln-load: Load JSON or CSV data into a SQLite table
//!
//! Usage:
//!   # Load a JSON array (or single object), creating the table if needed
//!   kiln-load orders.json --database shop.db --table orders
//!
//!   # Upsert NDJSON from stdin by key
//!   cat events.jsonl | kiln-load --ndjson --database app.db --table events --keys id
//!
//!   # Load the first CSV in ./exports whose name contains "sales"
//!   kiln-load exports/sales --csv --database shop.db --table sales --recreate

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::Parser;
use kiln::{read_documents, Etl, EtlConfig, LoadOptions, SqliteDatabase};
use std::fs::File;
use std::io::{stdin, Read};
use std::path::Path;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "kiln-load")]
#[command(about = "Load JSON or CSV data into a SQLite table", long_about = None)]
struct Args {
    /// Input file (use stdin if omitted); with --csv, a directory and name fragment
    #[arg(value_name = "FILE")]
    input: Option<String>,

    /// SQLite database file
    #[arg(long, short = 'd')]
    database: String,

    /// Destination table
    #[arg(long, short = 't')]
    table: String,

    /// Process newline-delimited JSON (one JSON object per line)
    #[arg(long)]
    ndjson: bool,

    /// Read CSV instead of JSON
    #[arg(long, conflicts_with = "ndjson")]
    csv: bool,

    /// Comma-separated key columns for update-or-insert
    #[arg(long)]
    keys: Option<String>,

    /// Comma-separated key columns for nested tables (defaults to --keys)
    #[arg(long)]
    nested_keys: Option<String>,

    /// Empty the table before inserting
    #[arg(long)]
    truncate: bool,

    /// Drop and create the table before inserting
    #[arg(long)]
    recreate: bool,

    /// Type every column as TEXT
    #[arg(long)]
    force_text: bool,

    /// Keep list fields in the main table instead of splitting them out
    #[arg(long)]
    no_sublists: bool,

    /// JSON configuration file
    #[arg(long, short = 'c')]
    config: Option<String>,

    /// Hide the row-by-row progress bar
    #[arg(long)]
    no_progress: bool,

    /// Enable debug logging
    #[arg(long, short = 'v')]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = match &args.config {
        Some(path) => EtlConfig::from_json_file(path)?,
        None => EtlConfig::default(),
    };
    if args.no_progress {
        config.show_progress = false;
    }

    let mut etl = Etl::new(config);

    if args.csv {
        let input = args.input.as_deref().context("--csv needs a file name")?;
        let path = Path::new(input);
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .context("Invalid CSV file name")?;
        let directory = path.parent().filter(|dir| !dir.as_os_str().is_empty());
        etl.extract_csv(name, directory)?;
    } else {
        let reader: Box<dyn Read> = if let Some(file_path) = &args.input {
            Box::new(File::open(file_path).with_context(|| format!("Failed to open {}", file_path))?)
        } else {
            Box::new(stdin())
        };
        let ndjson = args.ndjson;
        etl.extract_json(|| read_documents(reader, ndjson), !args.no_sublists)?;
    }

    let options = LoadOptions {
        truncate: args.truncate,
        recreate: args.recreate,
        force_text: args.force_text,
        keys: args.keys.as_deref().map(split_list),
        nested_keys: args.nested_keys.as_deref().map(split_list),
    };

    let mut db = SqliteDatabase::open(&args.database)?;
    match etl.to_db(&args.table, &mut db, &options)? {
        Some(report) => println!("{}", serde_json::to_string_pretty(&report)?),
        None => info!("Nothing to load"),
    }

    Ok(())
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
