//! kiln-infer: Show the SQL column types a JSON input would be loaded with
//!
//! Prints one schema per table: the flattened main table under "main" and
//! every extracted list field under its own name.
//!
//! Usage:
//!   kiln-infer orders.json
//!   cat events.jsonl | kiln-infer --ndjson --compact

use anyhow::Result;
use clap::Parser;
use indexmap::IndexMap;
use kiln::{melt_json, EtlConfig, Schema, SchemaBuilder};
use std::fs::File;
use std::io::{stdin, BufReader, Read};

#[derive(Parser, Debug)]
#[command(name = "kiln-infer")]
#[command(about = "Infer SQL column types for flattened JSON", long_about = None)]
struct Args {
    /// Input file (use stdin if omitted)
    #[arg(value_name = "FILE")]
    input: Option<String>,

    /// Process newline-delimited JSON (one JSON object per line)
    #[arg(long)]
    ndjson: bool,

    /// Type every column as TEXT
    #[arg(long)]
    force_text: bool,

    /// Separator for flattened keys (default: "_")
    #[arg(long)]
    separator: Option<String>,

    /// Compact output (no pretty-printing)
    #[arg(long)]
    compact: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let reader: Box<dyn Read> = if let Some(file_path) = &args.input {
        Box::new(BufReader::new(File::open(file_path)?))
    } else {
        Box::new(stdin())
    };

    let mut config = EtlConfig::default();
    if let Some(sep) = args.separator {
        config.separator = sep;
    }

    let etl = melt_json(reader, args.ndjson, config)?;
    if etl.data().is_empty() {
        eprintln!("Warning: No JSON objects found in input");
    }

    let mut schemas: IndexMap<String, Schema> = IndexMap::new();
    let mut builder = SchemaBuilder::new();
    builder.add_dataset(etl.data());
    schemas.insert("main".to_string(), builder.build(args.force_text));

    for (name, child) in etl.nested_tables().iter() {
        let mut builder = SchemaBuilder::new();
        builder.add_dataset(child);
        schemas.insert(name.to_string(), builder.build(args.force_text));
    }

    let output = if args.compact {
        serde_json::to_string(&schemas)?
    } else {
        serde_json::to_string_pretty(&schemas)?
    };

    println!("{}", output);

    Ok(())
}
