//! CSV input
//!
//! Files are located by name fragment inside a directory and parsed into a
//! dataset, sniffing each cell into the narrowest value it fits.

use crate::types::Dataset;
use crate::value::{Record, Value};
use anyhow::{bail, Context, Result};
use std::io::Read;
use std::path::{Path, PathBuf};

/// First `.csv` file in `directory` whose name contains `name`, in sorted order
pub fn find_csv_file(name: &str, directory: &Path) -> Result<PathBuf> {
    let entries = std::fs::read_dir(directory)
        .with_context(|| format!("Failed to read directory: {}", directory.display()))?;

    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|file| file.to_str())
                .map(|file| file.ends_with(".csv") && file.contains(name))
                .unwrap_or(false)
        })
        .collect();
    candidates.sort();

    match candidates.into_iter().next() {
        Some(path) => Ok(path),
        None => bail!("No CSV file matching '{}' in {}", name, directory.display()),
    }
}

/// Parse a CSV file with a header row
pub fn read_csv(path: &Path) -> Result<Dataset> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open CSV file: {}", path.display()))?;
    read_csv_from(file).with_context(|| format!("Failed to parse CSV file: {}", path.display()))
}

pub fn read_csv_from<R: Read>(reader: R) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut records = Vec::new();
    for result in reader.records() {
        let row = result?;
        let record: Record = headers
            .iter()
            .zip(row.iter())
            .map(|(header, cell)| (header.clone(), parse_field(cell)))
            .collect();
        records.push(record);
    }

    Ok(Dataset::from_records(records))
}

/// Empty cells are null; then integer, float, boolean, text
pub fn parse_field(cell: &str) -> Value {
    if cell.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = cell.parse::<i64>() {
        return Value::Int(i);
    }
    if let Ok(f) = cell.parse::<f64>() {
        return Value::Float(f);
    }
    if cell.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if cell.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    Value::Text(cell.to_string())
}
