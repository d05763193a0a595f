//! # Kiln - JSON and CSV to SQL loading toolkit
//!
//! Flattens semi-structured records into relational rows, infers a column type
//! per column and synchronizes the result into a SQL table, either by plain
//! inserts or by keyed update-or-insert.
//!
//! ## Modules
//!
//! - **melt**: Flatten nested documents and split list fields into child tables
//! - **schema**: Infer one SQL column type per column from the values seen
//! - **query**: Render CREATE, INSERT, UPDATE and insert-if-absent statements
//! - **upsert**: Choose a write strategy and run it with row-level fallback
//! - **db**: The `DatabaseInterface` capability set and its SQLite backend
//! - **etl**: The `Etl` facade tying extraction and loading together
//!
//! ## Quick Start
//!
//! ```rust
//! use kiln::{Etl, EtlConfig, LoadOptions, SqliteDatabase};
//! use kiln::value::record_from_json;
//! use serde_json::json;
//!
//! # fn main() -> anyhow::Result<()> {
//! let documents = vec![
//!     json!({"id": 1, "user": {"name": "Alice"}, "tags": [{"tag": "a"}]}),
//!     json!({"id": 2, "user": {"name": "Bob"}, "tags": []}),
//! ];
//!
//! let mut etl = Etl::new(EtlConfig::default());
//! etl.extract_json(
//!     || Ok(documents.into_iter().filter_map(record_from_json).collect()),
//!     true,
//! )?;
//!
//! // main table: id, user_name; child table "tags"
//! let mut db = SqliteDatabase::open_in_memory()?;
//! etl.to_db("posts", &mut db, &LoadOptions::default())?;
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use std::io::{BufReader, Read};
use tracing::warn;

pub mod csv_source;
pub mod db;
pub mod etl;
pub mod melt;
pub mod query;
pub mod schema;
pub mod types;
pub mod upsert;
pub mod value;

// Re-export commonly used types for convenience
pub use db::{DatabaseInterface, DbError, SqliteDatabase};
pub use etl::{Etl, LoadOptions};
pub use melt::{DatasetWriter, JsonMelter};
pub use query::{update_to_insert, UpsertStatements};
pub use schema::{infer_schema, ColumnType, Schema, SchemaBuilder};
pub use types::{Dataset, EtlConfig, NestedTableSet};
pub use upsert::{SyncError, SyncReport, UpsertEngine};
pub use value::{Record, SqlValue, Value};

/// Read documents from a JSON stream.
///
/// Objects are taken as documents and top-level arrays contribute their object
/// elements. Without `ndjson` only the first value of the stream is read.
pub fn read_documents<R: Read>(reader: R, ndjson: bool) -> Result<Vec<Record>> {
    let stream = serde_json::Deserializer::from_reader(BufReader::new(reader))
        .into_iter::<serde_json::Value>();
    let mut documents = Vec::new();

    for result in stream {
        let parsed = result.context("Failed to parse JSON")?;

        match parsed {
            serde_json::Value::Array(items) => {
                documents.extend(items.into_iter().filter_map(value::record_from_json));
            }
            other => match value::record_from_json(other) {
                Some(record) => documents.push(record),
                None => warn!("Skipping a JSON value that is not an object"),
            },
        }

        if !ndjson {
            break;
        }
    }

    Ok(documents)
}

/// Main entry point: read a JSON stream and melt it into an `Etl` ready to load
pub fn melt_json<R: Read>(reader: R, ndjson: bool, config: EtlConfig) -> Result<Etl> {
    let mut etl = Etl::new(config);
    etl.extract_json(|| read_documents(reader, ndjson), true)?;
    Ok(etl)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_documents_array() {
        let input = r#"[{"id": 1}, 5, {"id": 2}]"#;
        let documents = read_documents(input.as_bytes(), false).unwrap();
        assert_eq!(documents.len(), 2);
    }

    #[test]
    fn test_read_documents_ndjson() {
        let input = "{\"id\": 1}\n{\"id\": 2}\n\n{\"id\": 3}\n";
        assert_eq!(read_documents(input.as_bytes(), true).unwrap().len(), 3);
        assert_eq!(read_documents(input.as_bytes(), false).unwrap().len(), 1);
    }

    #[test]
    fn test_read_documents_reports_bad_json() {
        assert!(read_documents("{\"id\": ".as_bytes(), true).is_err());
    }

    #[test]
    fn test_basic_melting() {
        let input = r#"{"id": 1, "name": "Alice", "posts": [{"id": 10, "title": "Post 1"}, {"id": 11, "title": "Post 2"}]}"#;

        let etl = melt_json(input.as_bytes(), false, EtlConfig::default()).unwrap();

        assert_eq!(etl.data().columns(), &["id", "name"]);
        assert_eq!(etl.nested_tables().get("posts").unwrap().len(), 2);
    }
}
