use crate::value::{field, Record, Value};
use anyhow::{Context, Result};
use indexmap::{IndexMap, IndexSet};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Rows sharing one ordered column list
///
/// The column list is the union of every record's keys in first-seen order,
/// so sparse records line up the way a frame built from mappings would.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Record>,
}

impl Dataset {
    pub fn new() -> Self {
        Dataset::default()
    }

    pub fn from_records(rows: Vec<Record>) -> Self {
        let mut columns: IndexSet<String> = IndexSet::new();
        for row in &rows {
            columns.extend(row.keys().cloned());
        }

        Dataset {
            columns: columns.into_iter().collect(),
            rows,
        }
    }

    /// Build a dataset from JSON objects; non-object values are skipped
    pub fn from_json(values: Vec<serde_json::Value>) -> Self {
        let rows = values
            .into_iter()
            .filter_map(crate::value::record_from_json)
            .collect();
        Self::from_records(rows)
    }

    /// Append one record. Checks each key against the known columns, so
    /// building from many records goes through `from_records` instead.
    pub fn push(&mut self, record: Record) {
        for key in record.keys() {
            if !self.columns.iter().any(|c| c == key) {
                self.columns.push(key.clone());
            }
        }
        self.rows.push(record);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Record> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Every value of one column, nulls included for rows missing it
    pub fn column_values<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.rows.iter().map(move |row| field(row, column))
    }
}

impl FromIterator<Record> for Dataset {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Dataset::from_records(iter.into_iter().collect())
    }
}

/// Child tables pulled out of list-valued fields, keyed by field name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NestedTableSet {
    tables: IndexMap<String, Dataset>,
}

impl NestedTableSet {
    pub fn insert(&mut self, name: String, dataset: Dataset) {
        self.tables.insert(name, dataset);
    }

    pub fn get(&self, name: &str) -> Option<&Dataset> {
        self.tables.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Dataset)> {
        self.tables.iter().map(|(name, data)| (name.as_str(), data))
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Configuration for extraction and loading
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EtlConfig {
    /// Separator placed between parent and nested keys when flattening
    pub separator: String,

    /// Parent columns copied into every extracted child row
    pub reference_keys: Vec<String>,

    /// Try a single bulk call before falling back to row-by-row writes
    pub bulk_execute: bool,

    /// Show a progress bar during row-by-row fallback
    pub show_progress: bool,

    /// Directory searched for CSV input and used for CSV output
    pub downloads_dir: PathBuf,
}

impl Default for EtlConfig {
    fn default() -> Self {
        EtlConfig {
            separator: String::from("_"),
            reference_keys: vec![],
            bulk_execute: true,
            show_progress: true,
            downloads_dir: PathBuf::from("."),
        }
    }
}

impl EtlConfig {
    /// Load a configuration from a JSON file; missing fields take defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_columns_are_union_in_first_seen_order() {
        let dataset = Dataset::from_json(vec![
            json!({"a": 1, "b": 2}),
            json!({"c": 3, "a": 4}),
        ]);
        assert_eq!(dataset.columns(), &["a", "b", "c"]);

        let c: Vec<&Value> = dataset.column_values("c").collect();
        assert_eq!(c, vec![&Value::Null, &Value::Int(3)]);
    }

    #[test]
    fn test_push_extends_columns() {
        let mut dataset = Dataset::new();
        dataset.push(crate::value::record_from_json(json!({"x": 1})).unwrap());
        dataset.push(crate::value::record_from_json(json!({"y": 2})).unwrap());
        assert_eq!(dataset.columns(), &["x", "y"]);
        assert_eq!(dataset.len(), 2);
    }

    #[test]
    fn test_config_defaults_fill_missing_fields() {
        let config: EtlConfig = serde_json::from_value(json!({"separator": "."})).unwrap();
        assert_eq!(config.separator, ".");
        assert!(config.bulk_execute);
    }
}
