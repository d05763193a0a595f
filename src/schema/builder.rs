//! Streaming column type accumulator
//!
//! Rather than typing every value and merging the results, the builder keeps
//! one small set of observed value kinds per column and resolves the column
//! type once, at the end.

use crate::schema::inference::{ColumnType, Schema};
use crate::types::Dataset;
use crate::value::{Record, Value};
use indexmap::IndexMap;
use std::collections::HashSet;
use tracing::debug;

/// Kind of a runtime value, as far as column typing cares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ValueKind {
    Null,
    Boolean,
    Integer,
    Float,
    Text,
    List,
    Map,
}

impl ValueKind {
    fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Boolean,
            Value::Int(_) => ValueKind::Integer,
            // NaN is still a float
            Value::Float(_) => ValueKind::Float,
            Value::Text(_) => ValueKind::Text,
            Value::List(_) => ValueKind::List,
            Value::Map(_) => ValueKind::Map,
        }
    }
}

/// Observed kinds for one column
#[derive(Debug, Default)]
struct ColumnStats {
    kinds: HashSet<ValueKind>,
    sample_count: usize,
}

impl ColumnStats {
    fn add_value(&mut self, value: &Value) {
        self.sample_count += 1;
        self.kinds.insert(ValueKind::from_value(value));
    }

    fn resolve(&self) -> ColumnType {
        let observed: Vec<ValueKind> = self
            .kinds
            .iter()
            .copied()
            .filter(|kind| *kind != ValueKind::Null)
            .collect();

        if observed.is_empty() {
            return ColumnType::Text;
        }

        if observed.iter().all(|k| *k == ValueKind::Integer) {
            ColumnType::Integer
        } else if observed
            .iter()
            .all(|k| matches!(k, ValueKind::Integer | ValueKind::Float))
        {
            ColumnType::Real
        } else if observed.iter().all(|k| *k == ValueKind::Boolean) {
            ColumnType::Boolean
        } else {
            ColumnType::Text
        }
    }
}

/// Accumulates value kinds per column and builds a `Schema`
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    columns: IndexMap<String, ColumnStats>,
    record_count: usize,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        SchemaBuilder::default()
    }

    /// Register a column without observing a value for it
    pub fn add_column(&mut self, column: &str) {
        if !self.columns.contains_key(column) {
            self.columns.insert(column.to_string(), ColumnStats::default());
        }
    }

    pub fn add_record(&mut self, record: &Record) {
        self.record_count += 1;
        for (column, value) in record.iter() {
            self.add_column(column);
            if let Some(stats) = self.columns.get_mut(column) {
                stats.add_value(value);
            }
        }
    }

    /// Add every row of a dataset, keeping the dataset's column order
    pub fn add_dataset(&mut self, dataset: &Dataset) {
        for column in dataset.columns() {
            self.add_column(column);
        }
        for row in dataset.rows() {
            self.add_record(row);
        }
    }

    pub fn record_count(&self) -> usize {
        self.record_count
    }

    /// Resolve a type per column; `force_text` types every column as TEXT
    pub fn build(self, force_text: bool) -> Schema {
        self.columns
            .into_iter()
            .map(|(column, stats)| {
                let column_type = if force_text {
                    ColumnType::Text
                } else {
                    stats.resolve()
                };

                let non_null = stats.kinds.iter().filter(|k| **k != ValueKind::Null).count();
                if !force_text && column_type == ColumnType::Text && non_null > 1 {
                    debug!(column = %column, samples = stats.sample_count, "Mixed value kinds, typing as TEXT");
                }

                (column, column_type)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::record_from_json;
    use serde_json::json;

    #[test]
    fn test_nulls_are_ignored() {
        let mut builder = SchemaBuilder::new();
        builder.add_record(&record_from_json(json!({"n": 1})).unwrap());
        builder.add_record(&record_from_json(json!({"n": null})).unwrap());

        let schema = builder.build(false);
        assert_eq!(schema.get("n"), Some(ColumnType::Integer));
    }

    #[test]
    fn test_all_null_column_is_text() {
        let mut builder = SchemaBuilder::new();
        builder.add_record(&record_from_json(json!({"n": null})).unwrap());

        assert_eq!(builder.build(false).get("n"), Some(ColumnType::Text));
    }

    #[test]
    fn test_bool_mixed_with_int_is_text() {
        let mut builder = SchemaBuilder::new();
        builder.add_record(&record_from_json(json!({"flag": true})).unwrap());
        builder.add_record(&record_from_json(json!({"flag": 0})).unwrap());

        assert_eq!(builder.build(false).get("flag"), Some(ColumnType::Text));
    }

    #[test]
    fn test_record_count() {
        let mut builder = SchemaBuilder::new();
        builder.add_record(&record_from_json(json!({"a": 1})).unwrap());
        builder.add_record(&record_from_json(json!({"b": 1})).unwrap());
        assert_eq!(builder.record_count(), 2);
    }
}
