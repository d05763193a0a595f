//! Destination column types inferred from dataset values

use crate::schema::builder::SchemaBuilder;
use crate::types::Dataset;
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;

/// Destination type of one column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnType {
    Integer,
    Real,
    Boolean,
    /// Variable-length text; also the fallback for anything unresolvable
    Text,
}

impl ColumnType {
    pub fn sql_name(self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Text => "TEXT",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_name())
    }
}

/// Column name to destination type, in dataset column order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Schema {
    columns: IndexMap<String, ColumnType>,
}

impl Schema {
    pub fn new() -> Self {
        Schema::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, column_type: ColumnType) {
        self.columns.insert(column.into(), column_type);
    }

    pub fn get(&self, column: &str) -> Option<ColumnType> {
        self.columns.get(column).copied()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ColumnType)> {
        self.columns.iter().map(|(name, ty)| (name.as_str(), *ty))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl FromIterator<(String, ColumnType)> for Schema {
    fn from_iter<I: IntoIterator<Item = (String, ColumnType)>>(iter: I) -> Self {
        Schema {
            columns: iter.into_iter().collect(),
        }
    }
}

/// Main entry point: infer one destination type per dataset column
///
/// Only integers give INTEGER, floats (alone or with integers) give REAL,
/// only booleans give BOOLEAN. Everything else, including all-null columns,
/// is TEXT. `force_text` overrides every column to TEXT.
pub fn infer_schema(dataset: &Dataset, force_text: bool) -> Schema {
    let mut builder = SchemaBuilder::new();
    builder.add_dataset(dataset);
    builder.build(force_text)
}
