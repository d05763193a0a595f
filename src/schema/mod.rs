//! Column type inference
//!
//! Derives one destination SQL type per column from the values a dataset
//! actually holds.

pub mod builder;
pub mod inference;

pub use builder::SchemaBuilder;
pub use inference::{infer_schema, ColumnType, Schema};
