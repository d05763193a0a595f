use crate::types::Dataset;
use crate::value::{field, SqlValue, Value};

/// Turn a cell into a bindable parameter.
///
/// Lists and mappings become JSON text first; only a NaN left at the top level
/// afterwards becomes NULL, so a NaN inside a list survives as `NaN` text.
pub fn prepare_value(value: &Value) -> SqlValue {
    match value {
        Value::List(_) | Value::Map(_) => SqlValue::Text(value.to_json_text()),
        Value::Null => SqlValue::Null,
        Value::Float(f) if f.is_nan() => SqlValue::Null,
        Value::Float(f) => SqlValue::Real(*f),
        Value::Int(i) => SqlValue::Integer(*i),
        Value::Bool(b) => SqlValue::Boolean(*b),
        Value::Text(s) => SqlValue::Text(s.clone()),
    }
}

/// One parameter tuple per row, columns taken in `order`
pub fn prepare_rows(dataset: &Dataset, order: &[String]) -> Vec<Vec<SqlValue>> {
    dataset
        .rows()
        .iter()
        .map(|row| order.iter().map(|column| prepare_value(field(row, column))).collect())
        .collect()
}
