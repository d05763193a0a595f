//! Cell values carried through flattening, inference and loading.
//!
//! Documents arrive as `serde_json::Value`, but rows loaded from CSV files or
//! handed over directly may contain floats JSON cannot express (NaN, infinities).
//! `Value` keeps those intact until the row is prepared for binding.

use indexmap::IndexMap;
use std::fmt::Write as _;

/// One row (or one nested document): column name to value, in insertion order.
pub type Record = IndexMap<String, Value>;

static NULL: Value = Value::Null;

/// A single cell of a record
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<Value>),
    Map(Record),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True for a top-level NaN float only
    pub fn is_nan(&self) -> bool {
        matches!(self, Value::Float(f) if f.is_nan())
    }

    pub fn as_map(&self) -> Option<&Record> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Consume the value, returning the record if it is a mapping
    pub fn into_record(self) -> Option<Record> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Encode as compact JSON text.
    ///
    /// Non-finite floats are written as `NaN`, `Infinity` and `-Infinity`
    /// instead of being turned into `null`.
    pub fn to_json_text(&self) -> String {
        let mut out = String::new();
        self.write_json(&mut out);
        out
    }

    fn write_json(&self, out: &mut String) {
        match self {
            Value::Null => out.push_str("null"),
            Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Value::Int(i) => {
                let _ = write!(out, "{}", i);
            }
            Value::Float(f) => write_float(*f, out),
            Value::Text(s) => write_string(s, out),
            Value::List(items) => {
                out.push('[');
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        out.push(',');
                    }
                    item.write_json(out);
                }
                out.push(']');
            }
            Value::Map(map) => {
                out.push('{');
                for (idx, (key, item)) in map.iter().enumerate() {
                    if idx > 0 {
                        out.push(',');
                    }
                    write_string(key, out);
                    out.push(':');
                    item.write_json(out);
                }
                out.push('}');
            }
        }
    }

    /// Text used for a CSV cell; nulls and NaN become empty fields
    pub fn to_field(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) if f.is_nan() => String::new(),
            Value::Float(f) => f.to_string(),
            Value::Text(s) => s.clone(),
            Value::List(_) | Value::Map(_) => self.to_json_text(),
        }
    }
}

fn write_float(f: f64, out: &mut String) {
    if f.is_nan() {
        out.push_str("NaN");
    } else if f.is_infinite() {
        out.push_str(if f > 0.0 { "Infinity" } else { "-Infinity" });
    } else {
        match serde_json::Number::from_f64(f) {
            Some(n) => {
                let _ = write!(out, "{}", n);
            }
            None => {
                let _ = write!(out, "{}", f);
            }
        }
    }
}

fn write_string(s: &str, out: &mut String) {
    // Display on serde_json::Value handles escaping
    let _ = write!(out, "{}", serde_json::Value::from(s));
}

/// Look up a column, reading a missing column as null
pub fn field<'a>(record: &'a Record, column: &str) -> &'a Value {
    record.get(column).unwrap_or(&NULL)
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    n.as_f64().map_or(Value::Null, Value::Float)
                }
            }
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(obj) => Value::Map(
                obj.into_iter()
                    .map(|(key, item)| (key, Value::from(item)))
                    .collect(),
            ),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

/// Convert a JSON object into a record; anything else yields `None`
pub fn record_from_json(value: serde_json::Value) -> Option<Record> {
    Value::from(value).into_record()
}

/// A parameter ready to be bound to a `?` placeholder
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Boolean(bool),
    Text(String),
}
