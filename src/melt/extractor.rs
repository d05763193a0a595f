use crate::types::{Dataset, EtlConfig, NestedTableSet};
use crate::value::{Record, Value};
use indexmap::IndexSet;
use tracing::debug;

/// Flattens nested documents into rows and pulls list fields out into child tables
pub struct JsonMelter {
    config: EtlConfig,
}

impl JsonMelter {
    pub fn new(config: EtlConfig) -> Self {
        JsonMelter { config }
    }

    /// Flatten every document, then optionally extract list-valued columns.
    ///
    /// Extraction runs once over the flattened top level. Items moved into a
    /// child table are neither flattened nor extracted again here.
    pub fn flatten_and_extract(
        &self,
        documents: Vec<Record>,
        extract_sublists: bool,
    ) -> (Dataset, NestedTableSet) {
        let mut rows: Vec<Record> = documents
            .into_iter()
            .map(|doc| flatten_record(doc, &self.config.separator))
            .collect();

        let nested = if extract_sublists && !rows.is_empty() {
            self.extract_sublists(&mut rows)
        } else {
            NestedTableSet::default()
        };

        (Dataset::from_records(rows), nested)
    }

    /// Remove list-valued columns from the rows and pool their mapping items
    fn extract_sublists(&self, rows: &mut [Record]) -> NestedTableSet {
        // A column counts as soon as one row holds a list in it
        let mut list_columns: IndexSet<String> = IndexSet::new();
        for row in rows.iter() {
            for (key, value) in row.iter() {
                if matches!(value, Value::List(_)) {
                    list_columns.insert(key.clone());
                }
            }
        }

        let mut nested = NestedTableSet::default();

        for column in list_columns {
            let mut items = Vec::new();

            for row in rows.iter_mut() {
                let Some(value) = row.shift_remove(&column) else {
                    continue;
                };

                if let Value::List(list) = value {
                    for item in list {
                        // Non-mapping items have no columns to land in
                        if let Value::Map(mut child) = item {
                            self.copy_reference_keys(row, &mut child);
                            items.push(child);
                        }
                    }
                }
            }

            debug!(table = %column, rows = items.len(), "Extracted nested table");
            nested.insert(column, Dataset::from_records(items));
        }

        nested
    }

    fn copy_reference_keys(&self, parent: &Record, child: &mut Record) {
        for key in &self.config.reference_keys {
            if let Some(value) = parent.get(key) {
                child.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Join nested mappings into one level, `{"a": {"b": 1}}` becoming `{"a_b": 1}`
/// with the default separator. Lists and scalars are kept as they are.
pub fn flatten_record(record: Record, separator: &str) -> Record {
    let mut flat = Record::with_capacity(record.len());
    flatten_into(&mut flat, None, record, separator);
    flat
}

fn flatten_into(flat: &mut Record, prefix: Option<&str>, record: Record, separator: &str) {
    for (key, value) in record {
        let name = match prefix {
            Some(parent) => format!("{}{}{}", parent, separator, key),
            None => key,
        };

        match value {
            Value::Map(nested) => flatten_into(flat, Some(&name), nested, separator),
            other => {
                flat.insert(name, other);
            }
        }
    }
}
