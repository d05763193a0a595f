use crate::csv_source::{find_csv_file, read_csv};
use crate::db::DatabaseInterface;
use crate::melt::{DatasetWriter, JsonMelter};
use crate::schema::infer_schema;
use crate::types::{Dataset, EtlConfig, NestedTableSet};
use crate::upsert::{SyncError, SyncReport, SyncRequest, UpsertEngine};
use crate::value::{Record, SqlValue, Value};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Datasets at or below this size are dumped at debug level after extraction
const DUMP_LIMIT: usize = 5;

/// How `Etl::to_db` writes into the destination
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub truncate: bool,
    pub recreate: bool,
    /// Type every column as TEXT
    pub force_text: bool,
    /// Key columns for update-or-insert; `None` always inserts
    pub keys: Option<Vec<String>>,
    /// Keys for nested tables, defaulting to `keys`
    pub nested_keys: Option<Vec<String>>,
}

/// Holds the current dataset and its nested tables between extraction and loading
pub struct Etl {
    config: EtlConfig,
    data: Dataset,
    nested: NestedTableSet,
}

impl Etl {
    pub fn new(config: EtlConfig) -> Self {
        Etl {
            config,
            data: Dataset::new(),
            nested: NestedTableSet::default(),
        }
    }

    pub fn config(&self) -> &EtlConfig {
        &self.config
    }

    pub fn data(&self) -> &Dataset {
        &self.data
    }

    /// Child tables produced by the last JSON extraction
    pub fn nested_tables(&self) -> &NestedTableSet {
        &self.nested
    }

    /// Pull documents from `source`, then flatten and optionally extract sublists.
    ///
    /// Errors from the source propagate unchanged apart from added context.
    pub fn extract_json<F>(&mut self, source: F, extract_sublists: bool) -> Result<&Dataset>
    where
        F: FnOnce() -> Result<Vec<Record>>,
    {
        info!("Data extraction started");
        let documents = source().context("Data extraction failed")?;
        info!(documents = documents.len(), "Data extraction complete");

        Ok(self.extract_documents(documents, extract_sublists))
    }

    pub fn extract_documents(&mut self, documents: Vec<Record>, extract_sublists: bool) -> &Dataset {
        let melter = JsonMelter::new(self.config.clone());
        let (data, nested) = melter.flatten_and_extract(documents, extract_sublists);

        self.data = data;
        self.nested = nested;
        self.log_records();
        &self.data
    }

    /// Read the first CSV whose name contains `filename`, searching
    /// `directory` or the configured downloads directory
    pub fn extract_csv(&mut self, filename: &str, directory: Option<&Path>) -> Result<&Dataset> {
        let directory = directory.unwrap_or(self.config.downloads_dir.as_path());
        let path = find_csv_file(filename, directory)?;
        info!(path = %path.display(), "Data extraction started");

        self.data = read_csv(&path)?;
        self.nested = NestedTableSet::default();
        self.log_records();
        Ok(&self.data)
    }

    /// Run a read query against `db` and take its rows as the dataset
    pub fn extract_db(
        &mut self,
        db: &mut dyn DatabaseInterface,
        query: &str,
        params: &[SqlValue],
    ) -> Result<&Dataset> {
        info!(database = db.database_name(), "Data extraction started");
        let records = db
            .execute_read_query(query, params)
            .context("Data extraction failed")?;

        self.data = Dataset::from_records(records);
        self.nested = NestedTableSet::default();
        self.log_records();
        Ok(&self.data)
    }

    /// Take an already tabular dataset as is
    pub fn load(&mut self, dataset: Dataset) -> &Dataset {
        self.data = dataset;
        self.nested = NestedTableSet::default();
        self.log_records();
        &self.data
    }

    /// Write the dataset to `<directory>/<filename>.csv`, nested tables to
    /// `<filename>_<child>.csv`. Returns `None` when there is nothing to write.
    pub fn to_csv(&self, filename: &str, directory: Option<&Path>) -> Result<Option<PathBuf>> {
        if self.has_nothing_to_write() {
            warn!(filename, "Dataset is empty");
            return Ok(None);
        }

        let directory = directory.unwrap_or(self.config.downloads_dir.as_path());

        for (name, child) in self.nested.iter() {
            let child_name = format!("{}_{}", filename, name);
            debug!(table = %child_name, "Writing nested table");
            self.child(child).to_csv(&child_name, Some(directory))?;
        }

        let writer = DatasetWriter::new(directory)?;
        let path = writer.write_table(filename, &self.data)?;
        info!(path = %path.display(), rows = self.data.len(), "CSV file created");
        Ok(Some(path))
    }

    /// Synchronize the dataset into `table`, nested tables first into
    /// `<table>_<child>`. Returns `None` when there is nothing to load.
    pub fn to_db(
        &self,
        table: &str,
        db: &mut dyn DatabaseInterface,
        options: &LoadOptions,
    ) -> Result<Option<SyncReport>, SyncError> {
        if self.has_nothing_to_write() {
            warn!(table, "Dataset is empty");
            return Ok(None);
        }

        for (name, child) in self.nested.iter() {
            let child_table = format!("{}_{}", table, name);
            let child = self.child(child);

            let mut keys = options.nested_keys.clone().or_else(|| options.keys.clone());
            if let Some(missing) = keys
                .as_deref()
                .and_then(|keys| keys.iter().find(|key| !child.data.has_column(key)).cloned())
            {
                warn!(table = %child_table, key = %missing, "Nested table lacks key column, inserting without keys");
                keys = None;
            }

            let child_options = LoadOptions {
                keys,
                nested_keys: None,
                ..options.clone()
            };
            child.to_db(&child_table, db, &child_options)?;
        }

        let schema = infer_schema(&self.data, options.force_text);
        let table_exists = db.table_exists(table);
        let table_has_rows = table_exists && db.table_has_rows(table);

        let request = SyncRequest {
            table,
            dataset: &self.data,
            schema: &schema,
            keys: options.keys.as_deref(),
            truncate: options.truncate,
            recreate: options.recreate,
            table_exists,
            table_has_rows,
        };

        UpsertEngine::new(db, &self.config).synchronize(&request).map(Some)
    }

    /// Rows without any column, such as extracted lists of `{}`, count as empty
    fn has_nothing_to_write(&self) -> bool {
        self.data.is_empty() || self.data.columns().is_empty()
    }

    /// Nested rows go through their own flatten and extract pass
    fn child(&self, dataset: &Dataset) -> Etl {
        let mut etl = Etl::new(self.config.clone());
        etl.extract_documents(dataset.rows().to_vec(), true);
        etl
    }

    fn log_records(&self) {
        info!(records = self.data.len(), nested = self.nested.len(), "Dataset ready");

        if !self.data.is_empty() && self.data.len() <= DUMP_LIMIT {
            for row in self.data.rows() {
                let text = Value::Map(row.clone()).to_json_text();
                debug!(row = %text, "Record");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteDatabase;
    use crate::value::record_from_json;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    fn config() -> EtlConfig {
        EtlConfig {
            show_progress: false,
            ..Default::default()
        }
    }

    fn documents(values: Vec<serde_json::Value>) -> Vec<Record> {
        values.into_iter().filter_map(record_from_json).collect()
    }

    fn select(db: &mut SqliteDatabase, query: &str) -> Vec<Record> {
        db.execute_read_query(query, &[]).unwrap()
    }

    #[test]
    fn test_extract_json_with_sublists() {
        let mut etl = Etl::new(config());
        let data = etl
            .extract_json(
                || {
                    Ok(documents(vec![
                        json!({"a": 1, "items": [{"x": 1}, {"x": 2}], "b": 2}),
                        json!({"a": 3, "items": [{"x": 9}, 7], "b": 4}),
                    ]))
                },
                true,
            )
            .unwrap();

        assert_eq!(data.columns(), &["a", "b"]);
        assert_eq!(etl.nested_tables().get("items").unwrap().len(), 3);
    }

    #[test]
    fn test_extract_json_propagates_source_errors() {
        let mut etl = Etl::new(config());
        let result = etl.extract_json(|| anyhow::bail!("service unavailable"), true);

        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("service unavailable"));
    }

    #[test]
    fn test_extract_csv_from_directory() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("export_users.csv"), "id,name\n1,a\n2,b\n").unwrap();

        let mut etl = Etl::new(config());
        let data = etl.extract_csv("users", Some(dir.path())).unwrap();

        assert_eq!(data.len(), 2);
        assert_eq!(data.rows()[0]["id"], Value::Int(1));
    }

    #[test]
    fn test_to_csv_writes_nested_tables() {
        let dir = tempdir().unwrap();
        let mut etl = Etl::new(config());
        etl.extract_documents(
            documents(vec![json!({"id": 1, "lines": [{"sku": "a"}, {"sku": "b"}]})]),
            true,
        );

        let path = etl.to_csv("orders", Some(dir.path())).unwrap().unwrap();

        let main = fs::read_to_string(path).unwrap();
        assert_eq!(main.lines().collect::<Vec<_>>(), vec!["id", "1"]);

        let lines = fs::read_to_string(dir.path().join("orders_lines.csv")).unwrap();
        assert_eq!(lines.lines().collect::<Vec<_>>(), vec!["sku", "a", "b"]);
    }

    #[test]
    fn test_empty_dataset_is_a_noop() {
        let dir = tempdir().unwrap();
        let etl = Etl::new(config());
        let mut db = SqliteDatabase::open_in_memory().unwrap();

        assert!(etl.to_csv("nothing", Some(dir.path())).unwrap().is_none());
        assert!(etl.to_db("nothing", &mut db, &LoadOptions::default()).unwrap().is_none());
        assert!(!db.table_exists("nothing"));
    }

    #[test]
    fn test_to_db_recreate_is_idempotent() {
        let mut db = SqliteDatabase::open_in_memory().unwrap();
        let mut etl = Etl::new(config());
        etl.extract_documents(
            documents(vec![json!({"id": 1, "v": 1.5}), json!({"id": 2, "v": null})]),
            true,
        );
        let options = LoadOptions {
            recreate: true,
            ..Default::default()
        };

        for _ in 0..2 {
            etl.to_db("metrics", &mut db, &options).unwrap();
            assert_eq!(select(&mut db, r#"SELECT * FROM "metrics""#).len(), 2);
        }
    }

    #[test]
    fn test_to_db_upserts_by_key() {
        let mut db = SqliteDatabase::open_in_memory().unwrap();
        let options = LoadOptions {
            keys: Some(vec!["id".to_string()]),
            ..Default::default()
        };

        let mut first = Etl::new(config());
        first.extract_documents(
            documents(vec![json!({"id": 1, "name": "a"}), json!({"id": 2, "name": "b"})]),
            true,
        );
        first.to_db("users", &mut db, &options).unwrap();

        let mut second = Etl::new(config());
        second.extract_documents(
            documents(vec![json!({"id": 2, "name": "bb"}), json!({"id": 3, "name": "c"})]),
            true,
        );
        let report = second.to_db("users", &mut db, &options).unwrap().unwrap();
        assert_eq!(report.path, crate::upsert::SyncPath::UpdateOrInsert);

        let rows = select(&mut db, r#"SELECT "id", "name" FROM "users" ORDER BY "id""#);
        let names: Vec<&Value> = rows.iter().map(|row| &row["name"]).collect();
        assert_eq!(names, vec![&Value::from("a"), &Value::from("bb"), &Value::from("c")]);
    }

    #[test]
    fn test_to_db_row_fallback_upserts() {
        let mut db = SqliteDatabase::open_in_memory().unwrap();
        let config = EtlConfig {
            bulk_execute: false,
            ..config()
        };
        let options = LoadOptions {
            keys: Some(vec!["id".to_string()]),
            ..Default::default()
        };

        let mut etl = Etl::new(config.clone());
        etl.extract_documents(documents(vec![json!({"id": 1, "n": 1})]), true);
        etl.to_db("counts", &mut db, &options).unwrap();

        let mut etl = Etl::new(config);
        etl.extract_documents(documents(vec![json!({"id": 1, "n": 5}), json!({"id": 2, "n": 7})]), true);
        let report = etl.to_db("counts", &mut db, &options).unwrap().unwrap();

        assert!(report.row_fallback);
        assert_eq!(report.rows_written, 2);
        let rows = select(&mut db, r#"SELECT "n" FROM "counts" ORDER BY "id""#);
        assert_eq!(rows[0]["n"], Value::Int(5));
        assert_eq!(rows[1]["n"], Value::Int(7));
    }

    #[test]
    fn test_to_db_loads_nested_tables() {
        let mut db = SqliteDatabase::open_in_memory().unwrap();
        let config = EtlConfig {
            reference_keys: vec!["order_id".to_string()],
            ..config()
        };
        let mut etl = Etl::new(config);
        etl.extract_documents(
            documents(vec![json!({
                "order_id": 7,
                "customer": {"name": "x"},
                "lines": [{"sku": "a", "qty": 1}, {"sku": "b", "qty": 2}]
            })]),
            true,
        );

        let options = LoadOptions {
            keys: Some(vec!["order_id".to_string()]),
            nested_keys: Some(vec!["order_id".to_string(), "sku".to_string()]),
            ..Default::default()
        };
        etl.to_db("orders", &mut db, &options).unwrap();

        assert!(db.table_exists("orders"));
        let lines = select(&mut db, r#"SELECT * FROM "orders_lines" ORDER BY "sku""#);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["order_id"], Value::Int(7));

        let orders = select(&mut db, r#"SELECT "customer_name" FROM "orders""#);
        assert_eq!(orders[0]["customer_name"], Value::from("x"));
    }

    #[test]
    fn test_nested_table_without_key_column_still_loads() {
        let mut db = SqliteDatabase::open_in_memory().unwrap();
        let mut etl = Etl::new(config());
        etl.extract_documents(documents(vec![json!({"id": 1, "tags": [{"t": "a"}]})]), true);

        let options = LoadOptions {
            keys: Some(vec!["id".to_string()]),
            ..Default::default()
        };
        etl.to_db("posts", &mut db, &options).unwrap();

        assert_eq!(select(&mut db, r#"SELECT * FROM "posts_tags""#).len(), 1);
    }

    #[test]
    fn test_empty_child_items_do_not_block_parent() {
        let dir = tempdir().unwrap();
        let mut db = SqliteDatabase::open_in_memory().unwrap();
        let mut etl = Etl::new(config());
        etl.extract_documents(documents(vec![json!({"id": 1, "tags": [{}, {}]})]), true);
        assert!(etl.nested_tables().get("tags").unwrap().columns().is_empty());

        let report = etl.to_db("posts", &mut db, &LoadOptions::default()).unwrap();

        assert_eq!(report.unwrap().rows_written, 1);
        assert!(db.table_exists("posts"));
        assert!(!db.table_exists("posts_tags"));

        assert!(etl.to_csv("posts", Some(dir.path())).unwrap().is_some());
        assert!(!dir.path().join("posts_tags.csv").exists());
    }

    #[test]
    fn test_columnless_rows_are_a_noop() {
        let mut db = SqliteDatabase::open_in_memory().unwrap();
        let mut etl = Etl::new(config());
        etl.extract_documents(documents(vec![json!({"tags": ["a", "b"]})]), true);
        assert_eq!(etl.data().len(), 1);

        assert!(etl.to_db("t", &mut db, &LoadOptions::default()).unwrap().is_none());
        assert!(!db.table_exists("t"));
    }

    #[test]
    fn test_extract_db_reads_query_rows() {
        let mut db = SqliteDatabase::open_in_memory().unwrap();
        let mut source = Etl::new(config());
        source.extract_documents(
            documents(vec![
                json!({"id": 1, "name": "a", "score": 1.5}),
                json!({"id": 2, "name": "b", "score": null}),
                json!({"id": 3, "name": "c", "score": 3.0}),
            ]),
            true,
        );
        source.to_db("scores", &mut db, &LoadOptions::default()).unwrap();

        let mut etl = Etl::new(config());
        let data = etl
            .extract_db(
                &mut db,
                r#"SELECT "id", "name", "score" FROM "scores" WHERE "id" >= ? ORDER BY "id""#,
                &[SqlValue::Integer(2)],
            )
            .unwrap();

        assert_eq!(data.columns(), &["id", "name", "score"]);
        assert_eq!(data.len(), 2);
        assert_eq!(data.rows()[0]["name"], Value::from("b"));
        assert_eq!(data.rows()[0]["score"], Value::Null);
        assert_eq!(data.rows()[1]["score"], Value::Float(3.0));
        assert!(etl.nested_tables().is_empty());
    }

    #[test]
    fn test_extract_db_reports_query_errors() {
        let mut db = SqliteDatabase::open_in_memory().unwrap();
        let mut etl = Etl::new(config());

        assert!(etl.extract_db(&mut db, r#"SELECT * FROM "missing""#, &[]).is_err());
    }
}
