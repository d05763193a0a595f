use crate::db::{DatabaseInterface, DbError};
use crate::query::{build_create_table, quote_identifier};
use crate::schema::Schema;
use crate::value::{Record, SqlValue, Value};
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection, ErrorCode};
use std::path::Path;
use tracing::{debug, error, info, warn};

/// Default backend: one SQLite connection
pub struct SqliteDatabase {
    connection: Connection,
    name: String,
}

impl SqliteDatabase {
    /// Open (or create) a database file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let path = path.as_ref();
        let connection =
            Connection::open(path).map_err(|err| DbError::Connection(err.to_string()))?;
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("sqlite")
            .to_string();

        info!(database = %name, "Connected to the database");
        Ok(SqliteDatabase { connection, name })
    }

    pub fn open_in_memory() -> Result<Self, DbError> {
        let connection =
            Connection::open_in_memory().map_err(|err| DbError::Connection(err.to_string()))?;
        Ok(SqliteDatabase {
            connection,
            name: String::from("memory"),
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    fn log_failure(&self, action: &str, query: &str, err: &DbError) {
        if !matches!(err, DbError::NoRowsAffected) {
            error!(database = %self.name, query, error = %err, "Unable to execute {}", action);
        }
    }

    fn run_bulk(&mut self, query: &str, rows: &[Vec<SqlValue>]) -> Result<(), DbError> {
        let tx = self.connection.transaction()?;
        {
            let mut statement = tx.prepare(query)?;
            for row in rows {
                statement.execute(params_from_iter(row.iter()))?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

impl DatabaseInterface for SqliteDatabase {
    fn database_name(&self) -> &str {
        &self.name
    }

    fn database_type(&self) -> &str {
        "sqlite"
    }

    fn execute_read_query(&mut self, query: &str, params: &[SqlValue]) -> Result<Vec<Record>, DbError> {
        let result = (|| {
            let mut statement = self.connection.prepare(query)?;
            let names: Vec<String> = statement
                .column_names()
                .into_iter()
                .map(str::to_string)
                .collect();

            let mut rows = statement.query(params_from_iter(params.iter()))?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                let mut record = Record::with_capacity(names.len());
                for (idx, name) in names.iter().enumerate() {
                    record.insert(name.clone(), from_sql(row.get_ref(idx)?));
                }
                records.push(record);
            }
            Ok::<_, DbError>(records)
        })();

        if let Err(err) = &result {
            self.log_failure("read query", query, err);
        }
        result
    }

    fn execute_write_query(
        &mut self,
        query: &str,
        params: &[SqlValue],
        check_affected_rows: bool,
    ) -> Result<(), DbError> {
        let result = self
            .connection
            .execute(query, params_from_iter(params.iter()))
            .map_err(DbError::from)
            .and_then(|changed| {
                if check_affected_rows && changed == 0 {
                    Err(DbError::NoRowsAffected)
                } else {
                    Ok(())
                }
            });

        if let Err(err) = &result {
            self.log_failure("write query", query, err);
        }
        result
    }

    fn execute_write_bulk_query(&mut self, query: &str, rows: &[Vec<SqlValue>]) -> Result<(), DbError> {
        debug!(database = %self.name, rows = rows.len(), "Executing bulk query");
        let result = self.run_bulk(query, rows);

        match &result {
            Ok(()) => debug!(database = %self.name, "Executed bulk query"),
            Err(err) => self.log_failure("bulk query", query, err),
        }
        result
    }

    fn execute_write_batch_query(
        &mut self,
        query: &str,
        rows: &[Vec<SqlValue>],
        batch_size: usize,
    ) -> Result<(), DbError> {
        for chunk in rows.chunks(batch_size.max(1)) {
            self.execute_write_bulk_query(query, chunk)?;
        }
        Ok(())
    }

    fn table_exists(&mut self, table: &str) -> bool {
        let count = self.connection.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get::<_, i64>(0),
        );

        match count {
            Ok(count) => count > 0,
            Err(err) => {
                warn!(database = %self.name, table, error = %err, "Unable to check table existence");
                false
            }
        }
    }

    fn create_table(&mut self, table: &str, schema: &Schema, keys: Option<&[String]>) -> bool {
        if self.table_exists(table) {
            warn!(database = %self.name, table, "Table already exists");
            return false;
        }
        if schema.is_empty() {
            warn!(database = %self.name, table, "Refusing to create a table without columns");
            return false;
        }
        if let Some(keys) = keys {
            debug!(table, ?keys, "Key columns are not enforced as constraints");
        }

        let ddl = build_create_table(table, schema);
        match self.connection.execute_batch(&ddl) {
            Ok(()) => {
                info!(database = %self.name, table, "Table created");
                true
            }
            Err(err) => {
                error!(database = %self.name, table, error = %err, "Unable to create table");
                false
            }
        }
    }

    fn truncate_table(&mut self, table: &str) -> bool {
        // SQLite has no TRUNCATE; an unqualified DELETE is optimized into one
        let query = format!("DELETE FROM {}", quote_identifier(table));
        let truncated = self.execute_write_query(&query, &[], false).is_ok();
        if truncated {
            info!(database = %self.name, table, "Table truncated");
        }
        truncated
    }

    fn drop_table(&mut self, table: &str) -> bool {
        let query = format!("DROP TABLE {}", quote_identifier(table));
        let dropped = self.execute_write_query(&query, &[], false).is_ok();
        if dropped {
            info!(database = %self.name, table, "Table dropped");
        }
        dropped
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::OutOfMemory | ErrorCode::DiskFull | ErrorCode::TooBig) => {
                DbError::ResourceExhausted(err.to_string())
            }
            Some(ErrorCode::CannotOpen) => DbError::Connection(err.to_string()),
            _ => DbError::query(err.to_string()),
        }
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Owned(rusqlite::types::Value::Null),
            SqlValue::Integer(i) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(*i)),
            SqlValue::Real(f) => ToSqlOutput::Owned(rusqlite::types::Value::Real(*f)),
            SqlValue::Boolean(b) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(i64::from(*b))),
            SqlValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}
